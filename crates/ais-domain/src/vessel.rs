use chrono::{DateTime, Utc};

/// Insert-or-update payload for the `vessel_identity` table.
///
/// One row per IMO number; repeated static reports for the same vessel
/// overwrite the dimension fields (most recent wins).
#[derive(Debug, Clone, PartialEq)]
pub struct VesselUpsert {
    pub imo_number: i64,
    pub mmsi: i64,
    pub name: Option<String>,
    pub type_code: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub max_draught: Option<f64>,
    pub destination: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only position report, linked to a vessel identity when the MMSI
/// resolved at routing time.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub imo_number: Option<i64>,
    pub mmsi: i64,
    pub lat: f64,
    pub lon: f64,
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
    pub nav_status: Option<i32>,
    pub rate_of_turn: Option<f64>,
    pub true_heading: Option<i32>,
    pub collected_at: DateTime<Utc>,
}

/// Record for an event whose MMSI never resolved to an IMO number.
///
/// Keyed by MMSI alone; never promoted retroactively once an identity
/// becomes known.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownVesselRecord {
    pub mmsi: i64,
    pub name: Option<String>,
    pub destination: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
    pub nav_status: Option<i32>,
    pub collected_at: DateTime<Utc>,
}

/// Declared dimensions of one stored vessel, as scanned by the correction
/// worker.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselDimensions {
    pub imo_number: i64,
    pub type_code: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
}

/// Which dimension field a correction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionField {
    Length,
    Width,
}

impl DimensionField {
    pub fn column(&self) -> &'static str {
        match self {
            DimensionField::Length => "length",
            DimensionField::Width => "width",
        }
    }
}

/// An applied dimension repair. The storage layer writes the vessel update
/// and the matching `correction_audit` row in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionCorrection {
    pub imo_number: i64,
    pub field: DimensionField,
    pub old_value: Option<f64>,
    pub new_value: f64,
    pub method: String,
    pub applied_at: DateTime<Utc>,
}
