use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame has no MessageType field")]
    MissingMessageType,

    #[error("unsupported message type: {0}")]
    UnsupportedType(String),

    #[error("frame metadata has no coordinates")]
    MissingCoordinates,

    #[error("invalid feed timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Static identity fields carried by a `ShipStaticData` frame.
///
/// Length and width are derived from the four AIS antenna-offset distances:
/// length = A + B (bow to stern), width = C + D (port to starboard).
#[derive(Debug, Clone, PartialEq)]
pub struct StaticData {
    pub imo_number: Option<i64>,
    pub name: Option<String>,
    pub type_code: Option<i32>,
    pub length: Option<i32>,
    pub width: Option<i32>,
    pub max_draught: Option<f64>,
    pub destination: Option<String>,
}

/// Dynamic fields carried by a `PositionReport` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionData {
    pub speed_over_ground: Option<f64>,
    pub course_over_ground: Option<f64>,
    pub nav_status: Option<i32>,
    pub rate_of_turn: Option<f64>,
    pub true_heading: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedEventKind {
    Static(StaticData),
    Position(PositionData),
}

/// One decoded, coordinate-bearing event from the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub mmsi: i64,
    pub lat: f64,
    pub lon: f64,
    pub collected_at: DateTime<Utc>,
    pub kind: FeedEventKind,
}

impl FeedEvent {
    /// Decode a raw feed frame into a domain event.
    ///
    /// Frames without coordinates, without a recognized message type, or
    /// with an unparseable timestamp are decode failures; the caller counts
    /// and drops them without touching the connection.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let frame: Frame = serde_json::from_str(raw)?;

        let message_type = frame.message_type.ok_or(DecodeError::MissingMessageType)?;
        let metadata = frame.metadata.ok_or(DecodeError::MissingCoordinates)?;

        let (lat, lon) = match (metadata.latitude, metadata.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => return Err(DecodeError::MissingCoordinates),
        };

        let collected_at = parse_feed_timestamp(metadata.time_utc.as_deref().unwrap_or(""))?;

        let kind = match message_type.as_str() {
            "ShipStaticData" => {
                let body = frame
                    .message
                    .and_then(|m| m.ship_static_data)
                    .unwrap_or_default();
                let (length, width) = body
                    .dimension
                    .as_ref()
                    .map(Dimension::length_and_width)
                    .unwrap_or((None, None));
                FeedEventKind::Static(StaticData {
                    imo_number: body.imo_number,
                    name: body.name,
                    type_code: body.type_code,
                    length,
                    width,
                    max_draught: body.maximum_static_draught,
                    destination: body.destination,
                })
            }
            "PositionReport" => {
                let body = frame
                    .message
                    .and_then(|m| m.position_report)
                    .unwrap_or_default();
                FeedEventKind::Position(PositionData {
                    speed_over_ground: body.sog,
                    course_over_ground: body.cog,
                    nav_status: body.navigational_status,
                    rate_of_turn: body.rate_of_turn,
                    true_heading: body.true_heading,
                })
            }
            other => return Err(DecodeError::UnsupportedType(other.to_string())),
        };

        Ok(FeedEvent {
            mmsi: metadata.mmsi.unwrap_or(0),
            lat,
            lon,
            collected_at,
            kind,
        })
    }

    /// Valid primary identifier: a positive IMO number. Zero and absent are
    /// placeholders the feed uses for vessels without a registered identity.
    pub fn valid_imo(imo: Option<i64>) -> Option<i64> {
        imo.filter(|n| *n > 0)
    }
}

/// Parse the feed's timestamp format, e.g.
/// `2024-03-01 12:34:56.123456789 +0000 UTC`.
///
/// The trailing ` UTC` is redundant with the numeric offset and is stripped;
/// chrono accepts the nanosecond fraction directly.
pub fn parse_feed_timestamp(raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    let trimmed = raw.trim_end_matches(" UTC");
    DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f %z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DecodeError::InvalidTimestamp(raw.to_string()))
}

#[derive(Debug, Deserialize)]
struct Frame {
    #[serde(rename = "MessageType")]
    message_type: Option<String>,
    #[serde(rename = "MetaData")]
    metadata: Option<MetaData>,
    #[serde(rename = "Message")]
    message: Option<MessageBody>,
}

#[derive(Debug, Deserialize)]
struct MetaData {
    #[serde(rename = "MMSI")]
    mmsi: Option<i64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    time_utc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    #[serde(rename = "ShipStaticData")]
    ship_static_data: Option<ShipStaticDataBody>,
    #[serde(rename = "PositionReport")]
    position_report: Option<PositionReportBody>,
}

#[derive(Debug, Default, Deserialize)]
struct ShipStaticDataBody {
    #[serde(rename = "ImoNumber")]
    imo_number: Option<i64>,
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Type")]
    type_code: Option<i32>,
    #[serde(rename = "Dimension")]
    dimension: Option<Dimension>,
    #[serde(rename = "MaximumStaticDraught")]
    maximum_static_draught: Option<f64>,
    #[serde(rename = "Destination")]
    destination: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Dimension {
    #[serde(rename = "A")]
    a: Option<i32>,
    #[serde(rename = "B")]
    b: Option<i32>,
    #[serde(rename = "C")]
    c: Option<i32>,
    #[serde(rename = "D")]
    d: Option<i32>,
}

impl Dimension {
    // Feed-supplied offsets; an overflowing sum is nonsense data and is
    // treated as a missing dimension.
    fn length_and_width(&self) -> (Option<i32>, Option<i32>) {
        let length = match (self.a, self.b) {
            (Some(a), Some(b)) => a.checked_add(b),
            _ => None,
        };
        let width = match (self.c, self.d) {
            (Some(c), Some(d)) => c.checked_add(d),
            _ => None,
        };
        (length, width)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PositionReportBody {
    #[serde(rename = "Sog")]
    sog: Option<f64>,
    #[serde(rename = "Cog")]
    cog: Option<f64>,
    #[serde(rename = "NavigationalStatus")]
    navigational_status: Option<i32>,
    #[serde(rename = "RateOfTurn")]
    rate_of_turn: Option<f64>,
    #[serde(rename = "TrueHeading")]
    true_heading: Option<i32>,
}
