use async_trait::async_trait;

use crate::error::DomainResult;
use crate::vessel::{
    DimensionCorrection, PositionRecord, UnknownVesselRecord, VesselDimensions, VesselUpsert,
};

/// Storage for identified vessels and their position reports.
#[async_trait]
pub trait VesselRepository: Send + Sync {
    /// Write one batch of vessel upserts and position inserts in a single
    /// transaction. Either every row in the batch lands or none do.
    ///
    /// Upserts are idempotent (`ON CONFLICT (imo_number) DO UPDATE`, most
    /// recent event wins); position inserts are append-only.
    async fn write_batch(
        &self,
        upserts: &[VesselUpsert],
        positions: &[PositionRecord],
    ) -> DomainResult<()>;

    /// All known MMSI → IMO mappings, for warming the identity cache.
    async fn load_identity_map(&self) -> DomainResult<Vec<(i64, i64)>>;

    /// Resolve a single MMSI to an IMO number; cache-miss fallback.
    async fn find_imo_by_mmsi(&self, mmsi: i64) -> DomainResult<Option<i64>>;
}

/// Storage for events whose MMSI never resolved to a vessel identity.
#[async_trait]
pub trait UnknownVesselRepository: Send + Sync {
    /// Append one batch of unknown-vessel records in a single transaction.
    async fn write_batch(&self, records: &[UnknownVesselRecord]) -> DomainResult<()>;
}

/// Storage operations used by the dimension correction worker.
#[async_trait]
pub trait CorrectionRepository: Send + Sync {
    /// Declared dimensions of every stored vessel, for building per-type
    /// reference distributions.
    async fn list_dimensions(&self) -> DomainResult<Vec<VesselDimensions>>;

    /// Apply one dimension repair: update the vessel row and insert the
    /// matching audit record in the same transaction.
    ///
    /// The update is guarded by the expected old value; returns `false`
    /// (nothing written, no audit row) when a concurrent static-data upsert
    /// changed the field first.
    async fn apply_correction(&self, correction: &DimensionCorrection) -> DomainResult<bool>;
}
