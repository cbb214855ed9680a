pub mod correction;
pub mod error;
pub mod event;
pub mod geo;
pub mod identity;
pub mod repository;
pub mod vessel;

pub use correction::{CorrectionDecision, DimensionPolicy};
pub use error::{DomainError, DomainResult};
pub use event::{DecodeError, FeedEvent, FeedEventKind, PositionData, StaticData};
pub use geo::RegionFilter;
pub use identity::IdentityCache;
pub use repository::{CorrectionRepository, UnknownVesselRepository, VesselRepository};
pub use vessel::{
    DimensionCorrection, DimensionField, PositionRecord, UnknownVesselRecord, VesselDimensions,
    VesselUpsert,
};
