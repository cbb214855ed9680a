pub mod client;
pub mod correction_repository;
pub mod schema;
pub mod unknown_repository;
pub mod vessel_repository;

pub use client::PostgresClient;
pub use correction_repository::PostgresCorrectionRepository;
pub use schema::ensure_schema;
pub use unknown_repository::PostgresUnknownVesselRepository;
pub use vessel_repository::PostgresVesselRepository;
