pub mod domain;
pub mod ingest_worker;

pub use domain::*;
pub use ingest_worker::*;
