pub mod status;
pub mod telemetry;

pub use status::{CollectorStatus, ConnectionState, StatusSnapshot};
pub use telemetry::{init_telemetry, TelemetryConfig};
