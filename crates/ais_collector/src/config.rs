use ais_domain::geo::DEFAULT_REGION_POLYGON;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,

    // Feed configuration
    /// WebSocket endpoint of the AIS feed
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Feed API key; the only option without a default
    pub feed_api_key: String,

    /// Region of interest as "lat,lon;lat,lon;..." polygon vertices. The
    /// feed-subscription bounding envelope is derived from it.
    #[serde(default = "default_region_polygon")]
    pub region_polygon: String,

    /// Seconds without any frame before the connection is recycled
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Consecutive credential rejections before giving up
    #[serde(default = "default_max_auth_failures")]
    pub max_auth_failures: u32,

    #[serde(default = "default_backoff_initial_secs")]
    pub backoff_initial_secs: u64,

    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,

    /// Connected time after which the backoff schedule resets
    #[serde(default = "default_sustained_connection_secs")]
    pub sustained_connection_secs: u64,

    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,

    // Ingestion configuration
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_batch_age_secs")]
    pub max_batch_age_secs: u64,

    #[serde(default = "default_max_flush_retries")]
    pub max_flush_retries: u32,

    #[serde(default = "default_flush_retry_backoff_secs")]
    pub flush_retry_backoff_secs: u64,

    #[serde(default = "default_identity_cache_capacity")]
    pub identity_cache_capacity: usize,

    // Correction configuration
    #[serde(default = "default_correction_interval_secs")]
    pub correction_interval_secs: u64,

    /// IQR fence multiplier for outlier detection
    #[serde(default = "default_correction_deviation_threshold")]
    pub correction_deviation_threshold: f64,

    /// Minimum corroborating observations before auto-correcting
    #[serde(default = "default_correction_min_evidence")]
    pub correction_min_evidence: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "ais".to_string()
}

fn default_postgres_username() -> String {
    "postgres".to_string()
}

fn default_postgres_password() -> String {
    "postgres".to_string()
}

fn default_postgres_pool_size() -> usize {
    16
}

// Feed defaults
fn default_feed_url() -> String {
    "wss://stream.aisstream.io/v0/stream".to_string()
}

fn default_region_polygon() -> String {
    DEFAULT_REGION_POLYGON.to_string()
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_max_auth_failures() -> u32 {
    3
}

fn default_backoff_initial_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    60
}

fn default_sustained_connection_secs() -> u64 {
    60
}

fn default_event_queue_capacity() -> usize {
    10_000
}

// Ingestion defaults
fn default_batch_size() -> usize {
    100
}

fn default_max_batch_age_secs() -> u64 {
    10
}

fn default_max_flush_retries() -> u32 {
    3
}

fn default_flush_retry_backoff_secs() -> u64 {
    1
}

fn default_identity_cache_capacity() -> usize {
    50_000
}

// Correction defaults
fn default_correction_interval_secs() -> u64 {
    3600
}

fn default_correction_deviation_threshold() -> f64 {
    1.5
}

fn default_correction_min_evidence() -> usize {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("AIS"))
            .build()?
            .try_deserialize()
    }
}
