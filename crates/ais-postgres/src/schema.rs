use anyhow::{Context, Result};
use tracing::info;

use crate::client::PostgresClient;

/// Idempotent schema bootstrap, run once at startup.
const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS vessel_identity (
        imo_number BIGINT PRIMARY KEY,
        mmsi BIGINT,
        name TEXT,
        type_code INTEGER,
        length INTEGER,
        width INTEGER,
        max_draught DOUBLE PRECISION,
        destination TEXT,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_vessel_identity_mmsi ON vessel_identity (mmsi)",
    "CREATE INDEX IF NOT EXISTS idx_vessel_identity_type ON vessel_identity (type_code)",
    "CREATE TABLE IF NOT EXISTS position_report (
        id BIGSERIAL PRIMARY KEY,
        imo_number BIGINT,
        mmsi BIGINT NOT NULL,
        lat DOUBLE PRECISION NOT NULL,
        lon DOUBLE PRECISION NOT NULL,
        speed_over_ground DOUBLE PRECISION,
        course_over_ground DOUBLE PRECISION,
        nav_status INTEGER,
        rate_of_turn DOUBLE PRECISION,
        true_heading INTEGER,
        collected_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_position_report_imo ON position_report (imo_number)",
    "CREATE INDEX IF NOT EXISTS idx_position_report_collected
        ON position_report (collected_at DESC)",
    "CREATE TABLE IF NOT EXISTS unknown_vessel (
        id BIGSERIAL PRIMARY KEY,
        mmsi BIGINT NOT NULL,
        name TEXT,
        destination TEXT,
        lat DOUBLE PRECISION NOT NULL,
        lon DOUBLE PRECISION NOT NULL,
        speed_over_ground DOUBLE PRECISION,
        course_over_ground DOUBLE PRECISION,
        nav_status INTEGER,
        collected_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_unknown_vessel_mmsi ON unknown_vessel (mmsi)",
    "CREATE TABLE IF NOT EXISTS correction_audit (
        id BIGSERIAL PRIMARY KEY,
        imo_number BIGINT NOT NULL,
        field TEXT NOT NULL,
        old_value DOUBLE PRECISION,
        new_value DOUBLE PRECISION NOT NULL,
        method TEXT NOT NULL,
        applied_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_correction_audit_imo ON correction_audit (imo_number)",
];

/// Create all collector tables and indexes if they do not exist.
pub async fn ensure_schema(client: &PostgresClient) -> Result<()> {
    let conn = client.get_connection().await?;
    for statement in SCHEMA_STATEMENTS {
        conn.execute(*statement, &[])
            .await
            .with_context(|| format!("schema statement failed: {}", &statement[..40.min(statement.len())]))?;
    }
    info!("database schema verified");
    Ok(())
}
