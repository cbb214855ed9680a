mod config;

use std::sync::Arc;
use std::time::Duration;

use ais_domain::correction::DimensionPolicy;
use ais_domain::geo::RegionFilter;
use ais_feed::client::FeedConfig;
use ais_feed::feed_worker::FeedWorker;
use ais_feed::queue::EventQueue;
use ais_postgres::{
    ensure_schema, PostgresClient, PostgresCorrectionRepository, PostgresUnknownVesselRepository,
    PostgresVesselRepository,
};
use ais_runner::Runner;
use common::status::CollectorStatus;
use common::telemetry::{init_telemetry, TelemetryConfig};
use config::ServiceConfig;
use correction_worker::correction_worker::CorrectionWorker;
use correction_worker::domain::CorrectionProcessConfig;
use ingest_worker::domain::BatchConfig;
use ingest_worker::ingest_worker::{IngestWorker, IngestWorkerConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "ais-collector".to_string(),
        log_level: config.log_level.clone(),
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(feed_url = %config.feed_url, "starting ais-collector service");

    let region = match RegionFilter::parse(&config.region_polygon) {
        Ok(region) => Arc::new(region),
        Err(e) => {
            error!(error = %e, "invalid region polygon");
            std::process::exit(1);
        }
    };

    let postgres_client = match initialize_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!(error = %format!("{e:#}"), "failed to initialize PostgreSQL");
            std::process::exit(1);
        }
    };
    let vessel_repository = Arc::new(PostgresVesselRepository::new(postgres_client.clone()));
    let unknown_repository = Arc::new(PostgresUnknownVesselRepository::new(postgres_client.clone()));
    let correction_repository = Arc::new(PostgresCorrectionRepository::new(postgres_client));

    let status = CollectorStatus::new();
    let queue = Arc::new(EventQueue::new(config.event_queue_capacity, status.clone()));

    let feed_worker = FeedWorker::new(
        config.feed_url.clone(),
        FeedConfig {
            api_key: config.feed_api_key.clone(),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            max_auth_failures: config.max_auth_failures,
            backoff_initial: Duration::from_secs(config.backoff_initial_secs),
            backoff_cap: Duration::from_secs(config.backoff_max_secs),
            backoff_reset_after: Duration::from_secs(config.sustained_connection_secs),
        },
        region,
        queue.clone(),
        status.clone(),
    );

    let ingest_worker = IngestWorker::new(
        vessel_repository,
        unknown_repository,
        queue,
        status.clone(),
        IngestWorkerConfig {
            batch: BatchConfig {
                batch_size: config.batch_size,
                max_batch_age: Duration::from_secs(config.max_batch_age_secs),
                max_flush_retries: config.max_flush_retries,
                retry_backoff: Duration::from_secs(config.flush_retry_backoff_secs),
            },
            identity_cache_capacity: config.identity_cache_capacity,
        },
    );

    let correction_worker = CorrectionWorker::new(
        correction_repository,
        CorrectionProcessConfig {
            interval: Duration::from_secs(config.correction_interval_secs),
            policy: DimensionPolicy::new(
                config.correction_deviation_threshold,
                config.correction_min_evidence,
            ),
        },
        status.clone(),
    );

    let runner = Runner::new()
        .with_named_process("feed_client", feed_worker.into_runner_process())
        .with_named_process("ingest_worker", ingest_worker.into_runner_process())
        .with_named_process("correction_worker", correction_worker.into_runner_process())
        .with_closer({
            // The ingest worker drains the queue and flushes on cancellation;
            // by closer time the snapshot is the final word on this run.
            let status = status.clone();
            move || {
                Box::pin(async move {
                    info!(snapshot = ?status.snapshot(), "final collector status");
                    Ok(())
                })
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    runner.run().await;
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    info!("initializing PostgreSQL");
    let client = PostgresClient::new(
        &config.postgres_host,
        config.postgres_port,
        &config.postgres_database,
        &config.postgres_username,
        &config.postgres_password,
        config.postgres_pool_size,
    )?;
    client.ping().await?;
    ensure_schema(&client).await?;
    Ok(client)
}
