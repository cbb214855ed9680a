use ais_domain::error::{DomainError, DomainResult};
use ais_domain::repository::UnknownVesselRepository;
use ais_domain::vessel::UnknownVesselRecord;
use async_trait::async_trait;
use tracing::debug;

use crate::client::PostgresClient;

const INSERT_UNKNOWN: &str = "INSERT INTO unknown_vessel
        (mmsi, name, destination, lat, lon, speed_over_ground, course_over_ground,
         nav_status, collected_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)";

#[derive(Clone)]
pub struct PostgresUnknownVesselRepository {
    client: PostgresClient,
}

impl PostgresUnknownVesselRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UnknownVesselRepository for PostgresUnknownVesselRepository {
    async fn write_batch(&self, records: &[UnknownVesselRecord]) -> DomainResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let stmt = tx
            .prepare(INSERT_UNKNOWN)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        for record in records {
            tx.execute(
                &stmt,
                &[
                    &record.mmsi,
                    &record.name,
                    &record.destination,
                    &record.lat,
                    &record.lon,
                    &record.speed_over_ground,
                    &record.course_over_ground,
                    &record.nav_status,
                    &record.collected_at,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(count = records.len(), "unknown-vessel batch committed");
        Ok(())
    }
}
