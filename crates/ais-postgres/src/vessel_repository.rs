use ais_domain::error::{DomainError, DomainResult};
use ais_domain::repository::VesselRepository;
use ais_domain::vessel::{PositionRecord, VesselUpsert};
use async_trait::async_trait;
use tracing::debug;

use crate::client::PostgresClient;

const UPSERT_VESSEL: &str = "INSERT INTO vessel_identity
        (imo_number, mmsi, name, type_code, length, width, max_draught, destination, updated_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
     ON CONFLICT (imo_number) DO UPDATE SET
        mmsi = EXCLUDED.mmsi,
        name = EXCLUDED.name,
        type_code = EXCLUDED.type_code,
        length = EXCLUDED.length,
        width = EXCLUDED.width,
        max_draught = EXCLUDED.max_draught,
        destination = EXCLUDED.destination,
        updated_at = EXCLUDED.updated_at";

const INSERT_POSITION: &str = "INSERT INTO position_report
        (imo_number, mmsi, lat, lon, speed_over_ground, course_over_ground,
         nav_status, rate_of_turn, true_heading, collected_at)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)";

#[derive(Clone)]
pub struct PostgresVesselRepository {
    client: PostgresClient,
}

impl PostgresVesselRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VesselRepository for PostgresVesselRepository {
    async fn write_batch(
        &self,
        upserts: &[VesselUpsert],
        positions: &[PositionRecord],
    ) -> DomainResult<()> {
        if upserts.is_empty() && positions.is_empty() {
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

        if !upserts.is_empty() {
            let stmt = tx
                .prepare(UPSERT_VESSEL)
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            for vessel in upserts {
                tx.execute(
                    &stmt,
                    &[
                        &vessel.imo_number,
                        &vessel.mmsi,
                        &vessel.name,
                        &vessel.type_code,
                        &vessel.length,
                        &vessel.width,
                        &vessel.max_draught,
                        &vessel.destination,
                        &vessel.updated_at,
                    ],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            }
        }

        if !positions.is_empty() {
            let stmt = tx
                .prepare(INSERT_POSITION)
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            for report in positions {
                tx.execute(
                    &stmt,
                    &[
                        &report.imo_number,
                        &report.mmsi,
                        &report.lat,
                        &report.lon,
                        &report.speed_over_ground,
                        &report.course_over_ground,
                        &report.nav_status,
                        &report.rate_of_turn,
                        &report.true_heading,
                        &report.collected_at,
                    ],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(
            vessels = upserts.len(),
            positions = positions.len(),
            "vessel batch committed"
        );
        Ok(())
    }

    async fn load_identity_map(&self) -> DomainResult<Vec<(i64, i64)>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT mmsi, imo_number FROM vessel_identity WHERE mmsi IS NOT NULL",
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mappings: Vec<(i64, i64)> = rows
            .into_iter()
            .map(|row| (row.get::<_, i64>(0), row.get::<_, i64>(1)))
            .collect();

        debug!(count = mappings.len(), "loaded identity mappings");
        Ok(mappings)
    }

    async fn find_imo_by_mmsi(&self, mmsi: i64) -> DomainResult<Option<i64>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT imo_number FROM vessel_identity WHERE mmsi = $1 LIMIT 1",
                &[&mmsi],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|r| r.get(0)))
    }
}
