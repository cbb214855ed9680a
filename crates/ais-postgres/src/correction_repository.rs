use ais_domain::error::{DomainError, DomainResult};
use ais_domain::repository::CorrectionRepository;
use ais_domain::vessel::{DimensionCorrection, DimensionField, VesselDimensions};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::PostgresClient;

#[derive(Clone)]
pub struct PostgresCorrectionRepository {
    client: PostgresClient,
}

impl PostgresCorrectionRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CorrectionRepository for PostgresCorrectionRepository {
    async fn list_dimensions(&self) -> DomainResult<Vec<VesselDimensions>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT imo_number, type_code, length, width FROM vessel_identity",
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let dimensions: Vec<VesselDimensions> = rows
            .into_iter()
            .map(|row| VesselDimensions {
                imo_number: row.get(0),
                type_code: row.get(1),
                length: row.get(2),
                width: row.get(3),
            })
            .collect();

        debug!(count = dimensions.len(), "scanned vessel dimensions");
        Ok(dimensions)
    }

    async fn apply_correction(&self, correction: &DimensionCorrection) -> DomainResult<bool> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        // Optimistic guard: the update only lands when the field still holds
        // the value the scan saw, so a concurrent static-data upsert from
        // ingestion is never overwritten.
        let update_sql = match correction.field {
            DimensionField::Length => {
                "UPDATE vessel_identity
                 SET length = $1, updated_at = $2
                 WHERE imo_number = $3 AND length IS NOT DISTINCT FROM $4"
            }
            DimensionField::Width => {
                "UPDATE vessel_identity
                 SET width = $1, updated_at = $2
                 WHERE imo_number = $3 AND width IS NOT DISTINCT FROM $4"
            }
        };

        // Round once; the audit row must record exactly what was stored.
        let rounded = correction.new_value.round();
        let new_value = rounded as i32;
        let old_value = correction.old_value.map(|v| v.round() as i32);

        let updated = tx
            .execute(
                update_sql,
                &[
                    &new_value,
                    &correction.applied_at,
                    &correction.imo_number,
                    &old_value,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if updated == 0 {
            // Lost the race against ingestion; skip this vessel for the run.
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO correction_audit
                (imo_number, field, old_value, new_value, method, applied_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &correction.imo_number,
                &correction.field.column(),
                &correction.old_value,
                &rounded,
                &correction.method,
                &correction.applied_at,
            ],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        info!(
            imo_number = correction.imo_number,
            field = correction.field.column(),
            old_value = ?correction.old_value,
            new_value = rounded,
            method = %correction.method,
            "dimension correction applied"
        );
        Ok(true)
    }
}
