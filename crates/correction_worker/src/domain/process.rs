use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ais_domain::correction::{CorrectionDecision, DimensionPolicy};
use ais_domain::error::DomainResult;
use ais_domain::repository::CorrectionRepository;
use ais_domain::vessel::{DimensionCorrection, DimensionField, VesselDimensions};
use anyhow::Result;
use chrono::Utc;
use common::status::CollectorStatus;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Correction method recorded in the audit trail.
const METHOD_IQR_MEDIAN: &str = "iqr_fence_median";

pub struct CorrectionProcessConfig {
    pub interval: Duration,
    pub policy: DimensionPolicy,
}

#[derive(Debug, Default, PartialEq)]
pub struct PassSummary {
    pub evaluated: usize,
    pub applied: usize,
    pub flagged: usize,
    pub lost_races: usize,
}

/// Periodic scan that repairs implausible vessel dimensions.
///
/// Each vessel's declared length and width are compared against the
/// distribution of the same dimension across vessels sharing its type code.
/// Outliers with enough corroboration are replaced by the consensus value;
/// thin evidence only flags the vessel for manual review.
pub struct CorrectionProcess<C> {
    repository: Arc<C>,
    config: CorrectionProcessConfig,
    status: CollectorStatus,
    cancellation_token: CancellationToken,
}

impl<C: CorrectionRepository> CorrectionProcess<C> {
    pub fn new(
        repository: Arc<C>,
        config: CorrectionProcessConfig,
        status: CollectorStatus,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            repository,
            config,
            status,
            cancellation_token,
        }
    }

    pub async fn run(self) -> Result<()> {
        debug!(
            interval_secs = self.config.interval.as_secs(),
            "starting correction process"
        );
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // A failed pass is retried at the next tick; the scan
                    // holds no state worth crashing over.
                    if let Err(e) = self.run_pass().await {
                        error!(error = %e, "correction pass failed");
                    }
                }
                _ = self.cancellation_token.cancelled() => {
                    debug!("correction process cancelled, shutting down");
                    return Ok(());
                }
            }
        }
    }

    pub async fn run_pass(&self) -> DomainResult<PassSummary> {
        let vessels = self.repository.list_dimensions().await?;
        let references = ReferenceDistributions::build(&vessels);

        let mut summary = PassSummary::default();
        for vessel in &vessels {
            let Some(type_code) = vessel.type_code else {
                continue;
            };
            for field in [DimensionField::Length, DimensionField::Width] {
                let declared = match field {
                    DimensionField::Length => vessel.length,
                    DimensionField::Width => vessel.width,
                };
                let Some(declared) = declared else { continue };
                let samples = references.samples(type_code, field);

                summary.evaluated += 1;
                match self.config.policy.evaluate(declared as f64, samples) {
                    CorrectionDecision::InRange => {}
                    CorrectionDecision::Correct { consensus } => {
                        let correction = DimensionCorrection {
                            imo_number: vessel.imo_number,
                            field,
                            old_value: Some(declared as f64),
                            new_value: consensus,
                            method: METHOD_IQR_MEDIAN.to_string(),
                            applied_at: Utc::now(),
                        };
                        if self.repository.apply_correction(&correction).await? {
                            summary.applied += 1;
                        } else {
                            // Fresh static data landed mid-pass; its value
                            // takes precedence over our stale observation.
                            summary.lost_races += 1;
                        }
                    }
                    CorrectionDecision::NeedsReview => {
                        self.status.record_review_flagged();
                        warn!(
                            imo_number = vessel.imo_number,
                            field = field.column(),
                            declared,
                            "dimension deviates but lacks consensus, flagged for review"
                        );
                        summary.flagged += 1;
                    }
                }
            }
        }

        self.status.record_correction_run(Utc::now());
        info!(
            vessels = vessels.len(),
            evaluated = summary.evaluated,
            applied = summary.applied,
            flagged = summary.flagged,
            lost_races = summary.lost_races,
            "correction pass complete"
        );
        Ok(summary)
    }
}

/// Per-type dimension samples across the whole fleet.
struct ReferenceDistributions {
    lengths: HashMap<i32, Vec<f64>>,
    widths: HashMap<i32, Vec<f64>>,
}

impl ReferenceDistributions {
    fn build(vessels: &[VesselDimensions]) -> Self {
        let mut lengths: HashMap<i32, Vec<f64>> = HashMap::new();
        let mut widths: HashMap<i32, Vec<f64>> = HashMap::new();
        for vessel in vessels {
            let Some(type_code) = vessel.type_code else {
                continue;
            };
            if let Some(length) = vessel.length.filter(|v| *v > 0) {
                lengths.entry(type_code).or_default().push(length as f64);
            }
            if let Some(width) = vessel.width.filter(|v| *v > 0) {
                widths.entry(type_code).or_default().push(width as f64);
            }
        }
        Self { lengths, widths }
    }

    fn samples(&self, type_code: i32, field: DimensionField) -> &[f64] {
        let map = match field {
            DimensionField::Length => &self.lengths,
            DimensionField::Width => &self.widths,
        };
        map.get(&type_code).map(Vec::as_slice).unwrap_or(&[])
    }
}
