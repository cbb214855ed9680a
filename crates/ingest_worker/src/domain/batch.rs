use std::sync::Arc;
use std::time::Duration;

use ais_domain::repository::{UnknownVesselRepository, VesselRepository};
use ais_domain::vessel::{PositionRecord, UnknownVesselRecord, VesselUpsert};
use chrono::Utc;
use common::status::CollectorStatus;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, warn};

use crate::domain::Routed;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub max_batch_age: Duration,
    pub max_flush_retries: u32,
    pub retry_backoff: Duration,
}

/// Accumulates routed events and commits them in batches.
///
/// A flush happens when the buffered total reaches `batch_size` or when the
/// oldest buffered event reaches `max_batch_age`. Vessel identity and
/// position rows commit in one transaction; unknown vessel rows commit in
/// their own. A batch that keeps failing past the retry budget is dropped
/// with a single error log so one poisoned batch cannot wedge ingestion.
pub struct BatchWriter<V, U> {
    vessels: Arc<V>,
    unknowns: Arc<U>,
    config: BatchConfig,
    status: CollectorStatus,
    upserts: Vec<VesselUpsert>,
    positions: Vec<PositionRecord>,
    unknown_records: Vec<UnknownVesselRecord>,
    oldest: Option<Instant>,
}

impl<V: VesselRepository, U: UnknownVesselRepository> BatchWriter<V, U> {
    pub fn new(
        vessels: Arc<V>,
        unknowns: Arc<U>,
        config: BatchConfig,
        status: CollectorStatus,
    ) -> Self {
        Self {
            vessels,
            unknowns,
            config,
            status,
            upserts: Vec::new(),
            positions: Vec::new(),
            unknown_records: Vec::new(),
            oldest: None,
        }
    }

    pub fn push(&mut self, routed: Routed) {
        if self.oldest.is_none() {
            self.oldest = Some(Instant::now());
        }
        match routed {
            Routed::Vessel(upsert) => self.upserts.push(upsert),
            Routed::Position(position) => self.positions.push(position),
            Routed::Unknown(record) => self.unknown_records.push(record),
        }
    }

    pub fn len(&self) -> usize {
        self.upserts.len() + self.positions.len() + self.unknown_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn should_flush(&self) -> bool {
        if self.len() >= self.config.batch_size {
            return true;
        }
        match self.oldest {
            Some(oldest) => oldest.elapsed() >= self.config.max_batch_age,
            None => false,
        }
    }

    /// When the age-based flush for the current buffer is due.
    pub fn deadline(&self) -> Option<Instant> {
        self.oldest.map(|oldest| oldest + self.config.max_batch_age)
    }

    pub async fn flush(&mut self) {
        if self.is_empty() {
            return;
        }

        let upserts = std::mem::take(&mut self.upserts);
        let positions = std::mem::take(&mut self.positions);
        let unknown_records = std::mem::take(&mut self.unknown_records);
        self.oldest = None;

        if !upserts.is_empty() || !positions.is_empty() {
            let mut attempt = 0;
            let mut delay = self.config.retry_backoff;
            loop {
                match self.vessels.write_batch(&upserts, &positions).await {
                    Ok(()) => break,
                    Err(e) if attempt < self.config.max_flush_retries => {
                        attempt += 1;
                        warn!(error = %e, attempt, "vessel batch write failed, retrying");
                        sleep(delay).await;
                        delay *= 2;
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            vessels = upserts.len(),
                            positions = positions.len(),
                            "vessel batch dropped after exhausting retries"
                        );
                        self.status.record_batch_dropped();
                        break;
                    }
                }
            }
        }

        if !unknown_records.is_empty() {
            let mut attempt = 0;
            let mut delay = self.config.retry_backoff;
            loop {
                match self.unknowns.write_batch(&unknown_records).await {
                    Ok(()) => break,
                    Err(e) if attempt < self.config.max_flush_retries => {
                        attempt += 1;
                        warn!(error = %e, attempt, "unknown-vessel batch write failed, retrying");
                        sleep(delay).await;
                        delay *= 2;
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            records = unknown_records.len(),
                            "unknown-vessel batch dropped after exhausting retries"
                        );
                        self.status.record_batch_dropped();
                        break;
                    }
                }
            }
        }

        self.status.record_flush(Utc::now());
        debug!(
            vessels = upserts.len(),
            positions = positions.len(),
            unknown = unknown_records.len(),
            "batch flushed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;

    use ais_domain::error::{DomainError, DomainResult};

    #[derive(Default)]
    struct MockVesselRepo {
        fail_first: AtomicU32,
        writes: Mutex<Vec<(usize, usize)>>,
    }

    #[async_trait]
    impl VesselRepository for MockVesselRepo {
        async fn write_batch(
            &self,
            upserts: &[VesselUpsert],
            positions: &[PositionRecord],
        ) -> DomainResult<()> {
            if self.fail_first.load(Ordering::Relaxed) > 0 {
                self.fail_first.fetch_sub(1, Ordering::Relaxed);
                return Err(DomainError::RepositoryError(anyhow!("connection reset")));
            }
            self.writes
                .lock()
                .unwrap()
                .push((upserts.len(), positions.len()));
            Ok(())
        }

        async fn load_identity_map(&self) -> DomainResult<Vec<(i64, i64)>> {
            Ok(Vec::new())
        }

        async fn find_imo_by_mmsi(&self, _mmsi: i64) -> DomainResult<Option<i64>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct MockUnknownRepo {
        writes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl UnknownVesselRepository for MockUnknownRepo {
        async fn write_batch(&self, records: &[UnknownVesselRecord]) -> DomainResult<()> {
            self.writes.lock().unwrap().push(records.len());
            Ok(())
        }
    }

    fn config() -> BatchConfig {
        BatchConfig {
            batch_size: 3,
            max_batch_age: Duration::from_secs(10),
            max_flush_retries: 2,
            retry_backoff: Duration::from_millis(100),
        }
    }

    fn position(mmsi: i64) -> Routed {
        Routed::Position(PositionRecord {
            imo_number: Some(1234567),
            mmsi,
            lat: 54.0,
            lon: 4.0,
            speed_over_ground: None,
            course_over_ground: None,
            nav_status: None,
            rate_of_turn: None,
            true_heading: None,
            collected_at: Utc::now(),
        })
    }

    fn unknown(mmsi: i64) -> Routed {
        Routed::Unknown(UnknownVesselRecord {
            mmsi,
            name: None,
            destination: None,
            lat: 54.0,
            lon: 4.0,
            speed_over_ground: None,
            course_over_ground: None,
            nav_status: None,
            collected_at: Utc::now(),
        })
    }

    fn writer(
        vessels: Arc<MockVesselRepo>,
        unknowns: Arc<MockUnknownRepo>,
        status: CollectorStatus,
    ) -> BatchWriter<MockVesselRepo, MockUnknownRepo> {
        BatchWriter::new(vessels, unknowns, config(), status)
    }

    #[tokio::test]
    async fn size_threshold_counts_all_table_groups() {
        let vessels = Arc::new(MockVesselRepo::default());
        let unknowns = Arc::new(MockUnknownRepo::default());
        let mut w = writer(vessels.clone(), unknowns.clone(), CollectorStatus::new());

        w.push(position(1));
        w.push(unknown(2));
        assert!(!w.should_flush());
        w.push(position(3));
        assert!(w.should_flush());

        w.flush().await;
        assert!(w.is_empty());
        assert_eq!(*vessels.writes.lock().unwrap(), vec![(0, 2)]);
        assert_eq!(*unknowns.writes.lock().unwrap(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn age_threshold_triggers_flush() {
        let vessels = Arc::new(MockVesselRepo::default());
        let unknowns = Arc::new(MockUnknownRepo::default());
        let mut w = writer(vessels, unknowns, CollectorStatus::new());

        w.push(position(1));
        assert!(!w.should_flush());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(w.should_flush());
        assert!(w.deadline().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_is_retried_and_succeeds() {
        let vessels = Arc::new(MockVesselRepo {
            fail_first: AtomicU32::new(2),
            ..Default::default()
        });
        let unknowns = Arc::new(MockUnknownRepo::default());
        let status = CollectorStatus::new();
        let mut w = writer(vessels.clone(), unknowns, status.clone());

        w.push(position(1));
        w.flush().await;

        assert_eq!(*vessels.writes.lock().unwrap(), vec![(0, 1)]);
        assert_eq!(status.snapshot().batches_dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_doubles_between_attempts() {
        // Two failures: first retry waits 100ms, second 200ms.
        let vessels = Arc::new(MockVesselRepo {
            fail_first: AtomicU32::new(2),
            ..Default::default()
        });
        let unknowns = Arc::new(MockUnknownRepo::default());
        let mut w = writer(vessels.clone(), unknowns, CollectorStatus::new());

        w.push(position(1));
        let start = Instant::now();
        w.flush().await;

        assert_eq!(start.elapsed(), Duration::from_millis(300));
        assert_eq!(*vessels.writes.lock().unwrap(), vec![(0, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_is_dropped_after_retry_budget() {
        let vessels = Arc::new(MockVesselRepo {
            fail_first: AtomicU32::new(10),
            ..Default::default()
        });
        let unknowns = Arc::new(MockUnknownRepo::default());
        let status = CollectorStatus::new();
        let mut w = writer(vessels.clone(), unknowns.clone(), status.clone());

        w.push(position(1));
        w.push(unknown(2));
        w.flush().await;

        // Vessel group dropped; unknown group is independent and lands.
        assert!(vessels.writes.lock().unwrap().is_empty());
        assert_eq!(*unknowns.writes.lock().unwrap(), vec![1]);
        assert_eq!(status.snapshot().batches_dropped, 1);
        assert!(w.is_empty());

        // Dropped rows are gone; the next flush writes nothing extra.
        w.flush().await;
        assert_eq!(*unknowns.writes.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn empty_flush_is_a_no_op() {
        let vessels = Arc::new(MockVesselRepo::default());
        let unknowns = Arc::new(MockUnknownRepo::default());
        let status = CollectorStatus::new();
        let mut w = writer(vessels.clone(), unknowns, status.clone());

        w.flush().await;
        assert!(vessels.writes.lock().unwrap().is_empty());
        assert!(status.snapshot().last_flush.is_none());
    }
}
