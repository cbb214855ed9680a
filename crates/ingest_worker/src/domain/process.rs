use std::sync::Arc;

use ais_domain::repository::{UnknownVesselRepository, VesselRepository};
use ais_feed::queue::EventQueue;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{BatchWriter, VesselRouter};

/// Drains the event queue into batched storage writes.
pub struct IngestProcess<R, V, U> {
    router: VesselRouter<R>,
    writer: BatchWriter<V, U>,
    queue: Arc<EventQueue>,
    cancellation_token: CancellationToken,
}

impl<R, V, U> IngestProcess<R, V, U>
where
    R: VesselRepository,
    V: VesselRepository,
    U: UnknownVesselRepository,
{
    pub fn new(
        router: VesselRouter<R>,
        writer: BatchWriter<V, U>,
        queue: Arc<EventQueue>,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            router,
            writer,
            queue,
            cancellation_token,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        self.router.warm().await?;
        debug!("starting ingest process");

        loop {
            let event = match self.writer.deadline() {
                Some(deadline) => {
                    tokio::select! {
                        event = self.queue.pop(&self.cancellation_token) => event,
                        _ = tokio::time::sleep_until(deadline) => {
                            self.writer.flush().await;
                            continue;
                        }
                    }
                }
                None => self.queue.pop(&self.cancellation_token).await,
            };

            match event {
                Some(event) => {
                    match self.router.route(event).await {
                        Ok(routed) => self.writer.push(routed),
                        Err(e) => {
                            warn!(error = %e, "identity resolution failed, event dropped");
                        }
                    }
                    if self.writer.should_flush() {
                        self.writer.flush().await;
                    }
                }
                None => {
                    // Cancelled and drained; commit whatever is buffered.
                    debug!("ingest queue drained, flushing final batch");
                    self.writer.flush().await;
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use ais_domain::error::DomainResult;
    use ais_domain::event::{FeedEvent, FeedEventKind, PositionData, StaticData};
    use ais_domain::vessel::{PositionRecord, UnknownVesselRecord, VesselUpsert};
    use common::status::CollectorStatus;

    use crate::domain::BatchConfig;

    #[derive(Default)]
    struct RecordingVesselRepo {
        upserts: Mutex<Vec<VesselUpsert>>,
        positions: Mutex<Vec<PositionRecord>>,
        lookups: AtomicU32,
    }

    #[async_trait]
    impl VesselRepository for RecordingVesselRepo {
        async fn write_batch(
            &self,
            upserts: &[VesselUpsert],
            positions: &[PositionRecord],
        ) -> DomainResult<()> {
            self.upserts.lock().unwrap().extend_from_slice(upserts);
            self.positions.lock().unwrap().extend_from_slice(positions);
            Ok(())
        }

        async fn load_identity_map(&self) -> DomainResult<Vec<(i64, i64)>> {
            Ok(Vec::new())
        }

        async fn find_imo_by_mmsi(&self, _mmsi: i64) -> DomainResult<Option<i64>> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            Ok(None)
        }
    }

    #[derive(Default)]
    struct RecordingUnknownRepo {
        records: Mutex<Vec<UnknownVesselRecord>>,
    }

    #[async_trait]
    impl UnknownVesselRepository for RecordingUnknownRepo {
        async fn write_batch(&self, records: &[UnknownVesselRecord]) -> DomainResult<()> {
            self.records.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    fn static_event(mmsi: i64, imo: i64) -> FeedEvent {
        FeedEvent {
            mmsi,
            lat: 54.0,
            lon: 4.0,
            collected_at: Utc::now(),
            kind: FeedEventKind::Static(StaticData {
                imo_number: Some(imo),
                name: Some("TEST VESSEL".to_string()),
                type_code: Some(70),
                length: Some(100),
                width: Some(20),
                max_draught: Some(7.5),
                destination: None,
            }),
        }
    }

    fn position_event(mmsi: i64) -> FeedEvent {
        FeedEvent {
            mmsi,
            lat: 54.5,
            lon: 4.5,
            collected_at: Utc::now(),
            kind: FeedEventKind::Position(PositionData {
                speed_over_ground: Some(12.0),
                course_over_ground: None,
                nav_status: Some(0),
                rate_of_turn: None,
                true_heading: None,
            }),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn drains_queue_and_flushes_on_shutdown() {
        let vessels = Arc::new(RecordingVesselRepo::default());
        let unknowns = Arc::new(RecordingUnknownRepo::default());
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(64, status.clone()));

        let router = VesselRouter::new(vessels.clone(), 16);
        let writer = BatchWriter::new(
            vessels.clone(),
            unknowns.clone(),
            BatchConfig {
                batch_size: 100,
                max_batch_age: Duration::from_secs(10),
                max_flush_retries: 1,
                retry_backoff: Duration::from_millis(100),
            },
            status.clone(),
        );

        queue.push(static_event(211, 1234567));
        queue.push(position_event(211));
        queue.push(position_event(999));

        let cancel = CancellationToken::new();
        cancel.cancel();
        IngestProcess::new(router, writer, queue, cancel)
            .run()
            .await
            .unwrap();

        assert_eq!(vessels.upserts.lock().unwrap().len(), 1);
        assert_eq!(vessels.positions.lock().unwrap().len(), 1);
        assert_eq!(unknowns.records.lock().unwrap().len(), 1);
        assert!(status.snapshot().last_flush.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn age_deadline_flushes_while_feed_is_quiet() {
        let vessels = Arc::new(RecordingVesselRepo::default());
        let unknowns = Arc::new(RecordingUnknownRepo::default());
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(64, status.clone()));

        let router = VesselRouter::new(vessels.clone(), 16);
        let writer = BatchWriter::new(
            vessels.clone(),
            unknowns.clone(),
            BatchConfig {
                batch_size: 100,
                max_batch_age: Duration::from_secs(10),
                max_flush_retries: 1,
                retry_backoff: Duration::from_millis(100),
            },
            status,
        );

        queue.push(static_event(211, 1234567));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            IngestProcess::new(router, writer, queue, cancel.clone()).run(),
        );

        // Nothing else arrives; the age deadline alone must commit the row.
        for _ in 0..1_000 {
            if !vessels.upserts.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(vessels.upserts.lock().unwrap().len(), 1);

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
