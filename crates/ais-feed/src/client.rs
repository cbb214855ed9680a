use std::sync::Arc;
use std::time::Duration;

use ais_domain::error::DomainError;
use ais_domain::event::FeedEvent;
use ais_domain::geo::RegionFilter;
use anyhow::Result;
use common::status::{CollectorStatus, ConnectionState};
use serde_json::json;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::queue::EventQueue;
use crate::transport::{FeedTransport, FrameSource};

pub struct FeedConfig {
    pub api_key: String,
    pub idle_timeout: Duration,
    pub max_auth_failures: u32,
    pub backoff_initial: Duration,
    pub backoff_cap: Duration,
    pub backoff_reset_after: Duration,
}

/// Reads the live feed, filters events to the configured region, and hands
/// them to the ingest queue. Owns the reconnect loop; every exit path other
/// than cancellation or repeated credential rejection leads back to a
/// reconnect attempt.
pub struct FeedClient<T> {
    transport: T,
    config: FeedConfig,
    region: Arc<RegionFilter>,
    queue: Arc<EventQueue>,
    status: CollectorStatus,
}

enum SessionEnd {
    Cancelled,
    Idle,
    Closed(Option<String>),
    AuthRejected(String),
}

impl<T: FeedTransport> FeedClient<T> {
    pub fn new(
        transport: T,
        config: FeedConfig,
        region: Arc<RegionFilter>,
        queue: Arc<EventQueue>,
        status: CollectorStatus,
    ) -> Self {
        Self {
            transport,
            config,
            region,
            queue,
            status,
        }
    }

    fn subscription_payload(&self) -> String {
        let (lat_min, lon_min, lat_max, lon_max) = self.region.bounding_box();
        json!({
            "APIKey": self.config.api_key,
            "BoundingBoxes": [[[lat_min, lon_min], [lat_max, lon_max]]],
            "FilterMessageTypes": ["PositionReport", "ShipStaticData"],
        })
        .to_string()
    }

    pub async fn run(self, ctx: CancellationToken) -> Result<()> {
        let subscription = self.subscription_payload();
        let mut backoff = BackoffPolicy::new(
            self.config.backoff_initial,
            self.config.backoff_cap,
            self.config.backoff_reset_after,
        );
        let mut auth_failures = 0u32;
        let mut first_attempt = true;

        loop {
            if ctx.is_cancelled() {
                self.status
                    .set_connection_state(ConnectionState::Disconnected);
                return Ok(());
            }

            if first_attempt {
                self.status.set_connection_state(ConnectionState::Connecting);
                first_attempt = false;
            }

            let connect = tokio::select! {
                result = self.transport.connect(&subscription) => result,
                _ = ctx.cancelled() => {
                    self.status.set_connection_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            };

            match connect {
                Ok(mut source) => {
                    info!("feed connected");
                    self.status.set_connection_state(ConnectionState::Connected);
                    let connected_at = Instant::now();
                    let (end, received_any) = self.read_session(source.as_mut(), &ctx).await;
                    backoff.record_session(connected_at.elapsed());
                    if received_any {
                        auth_failures = 0;
                    }

                    match end {
                        SessionEnd::Cancelled => {
                            self.status.set_connection_state(ConnectionState::Draining);
                            return Ok(());
                        }
                        SessionEnd::AuthRejected(reason) => {
                            auth_failures += 1;
                            warn!(
                                attempt = auth_failures,
                                reason = %reason,
                                "feed rejected credentials"
                            );
                            if auth_failures >= self.config.max_auth_failures {
                                self.status
                                    .set_connection_state(ConnectionState::Disconnected);
                                return Err(DomainError::FeedAuthRejected(reason).into());
                            }
                        }
                        SessionEnd::Idle => {
                            warn!(
                                idle_timeout_secs = self.config.idle_timeout.as_secs(),
                                "no frames within idle window, reconnecting"
                            );
                        }
                        SessionEnd::Closed(reason) => {
                            warn!(reason = ?reason, "feed stream ended");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "feed connect failed");
                }
            }

            // Flip the state before the backoff sleep, not after it; the
            // status must never read connected between sessions.
            self.status
                .set_connection_state(ConnectionState::Reconnecting);
            let delay = backoff.next_delay();
            debug!(delay_ms = delay.as_millis() as u64, "reconnect backoff");
            tokio::select! {
                _ = sleep(delay) => {}
                _ = ctx.cancelled() => {
                    self.status.set_connection_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn read_session(
        &self,
        source: &mut dyn FrameSource,
        ctx: &CancellationToken,
    ) -> (SessionEnd, bool) {
        let mut received_any = false;
        loop {
            let next = tokio::select! {
                next = timeout(self.config.idle_timeout, source.next_frame()) => next,
                _ = ctx.cancelled() => return (SessionEnd::Cancelled, received_any),
            };

            match next {
                Err(_) => return (SessionEnd::Idle, received_any),
                Ok(Err(e)) => return (SessionEnd::Closed(Some(e.to_string())), received_any),
                Ok(Ok(None)) => return (SessionEnd::Closed(None), received_any),
                Ok(Ok(Some(text))) => {
                    if let Some(reason) = auth_rejection(&text) {
                        return (SessionEnd::AuthRejected(reason), received_any);
                    }
                    received_any = true;
                    self.handle_frame(&text);
                }
            }
        }
    }

    fn handle_frame(&self, raw: &str) {
        match FeedEvent::decode(raw) {
            Ok(event) => {
                if self.region.contains(event.lat, event.lon) {
                    self.queue.push(event);
                }
            }
            Err(e) => {
                self.status.record_decode_failure();
                debug!(error = %e, "dropping undecodable frame");
            }
        }
    }
}

/// The feed reports credential problems as an error frame, not as a
/// protocol-level close.
fn auth_rejection(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::transport::TransportError;

    type Script = Vec<Result<Option<String>, TransportError>>;

    /// Replays scripted sessions; once a session's frames run out the
    /// stream hangs open, so the idle timeout is what moves things along.
    struct ScriptedTransport {
        sessions: Mutex<VecDeque<Script>>,
    }

    impl ScriptedTransport {
        fn new(sessions: Vec<Script>) -> Self {
            Self {
                sessions: Mutex::new(sessions.into()),
            }
        }
    }

    #[async_trait]
    impl FeedTransport for ScriptedTransport {
        async fn connect(
            &self,
            _subscription: &str,
        ) -> Result<Box<dyn FrameSource>, TransportError> {
            match self.sessions.lock().unwrap().pop_front() {
                Some(frames) => Ok(Box::new(ScriptedSource {
                    frames: frames.into(),
                })),
                None => Err(TransportError::Connect("no session scripted".into())),
            }
        }
    }

    struct ScriptedSource {
        frames: VecDeque<Result<Option<String>, TransportError>>,
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn next_frame(&mut self) -> Result<Option<String>, TransportError> {
            match self.frames.pop_front() {
                Some(item) => item,
                None => futures::future::pending().await,
            }
        }
    }

    fn position_frame(mmsi: i64, lat: f64, lon: f64) -> String {
        format!(
            r#"{{"MessageType":"PositionReport",
                "MetaData":{{"MMSI":{mmsi},"latitude":{lat},"longitude":{lon},
                            "time_utc":"2024-03-01 12:00:00.0 +0000 UTC"}},
                "Message":{{"PositionReport":{{"Sog":10.0}}}}}}"#
        )
    }

    fn test_config() -> FeedConfig {
        FeedConfig {
            api_key: "test-key".to_string(),
            idle_timeout: Duration::from_secs(60),
            max_auth_failures: 3,
            backoff_initial: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(60),
            backoff_reset_after: Duration::from_secs(60),
        }
    }

    fn north_sea() -> Arc<RegionFilter> {
        Arc::new(RegionFilter::parse(ais_domain::geo::DEFAULT_REGION_POLYGON).unwrap())
    }

    async fn wait_for_events(queue: &EventQueue, n: usize) {
        for _ in 0..10_000 {
            if queue.len() >= n {
                return;
            }
            sleep(Duration::from_millis(50)).await;
        }
        panic!("queue never reached {} events", n);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_stream_close_and_keeps_delivering() {
        let transport = ScriptedTransport::new(vec![
            vec![Ok(Some(position_frame(1, 54.0, 4.0))), Ok(None)],
            vec![Ok(Some(position_frame(2, 54.5, 4.5)))],
        ]);
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(16, status.clone()));
        let client = FeedClient::new(transport, test_config(), north_sea(), queue.clone(), status);

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(client.run(ctx.clone()));

        wait_for_events(&queue, 2).await;
        assert_eq!(queue.try_pop().map(|e| e.mmsi), Some(1));
        assert_eq!(queue.try_pop().map(|e| e.mmsi), Some(2));

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_torn_down_and_reconnected() {
        // First session sends one frame then goes silent; only the idle
        // timeout can get us to the second session.
        let transport = ScriptedTransport::new(vec![
            vec![Ok(Some(position_frame(1, 54.0, 4.0)))],
            vec![Ok(Some(position_frame(2, 54.0, 4.0)))],
        ]);
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(16, status.clone()));
        let client = FeedClient::new(transport, test_config(), north_sea(), queue.clone(), status);

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(client.run(ctx.clone()));

        wait_for_events(&queue, 2).await;
        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn status_reads_reconnecting_through_the_backoff_sleep() {
        // One session delivers a frame and closes; the client then sits in
        // a long backoff sleep. The status must flip to reconnecting as
        // soon as the session ends, not at the next connect attempt.
        let transport = ScriptedTransport::new(vec![vec![
            Ok(Some(position_frame(1, 54.0, 4.0))),
            Ok(None),
        ]]);
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(16, status.clone()));
        let mut config = test_config();
        config.backoff_initial = Duration::from_secs(300);
        config.backoff_cap = Duration::from_secs(300);
        let client = FeedClient::new(transport, config, north_sea(), queue.clone(), status.clone());

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(client.run(ctx.clone()));

        wait_for_events(&queue, 1).await;
        for _ in 0..1_000 {
            if status.connection_state() == ConnectionState::Reconnecting {
                break;
            }
            sleep(Duration::from_millis(1)).await;
        }
        // Well inside the 300s backoff window.
        assert_eq!(status.connection_state(), ConnectionState::Reconnecting);

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_credential_rejection_is_fatal() {
        let reject = || vec![Ok(Some(r#"{"error":"Api Key Is Not Valid"}"#.to_string()))];
        let transport = ScriptedTransport::new(vec![reject(), reject(), reject()]);
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(16, status.clone()));
        let client = FeedClient::new(transport, test_config(), north_sea(), queue, status.clone());

        let err = client.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::FeedAuthRejected(_))
        ));
        assert_eq!(status.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn decode_failures_are_counted_without_dropping_the_connection() {
        let transport = ScriptedTransport::new(vec![vec![
            Ok(Some("{not json".to_string())),
            Ok(Some(position_frame(1, 54.0, 4.0))),
        ]]);
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(16, status.clone()));
        let client = FeedClient::new(
            transport,
            test_config(),
            north_sea(),
            queue.clone(),
            status.clone(),
        );

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(client.run(ctx.clone()));

        wait_for_events(&queue, 1).await;
        assert_eq!(status.decode_failures(), 1);

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_region_events_never_reach_the_queue() {
        let transport = ScriptedTransport::new(vec![vec![
            Ok(Some(position_frame(1, 40.0, 5.0))),
            Ok(Some(position_frame(2, 54.0, 4.0))),
        ]]);
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(16, status.clone()));
        let client = FeedClient::new(transport, test_config(), north_sea(), queue.clone(), status);

        let ctx = CancellationToken::new();
        let handle = tokio::spawn(client.run(ctx.clone()));

        wait_for_events(&queue, 1).await;
        assert_eq!(queue.try_pop().map(|e| e.mmsi), Some(2));
        assert!(queue.is_empty());

        ctx.cancel();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn subscription_carries_key_and_region_bounds() {
        let status = CollectorStatus::new();
        let queue = Arc::new(EventQueue::new(16, status.clone()));
        let transport = ScriptedTransport::new(vec![]);
        let client = FeedClient::new(transport, test_config(), north_sea(), queue, status);

        let payload: serde_json::Value =
            serde_json::from_str(&client.subscription_payload()).unwrap();
        assert_eq!(payload["APIKey"], "test-key");
        assert_eq!(payload["BoundingBoxes"][0][0][0], 50.0);
        assert_eq!(payload["FilterMessageTypes"][0], "PositionReport");
    }
}
