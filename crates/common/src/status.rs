use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Feed connection lifecycle state, as exposed to the status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Draining,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Draining,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Shared runtime status handle.
///
/// Every component writes its own fields; the external management layer
/// reads a consistent-enough `snapshot()`. The status always reflects the
/// true current state: a collector stuck in a reconnect loop reports
/// `reconnecting`, never a stale `connected`.
#[derive(Clone, Default)]
pub struct CollectorStatus {
    inner: Arc<StatusInner>,
}

#[derive(Default)]
struct StatusInner {
    connection_state: AtomicU8,
    queue_depth: AtomicUsize,
    events_dropped: AtomicU64,
    decode_failures: AtomicU64,
    batches_dropped: AtomicU64,
    review_flagged: AtomicU64,
    last_flush: RwLock<Option<DateTime<Utc>>>,
    last_correction_run: RwLock<Option<DateTime<Utc>>>,
}

/// Point-in-time view of the collector, for the management layer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub connection_state: ConnectionState,
    pub queue_depth: usize,
    pub events_dropped: u64,
    pub decode_failures: u64,
    pub batches_dropped: u64,
    pub review_flagged: u64,
    pub last_flush: Option<DateTime<Utc>>,
    pub last_correction_run: Option<DateTime<Utc>>,
}

impl CollectorStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connection_state(&self, state: ConnectionState) {
        self.inner
            .connection_state
            .store(state as u8, Ordering::Relaxed);
    }

    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.connection_state.load(Ordering::Relaxed))
    }

    pub fn set_queue_depth(&self, depth: usize) {
        self.inner.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn record_event_dropped(&self) {
        self.inner.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.inner.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failures(&self) -> u64 {
        self.inner.decode_failures.load(Ordering::Relaxed)
    }

    pub fn record_batch_dropped(&self) {
        self.inner.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_review_flagged(&self) {
        self.inner.review_flagged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, at: DateTime<Utc>) {
        *self.inner.last_flush.write().expect("status lock poisoned") = Some(at);
    }

    pub fn record_correction_run(&self, at: DateTime<Utc>) {
        *self
            .inner
            .last_correction_run
            .write()
            .expect("status lock poisoned") = Some(at);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connection_state: self.connection_state(),
            queue_depth: self.inner.queue_depth.load(Ordering::Relaxed),
            events_dropped: self.inner.events_dropped.load(Ordering::Relaxed),
            decode_failures: self.inner.decode_failures.load(Ordering::Relaxed),
            batches_dropped: self.inner.batches_dropped.load(Ordering::Relaxed),
            review_flagged: self.inner.review_flagged.load(Ordering::Relaxed),
            last_flush: *self.inner.last_flush.read().expect("status lock poisoned"),
            last_correction_run: *self
                .inner
                .last_correction_run
                .read()
                .expect("status lock poisoned"),
        }
    }
}
