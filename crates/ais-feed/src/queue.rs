use std::collections::VecDeque;
use std::sync::Mutex;

use ais_domain::event::FeedEvent;
use common::status::CollectorStatus;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Bounded hand-off between the feed reader and the ingest worker.
///
/// When the consumer falls behind, the oldest queued event is evicted in
/// favor of the new one; position data ages quickly, so fresher is always
/// better than complete. The reader never blocks on a full queue.
pub struct EventQueue {
    events: Mutex<VecDeque<FeedEvent>>,
    notify: Notify,
    capacity: usize,
    status: CollectorStatus,
}

impl EventQueue {
    pub fn new(capacity: usize, status: CollectorStatus) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            status,
        }
    }

    pub fn push(&self, event: FeedEvent) {
        let depth = {
            let mut events = self.events.lock().expect("queue lock poisoned");
            if events.len() == self.capacity {
                events.pop_front();
                self.status.record_event_dropped();
            }
            events.push_back(event);
            events.len()
        };
        self.status.set_queue_depth(depth);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<FeedEvent> {
        let (event, depth) = {
            let mut events = self.events.lock().expect("queue lock poisoned");
            (events.pop_front(), events.len())
        };
        if event.is_some() {
            self.status.set_queue_depth(depth);
        }
        event
    }

    /// Wait for the next event. Once `cancel` fires, remaining queued
    /// events are still handed out; `None` means drained and shut down.
    pub async fn pop(&self, cancel: &CancellationToken) -> Option<FeedEvent> {
        loop {
            let notified = self.notify.notified();
            if let Some(event) = self.try_pop() {
                return Some(event);
            }
            tokio::select! {
                _ = notified => {}
                _ = cancel.cancelled() => return self.try_pop(),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;

    use ais_domain::event::{FeedEventKind, PositionData};

    fn event(mmsi: i64) -> FeedEvent {
        FeedEvent {
            mmsi,
            lat: 54.0,
            lon: 4.0,
            collected_at: Utc::now(),
            kind: FeedEventKind::Position(PositionData {
                speed_over_ground: None,
                course_over_ground: None,
                nav_status: None,
                rate_of_turn: None,
                true_heading: None,
            }),
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let status = CollectorStatus::new();
        let queue = EventQueue::new(2, status.clone());

        queue.push(event(1));
        queue.push(event(2));
        queue.push(event(3));

        assert_eq!(queue.len(), 2);
        assert_eq!(status.snapshot().events_dropped, 1);
        assert_eq!(queue.try_pop().map(|e| e.mmsi), Some(2));
        assert_eq!(queue.try_pop().map(|e| e.mmsi), Some(3));
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = Arc::new(EventQueue::new(8, CollectorStatus::new()));
        let cancel = CancellationToken::new();

        let consumer = {
            let queue = queue.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.pop(&cancel).await.map(|e| e.mmsi) })
        };

        tokio::task::yield_now().await;
        queue.push(event(42));
        assert_eq!(consumer.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn cancelled_pop_drains_then_returns_none() {
        let queue = EventQueue::new(8, CollectorStatus::new());
        let cancel = CancellationToken::new();

        queue.push(event(1));
        cancel.cancel();

        assert_eq!(queue.pop(&cancel).await.map(|e| e.mmsi), Some(1));
        assert!(queue.pop(&cancel).await.is_none());
    }

    #[test]
    fn depth_tracks_into_status() {
        let status = CollectorStatus::new();
        let queue = EventQueue::new(8, status.clone());

        queue.push(event(1));
        queue.push(event(2));
        assert_eq!(status.snapshot().queue_depth, 2);

        queue.try_pop();
        assert_eq!(status.snapshot().queue_depth, 1);
    }
}
