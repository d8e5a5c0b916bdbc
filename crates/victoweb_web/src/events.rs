//! Live update fan-out for the admin hub.
//!
//! # Responsibility
//! - Track connected server-sent-event clients.
//! - Push `chat` / `tasks` change notices to every client without letting a
//!   slow one hold up the rest.
//!
//! # Invariants
//! - Each subscriber queue holds at most [`SUBSCRIBER_QUEUE_CAPACITY`]
//!   events; overflow is dropped for that subscriber only.
//! - A [`Subscription`] removes itself from the hub when dropped.

use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::stream;
use log::{debug, info};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 4;
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// What changed on the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubChange {
    Chat,
    Tasks,
}

impl HubChange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Tasks => "tasks",
        }
    }
}

#[derive(Default)]
pub struct AdminEventHub {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<String>>>,
    next_id: AtomicU64,
}

impl AdminEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(self: &Arc<Self>) -> Subscription {
        let (sender, receiver) = mpsc::channel(SUBSCRIBER_QUEUE_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        info!(
            "event=hub_subscribe module=events status=ok subscriber_id={} subscribers={}",
            id, count
        );
        Subscription {
            id,
            hub: Arc::clone(self),
            receiver,
        }
    }

    /// Queues `event` for every subscriber; returns how many accepted it.
    pub fn broadcast(&self, event: &str) -> usize {
        let targets: Vec<(u64, mpsc::Sender<String>)> = self
            .lock()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();
        let mut delivered = 0;
        for (id, sender) in targets {
            match sender.try_send(event.to_string()) {
                Ok(()) => delivered += 1,
                Err(_) => debug!(
                    "event=hub_broadcast module=events status=skipped subscriber_id={}",
                    id
                ),
            }
        }
        delivered
    }

    pub fn broadcast_change(&self, change: HubChange) -> usize {
        self.broadcast(&format_event(change.as_str(), &timestamp_nanos().to_string()))
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn unregister(&self, id: u64) {
        let count = {
            let mut subscribers = self.lock();
            subscribers.remove(&id);
            subscribers.len()
        };
        info!(
            "event=hub_unsubscribe module=events status=ok subscriber_id={} subscribers={}",
            id, count
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, mpsc::Sender<String>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct Subscription {
    id: u64,
    hub: Arc<AdminEventHub>,
    receiver: mpsc::Receiver<String>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Next event, or a heartbeat after `idle` without one.
    pub async fn next_event(&mut self, idle: Duration) -> Option<String> {
        match tokio::time::timeout(idle, self.receiver.recv()).await {
            Ok(event) => event,
            Err(_) => Some(heartbeat_event()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

/// Wire form of one server-sent event.
pub fn format_event(event_type: &str, data: &str) -> String {
    let data = if data.trim().is_empty() { "noop" } else { data };
    format!("event: {event_type}\ndata: {data}\n\n")
}

pub fn heartbeat_event() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    format_event("heartbeat", &secs.to_string())
}

fn timestamp_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default()
}

/// Streaming `text/event-stream` response bound to a fresh subscription.
pub fn event_stream_response(hub: &Arc<AdminEventHub>, idle: Duration) -> Response {
    let subscription = hub.register();
    let events = stream::unfold(
        (subscription, true),
        move |(mut subscription, first)| async move {
            if first {
                return Some((Ok::<_, Infallible>(heartbeat_event()), (subscription, false)));
            }
            let event = subscription.next_event(idle).await?;
            Some((Ok(event), (subscription, false)))
        },
    );
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        [("x-accel-buffering", "no")],
        Body::from_stream(events),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_events_and_fills_blank_data() {
        assert_eq!(format_event("chat", "42"), "event: chat\ndata: 42\n\n");
        assert_eq!(format_event("tasks", "  "), "event: tasks\ndata: noop\n\n");
        assert!(heartbeat_event().starts_with("event: heartbeat\ndata: "));
    }

    #[tokio::test]
    async fn broadcast_reaches_subscribers_and_drop_unregisters() {
        let hub = Arc::new(AdminEventHub::new());
        let mut first = hub.register();
        let second = hub.register();
        assert_eq!(hub.subscriber_count(), 2);

        assert_eq!(hub.broadcast(&format_event("chat", "1")), 2);
        assert_eq!(first.recv().await.as_deref(), Some("event: chat\ndata: 1\n\n"));

        drop(second);
        assert_eq!(hub.subscriber_count(), 1);
        assert_eq!(hub.broadcast_change(HubChange::Tasks), 1);
        let event = first.recv().await.unwrap_or_default();
        assert!(event.starts_with("event: tasks\ndata: "));
    }

    #[tokio::test]
    async fn full_queue_skips_only_the_slow_subscriber() {
        let hub = Arc::new(AdminEventHub::new());
        let _slow = hub.register();
        for _ in 0..SUBSCRIBER_QUEUE_CAPACITY {
            assert_eq!(hub.broadcast("event: chat\ndata: x\n\n"), 1);
        }
        let mut fresh = hub.register();
        assert_eq!(hub.broadcast("event: chat\ndata: y\n\n"), 1);
        assert_eq!(fresh.recv().await.as_deref(), Some("event: chat\ndata: y\n\n"));
    }

    #[tokio::test]
    async fn idle_subscription_yields_heartbeat() {
        let hub = Arc::new(AdminEventHub::new());
        let mut subscription = hub.register();
        let event = subscription
            .next_event(Duration::from_millis(10))
            .await
            .unwrap_or_default();
        assert!(event.starts_with("event: heartbeat"));
    }
}
