//! Notifications from the visibility manager.
//!
//! The window and scheduler never call their collaborators directly. Passes,
//! expands, rebinds and stats snapshots are published on a per-session bus,
//! and a panel, a logger or a test subscribes to whatever it cares about.
//!
//! ```text
//! Session ──emit(source, topic, payload)──► EventBus ──► Receiver (all topics)
//!                                                   └──► TopicReceiver ("stats/")
//! ```
//!
//! Every event published through one bus carries a sequence number, so
//! subscribers can order events that share a timestamp.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use uuid::Uuid;

pub mod topics;

/// Default bus capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// One published notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlimEvent {
    /// Unique event identifier.
    pub id: String,
    /// Position in the publishing bus, starting at 1. `0` until published.
    #[serde(default)]
    pub seq: u64,
    /// Emitting component (see [`sources`]).
    pub source: String,
    /// Routing key (see [`topics`]).
    pub topic: String,
    /// Topic-specific JSON body.
    pub payload: Value,
    /// Wall-clock time of creation.
    pub timestamp: DateTime<Utc>,
}

impl SlimEvent {
    /// Unpublished event.
    pub fn new(source: impl Into<String>, topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            seq: 0,
            source: source.into(),
            topic: topic.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Event whose payload is `{"message": ...}`.
    pub fn with_message(source: &str, topic: &str, message: &str) -> Self {
        Self::new(source, topic, json!({ "message": message }))
    }

    /// Whether the event carries exactly `topic`.
    #[must_use]
    pub fn is(&self, topic: &str) -> bool {
        self.topic == topic
    }

    /// Whether the topic starts with `prefix` (`"window/"` matches every window event).
    #[must_use]
    pub fn in_family(&self, prefix: &str) -> bool {
        self.topic.starts_with(prefix)
    }
}

impl std::fmt::Display for SlimEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{} [{}] {} {}: {}",
            self.seq,
            self.timestamp.format("%H:%M:%S%.3f"),
            self.source,
            self.topic,
            self.payload
        )
    }
}

/// Broadcast fan-out owned by one session.
///
/// Publishing never blocks and never fails. With no subscribers the event is
/// dropped; a subscriber that falls more than `capacity` events behind loses
/// the oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SlimEvent>,
    capacity: usize,
    next_seq: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Bus holding up to `capacity` undelivered events per subscriber (at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            capacity,
            next_seq: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Per-subscriber buffer size.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stamp `event` with the next sequence number and fan it out.
    ///
    /// Returns how many subscribers got it.
    pub fn publish(&self, mut event: SlimEvent) -> usize {
        event.seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Build and publish in one step.
    pub fn emit(&self, source: &str, topic: &str, payload: Value) -> usize {
        self.publish(SlimEvent::new(source, topic, payload))
    }

    /// Receive every future event. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SlimEvent> {
        self.tx.subscribe()
    }

    /// Receive future events whose topic starts with `prefix`.
    #[must_use]
    pub fn subscribe_family(&self, prefix: &str) -> TopicReceiver {
        TopicReceiver {
            rx: self.tx.subscribe(),
            prefix: prefix.to_string(),
            missed: 0,
        }
    }

    /// Live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Subscription filtered to one topic family.
///
/// Lag is absorbed: dropped events are counted in [`TopicReceiver::missed`]
/// instead of surfacing as errors.
#[derive(Debug)]
pub struct TopicReceiver {
    rx: broadcast::Receiver<SlimEvent>,
    prefix: String,
    missed: u64,
}

impl TopicReceiver {
    /// Next matching event; `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<SlimEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.in_family(&self.prefix) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => self.missed += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Matching events already buffered, without waiting.
    pub fn drain(&mut self) -> Vec<SlimEvent> {
        let prefix = self.prefix.clone();
        let mut missed = 0;
        let events = drain_where(&mut self.rx, &mut missed, |event| event.in_family(&prefix));
        self.missed += missed;
        events
    }

    /// Events lost to lag so far, matching or not.
    #[must_use]
    pub fn missed(&self) -> u64 {
        self.missed
    }
}

/// Every event already buffered in `rx`, without waiting. Lagged gaps are skipped.
pub fn drain(rx: &mut broadcast::Receiver<SlimEvent>) -> Vec<SlimEvent> {
    let mut missed = 0;
    drain_where(rx, &mut missed, |_| true)
}

fn drain_where(
    rx: &mut broadcast::Receiver<SlimEvent>,
    missed: &mut u64,
    keep: impl Fn(&SlimEvent) -> bool,
) -> Vec<SlimEvent> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => {
                if keep(&event) {
                    out.push(event);
                }
            }
            Err(TryRecvError::Lagged(skipped)) => *missed += skipped,
            Err(TryRecvError::Empty | TryRecvError::Closed) => return out,
        }
    }
}

/// Emitting components.
pub mod sources {
    /// Visibility manager core.
    pub const WINDOW: &str = "window";
    /// Change-detection scheduler.
    pub const SCHEDULER: &str = "scheduler";
    /// Session facade (user commands).
    pub const SESSION: &str = "session";
    /// Export pipeline.
    pub const EXPORT: &str = "export";
}
