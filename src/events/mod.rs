//! Job update fanout.
//!
//! [`Broadcaster`] hands every published [`JobEvent`] to each registered
//! [`EventSink`]. Every subscriber owns a bounded queue drained by its own
//! delivery task, so `publish` never waits on a sink. Events are enqueued
//! for all subscribers under a single lock, which keeps the relative order
//! identical across subscribers. A subscriber whose queue is full, whose
//! write fails, or whose write exceeds the timeout is removed.

mod sink;

pub use sink::{ChannelSink, EventSink, JsonLinesSink, SinkError};

use crate::ids::{EventId, JobId, SubscriberId};
use crate::state::JobStatus;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;

/// Maximum number of events retained for late joiners.
pub const MAX_RECENT_EVENTS: usize = 100;

/// A job state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "job_update")]
pub struct JobEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEvent {
    pub fn new(
        job_id: JobId,
        status: JobStatus,
        progress: f64,
        step: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            timestamp: Utc::now(),
            job_id,
            status,
            progress,
            step,
            error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Events queued per subscriber before it counts as stalled.
    pub subscriber_buffer: usize,
    /// Longest a single sink write may take.
    pub write_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 256,
            write_timeout: Duration::from_secs(5),
        }
    }
}

struct Inner {
    subscribers: HashMap<SubscriberId, mpsc::Sender<JobEvent>>,
    recent: VecDeque<JobEvent>,
}

/// Publish/subscribe hub for job events.
///
/// Cloning is cheap; clones share subscribers.
#[derive(Clone)]
pub struct Broadcaster {
    inner: Arc<Mutex<Inner>>,
    config: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                subscribers: HashMap::new(),
                recent: VecDeque::with_capacity(MAX_RECENT_EVENTS),
            })),
            config,
        }
    }

    /// Register a sink. Must be called from within a Tokio runtime.
    pub fn subscribe<S: EventSink>(&self, sink: S) -> SubscriberId {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));
        self.inner.lock().subscribers.insert(id, tx);

        tokio::spawn(deliver(
            id,
            sink,
            rx,
            Arc::downgrade(&self.inner),
            self.config.write_timeout,
        ));

        tracing::debug!("Subscriber {} connected", id);
        id
    }

    /// Remove a subscriber. Unknown or already removed IDs are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.inner.lock().subscribers.remove(&id).is_some() {
            tracing::debug!("Subscriber {} unsubscribed", id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Queue an event for every subscriber without waiting on any of them.
    pub fn publish(&self, event: JobEvent) {
        let mut inner = self.inner.lock();

        if inner.recent.len() >= MAX_RECENT_EVENTS {
            inner.recent.pop_back();
        }
        inner.recent.push_front(event.clone());

        inner.subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Subscriber {} is not keeping up, dropping it", id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Subscriber {} is gone, dropping it", id);
                false
            }
        });
    }

    /// The `n` most recent events, newest first.
    pub fn recent_events(&self, n: usize) -> Vec<JobEvent> {
        self.inner.lock().recent.iter().take(n).cloned().collect()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

/// Drain one subscriber's queue into its sink.
async fn deliver<S: EventSink>(
    id: SubscriberId,
    mut sink: S,
    mut rx: mpsc::Receiver<JobEvent>,
    inner: Weak<Mutex<Inner>>,
    write_timeout: Duration,
) {
    while let Some(event) = rx.recv().await {
        let failure = match tokio::time::timeout(write_timeout, sink.send(&event)).await {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("write timed out after {:?}", write_timeout),
        };

        tracing::warn!("Dropping subscriber {}: {}", id, failure);
        if let Some(inner) = inner.upgrade() {
            inner.lock().subscribers.remove(&id);
        }
        break;
    }

    sink.close().await;
}
