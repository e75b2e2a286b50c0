//! Lifecycle and progress event notification.
//!
//! The notifier is an explicit per-engine publish/subscribe channel.
//! Events carry owned snapshots of the relevant task fields at emission
//! time; later task mutation never changes a delivered payload.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::batch::types::{BatchTask, TaskProgress};

const EVENT_CAPACITY: usize = 256;

/// Errors that can occur in event delivery.
#[derive(Debug, Error)]
pub enum EventError {
    /// The event channel was closed or the receiver lagged too far behind.
    #[error("event channel closed")]
    ChannelClosed,
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// A task lifecycle or progress event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskEvent {
    /// A task was admitted and queued.
    TaskCreated {
        /// Task ID.
        task_id: String,
        /// Number of items in the batch.
        file_count: usize,
        /// Admission timestamp.
        created_at: DateTime<Utc>,
    },
    /// A task was dispatched and began executing.
    TaskStarted {
        /// Task ID.
        task_id: String,
        /// Dispatch timestamp.
        started_at: DateTime<Utc>,
    },
    /// One item of a task settled.
    ProgressUpdated {
        /// Task ID.
        task_id: String,
        /// Progress snapshot after the settlement.
        progress: TaskProgress,
    },
    /// A task finished with every item successful.
    TaskCompleted {
        /// Task ID.
        task_id: String,
        /// Final progress snapshot.
        progress: TaskProgress,
        /// Wall-clock processing time.
        processing_time_ms: u64,
    },
    /// A task finished with no successful item, or in a partial state.
    TaskFailed {
        /// Task ID.
        task_id: String,
        /// Final status name (`failed` or `partial`).
        status: String,
        /// Final progress snapshot.
        progress: TaskProgress,
        /// Whole-task error, if the failure was not item-attributable.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A queued task was cancelled before dispatch.
    TaskCancelled {
        /// Task ID.
        task_id: String,
        /// Cancellation timestamp.
        cancelled_at: DateTime<Utc>,
    },
}

impl TaskEvent {
    /// Snapshot event for an admitted task.
    #[must_use]
    pub fn created(task: &BatchTask) -> Self {
        Self::TaskCreated {
            task_id: task.id.to_string(),
            file_count: task.items.len(),
            created_at: task.created_at,
        }
    }

    /// Snapshot event for a dispatched task.
    #[must_use]
    pub fn started(task: &BatchTask) -> Self {
        Self::TaskStarted {
            task_id: task.id.to_string(),
            started_at: task.started_at.unwrap_or_else(Utc::now),
        }
    }

    /// Snapshot event for one settled item.
    #[must_use]
    pub fn progress(task: &BatchTask) -> Self {
        Self::ProgressUpdated {
            task_id: task.id.to_string(),
            progress: task.progress,
        }
    }

    /// Serializes the event to a JSON string for wire delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be serialized.
    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(EventError::Serialization)
    }
}

/// Publishes task events to all subscribed observers.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<TaskEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl Notifier {
    /// Creates a new notifier with an empty channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sender,
            subscriber_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribes a new observer to receive task events.
    pub fn subscribe(&self) -> EventReceiver {
        self.subscriber_count.fetch_add(1, Ordering::SeqCst);
        debug!(
            subscriber_count = self.subscriber_count(),
            "Event subscriber added"
        );
        EventReceiver {
            inner: self.sender.subscribe(),
            subscriber_count: Arc::clone(&self.subscriber_count),
        }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Publishing with no subscribers is not an error; the event is
    /// dropped.
    pub fn publish(&self, event: TaskEvent) {
        if let Ok(receiver_count) = self.sender.send(event) {
            debug!(receiver_count, "Task event published");
        }
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count.load(Ordering::SeqCst)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for task events from a notifier.
pub struct EventReceiver {
    inner: broadcast::Receiver<TaskEvent>,
    subscriber_count: Arc<AtomicUsize>,
}

impl EventReceiver {
    /// Receive the next task event.
    ///
    /// # Errors
    /// Returns `EventError::ChannelClosed` if the channel is closed or the
    /// receiver lagged past the channel capacity.
    pub async fn recv(&mut self) -> Result<TaskEvent, EventError> {
        self.inner.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventError::ChannelClosed,
            broadcast::error::RecvError::Lagged(count) => {
                warn!(skipped = count, "Event receiver lagged");
                EventError::ChannelClosed
            }
        })
    }
}

impl Drop for EventReceiver {
    fn drop(&mut self) {
        self.subscriber_count.fetch_sub(1, Ordering::SeqCst);
        debug!(
            subscriber_count = self.subscriber_count.load(Ordering::SeqCst),
            "Event subscriber removed"
        );
    }
}
