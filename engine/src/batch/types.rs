//! Batch task types for the docflux engine.
//!
//! This module provides the domain types for batch jobs: tasks, work
//! items, per-item outcomes and the task error taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    /// Generates a fresh unique task ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create a task ID from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is empty or contains path separators.
    pub fn new(id: String) -> Result<Self, TaskError> {
        if id.is_empty() {
            return Err(TaskError::Internal("empty task ID".to_string()));
        }
        if id.contains('/') {
            return Err(TaskError::Internal(format!("invalid task ID: {id}")));
        }
        Ok(Self(id))
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Admitted and queued, not yet dispatched.
    #[default]
    Pending,
    /// Currently occupying a pool slot, items in flight.
    Processing,
    /// All items succeeded.
    Completed,
    /// At least one item succeeded and at least one failed.
    Partial,
    /// No item succeeded, or the run failed before fan-out.
    Failed,
    /// Cancelled while still queued.
    Cancelled,
}

impl TaskStatus {
    /// Whether this status is terminal (no further transitions).
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Partial | Self::Failed | Self::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Partial => write!(f, "partial"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Settlement status of a single work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// The item's work function returned a value.
    Completed,
    /// The item's work function failed or timed out.
    Failed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of work inside a task, e.g. one uploaded document.
///
/// The engine only reads `size_bytes` (admission weight) and `file_name`
/// (admission policy input); `payload` is passed through to the item
/// executor untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// File name as submitted by the caller.
    pub file_name: String,
    /// Declared size in bytes, used as the admission weight.
    pub size_bytes: u64,
    /// Opaque executor payload (file reference, parse hints, ...).
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Caller-supplied options, frozen at admission time.
///
/// The engine never inspects these; they are handed to the item executor
/// with every item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOptions {
    /// Source language hint for translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    /// Target language for translation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    /// Requested output format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    /// Additional executor-specific options.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate progress of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Total number of items in the task.
    pub total: usize,
    /// Number of items that settled successfully.
    pub completed: usize,
    /// Number of items that settled with a failure.
    pub failed: usize,
    /// Rounded percentage of settled items, 0..=100.
    pub percentage: u8,
}

impl TaskProgress {
    /// Zeroed progress for a task of `total` items.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            percentage: 0,
        }
    }

    /// Records one settled item and recomputes the percentage.
    pub fn settle(&mut self, succeeded: bool) {
        if succeeded {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        {
            self.percentage =
                ((self.settled() as f64 / self.total as f64) * 100.0).round() as u8;
        }
    }

    /// Number of items settled so far.
    #[must_use]
    pub fn settled(&self) -> usize {
        self.completed + self.failed
    }

    /// Whether every item has settled.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.settled() == self.total
    }
}

/// The settled result for one work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Position of the item in the submitted batch.
    pub index: usize,
    /// Settlement status.
    pub status: ItemStatus,
    /// Value produced by the work function, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Error message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock time the item spent executing.
    pub processing_time_ms: u64,
    /// When the item settled.
    pub settled_at: DateTime<Utc>,
}

impl ItemOutcome {
    /// A successful outcome carrying the produced value.
    #[must_use]
    pub fn success(index: usize, value: serde_json::Value, processing_time_ms: u64) -> Self {
        Self {
            index,
            status: ItemStatus::Completed,
            value: Some(value),
            error: None,
            processing_time_ms,
            settled_at: Utc::now(),
        }
    }

    /// A failed outcome carrying the error message.
    pub fn failure(index: usize, error: impl Into<String>, processing_time_ms: u64) -> Self {
        Self {
            index,
            status: ItemStatus::Failed,
            value: None,
            error: Some(error.into()),
            processing_time_ms,
            settled_at: Utc::now(),
        }
    }
}

/// A batch task: the unit of admission, dispatch and retention.
#[derive(Debug, Clone)]
pub struct BatchTask {
    /// Task ID.
    pub id: TaskId,
    /// Ordered work items, immutable after admission.
    pub items: Vec<WorkItem>,
    /// Options snapshot taken at admission time.
    pub options: BatchOptions,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Aggregate progress.
    pub progress: TaskProgress,
    /// One outcome slot per item, written exactly once on settlement.
    pub outcomes: Vec<Option<ItemOutcome>>,
    /// Number of retries performed so far.
    pub retry_count: u32,
    /// Admission timestamp.
    pub created_at: DateTime<Utc>,
    /// Set when the task enters `Processing`.
    pub started_at: Option<DateTime<Utc>>,
    /// Set on any terminal transition.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration between start and terminal transition.
    pub processing_time_ms: Option<u64>,
    /// Whole-task error, set only for failures outside per-item execution.
    pub error: Option<String>,
}

impl BatchTask {
    /// Creates a pending task with zeroed progress and empty outcomes.
    #[must_use]
    pub fn new(items: Vec<WorkItem>, options: BatchOptions) -> Self {
        let total = items.len();
        Self {
            id: TaskId::generate(),
            items,
            options,
            status: TaskStatus::Pending,
            progress: TaskProgress::new(total),
            outcomes: vec![None; total],
            retry_count: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            processing_time_ms: None,
            error: None,
        }
    }

    /// Settled outcomes in item order, skipping unsettled slots.
    #[must_use]
    pub fn settled_outcomes(&self) -> Vec<ItemOutcome> {
        self.outcomes.iter().flatten().cloned().collect()
    }

    /// Resets the task for a fresh run, keeping items and options.
    ///
    /// Outcomes, progress and timestamps are discarded; the retry counter
    /// is incremented.
    pub fn reset_for_retry(&mut self) {
        self.status = TaskStatus::Pending;
        self.progress = TaskProgress::new(self.items.len());
        self.outcomes = vec![None; self.items.len()];
        self.retry_count += 1;
        self.started_at = None;
        self.completed_at = None;
        self.processing_time_ms = None;
        self.error = None;
    }
}

/// Task-related errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Submission contained no items.
    #[error("batch must contain at least one item")]
    EmptyBatch,
    /// Submission exceeded the batch size limit.
    #[error("batch of {count} items exceeds the limit of {limit}")]
    BatchTooLarge {
        /// Number of submitted items.
        count: usize,
        /// Configured maximum batch size.
        limit: usize,
    },
    /// Sum of item weights exceeded the total size limit.
    #[error("batch totals {total_bytes} bytes, exceeding the limit of {limit_bytes}")]
    TotalSizeExceeded {
        /// Sum of declared item sizes.
        total_bytes: u64,
        /// Configured maximum total size.
        limit_bytes: u64,
    },
    /// An item was rejected by the admission policy.
    #[error("item not admissible: {file_name}")]
    InadmissibleItem {
        /// Name of the rejected item.
        file_name: String,
    },
    /// Task not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),
    /// Cancel requested for a task that is already executing.
    #[error("cannot cancel in-flight task: {0}")]
    CannotCancelInFlight(String),
    /// Operation not valid for the task's current status.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current status name.
        from: String,
        /// Requested status name.
        to: String,
    },
    /// Retry requested for a task without a failure-bearing status.
    #[error("task is not retryable from status {status}")]
    NotRetryable {
        /// Current status name.
        status: String,
    },
    /// Retry requested past the bounded attempt limit.
    #[error("retry limit exceeded: {attempts}/{limit}")]
    RetryLimitExceeded {
        /// Retries already performed.
        attempts: u32,
        /// Configured maximum retries.
        limit: u32,
    },
    /// Results requested before the task reached a terminal status.
    #[error("task not yet complete: {0}")]
    NotYetComplete(String),
    /// Export requested in a format the engine does not produce.
    #[error("unsupported export format: {0}")]
    UnsupportedExportFormat(String),
    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_rejects_empty_and_slashes() {
        assert!(TaskId::new(String::new()).is_err());
        assert!(TaskId::new("a/b".to_string()).is_err());
        assert!(TaskId::new("task-1".to_string()).is_ok());
    }

    #[test]
    fn generated_task_ids_are_unique() {
        assert_ne!(TaskId::generate(), TaskId::generate());
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(TaskStatus::Pending.to_string(), "pending");
        assert_eq!(TaskStatus::Processing.to_string(), "processing");
        assert_eq!(TaskStatus::Partial.to_string(), "partial");
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Partial.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn progress_percentage_rounds() {
        let mut progress = TaskProgress::new(3);
        progress.settle(true);
        assert_eq!(progress.percentage, 33);
        progress.settle(false);
        assert_eq!(progress.percentage, 67);
        progress.settle(true);
        assert_eq!(progress.percentage, 100);
        assert!(progress.is_complete());
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.failed, 1);
    }

    #[test]
    fn new_task_is_pending_with_empty_outcomes() {
        let items = vec![
            WorkItem {
                file_name: "a.docx".to_string(),
                size_bytes: 10,
                payload: serde_json::Value::Null,
            },
            WorkItem {
                file_name: "b.docx".to_string(),
                size_bytes: 20,
                payload: serde_json::Value::Null,
            },
        ];
        let task = BatchTask::new(items, BatchOptions::default());
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress.total, 2);
        assert_eq!(task.outcomes.len(), 2);
        assert!(task.settled_outcomes().is_empty());
        assert!(task.started_at.is_none());
    }

    #[test]
    fn reset_for_retry_discards_progress() {
        let items = vec![WorkItem {
            file_name: "a.txt".to_string(),
            size_bytes: 1,
            payload: serde_json::Value::Null,
        }];
        let mut task = BatchTask::new(items, BatchOptions::default());
        task.status = TaskStatus::Failed;
        task.progress.settle(false);
        task.outcomes[0] = Some(ItemOutcome::failure(0, "boom", 5));
        task.completed_at = Some(Utc::now());

        task.reset_for_retry();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.retry_count, 1);
        assert_eq!(task.progress.settled(), 0);
        assert!(task.outcomes[0].is_none());
        assert!(task.completed_at.is_none());
        assert!(task.error.is_none());
    }

    #[test]
    fn outcome_constructors_set_status() {
        let ok = ItemOutcome::success(0, serde_json::json!({"text": "hola"}), 12);
        assert_eq!(ok.status, ItemStatus::Completed);
        assert!(ok.error.is_none());

        let failed = ItemOutcome::failure(1, "parse error", 3);
        assert_eq!(failed.status, ItemStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("parse error"));
        assert!(failed.value.is_none());
    }
}
