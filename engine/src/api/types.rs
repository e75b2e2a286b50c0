//! Request and response types for the task API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::types::{BatchOptions, BatchTask, ItemOutcome, TaskProgress, TaskStatus, WorkItem};

/// Request body for creating a task.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    /// Work items to process.
    pub items: Vec<WorkItem>,
    /// Options snapshot for the whole batch.
    #[serde(default)]
    pub options: BatchOptions,
}

/// Task snapshot returned by the API.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    /// Task ID.
    pub task_id: String,
    /// Current status.
    pub status: TaskStatus,
    /// Number of items in the batch.
    pub file_count: usize,
    /// Aggregate progress.
    pub progress: TaskProgress,
    /// Retries performed so far.
    pub retry_count: u32,
    /// Admission timestamp.
    pub created_at: DateTime<Utc>,
    /// Dispatch timestamp, if started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Terminal timestamp, if settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock processing time, if settled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    /// Whole-task error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Converts an engine task snapshot into its API representation.
#[must_use]
pub fn task_to_response(task: &BatchTask) -> TaskResponse {
    TaskResponse {
        task_id: task.id.to_string(),
        status: task.status,
        file_count: task.items.len(),
        progress: task.progress,
        retry_count: task.retry_count,
        created_at: task.created_at,
        started_at: task.started_at,
        completed_at: task.completed_at,
        processing_time_ms: task.processing_time_ms,
        error: task.error.clone(),
    }
}

/// Query parameters for listing tasks.
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    /// Optional status filter.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Page number, 1-based.
    #[serde(default = "default_page")]
    pub page: usize,
    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    20
}

/// Response for listing tasks.
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    /// Task snapshots, newest first.
    pub tasks: Vec<TaskResponse>,
    /// Total number of tasks matching the filter.
    pub total: usize,
    /// Requested page number.
    pub page: usize,
    /// Requested page size.
    pub limit: usize,
}

/// Response for reading a terminal task's results.
#[derive(Debug, Serialize)]
pub struct TaskResultsResponse {
    /// Task ID.
    pub task_id: String,
    /// Terminal status.
    pub status: TaskStatus,
    /// Settled outcomes in item order.
    pub results: Vec<ItemOutcome>,
}

/// Query parameters for exporting task results.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// Export format; only `json` is supported.
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".to_string()
}

/// Request body for the retention cleanup command.
#[derive(Debug, Deserialize, Default)]
pub struct CleanupRequest {
    /// Age threshold in hours; the configured retention window if unset.
    #[serde(default)]
    pub max_age_hours: Option<i64>,
}

/// Response for the retention cleanup command.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    /// Number of purged tasks.
    pub purged: usize,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Response timestamp.
    pub timestamp: DateTime<Utc>,
}
