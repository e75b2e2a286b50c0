//! API handler implementations for task management.
//!
//! This module provides HTTP request handlers for the engine's command
//! and query surface.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;

use crate::api::types::{
    task_to_response, CleanupRequest, CleanupResponse, CreateTaskRequest, ExportQuery,
    HealthResponse, ListTasksQuery, ListTasksResponse, TaskResponse, TaskResultsResponse,
};
use crate::batch::types::{TaskError, TaskId};
use crate::engine::{BatchEngine, EngineStats};

/// API errors for task operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Domain-level task error.
    #[error("Task error: {0}")]
    Task(#[from] TaskError),
    /// Invalid task ID format.
    #[error("Invalid task ID: {0}")]
    InvalidTaskId(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Task(e @ TaskError::TaskNotFound(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            ApiError::Task(
                e @ (TaskError::CannotCancelInFlight(_)
                | TaskError::InvalidStateTransition { .. }
                | TaskError::NotRetryable { .. }
                | TaskError::RetryLimitExceeded { .. }
                | TaskError::NotYetComplete(_)),
            ) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Task(
                e @ (TaskError::EmptyBatch
                | TaskError::BatchTooLarge { .. }
                | TaskError::TotalSizeExceeded { .. }
                | TaskError::InadmissibleItem { .. }
                | TaskError::UnsupportedExportFormat(_)),
            ) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Task(e @ TaskError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::InvalidTaskId(id) => {
                (StatusCode::BAD_REQUEST, format!("Invalid task ID: {id}"))
            }
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

fn parse_task_id(id: String) -> Result<TaskId, ApiError> {
    TaskId::new(id.clone()).map_err(|_| ApiError::InvalidTaskId(id))
}

/// GET /health
///
/// Returns basic health status of the engine.
pub async fn health_check() -> Result<Json<HealthResponse>, ApiError> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
    }))
}

/// POST /api/v1/tasks
///
/// Admit a batch of work items as a new task.
pub async fn create_task(
    State(engine): State<BatchEngine>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let task = engine.submit(req.items, req.options)?;
    Ok((StatusCode::CREATED, Json(task_to_response(&task))))
}

/// GET /api/v1/tasks
///
/// List task snapshots, newest first, with optional status filter.
pub async fn list_tasks(
    State(engine): State<BatchEngine>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<ListTasksResponse>, ApiError> {
    let page = engine.list(query.status, query.page, query.limit);
    Ok(Json(ListTasksResponse {
        tasks: page.tasks.iter().map(task_to_response).collect(),
        total: page.total,
        page: page.page,
        limit: page.limit,
    }))
}

/// GET /api/v1/tasks/{id}
///
/// Read one task's status snapshot.
pub async fn get_task(
    State(engine): State<BatchEngine>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = parse_task_id(id)?;
    let task = engine.get(&id)?;
    Ok(Json(task_to_response(&task)))
}

/// GET /api/v1/tasks/{id}/results
///
/// Read a terminal task's per-item outcomes.
pub async fn get_task_results(
    State(engine): State<BatchEngine>,
    Path(id): Path<String>,
) -> Result<Json<TaskResultsResponse>, ApiError> {
    let id = parse_task_id(id)?;
    // Single snapshot: a concurrent cleanup must not turn a successful
    // read into a not-found halfway through.
    let task = engine.get(&id)?;
    if !task.status.is_terminal() {
        return Err(TaskError::NotYetComplete(id.to_string()).into());
    }
    Ok(Json(TaskResultsResponse {
        task_id: task.id.to_string(),
        status: task.status,
        results: task.settled_outcomes(),
    }))
}

/// POST /api/v1/tasks/{id}/cancel
///
/// Cancel a queued task. In-flight tasks are rejected.
pub async fn cancel_task(
    State(engine): State<BatchEngine>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = parse_task_id(id)?;
    let task = engine.cancel(&id)?;
    Ok(Json(task_to_response(&task)))
}

/// POST /api/v1/tasks/{id}/retry
///
/// Re-admit a failed or partial task.
pub async fn retry_task(
    State(engine): State<BatchEngine>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let id = parse_task_id(id)?;
    let task = engine.retry(&id)?;
    Ok(Json(task_to_response(&task)))
}

/// GET /api/v1/tasks/{id}/export
///
/// Export a terminal task's results as a serialized bundle.
pub async fn export_task(
    State(engine): State<BatchEngine>,
    Path(id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_task_id(id)?;
    let bundle = engine.export(&id, &query.format)?;
    Ok(Json(bundle))
}

/// POST /api/v1/cleanup
///
/// Purge terminal tasks past the retention window.
pub async fn cleanup(
    State(engine): State<BatchEngine>,
    body: Option<Json<CleanupRequest>>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let purged = match request.max_age_hours {
        Some(hours) => engine.cleanup(hours),
        None => engine.cleanup_default(),
    };
    Ok(Json(CleanupResponse { purged }))
}

/// GET /api/v1/stats
///
/// Aggregate engine statistics.
pub async fn get_stats(
    State(engine): State<BatchEngine>,
) -> Result<Json<EngineStats>, ApiError> {
    Ok(Json(engine.stats()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::{BatchOptions, WorkItem};
    use crate::engine::{AcceptAll, PassthroughExecutor};
    use crate::infrastructure::config::EngineSettings;
    use std::sync::Arc;
    use std::time::Duration;

    fn engine() -> BatchEngine {
        BatchEngine::new(
            EngineSettings::default(),
            Arc::new(PassthroughExecutor::new()),
            Arc::new(AcceptAll),
        )
    }

    #[tokio::test]
    async fn results_handler_serves_a_terminal_task_from_one_snapshot() {
        let engine = engine();
        let task = engine
            .submit(
                vec![WorkItem {
                    file_name: "a.docx".to_string(),
                    size_bytes: 1,
                    payload: serde_json::Value::Null,
                }],
                BatchOptions::default(),
            )
            .expect("valid batch");
        while !engine.get(&task.id).expect("retained").status.is_terminal() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let Json(response) = get_task_results(State(engine.clone()), Path(task.id.to_string()))
            .await
            .expect("terminal task has results");
        assert_eq!(response.task_id, task.id.to_string());
        assert!(response.status.is_terminal());
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn results_handler_maps_missing_tasks_to_task_errors() {
        let engine = engine();
        let err = get_task_results(State(engine), Path("no-such-task".to_string()))
            .await
            .expect_err("unknown task");
        assert!(matches!(err, ApiError::Task(TaskError::TaskNotFound(_))));
    }
}
