//! REST API routes for task management.
//!
//! This module provides the HTTP endpoints for creating, inspecting and
//! managing batch tasks.

use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{
    cancel_task, cleanup, create_task, export_task, get_stats, get_task, get_task_results,
    list_tasks, retry_task,
};
use crate::api::stream::event_stream;
use crate::engine::BatchEngine;

/// API routes for task management.
///
/// Creates a router with all task-related endpoints mounted at `/api/v1`.
pub fn routes() -> Router<BatchEngine> {
    Router::new()
        .route("/api/v1/tasks", post(create_task).get(list_tasks))
        .route("/api/v1/tasks/{id}", get(get_task))
        .route("/api/v1/tasks/{id}/results", get(get_task_results))
        .route("/api/v1/tasks/{id}/cancel", post(cancel_task))
        .route("/api/v1/tasks/{id}/retry", post(retry_task))
        .route("/api/v1/tasks/{id}/export", get(export_task))
        .route("/api/v1/cleanup", post(cleanup))
        .route("/api/v1/stats", get(get_stats))
        .route("/api/v1/events", get(event_stream))
}
