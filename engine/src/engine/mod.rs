//! The docflux batch engine.
//!
//! An engine instance owns all task state: the submission queue, the
//! worker-pool slots, the in-memory task storage and the event notifier.
//! Callers hold a [`BatchEngine`] handle and issue commands (submit,
//! cancel, retry, cleanup) or read snapshots; the engine exclusively owns
//! task mutation.

pub mod dispatch;
pub mod executor;
pub mod policy;
pub mod runner;

pub use executor::{ItemExecutor, ItemExecutionError, PassthroughExecutor};
pub use policy::{AcceptAll, AdmissionPolicy, ExtensionPolicy};

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::batch::storage::TaskStorage;
use crate::batch::types::{
    BatchOptions, BatchTask, ItemOutcome, TaskError, TaskId, TaskStatus, WorkItem,
};
use crate::events::{EventReceiver, Notifier, TaskEvent};
use crate::infrastructure::audit::{log_audit, AuditEvent};
use crate::infrastructure::config::EngineSettings;
use dispatch::Dispatcher;

/// Aggregate engine statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Number of retained tasks, any status.
    pub total_tasks: usize,
    /// Number of tasks that finished fully successful.
    pub completed_tasks: usize,
    /// Number of tasks that finished with no successful item.
    pub failed_tasks: usize,
    /// Mean wall-clock processing time of terminal tasks.
    pub average_processing_time_ms: u64,
    /// Number of tasks waiting in the submission queue.
    pub queue_length: usize,
    /// Number of tasks currently executing.
    pub active_tasks: usize,
    /// Free worker-pool slots.
    pub pool_available: usize,
    /// Occupied worker-pool slots.
    pub pool_busy: usize,
}

/// One page of task snapshots.
#[derive(Debug, Clone)]
pub struct TaskPage {
    /// Tasks on this page, newest first.
    pub tasks: Vec<BatchTask>,
    /// Total number of tasks matching the filter.
    pub total: usize,
    /// Requested page number (1-based).
    pub page: usize,
    /// Requested page size.
    pub limit: usize,
}

/// Shared engine state, owned behind an `Arc` by the handle and by
/// spawned task runners.
pub(crate) struct EngineInner {
    pub(crate) settings: EngineSettings,
    pub(crate) storage: TaskStorage,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) notifier: Notifier,
    pub(crate) executor: Arc<dyn ItemExecutor>,
}

/// Handle to a batch engine instance.
#[derive(Clone)]
pub struct BatchEngine {
    inner: Arc<EngineInner>,
    policy: Arc<dyn AdmissionPolicy>,
}

impl BatchEngine {
    /// Constructs an engine with its configuration, work function and
    /// admission policy.
    #[must_use]
    pub fn new(
        settings: EngineSettings,
        executor: Arc<dyn ItemExecutor>,
        policy: Arc<dyn AdmissionPolicy>,
    ) -> Self {
        let dispatcher = Dispatcher::new(settings.max_concurrent_tasks);
        Self {
            inner: Arc::new(EngineInner {
                settings,
                storage: TaskStorage::new(),
                dispatcher,
                notifier: Notifier::new(),
                executor,
            }),
            policy,
        }
    }

    /// Admits a batch of work items as a new pending task.
    ///
    /// The task is validated, queued FIFO and returned synchronously;
    /// execution starts as soon as a pool slot is free.
    ///
    /// # Errors
    ///
    /// Returns a validation error and creates no task if the batch is
    /// empty, too large, too heavy, or contains an inadmissible item.
    pub fn submit(
        &self,
        items: Vec<WorkItem>,
        options: BatchOptions,
    ) -> Result<BatchTask, TaskError> {
        let limits = &self.inner.settings;
        if items.is_empty() {
            return Err(TaskError::EmptyBatch);
        }
        if items.len() > limits.max_batch_size {
            return Err(TaskError::BatchTooLarge {
                count: items.len(),
                limit: limits.max_batch_size,
            });
        }
        let total_bytes: u64 = items.iter().map(|item| item.size_bytes).sum();
        if total_bytes > limits.max_total_size_bytes {
            return Err(TaskError::TotalSizeExceeded {
                total_bytes,
                limit_bytes: limits.max_total_size_bytes,
            });
        }
        if let Some(rejected) = items.iter().find(|item| !self.policy.is_admissible(item)) {
            return Err(TaskError::InadmissibleItem {
                file_name: rejected.file_name.clone(),
            });
        }

        let task = BatchTask::new(items, options);
        let snapshot = task.clone();
        info!(task_id = %task.id, file_count = task.items.len(), "Task admitted");
        log_audit(&AuditEvent::TaskSubmitted {
            task_id: task.id.to_string(),
            file_count: task.items.len(),
        });
        metrics::counter!("docflux_tasks_submitted_total").increment(1);

        self.inner.storage.insert(task);
        self.inner.dispatcher.enqueue(snapshot.id.clone());
        self.inner.notifier.publish(TaskEvent::created(&snapshot));
        dispatch_pass(&self.inner);

        Ok(snapshot)
    }

    /// Snapshot of a task by ID.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::TaskNotFound` for unknown IDs.
    pub fn get(&self, id: &TaskId) -> Result<BatchTask, TaskError> {
        self.inner
            .storage
            .get(id)
            .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))
    }

    /// Settled outcomes of a terminal task, in item order.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::NotYetComplete` while the task is still pending
    /// or processing.
    pub fn results(&self, id: &TaskId) -> Result<Vec<ItemOutcome>, TaskError> {
        let task = self.get(id)?;
        if !task.status.is_terminal() {
            return Err(TaskError::NotYetComplete(id.to_string()));
        }
        Ok(task.settled_outcomes())
    }

    /// Lists task snapshots, newest first, optionally filtered by status.
    ///
    /// `page` is 1-based; a zero `limit` yields an empty page.
    pub fn list(
        &self,
        status_filter: Option<TaskStatus>,
        page: usize,
        limit: usize,
    ) -> TaskPage {
        let mut tasks: Vec<BatchTask> = self
            .inner
            .storage
            .all()
            .into_iter()
            .filter(|task| status_filter.map_or(true, |status| task.status == status))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = tasks.len();
        let page = page.max(1);
        let tasks = tasks
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();
        TaskPage {
            tasks,
            total,
            page,
            limit,
        }
    }

    /// Cancels a queued task.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::CannotCancelInFlight` for a task already
    /// executing (in-flight items run to completion), and
    /// `TaskError::InvalidStateTransition` for terminal tasks.
    pub fn cancel(&self, id: &TaskId) -> Result<BatchTask, TaskError> {
        let snapshot = {
            let mut task = self
                .inner
                .storage
                .get_mut(id)
                .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))?;
            match task.status {
                TaskStatus::Pending => {
                    task.status = TaskStatus::Cancelled;
                    task.completed_at = Some(Utc::now());
                    task.clone()
                }
                TaskStatus::Processing => {
                    return Err(TaskError::CannotCancelInFlight(id.to_string()));
                }
                status => {
                    return Err(TaskError::InvalidStateTransition {
                        from: status.to_string(),
                        to: TaskStatus::Cancelled.to_string(),
                    });
                }
            }
        };
        info!(task_id = %id, "Task cancelled while queued");
        self.inner.notifier.publish(TaskEvent::TaskCancelled {
            task_id: snapshot.id.to_string(),
            cancelled_at: snapshot.completed_at.unwrap_or_else(Utc::now),
        });
        Ok(snapshot)
    }

    /// Re-admits a failed or partial task for a fresh run of all items.
    ///
    /// The task re-enters the queue at the back, with no priority over
    /// fresh submissions. Previous outcomes are discarded.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::NotRetryable` unless the task is `failed` or
    /// `partial`, and `TaskError::RetryLimitExceeded` past the bounded
    /// attempt limit.
    pub fn retry(&self, id: &TaskId) -> Result<BatchTask, TaskError> {
        let limit = self.inner.settings.max_retries;
        let snapshot = {
            let mut task = self
                .inner
                .storage
                .get_mut(id)
                .ok_or_else(|| TaskError::TaskNotFound(id.to_string()))?;
            if !matches!(task.status, TaskStatus::Failed | TaskStatus::Partial) {
                return Err(TaskError::NotRetryable {
                    status: task.status.to_string(),
                });
            }
            if task.retry_count >= limit {
                return Err(TaskError::RetryLimitExceeded {
                    attempts: task.retry_count,
                    limit,
                });
            }
            task.reset_for_retry();
            task.clone()
        };
        info!(task_id = %id, retry_count = snapshot.retry_count, "Task re-admitted");
        self.inner.dispatcher.enqueue(snapshot.id.clone());
        dispatch_pass(&self.inner);
        Ok(snapshot)
    }

    /// Purges terminal tasks older than the retention window.
    ///
    /// Pending and processing tasks are never purged regardless of age.
    /// Returns how many tasks were removed.
    pub fn cleanup(&self, max_age_hours: i64) -> usize {
        let cutoff = Utc::now() - ChronoDuration::hours(max_age_hours);
        let purged = self.inner.storage.remove_where(|task| {
            task.status.is_terminal()
                && task.completed_at.is_some_and(|completed| completed < cutoff)
        });
        if purged > 0 {
            info!(purged, max_age_hours, "Retention cleanup removed tasks");
            log_audit(&AuditEvent::TasksPurged {
                purged,
                max_age_hours,
            });
        }
        purged
    }

    /// Purges terminal tasks using the configured retention window.
    pub fn cleanup_default(&self) -> usize {
        self.cleanup(self.inner.settings.retention_hours)
    }

    /// Aggregate statistics over retained tasks and the worker pool.
    pub fn stats(&self) -> EngineStats {
        let tasks = self.inner.storage.all();
        let completed_tasks = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let failed_tasks = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count();
        let active_tasks = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Processing)
            .count();

        let durations: Vec<u64> = tasks
            .iter()
            .filter(|t| t.status.is_terminal())
            .filter_map(|t| t.processing_time_ms)
            .collect();
        let average_processing_time_ms = if durations.is_empty() {
            0
        } else {
            durations.iter().sum::<u64>() / durations.len() as u64
        };

        EngineStats {
            total_tasks: tasks.len(),
            completed_tasks,
            failed_tasks,
            average_processing_time_ms,
            queue_length: self.inner.dispatcher.queue_len(),
            active_tasks,
            pool_available: self.inner.dispatcher.available_slots(),
            pool_busy: self.inner.dispatcher.busy_slots(),
        }
    }

    /// Serializes a terminal task into an export bundle.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::UnsupportedExportFormat` for formats other than
    /// `json` and `TaskError::NotYetComplete` for non-terminal tasks.
    pub fn export(&self, id: &TaskId, format: &str) -> Result<serde_json::Value, TaskError> {
        if format != "json" {
            return Err(TaskError::UnsupportedExportFormat(format.to_string()));
        }
        let task = self.get(id)?;
        if !task.status.is_terminal() {
            return Err(TaskError::NotYetComplete(id.to_string()));
        }
        Ok(serde_json::json!({
            "task_id": task.id.to_string(),
            "status": task.status,
            "retry_count": task.retry_count,
            "options": task.options,
            "progress": task.progress,
            "outcomes": task.settled_outcomes(),
            "exported_at": Utc::now(),
        }))
    }

    /// Subscribes an observer to the engine's lifecycle events.
    pub fn subscribe(&self) -> EventReceiver {
        self.inner.notifier.subscribe()
    }

    /// The engine's event notifier.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}

/// One dispatch pass: admit queued tasks into execution while pool slots
/// are free.
///
/// Called after a submission, after a retry and after a task settles --
/// the only re-entry points, so slots cannot leak.
pub(crate) fn dispatch_pass(inner: &Arc<EngineInner>) {
    while let Some((id, permit)) = inner.dispatcher.next_ready(&inner.storage) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            runner::run_task(inner, id, permit).await;
        });
    }
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!("docflux_pool_available").set(inner.dispatcher.available_slots() as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> BatchEngine {
        BatchEngine::new(
            EngineSettings::default(),
            Arc::new(PassthroughExecutor::new()),
            Arc::new(AcceptAll),
        )
    }

    fn items(count: usize) -> Vec<WorkItem> {
        (0..count)
            .map(|i| WorkItem {
                file_name: format!("doc-{i}.txt"),
                size_bytes: 100,
                payload: serde_json::Value::Null,
            })
            .collect()
    }

    #[tokio::test]
    async fn submit_rejects_empty_batch() {
        let engine = engine();
        let err = engine
            .submit(Vec::new(), BatchOptions::default())
            .expect_err("empty batch must be rejected");
        assert!(matches!(err, TaskError::EmptyBatch));
    }

    #[tokio::test]
    async fn submit_rejects_oversized_batch() {
        let engine = engine();
        let err = engine
            .submit(items(51), BatchOptions::default())
            .expect_err("51 items over the default limit of 50");
        assert!(matches!(err, TaskError::BatchTooLarge { count: 51, limit: 50 }));
    }

    #[tokio::test]
    async fn submit_rejects_overweight_batch() {
        let settings = EngineSettings {
            max_total_size_bytes: 1000,
            ..EngineSettings::default()
        };
        let engine = BatchEngine::new(
            settings,
            Arc::new(PassthroughExecutor::new()),
            Arc::new(AcceptAll),
        );
        let heavy = vec![
            WorkItem {
                file_name: "a.txt".to_string(),
                size_bytes: 600,
                payload: serde_json::Value::Null,
            },
            WorkItem {
                file_name: "b.txt".to_string(),
                size_bytes: 500,
                payload: serde_json::Value::Null,
            },
        ];
        let err = engine
            .submit(heavy, BatchOptions::default())
            .expect_err("1100 bytes over the 1000 byte limit");
        assert!(matches!(
            err,
            TaskError::TotalSizeExceeded {
                total_bytes: 1100,
                limit_bytes: 1000
            }
        ));
    }

    #[tokio::test]
    async fn submit_rejects_inadmissible_item() {
        let engine = BatchEngine::new(
            EngineSettings::default(),
            Arc::new(PassthroughExecutor::new()),
            Arc::new(ExtensionPolicy::default_documents()),
        );
        let mut batch = items(1);
        batch.push(WorkItem {
            file_name: "virus.exe".to_string(),
            size_bytes: 1,
            payload: serde_json::Value::Null,
        });
        let err = engine
            .submit(batch, BatchOptions::default())
            .expect_err("exe is not an admissible document");
        assert!(
            matches!(err, TaskError::InadmissibleItem { ref file_name } if file_name == "virus.exe")
        );
    }

    #[tokio::test]
    async fn submitted_task_starts_pending_with_zero_progress() {
        let engine = engine();
        let task = engine
            .submit(items(3), BatchOptions::default())
            .expect("valid batch");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress.total, 3);
        assert_eq!(task.progress.settled(), 0);
        assert_eq!(task.retry_count, 0);
    }

    #[tokio::test]
    async fn get_unknown_task_is_not_found() {
        let engine = engine();
        let id = TaskId::generate();
        assert!(matches!(engine.get(&id), Err(TaskError::TaskNotFound(_))));
    }

    #[tokio::test]
    async fn export_rejects_unknown_format() {
        let engine = engine();
        let task = engine
            .submit(items(1), BatchOptions::default())
            .expect("valid batch");
        let err = engine
            .export(&task.id, "xml")
            .expect_err("only json export is supported");
        assert!(matches!(err, TaskError::UnsupportedExportFormat(_)));
    }

    #[tokio::test]
    async fn list_paginates_newest_first() {
        let engine = engine();
        let first = engine
            .submit(items(1), BatchOptions::default())
            .expect("valid batch");
        let second = engine
            .submit(items(1), BatchOptions::default())
            .expect("valid batch");

        let page = engine.list(None, 1, 1);
        assert_eq!(page.total, 2);
        assert_eq!(page.tasks.len(), 1);
        // Newest submission first.
        assert_eq!(page.tasks[0].id, second.id);

        let page = engine.list(None, 2, 1);
        assert_eq!(page.tasks[0].id, first.id);
    }
}
