//! Per-task execution: parallel fan-out of items, fan-in of outcomes.
//!
//! Every item of a dispatched task runs as its own tokio task; outcomes
//! are collected as they settle, without short-circuiting. One item's
//! failure never cancels or blocks its siblings. The runner holds the
//! task's pool slot for its whole run and triggers a dispatch pass after
//! releasing it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::batch::types::{ItemOutcome, ItemStatus, TaskId, TaskStatus};
use crate::events::TaskEvent;

use super::{dispatch_pass, executor::execute_item, EngineInner};

/// Runs one dispatched task to a terminal status.
pub(crate) async fn run_task(inner: Arc<EngineInner>, id: TaskId, permit: OwnedSemaphorePermit) {
    // Re-check under the lock: the task may have been cancelled or purged
    // between the dispatch pass and this point.
    let task = {
        match inner.storage.get_mut(&id) {
            Some(mut task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Processing;
                task.started_at = Some(Utc::now());
                Some(task.clone())
            }
            Some(task) => {
                info!(task_id = %id, status = %task.status, "Dispatched task no longer pending");
                None
            }
            None => {
                warn!(task_id = %id, "Dispatched task no longer in storage");
                None
            }
        }
    };
    let Some(task) = task else {
        // Give the slot back.
        drop(permit);
        dispatch_pass(&inner);
        return;
    };
    info!(task_id = %id, file_count = task.items.len(), "Task started");
    inner.notifier.publish(TaskEvent::started(&task));

    let timeout = Duration::from_secs(inner.settings.item_timeout_secs);
    let mut join_set = JoinSet::new();
    for (index, item) in task.items.iter().enumerate() {
        join_set.spawn(execute_item(
            Arc::clone(&inner.executor),
            index,
            item.clone(),
            task.options.clone(),
            timeout,
        ));
    }

    let mut panicked = false;
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => settle_item(&inner, &id, outcome),
            Err(e) => {
                // The panicking item's index is unknown here; unsettled
                // slots are failed after the fan-in.
                error!(task_id = %id, error = %e, "Item task panicked");
                panicked = true;
            }
        }
    }
    if panicked {
        settle_leftovers(&inner, &id);
    }

    finalize(&inner, &id);
    drop(permit);
    dispatch_pass(&inner);
}

/// Writes one settled outcome into its slot, exactly once, and publishes
/// the progress update.
fn settle_item(inner: &Arc<EngineInner>, id: &TaskId, outcome: ItemOutcome) {
    let snapshot = {
        let Some(mut task) = inner.storage.get_mut(id) else {
            return;
        };
        let index = outcome.index;
        if task.outcomes[index].is_some() {
            return;
        }
        let succeeded = outcome.status == ItemStatus::Completed;
        task.outcomes[index] = Some(outcome);
        task.progress.settle(succeeded);
        if !succeeded {
            metrics::counter!("docflux_items_failed_total").increment(1);
        }
        task.clone()
    };
    inner.notifier.publish(TaskEvent::progress(&snapshot));
}

/// Fails every still-unsettled slot after a panicked item task.
fn settle_leftovers(inner: &Arc<EngineInner>, id: &TaskId) {
    let unsettled: Vec<usize> = match inner.storage.get(id) {
        Some(task) => task
            .outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.is_none().then_some(index))
            .collect(),
        None => return,
    };
    for index in unsettled {
        settle_item(
            inner,
            id,
            ItemOutcome::failure(index, "item execution panicked", 0),
        );
    }
}

/// Computes the terminal status once every item has settled and publishes
/// the matching terminal event.
fn finalize(inner: &Arc<EngineInner>, id: &TaskId) {
    let snapshot = {
        let Some(mut task) = inner.storage.get_mut(id) else {
            return;
        };
        task.status = if task.progress.failed == 0 {
            TaskStatus::Completed
        } else if task.progress.completed == 0 {
            TaskStatus::Failed
        } else {
            TaskStatus::Partial
        };
        let completed_at = Utc::now();
        task.completed_at = Some(completed_at);
        task.processing_time_ms = task.started_at.map(|started| {
            u64::try_from((completed_at - started).num_milliseconds().max(0)).unwrap_or(0)
        });
        task.clone()
    };

    info!(
        task_id = %id,
        status = %snapshot.status,
        completed = snapshot.progress.completed,
        failed = snapshot.progress.failed,
        processing_time_ms = snapshot.processing_time_ms.unwrap_or(0),
        "Task settled"
    );

    match snapshot.status {
        TaskStatus::Completed => {
            metrics::counter!("docflux_tasks_completed_total").increment(1);
            inner.notifier.publish(TaskEvent::TaskCompleted {
                task_id: snapshot.id.to_string(),
                progress: snapshot.progress,
                processing_time_ms: snapshot.processing_time_ms.unwrap_or(0),
            });
        }
        status => {
            metrics::counter!("docflux_tasks_failed_total").increment(1);
            inner.notifier.publish(TaskEvent::TaskFailed {
                task_id: snapshot.id.to_string(),
                status: status.to_string(),
                progress: snapshot.progress,
                error: snapshot.error.clone(),
            });
        }
    }
}
