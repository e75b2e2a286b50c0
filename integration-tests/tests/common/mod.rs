//! Shared helpers and scripted executors for engine scenario tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docflux_engine::batch::{BatchOptions, BatchTask, TaskId, WorkItem};
use docflux_engine::engine::{
    AcceptAll, BatchEngine, ItemExecutionError, ItemExecutor,
};
use docflux_engine::infrastructure::config::EngineSettings;
use tokio::sync::Semaphore;

/// Executor driven entirely by each item's payload.
///
/// `{"fail": true}` makes the item fail, `{"delay_ms": n}` delays its
/// settlement.
pub struct ScriptedExecutor;

#[async_trait]
impl ItemExecutor for ScriptedExecutor {
    async fn run(
        &self,
        item: &WorkItem,
        _options: &BatchOptions,
    ) -> Result<serde_json::Value, ItemExecutionError> {
        if let Some(delay_ms) = item.payload.get("delay_ms").and_then(serde_json::Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if item.payload.get("fail").and_then(serde_json::Value::as_bool) == Some(true) {
            return Err(ItemExecutionError::Processing(format!(
                "scripted failure for {}",
                item.file_name
            )));
        }
        Ok(serde_json::json!({ "translated": item.file_name }))
    }
}

/// Executor that blocks every item until the gate is opened.
pub struct GatedExecutor {
    gate: Arc<Semaphore>,
}

impl GatedExecutor {
    /// Returns the executor and the gate; add permits to let items through.
    pub fn new() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self { gate: Arc::clone(&gate) }, gate)
    }
}

#[async_trait]
impl ItemExecutor for GatedExecutor {
    async fn run(
        &self,
        item: &WorkItem,
        _options: &BatchOptions,
    ) -> Result<serde_json::Value, ItemExecutionError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ItemExecutionError::Other(e.to_string()))?;
        permit.forget();
        Ok(serde_json::json!({ "translated": item.file_name }))
    }
}

/// Executor that records the highest number of items in flight at once.
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
    /// Returns the executor and a handle to the recorded peak.
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let peak = Arc::new(AtomicUsize::new(0));
        (
            Self {
                current: AtomicUsize::new(0),
                peak: Arc::clone(&peak),
            },
            peak,
        )
    }
}

#[async_trait]
impl ItemExecutor for ConcurrencyProbe {
    async fn run(
        &self,
        item: &WorkItem,
        _options: &BatchOptions,
    ) -> Result<serde_json::Value, ItemExecutionError> {
        let in_flight = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(in_flight, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(serde_json::json!({ "translated": item.file_name }))
    }
}

/// Engine with default limits around the given executor.
pub fn engine_with(executor: Arc<dyn ItemExecutor>) -> BatchEngine {
    BatchEngine::new(EngineSettings::default(), executor, Arc::new(AcceptAll))
}

/// Engine with a custom pool size around the given executor.
pub fn engine_with_pool(executor: Arc<dyn ItemExecutor>, pool: usize) -> BatchEngine {
    let settings = EngineSettings {
        max_concurrent_tasks: pool,
        ..EngineSettings::default()
    };
    BatchEngine::new(settings, executor, Arc::new(AcceptAll))
}

/// A plain item that the scripted executor will succeed on.
pub fn ok_item(name: &str) -> WorkItem {
    WorkItem {
        file_name: name.to_string(),
        size_bytes: 100,
        payload: serde_json::json!({}),
    }
}

/// An item the scripted executor will fail, after an optional delay.
pub fn failing_item(name: &str, delay_ms: u64) -> WorkItem {
    WorkItem {
        file_name: name.to_string(),
        size_bytes: 100,
        payload: serde_json::json!({ "fail": true, "delay_ms": delay_ms }),
    }
}

/// An item the scripted executor will succeed on after a delay.
pub fn slow_item(name: &str, delay_ms: u64) -> WorkItem {
    WorkItem {
        file_name: name.to_string(),
        size_bytes: 100,
        payload: serde_json::json!({ "delay_ms": delay_ms }),
    }
}

/// Polls until the task reaches a terminal status.
///
/// Panics if the task has not settled after five seconds.
pub async fn wait_terminal(engine: &BatchEngine, id: &TaskId) -> BatchTask {
    wait_for(engine, id, |task| task.status.is_terminal()).await
}

/// Polls until the task satisfies the predicate.
pub async fn wait_for<F>(engine: &BatchEngine, id: &TaskId, predicate: F) -> BatchTask
where
    F: Fn(&BatchTask) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let task = engine.get(id).expect("task retained");
        if predicate(&task) {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {id} did not reach the expected state, status: {}",
            task.status
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
