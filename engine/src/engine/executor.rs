//! The pluggable item-execution boundary.
//!
//! The embedding application supplies the per-item work function
//! (parse, translate, generate in the docflux service); the engine only
//! enforces the per-item timeout, measures elapsed time and captures the
//! terminal value or error. Nothing an executor does can propagate past
//! [`execute_item`]: every error, timeout or panic becomes a failed
//! [`ItemOutcome`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::batch::types::{BatchOptions, ItemOutcome, WorkItem};

/// Errors a work function can surface for a single item.
#[derive(Debug, thiserror::Error)]
pub enum ItemExecutionError {
    /// The item's content could not be parsed.
    #[error("parse failed: {0}")]
    Parse(String),
    /// The downstream translation/generation call failed.
    #[error("processing failed: {0}")]
    Processing(String),
    /// Any other executor-internal failure.
    #[error("{0}")]
    Other(String),
}

/// Per-item work function supplied by the embedding application.
#[async_trait]
pub trait ItemExecutor: Send + Sync {
    /// Runs one work item to completion, producing its output value.
    ///
    /// # Errors
    ///
    /// Returns an error describing why the item could not be processed.
    async fn run(
        &self,
        item: &WorkItem,
        options: &BatchOptions,
    ) -> Result<serde_json::Value, ItemExecutionError>;
}

/// Runs one item under the configured timeout, settling it as an outcome.
///
/// The outcome carries the wall-clock time the item spent executing; on
/// timeout the elapsed time is approximately the timeout itself.
pub async fn execute_item(
    executor: Arc<dyn ItemExecutor>,
    index: usize,
    item: WorkItem,
    options: BatchOptions,
    timeout: Duration,
) -> ItemOutcome {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, executor.run(&item, &options)).await;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(Ok(value)) => {
            debug!(index, file = %item.file_name, elapsed_ms, "Item completed");
            ItemOutcome::success(index, value, elapsed_ms)
        }
        Ok(Err(e)) => {
            debug!(index, file = %item.file_name, error = %e, "Item failed");
            ItemOutcome::failure(index, e.to_string(), elapsed_ms)
        }
        Err(_) => {
            debug!(index, file = %item.file_name, "Item timed out");
            ItemOutcome::failure(
                index,
                format!("timed out after {}s", timeout.as_secs()),
                elapsed_ms,
            )
        }
    }
}

/// Development executor that echoes the item payload back unchanged.
///
/// Lets the binary run end to end without the external parse/translate
/// pipeline; an optional delay simulates downstream latency.
#[derive(Debug, Default)]
pub struct PassthroughExecutor {
    delay: Option<Duration>,
}

impl PassthroughExecutor {
    /// Creates a passthrough executor with no artificial delay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a passthrough executor that sleeps before answering.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }
}

#[async_trait]
impl ItemExecutor for PassthroughExecutor {
    async fn run(
        &self,
        item: &WorkItem,
        _options: &BatchOptions,
    ) -> Result<serde_json::Value, ItemExecutionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(serde_json::json!({
            "file_name": item.file_name,
            "output": item.payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::ItemStatus;

    struct FailingExecutor;

    #[async_trait]
    impl ItemExecutor for FailingExecutor {
        async fn run(
            &self,
            _item: &WorkItem,
            _options: &BatchOptions,
        ) -> Result<serde_json::Value, ItemExecutionError> {
            Err(ItemExecutionError::Parse("bad header".to_string()))
        }
    }

    struct HangingExecutor;

    #[async_trait]
    impl ItemExecutor for HangingExecutor {
        async fn run(
            &self,
            _item: &WorkItem,
            _options: &BatchOptions,
        ) -> Result<serde_json::Value, ItemExecutionError> {
            std::future::pending().await
        }
    }

    fn item() -> WorkItem {
        WorkItem {
            file_name: "a.txt".to_string(),
            size_bytes: 1,
            payload: serde_json::json!("hello"),
        }
    }

    #[tokio::test]
    async fn success_is_captured_with_value() {
        let outcome = execute_item(
            Arc::new(PassthroughExecutor::new()),
            0,
            item(),
            BatchOptions::default(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcome.status, ItemStatus::Completed);
        assert_eq!(outcome.index, 0);
        let value = outcome.value.expect("value set");
        assert_eq!(value["file_name"], "a.txt");
    }

    #[tokio::test]
    async fn executor_error_becomes_failed_outcome() {
        let outcome = execute_item(
            Arc::new(FailingExecutor),
            3,
            item(),
            BatchOptions::default(),
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(outcome.status, ItemStatus::Failed);
        assert_eq!(outcome.index, 3);
        assert_eq!(outcome.error.as_deref(), Some("parse failed: bad header"));
    }

    #[tokio::test]
    async fn timeout_becomes_failed_outcome() {
        let outcome = execute_item(
            Arc::new(HangingExecutor),
            0,
            item(),
            BatchOptions::default(),
            Duration::from_millis(20),
        )
        .await;

        assert_eq!(outcome.status, ItemStatus::Failed);
        assert!(
            outcome.error.as_deref().unwrap_or("").starts_with("timed out"),
            "timeout reason expected, got {:?}",
            outcome.error
        );
    }
}
