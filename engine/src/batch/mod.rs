//! Batch task domain: types and in-memory storage.

pub mod storage;
pub mod types;

pub use storage::TaskStorage;
pub use types::{
    BatchOptions, BatchTask, ItemOutcome, ItemStatus, TaskError, TaskId, TaskProgress, TaskStatus,
    WorkItem,
};
