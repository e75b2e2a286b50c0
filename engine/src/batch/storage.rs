//! In-memory task storage for the docflux engine.
//!
//! Task state is intentionally process-local; the engine makes no
//! durability guarantees across restarts.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::types::{BatchTask, TaskId};

/// Storage for batch tasks.
#[derive(Debug, Default)]
pub struct TaskStorage {
    tasks: RwLock<HashMap<String, BatchTask>>,
}

impl TaskStorage {
    /// Create a new storage instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task into storage.
    pub fn insert(&self, task: BatchTask) {
        self.tasks
            .write()
            .insert(task.id.as_str().to_string(), task);
    }

    /// Get a snapshot of a task by ID.
    pub fn get(&self, id: &TaskId) -> Option<BatchTask> {
        self.tasks.read().get(id.as_str()).cloned()
    }

    /// Get a mutable reference to a task.
    ///
    /// The returned guard serializes all mutation of the task map; per-task
    /// field updates go through here so that a single task is only ever
    /// mutated by one writer at a time.
    pub fn get_mut(
        &self,
        id: &TaskId,
    ) -> Option<parking_lot::MappedRwLockWriteGuard<'_, BatchTask>> {
        use parking_lot::RwLockWriteGuard;
        let tasks = self.tasks.write();
        RwLockWriteGuard::try_map(tasks, |tasks| tasks.get_mut(id.as_str())).ok()
    }

    /// Check if a task exists.
    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.read().contains_key(id.as_str())
    }

    /// Remove a task from storage.
    pub fn remove(&self, id: &TaskId) {
        self.tasks.write().remove(id.as_str());
    }

    /// Remove every task matched by the predicate, returning how many
    /// were removed.
    pub fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&BatchTask) -> bool,
    {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, task| !predicate(task));
        before - tasks.len()
    }

    /// Snapshots of all stored tasks.
    pub fn all(&self) -> Vec<BatchTask> {
        self.tasks.read().values().cloned().collect()
    }

    /// Number of stored tasks.
    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    /// Whether storage holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}
