//! FIFO submission queue and the bounded worker-pool slots.
//!
//! The pool is a semaphore: one permit per concurrently executing task.
//! A dispatch pass acquires a permit, pops the queue front and hands the
//! task to the runner, which holds the permit until the task settles.
//! Cancelled tasks stay in the queue and are skipped at pop time.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::batch::storage::TaskStorage;
use crate::batch::types::{TaskId, TaskStatus};

/// Submission queue plus the slot pool bounding concurrent tasks.
#[derive(Debug)]
pub struct Dispatcher {
    queue: Mutex<VecDeque<TaskId>>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl Dispatcher {
    /// Creates a dispatcher with `max_concurrent_tasks` pool slots.
    #[must_use]
    pub fn new(max_concurrent_tasks: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            slots: Arc::new(Semaphore::new(max_concurrent_tasks)),
            capacity: max_concurrent_tasks,
        }
    }

    /// Appends a task to the back of the submission queue.
    pub fn enqueue(&self, id: TaskId) {
        self.queue.lock().push_back(id);
    }

    /// Pops the next dispatchable task together with its pool slot.
    ///
    /// Returns `None` when no slot is free or no queued task is still
    /// `Pending`. Tasks cancelled while queued are dropped from the queue
    /// here. An unused permit is returned to the pool on drop.
    pub fn next_ready(&self, storage: &TaskStorage) -> Option<(TaskId, OwnedSemaphorePermit)> {
        let permit = Arc::clone(&self.slots).try_acquire_owned().ok()?;
        let mut queue = self.queue.lock();
        while let Some(id) = queue.pop_front() {
            let pending = storage
                .get(&id)
                .is_some_and(|task| task.status == TaskStatus::Pending);
            if pending {
                return Some((id, permit));
            }
        }
        None
    }

    /// Number of tasks waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Number of free pool slots.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Number of occupied pool slots.
    #[must_use]
    pub fn busy_slots(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }

    /// Total pool capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
