use crate::runtime::task::Runnable;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A per-worker local task queue.
///
/// `LocalQueue` stores runnable tasks local to a worker thread.
/// The owning worker pushes and pops from the back of the queue
/// (LIFO), which keeps freshly spawned work hot in cache for the
/// spawner.
///
/// Other workers steal from the front of the queue (FIFO), so stolen
/// work is the oldest waiting work: locality for the owner, fairness
/// for the thief.
pub(crate) struct LocalQueue {
    /// Inner deque protected by a mutex.
    inner: Mutex<VecDeque<Arc<dyn Runnable>>>,
}

impl LocalQueue {
    /// Creates an empty local task queue.
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Pushes a runnable task onto the back of the local queue.
    pub(crate) fn push(&self, task: Arc<dyn Runnable>) {
        self.inner.lock().unwrap().push_back(task);
    }

    /// Pops a runnable task from the back of the local queue.
    ///
    /// Returns `None` if the queue is empty.
    pub(crate) fn pop(&self) -> Option<Arc<dyn Runnable>> {
        self.inner.lock().unwrap().pop_back()
    }

    /// Steals up to half of the queue from the front.
    ///
    /// Intended to be called by other worker threads; at least one
    /// task is taken if any are present. Returns an empty vector if
    /// the queue is empty.
    pub(crate) fn steal_batch(&self) -> Vec<Arc<dyn Runnable>> {
        let mut inner = self.inner.lock().unwrap();

        let count = (inner.len() / 2).max(1).min(inner.len());

        inner.drain(..count).collect()
    }
}
