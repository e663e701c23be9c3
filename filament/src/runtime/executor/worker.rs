use crate::runtime::context;
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;
use crate::task::Runnable;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A worker thread in the executor.
///
/// A `Worker` is responsible for executing runnable tasks using
/// a work-stealing strategy. Each worker owns a local queue and
/// cooperates with other workers to balance load.
///
/// The execution order is:
/// 1. Pop from the local queue
/// 2. Steal from the global injector
/// 3. Steal from other workers
/// 4. Park if no work is available
pub(crate) struct Worker {
    /// Unique identifier of the worker.
    id: usize,

    /// All local queues (one per worker).
    ///
    /// Used for stealing work from other workers.
    locals: Arc<Vec<Arc<LocalQueue>>>,

    /// Handle to the global injector queue.
    injector: InjectorHandle,
}

impl Worker {
    /// Creates a new worker.
    ///
    /// # Arguments
    ///
    /// * `id` - Worker identifier
    /// * `locals` - Shared vector of all local queues
    /// * `injector` - Handle to the global injector
    pub(crate) fn new(
        id: usize,
        locals: Arc<Vec<Arc<LocalQueue>>>,
        injector: InjectorHandle,
    ) -> Self {
        Self {
            id,
            locals,
            injector,
        }
    }

    /// Runs the worker event loop.
    ///
    /// The worker repeatedly looks for work until a shutdown signal is
    /// received. Each task installs its own runtime context for the
    /// duration of its poll, so the worker itself only moves tasks.
    ///
    /// Suspended tasks are never re-queued here: the waitable a task
    /// parked on re-queues it once the awaited condition holds.
    pub(crate) fn run(&self, shutdown: Arc<AtomicBool>) {
        context::set_worker_id(self.id);

        tracing::trace!(target: "filament::executor", worker = self.id, "worker started");

        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            if let Some(task) = self.locals[self.id].pop() {
                task.run();
                continue;
            }

            if let Some(task) = self.injector.steal() {
                task.run();
                continue;
            }

            if let Some(task) = self.try_steal() {
                task.run();
                continue;
            }

            self.injector.park();
        }

        tracing::trace!(target: "filament::executor", worker = self.id, "worker stopped");
    }

    /// Attempts to steal a batch of tasks from another worker's local
    /// queue.
    ///
    /// Workers are visited in a round-robin fashion to avoid
    /// starvation and distribute load evenly. All but the first stolen
    /// task land in this worker's own queue; the first is returned to
    /// run immediately.
    fn try_steal(&self) -> Option<Arc<dyn Runnable>> {
        let len = self.locals.len();

        if len <= 1 {
            return None;
        }

        for i in 0..len {
            let victim = (self.id + i + 1) % len;

            let stolen = self.locals[victim].steal_batch();
            if stolen.is_empty() {
                continue;
            }

            let mut stolen = stolen.into_iter();
            let first = stolen.next();

            for task in stolen {
                self.locals[self.id].push(task);
            }

            return first;
        }
        None
    }
}
