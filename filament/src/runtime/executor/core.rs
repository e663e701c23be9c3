use crate::runtime::Handle;
use crate::runtime::executor::worker::Worker;
use crate::runtime::work_stealing::injector::Injector;
use crate::runtime::work_stealing::queue::LocalQueue;
use crate::time::TimerHandle;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

/// Multi-threaded task executor.
///
/// The `Executor` is responsible for:
/// - spawning worker threads,
/// - coordinating task execution via work-stealing,
/// - managing orderly shutdown and thread joining.
///
/// It owns the global task injector and all worker threads.
pub(crate) struct Executor {
    /// Runtime handle shared with every spawned task.
    handle: Handle,

    /// Join handles for worker threads.
    workers: Vec<JoinHandle<()>>,

    /// Shutdown flag shared with all workers.
    shutdown: Arc<AtomicBool>,
}

impl Executor {
    /// Creates a new executor with the given number of worker threads.
    ///
    /// This method:
    /// - initializes the global injector,
    /// - creates one local queue per worker,
    /// - spawns worker threads.
    ///
    /// # Arguments
    ///
    /// * `timer` - Handle to the runtime timer driver
    /// * `threads` - Number of worker threads
    pub(crate) fn new(timer: TimerHandle, threads: usize) -> Self {
        let injector = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut locals = Vec::with_capacity(threads);
        for _ in 0..threads {
            locals.push(Arc::new(LocalQueue::new()));
        }

        let locals = Arc::new(locals);

        let handle = Handle {
            injector: injector.clone(),
            locals: locals.clone(),
            timer,
        };

        tracing::debug!(target: "filament::executor", workers = threads, "starting executor");

        let mut workers = Vec::with_capacity(threads);

        for id in 0..threads {
            let worker = Worker::new(id, locals.clone(), injector.clone());
            let sd = shutdown.clone();

            let join = thread::Builder::new()
                .name(format!("filament-worker-{id}"))
                .spawn(move || worker.run(sd))
                .expect("failed to spawn worker thread");

            workers.push(join);
        }

        Self {
            handle,
            workers,
            shutdown,
        }
    }

    /// Returns a handle to this executor's runtime.
    pub(crate) fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Signals all workers to shut down.
    ///
    /// This method:
    /// - sets the shutdown flag,
    /// - wakes all parked workers via the injector.
    pub(crate) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.handle.injector.shutdown();
    }

    /// Waits for all worker threads to terminate.
    ///
    /// This should be called after initiating shutdown.
    pub(crate) fn join(&mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
