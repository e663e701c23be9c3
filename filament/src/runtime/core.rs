use crate::runtime::executor::core::Executor;
use crate::runtime::task::{self, JoinHandle, Outcome};
use crate::runtime::work_stealing::injector::InjectorHandle;
use crate::runtime::work_stealing::queue::LocalQueue;
use crate::time::{TimerDriver, TimerHandle};

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread::{self, Thread};

/// The main runtime instance.
///
/// `Runtime` is responsible for:
/// - spawning tasks,
/// - driving task execution via the executor,
/// - running the timer driver,
/// - providing a synchronous entry point via [`block_on`](Self::block_on).
///
/// There is no implicit global runtime: each instance is constructed
/// explicitly through [`RuntimeBuilder`](crate::RuntimeBuilder) and
/// torn down through [`shutdown`](Self::shutdown) (or on drop), so
/// tests can run several isolated runtimes side by side.
pub struct Runtime {
    /// Task executor responsible for scheduling and running tasks.
    executor: Executor,

    /// Timer driver thread backing `delay` and `timeout`.
    timer: TimerDriver,

    /// Cloneable handle attached to every task spawned here.
    handle: Handle,

    /// Set once teardown has run, making `shutdown` + drop safe.
    stopped: bool,
}

impl Runtime {
    /// Creates a new runtime instance.
    ///
    /// # Arguments
    ///
    /// * `worker_threads` - Number of worker threads used by the executor.
    ///
    /// The timer driver is started automatically.
    pub(crate) fn new(worker_threads: usize) -> Self {
        let timer = TimerDriver::start();
        let executor = Executor::new(timer.handle(), worker_threads);
        let handle = executor.handle();

        Self {
            executor,
            timer,
            handle,
            stopped: false,
        }
    }

    /// Returns a cloneable handle to this runtime.
    ///
    /// The handle can spawn tasks from any thread and is the value
    /// attached to every task at spawn time.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Spawns a future onto the runtime, returning a join handle to
    /// its outcome.
    ///
    /// # Requirements
    ///
    /// - The future must be `Send`
    /// - The future must have `'static` lifetime
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        self.handle.spawn(future)
    }

    /// Spawns a detached future onto the runtime.
    ///
    /// See [`task::spawn_detached`] for the semantics.
    pub fn spawn_detached<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn_detached(future);
    }

    /// Runs a future to completion, blocking the current thread.
    ///
    /// This method is typically used as the synchronous entry point
    /// of the runtime (e.g. in `main` or tests). The future is spawned
    /// as the root task and the calling thread parks until it reaches
    /// a terminal state.
    ///
    /// # Panics
    ///
    /// Panics if the root task panics: a failure that reaches the
    /// program root is fatal unless the caller catches it.
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let root = self.spawn(future);
        let mut root = std::pin::pin!(root);

        let waker = Waker::from(Arc::new(ThreadUnparker {
            thread: thread::current(),
        }));
        let mut cx = Context::from_waker(&waker);

        loop {
            match root.as_mut().poll(&mut cx) {
                Poll::Ready(Outcome::Completed(value)) => return value,
                Poll::Ready(Outcome::Failed(message)) => {
                    panic!("root task panicked: {message}")
                }
                Poll::Ready(Outcome::Cancelled) => panic!("root task was cancelled"),
                Poll::Pending => thread::park(),
            }
        }
    }

    /// Number of timer entries currently registered with the driver.
    ///
    /// Exposed for diagnostics and leak tests; cancelled entries are
    /// counted until the driver purges them.
    pub fn pending_timers(&self) -> usize {
        self.timer.handle().outstanding()
    }

    /// Shuts the runtime down explicitly.
    ///
    /// This performs the following steps:
    /// 1. Stops task execution and signals the executor to shut down
    /// 2. Stops the timer driver
    /// 3. Joins all worker threads
    ///
    /// Dropping the runtime performs the same teardown.
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        tracing::debug!(target: "filament::runtime", "shutting down runtime");

        self.executor.shutdown();
        self.timer.shutdown();
        self.executor.join();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

/// Cloneable runtime context.
///
/// A `Handle` identifies one runtime instance and is attached to every
/// task spawned on it. It carries what a running task needs to reach
/// its runtime: the injector for (re)scheduling and the timer driver
/// for delays.
#[derive(Clone)]
pub struct Handle {
    /// Global injector queue of the runtime.
    pub(crate) injector: InjectorHandle,

    /// Per-worker local queues, indexed by worker id.
    pub(crate) locals: Arc<Vec<Arc<LocalQueue>>>,

    /// Handle to the timer driver.
    pub(crate) timer: TimerHandle,
}

impl Handle {
    /// Spawns a future onto this runtime, returning a join handle.
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let task = task::core::spawn_inner(self, future, None, false);
        JoinHandle::new(task)
    }

    /// Spawns a detached future onto this runtime.
    pub fn spawn_detached<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let _ = task::core::spawn_inner(self, future, None, true);
    }

    /// Returns `true` if both handles refer to the same runtime.
    pub(crate) fn same_runtime(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.injector, &other.injector)
    }
}

/// Waker used by `block_on` to unpark the entry thread.
struct ThreadUnparker {
    thread: Thread,
}

impl Wake for ThreadUnparker {
    fn wake(self: Arc<Self>) {
        self.thread.unpark();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.thread.unpark();
    }
}
