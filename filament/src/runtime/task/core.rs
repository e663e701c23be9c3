use super::handle::{JoinHandle, Outcome};
use super::state::{CANCELLED, COMPLETED, FAILED, IDLE, NOTIFIED, QUEUED, RUNNING, is_terminal};
use crate::cancel::CancelToken;
use crate::runtime::Handle;
use crate::runtime::context;
use crate::runtime::task::waker::make_waker;
use crate::scope::{ChildState, ScopeMembership};
use crate::utils::WaiterList;

use std::any::Any;
use std::cell::UnsafeCell;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// A runnable unit of work that can be executed by the scheduler.
///
/// The `Runnable` trait abstracts the specific return type of a task,
/// allowing the executor to manage a heterogeneous collection of tasks
/// through `Arc<dyn Runnable>`.
pub(crate) trait Runnable: Send + Sync {
    /// Executes the task. This is typically called by a worker thread.
    fn run(self: Arc<Self>);
}

/// A spawned task managed by the runtime.
///
/// A `Task` is the container for a suspended continuation. It
/// coordinates the lifecycle of that continuation: its scheduling
/// state, cooperative cancellation, waker registration, outcome
/// storage, and, for scoped tasks, the back-reference through which
/// the owning scope learns about the terminal state.
pub(crate) struct Task<T> {
    /// The suspended continuation.
    ///
    /// Wrapped in `UnsafeCell` for interior mutability during `poll`,
    /// pinned and boxed so the continuation has a stable address, and
    /// optional so it can be dropped the moment the task reaches a
    /// terminal state; dropping it is what releases held resources.
    future: UnsafeCell<Option<Pin<Box<dyn Future<Output = T> + Send>>>>,

    /// Storage for the outcome produced when the task terminates.
    result: UnsafeCell<Option<Outcome<T>>>,

    /// The current scheduling state of the task.
    pub(crate) state: AtomicUsize,

    /// Cooperative cancellation flag, observed at poll boundaries only.
    pub(crate) cancel: CancelToken,

    /// Scope this task belongs to, if it was spawned inside one.
    ///
    /// A task belongs to at most one scope for its whole life.
    scope: Option<ScopeMembership>,

    /// Runtime context attached at spawn time.
    ///
    /// Carries the injector for re-scheduling and the timer handle for
    /// nested suspension points; installed for the duration of every
    /// poll so the task body can reach it.
    handle: Handle,

    /// Wakers of join handles and select registrations awaiting this
    /// task, woken in registration order on termination.
    pub(crate) waiters: WaiterList,

    /// Whether the task was spawned detached (no handle, no scope).
    detached: bool,

    /// Process-unique identity, never reused.
    id: usize,
}

unsafe impl<T: Send> Send for Task<T> {}
unsafe impl<T: Send> Sync for Task<T> {}

static NEXT_TASK_ID: AtomicUsize = AtomicUsize::new(0);

impl<T: Send + 'static> Task<T> {
    /// Creates a new task instance from a future.
    ///
    /// The task is initialized in the `QUEUED` state, indicating it is
    /// ready to be picked up by the scheduler.
    pub(crate) fn new<F>(
        future: F,
        handle: Handle,
        scope: Option<ScopeMembership>,
        detached: bool,
    ) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self {
            future: UnsafeCell::new(Some(Box::pin(future))),
            result: UnsafeCell::new(None),
            state: AtomicUsize::new(QUEUED),
            cancel: CancelToken::new(),
            scope,
            handle,
            waiters: WaiterList::new(),
            detached,
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Performs one execution slice of the task.
    ///
    /// This method transitions the task to `RUNNING`, observes any
    /// pending cancellation, polls the continuation, and handles the
    /// result:
    /// - `Poll::Pending`: transition back to `IDLE`, or re-queue if a
    ///   wake arrived during the poll (`NOTIFIED`),
    /// - `Poll::Ready`: record the completed outcome,
    /// - panic: record the failed outcome at the task boundary.
    pub(crate) fn run(self: Arc<Self>) {
        let current = self.state.load(Ordering::Acquire);

        // Early exit if the task is not in a runnable state.
        if current != QUEUED && current != NOTIFIED {
            return;
        }

        // Transition to RUNNING. This ensures exclusive access to the UnsafeCell.
        if self
            .state
            .compare_exchange(current, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        // Cancellation is cooperative: it is observed here, when the
        // task resumes at a suspension boundary, never mid-poll.
        if self.cancel.is_cancelled() || self.scope.as_ref().is_some_and(|s| s.is_cancelled()) {
            self.finish(Outcome::Cancelled);
            return;
        }

        let waker = make_waker(self.clone());
        let mut cx = Context::from_waker(&waker);

        // Safety: the RUNNING state guarantees that no other thread is
        // polling this continuation.
        let poll = context::enter(&self.handle, || {
            context::enter_task(self.id, || {
                catch_unwind(AssertUnwindSafe(|| {
                    let slot = unsafe { &mut *self.future.get() };
                    match slot.as_mut() {
                        Some(future) => future.as_mut().poll(&mut cx),
                        None => unreachable!("task polled after reaching a terminal state"),
                    }
                }))
            })
        });

        match poll {
            Ok(Poll::Pending) => {
                // Return to IDLE unless a wake-up occurred during execution.
                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    // Task was notified while running; move back to QUEUED and reschedule.
                    self.state.store(QUEUED, Ordering::Release);
                    self.handle.injector.push(self.clone());
                }
            }
            Ok(Poll::Ready(value)) => {
                self.finish(Outcome::Completed(value));
            }
            Err(payload) => {
                let message = panic_message(payload);
                tracing::error!(target: "filament::task", %message, "task panicked");

                if self.detached {
                    // A detached task has no join handle and no scope
                    // to absorb the failure; it is fatal at the root.
                    std::process::abort();
                }

                self.finish(Outcome::Failed(message));
            }
        }
    }

    /// Publishes a terminal outcome for the task.
    ///
    /// The continuation is dropped first, which runs release
    /// logic for resources the task still holds; then the outcome is
    /// stored, the terminal state published, and every waiter woken in
    /// registration order. The owning scope, if any, is notified last.
    fn finish(&self, outcome: Outcome<T>) {
        let child = match &outcome {
            Outcome::Completed(_) => ChildState::Completed,
            Outcome::Failed(message) => ChildState::Failed(message.clone()),
            Outcome::Cancelled => ChildState::Cancelled,
        };

        let terminal = match &outcome {
            Outcome::Completed(_) => COMPLETED,
            Outcome::Failed(_) => FAILED,
            Outcome::Cancelled => CANCELLED,
        };

        // Safety: reached only from the RUNNING state, which is owned
        // exclusively by the current worker.
        unsafe {
            *self.future.get() = None;
            *self.result.get() = Some(outcome);
        }

        self.state.store(terminal, Ordering::Release);
        self.waiters.wake_all();

        if let Some(membership) = &self.scope {
            membership.finish(child);
        }
    }

    /// Signals the task to be rescheduled.
    ///
    /// If the task is `IDLE`, it moves to `QUEUED` and is pushed to the
    /// scheduler. If the task is `RUNNING`, it moves to `NOTIFIED` to
    /// ensure it is re-polled immediately after its current execution
    /// slice.
    pub(crate) fn wake(self: Arc<Self>) {
        loop {
            let state = self.state.load(Ordering::Acquire);

            match state {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        self.handle.injector.push(self.clone());
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                // Already queued, notified, or terminal: nothing to do.
                QUEUED | NOTIFIED | COMPLETED | FAILED | CANCELLED => return,
                _ => return,
            }
        }
    }

    /// Requests cooperative cancellation of the task.
    ///
    /// The flag is observed at the task's next poll boundary; a task
    /// that has already terminated is unaffected. Idempotent.
    pub(crate) fn request_cancel(self: Arc<Self>) {
        if is_terminal(self.state.load(Ordering::Acquire)) {
            return;
        }

        self.cancel.cancel();
        self.wake();
    }

    /// Takes the terminal outcome out of the task.
    ///
    /// # Panics
    ///
    /// Panics if called before the task is terminal, or twice: the
    /// outcome is consumed exactly once.
    pub(crate) fn take_outcome(&self) -> Outcome<T> {
        debug_assert!(is_terminal(self.state.load(Ordering::Acquire)));

        unsafe {
            (*self.result.get())
                .take()
                .expect("task outcome already taken")
        }
    }
}

impl<T: Send + 'static> Runnable for Task<T> {
    fn run(self: Arc<Self>) {
        Task::run(self)
    }
}

/// Extracts a printable message from a panic payload.
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Spawns a future as a joinable task onto the current runtime.
///
/// The task is scheduled immediately and a [`JoinHandle`] to its
/// outcome is returned without blocking. The task is pushed onto the
/// spawning worker's local queue for cache locality, falling back to
/// the global injector when called from outside a worker.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub fn spawn<F, T>(future: F) -> JoinHandle<T>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    context::current().spawn(future)
}

/// Spawns a future as a detached task onto the current runtime.
///
/// A detached task has no join handle and belongs to no scope; nothing
/// waits for it, and a panic inside it is fatal to the process. Use
/// sparingly; scoped tasks are the structured default.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    context::current().spawn_detached(future);
}

/// Creates a task and schedules it on the runtime behind `handle`.
///
/// Scoped spawns pass their membership so the task reports its
/// terminal state back to the scope; the membership also wires the
/// scope's cancellation token to the task's waker so a group cancel
/// reaches suspended children.
pub(crate) fn spawn_inner<F, T>(
    handle: &Handle,
    future: F,
    scope: Option<ScopeMembership>,
    detached: bool,
) -> Arc<Task<T>>
where
    T: Send + 'static,
    F: Future<Output = T> + Send + 'static,
{
    let task = Arc::new(Task::new(future, handle.clone(), scope, detached));

    if let Some(membership) = &task.scope {
        membership.register_cancel_waker(make_waker(task.clone()));
    }

    schedule(handle, task.clone());

    task
}

/// Pushes a freshly spawned task onto a run queue.
///
/// The spawning worker's local queue is preferred when the spawn
/// happens on a worker of the same runtime; everything else goes
/// through the global injector.
fn schedule(handle: &Handle, task: Arc<dyn Runnable>) {
    let pushed_locally = match (context::worker_id(), context::try_current()) {
        (Some(id), Some(current)) if current.same_runtime(handle) => {
            handle.locals[id].push(task.clone());
            true
        }
        _ => false,
    };

    if !pushed_locally {
        handle.injector.push(task);
    }
}
