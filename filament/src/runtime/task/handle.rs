use crate::runtime::task::Task;
use crate::runtime::task::state::is_terminal;
use crate::select::{WaitToken, Waitable};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::task::{Context, Poll, Waker};

/// The terminal outcome of a task.
///
/// A task's outcome transitions exactly once, from pending to one of
/// these three states, and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The task ran to completion and produced a value.
    Completed(T),
    /// The task panicked; the panic message was captured at the task
    /// boundary.
    Failed(String),
    /// The task observed cooperative cancellation and wound down
    /// without producing a value.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Returns the completed value.
    ///
    /// # Panics
    ///
    /// Panics if the task failed or was cancelled.
    pub fn unwrap(self) -> T {
        match self {
            Outcome::Completed(value) => value,
            Outcome::Failed(message) => panic!("task failed: {message}"),
            Outcome::Cancelled => panic!("task was cancelled"),
        }
    }

    /// Returns the completed value as an `Option`, discarding failure
    /// and cancellation.
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// Returns `true` if the task completed with a value.
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// Returns `true` if the task panicked.
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Returns `true` if the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }
}

/// A handle to a spawned task.
///
/// A `JoinHandle` allows awaiting the [`Outcome`] of a task spawned
/// onto the runtime. It implements [`Future`] and resolves once the
/// task has reached a terminal state; if the task is already terminal
/// the await resolves synchronously, with no scheduling round-trip.
///
/// Dropping the `JoinHandle` does **not** cancel the task; it only
/// discards the ability to observe its outcome. Cancellation is an
/// explicit, cooperative request via [`cancel`](Self::cancel).
pub struct JoinHandle<T> {
    /// Shared reference to the underlying task.
    pub(crate) task: Arc<Task<T>>,

    /// Waiter registration from a previous poll, replaced on re-poll
    /// and cancelled on drop.
    waiter: Option<u64>,
}

impl<T: Send + 'static> JoinHandle<T> {
    pub(crate) fn new(task: Arc<Task<T>>) -> Self {
        Self { task, waiter: None }
    }

    /// Requests cooperative cancellation of the task.
    ///
    /// The flag is observed only at the task's next suspension point;
    /// cancellation never interrupts code running between suspension
    /// points. Requesting cancellation of a task that has already
    /// terminated, or a second time, is a no-op.
    pub fn cancel(&self) {
        self.task.clone().request_cancel();
    }

    /// Returns `true` if the task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        is_terminal(self.task.state.load(Ordering::Acquire))
    }
}

impl<T: Send + 'static> Future for JoinHandle<T> {
    /// The terminal outcome of the task.
    type Output = Outcome<T>;

    /// Polls the join handle.
    ///
    /// If the task has already terminated, its outcome is returned
    /// immediately. Otherwise the current waker is registered and the
    /// future returns `Poll::Pending`.
    ///
    /// The waker is registered **before** re-checking the task state
    /// to avoid missed wake-ups.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Outcome<T>> {
        let this = self.get_mut();

        if this.is_finished() {
            if let Some(id) = this.waiter.take() {
                this.task.waiters.cancel(id);
            }
            return Poll::Ready(this.task.take_outcome());
        }

        match this.waiter {
            Some(id) => this.task.waiters.reregister(id, cx.waker()),
            None => this.waiter = Some(this.task.waiters.register(cx.waker().clone())),
        }

        if this.is_finished() {
            if let Some(id) = this.waiter.take() {
                this.task.waiters.cancel(id);
            }
            return Poll::Ready(this.task.take_outcome());
        }

        Poll::Pending
    }
}

impl<T: Send + 'static> Waitable for JoinHandle<T> {
    fn is_ready(&self) -> bool {
        self.is_finished()
    }

    fn register_waiter(&self, waker: Waker) -> WaitToken {
        let id = self.task.waiters.register(waker);

        if self.is_finished() {
            self.task.waiters.wake_all();
        }

        WaitToken(id)
    }

    fn cancel_registration(&self, token: WaitToken) {
        self.task.waiters.cancel(token.0);
    }
}

impl<T> Drop for JoinHandle<T> {
    /// Removes any pending waiter registration.
    ///
    /// The task itself keeps running; dropping the handle only gives
    /// up the right to observe its outcome.
    fn drop(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.task.waiters.cancel(id);
        }
    }
}
