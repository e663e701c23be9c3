//! Structured concurrency scopes.
//!
//! A scope is a lexical boundary for tasks: children spawned through
//! its handle cannot outlive it. Leaving the scope is itself a
//! suspension point: the exiting task parks until every child has
//! reached a terminal state.
//!
//! Failure propagates sideways, not upward: a child panic sets the
//! scope's cancellation token, which the siblings observe at their
//! next suspension point and wind down as cancelled. The scope still
//! waits for all of them; cancellation shortens work, never the join.
//! Only after the join does the owner see what happened, as the
//! aggregate list of per-child terminal states.
//!
//! ```rust,ignore
//! let output = enter_scope(|scope| async move {
//!     scope.spawn(async { fetch(1).await });
//!     scope.spawn(async { fetch(2).await });
//!     "done"
//! })
//! .await;
//!
//! assert_eq!(output.children.len(), 2);
//! ```
//!
//! Tasks that must escape this discipline use
//! [`spawn_detached`](crate::task::spawn_detached), sparingly.

use crate::cancel::CancelToken;
use crate::runtime::Handle;
use crate::runtime::context;
use crate::runtime::task::{self, JoinHandle};
use crate::select::Waitable;
use crate::utils::{Slab, WaiterList};

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

/// Terminal state of a scope child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildState {
    /// The child ran to completion.
    Completed,
    /// The child panicked; the message was captured at its task
    /// boundary.
    Failed(String),
    /// The child observed cancellation and wound down.
    Cancelled,
}

impl ChildState {
    /// Returns `true` if the child panicked.
    pub fn is_failed(&self) -> bool {
        matches!(self, ChildState::Failed(_))
    }
}

/// Aggregate outcome of a scope: the body's value plus the terminal
/// state of every child, in spawn order.
#[derive(Debug)]
pub struct ScopeOutput<T> {
    /// Value returned by the scope body.
    pub value: T,

    /// Terminal states of all children spawned in the scope.
    pub children: Vec<ChildState>,
}

impl<T> ScopeOutput<T> {
    /// Returns the first child failure message, if any child panicked.
    pub fn failure(&self) -> Option<&str> {
        self.children.iter().find_map(|child| match child {
            ChildState::Failed(message) => Some(message.as_str()),
            _ => None,
        })
    }
}

/// Shared state of one scope.
///
/// The scope owns an arena of child outcome slots and hands out slot
/// indices; tasks hold the index plus an `Arc` of this state, never
/// the other way around, so no ownership cycle exists between a scope
/// and its children.
pub(crate) struct ScopeState {
    /// Child outcome slots: `None` while the child runs, its terminal
    /// state afterwards.
    children: Mutex<Slab<Option<ChildState>>>,

    /// Number of children that have not yet reached a terminal state.
    ///
    /// Never negative; reaches zero exactly once per join, when the
    /// last child records its state.
    outstanding: AtomicUsize,

    /// Cancellation token shared by every child.
    cancel: CancelToken,

    /// Wakers of exits parked on the completion barrier.
    exit_waiters: WaiterList,

    /// Set once the scope has exited; later spawns are refused.
    closed: AtomicBool,
}

impl ScopeState {
    fn new() -> Self {
        Self {
            children: Mutex::new(Slab::new(4)),
            outstanding: AtomicUsize::new(0),
            cancel: CancelToken::new(),
            exit_waiters: WaiterList::new(),
            closed: AtomicBool::new(false),
        }
    }
}

/// A child task's back-reference to its scope.
///
/// A task belongs to exactly one scope for its whole life; this is the
/// only link, and it points upward.
pub(crate) struct ScopeMembership {
    state: Arc<ScopeState>,
    slot: usize,
}

impl ScopeMembership {
    /// Whether the scope has been cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.cancel.is_cancelled()
    }

    /// Wires the scope's cancellation token to the task's waker so a
    /// group cancel re-queues suspended children.
    pub(crate) fn register_cancel_waker(&self, waker: Waker) {
        let _ = self.state.cancel.register_waiter(waker);
    }

    /// Records the child's terminal state and releases it from the
    /// scope.
    ///
    /// A failed child cancels its siblings before the count drops, so
    /// every sibling that parks afterwards already sees the token.
    pub(crate) fn finish(&self, child: ChildState) {
        if child.is_failed() {
            self.state.cancel.cancel();
        }

        *self.state.children.lock().unwrap().get_mut(self.slot) = Some(child);

        if self.state.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.state.exit_waiters.wake_all();
        }
    }
}

/// Handle to a live scope, used to spawn children into it.
///
/// The handle is cloneable: children can spawn siblings. All clones
/// become unusable once the scope has exited.
pub struct ScopeHandle {
    state: Arc<ScopeState>,
    handle: Handle,
}

impl ScopeHandle {
    /// Spawns a child task bound to this scope.
    ///
    /// The child's completion is what eventually lets the scope exit;
    /// its panic cancels the siblings in addition to failing the
    /// returned handle.
    ///
    /// # Panics
    ///
    /// Panics if the scope has already exited.
    pub fn spawn<F, T>(&self, future: F) -> JoinHandle<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        assert!(
            !self.state.closed.load(Ordering::Acquire),
            "cannot spawn into a scope that has already exited"
        );

        let slot = self.state.children.lock().unwrap().insert(None);
        self.state.outstanding.fetch_add(1, Ordering::AcqRel);

        let membership = ScopeMembership {
            state: self.state.clone(),
            slot,
        };

        let task = task::core::spawn_inner(&self.handle, future, Some(membership), false);
        JoinHandle::new(task)
    }

    /// Requests cooperative cancellation of every child.
    ///
    /// Children observe the token at their next suspension point; the
    /// scope still joins all of them.
    pub fn cancel(&self) {
        self.state.cancel.cancel();
    }

    /// Returns `true` once the scope's cancellation token is set.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancel.is_cancelled()
    }

    /// Returns a clone of the scope's cancellation token.
    ///
    /// Children can select over it to react to a group cancel before
    /// their next natural suspension point.
    pub fn cancel_token(&self) -> CancelToken {
        self.state.cancel.clone()
    }
}

impl Clone for ScopeHandle {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            handle: self.handle.clone(),
        }
    }
}

/// Opens a scope, runs `body` inside it, and joins every child before
/// returning.
///
/// The exit is a suspension point: after the body returns, the calling
/// task parks until the outstanding-child count reaches zero. The
/// returned [`ScopeOutput`] carries the body's value and the terminal
/// state of every child; failures are reported here, after the join,
/// never short-circuited through it.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub async fn enter_scope<T, F, Fut>(body: F) -> ScopeOutput<T>
where
    F: FnOnce(ScopeHandle) -> Fut,
    Fut: Future<Output = T>,
{
    let handle = context::current();
    let state = Arc::new(ScopeState::new());

    let scope = ScopeHandle {
        state: state.clone(),
        handle,
    };

    let value = body(scope).await;

    ScopeExit {
        state: &state,
        waiter: None,
    }
    .await;

    state.closed.store(true, Ordering::Release);

    let children = state
        .children
        .lock()
        .unwrap()
        .drain()
        .into_iter()
        .map(|slot| slot.unwrap_or(ChildState::Cancelled))
        .collect();

    ScopeOutput { value, children }
}

/// Completion barrier awaited at scope exit.
struct ScopeExit<'a> {
    state: &'a Arc<ScopeState>,
    waiter: Option<u64>,
}

impl Future for ScopeExit<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.state.outstanding.load(Ordering::Acquire) == 0 {
            return Poll::Ready(());
        }

        match self.waiter {
            Some(id) => self.state.exit_waiters.reregister(id, cx.waker()),
            None => {
                self.waiter = Some(self.state.exit_waiters.register(cx.waker().clone()));
            }
        }

        // The last child may have finished between the check and the
        // registration.
        if self.state.outstanding.load(Ordering::Acquire) == 0 {
            return Poll::Ready(());
        }

        Poll::Pending
    }
}

impl Drop for ScopeExit<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.state.exit_waiters.cancel(id);
        }
    }
}
