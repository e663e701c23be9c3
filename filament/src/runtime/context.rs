use crate::runtime::Handle;

use std::cell::{Cell, RefCell};

thread_local! {
    /// Runtime context installed for the duration of a task poll.
    ///
    /// Every task carries its runtime [`Handle`], attached at spawn
    /// time; the worker installs that handle around each poll so
    /// nested suspension points (spawns, timers, scopes) can reach the
    /// runtime the task belongs to. There is no process-global
    /// runtime: two runtimes in one process never observe each other.
    static CURRENT: RefCell<Option<Handle>> = const { RefCell::new(None) };

    /// Identifier of the current worker thread, if this thread is one.
    static CURRENT_WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };

    /// Identity of the task being polled on this thread, if any.
    ///
    /// Used by the debug deadlock detector to key its held-lock graph.
    static CURRENT_TASK: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Installs `handle` as the runtime context for the duration of `f`.
///
/// After the closure completes, the previous context is restored, so
/// nested polls (a task driving another runtime's `block_on`, tests
/// with several runtimes) behave correctly.
pub(crate) fn enter<R>(handle: &Handle, f: impl FnOnce() -> R) -> R {
    CURRENT.with(|current| {
        let prev = current.replace(Some(handle.clone()));

        let out = f();

        current.replace(prev);

        out
    })
}

/// Returns the handle of the runtime the current task belongs to.
///
/// # Panics
///
/// Panics if called outside the context of a running runtime.
pub(crate) fn current() -> Handle {
    try_current().expect("must be called within the context of a runtime")
}

/// Returns the current runtime handle, if any.
pub(crate) fn try_current() -> Option<Handle> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Installs `task` as the current task identity for the duration of
/// `f`.
pub(crate) fn enter_task<R>(task: usize, f: impl FnOnce() -> R) -> R {
    CURRENT_TASK.with(|current| {
        let prev = current.replace(Some(task));

        let out = f();

        current.set(prev);

        out
    })
}

/// Returns the identity of the task being polled on this thread.
pub(crate) fn current_task_id() -> Option<usize> {
    CURRENT_TASK.with(|current| current.get())
}

/// Marks the current thread as worker `id` for its lifetime.
pub(crate) fn set_worker_id(id: usize) {
    CURRENT_WORKER_ID.with(|cell| cell.set(Some(id)));
}

/// Returns the worker identifier of the current thread, if it is a
/// worker.
pub(crate) fn worker_id() -> Option<usize> {
    CURRENT_WORKER_ID.with(|cell| cell.get())
}
