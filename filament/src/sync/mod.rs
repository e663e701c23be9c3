//! Shared-state primitives.
//!
//! Channels are the preferred way to share data between tasks: they
//! transfer ownership and leave no state behind. The primitives in
//! this module are the explicit opt-in for state that must stay
//! visible to several tasks at once:
//!
//! - [`Shared`] — an atomically reference-counted container; the
//!   payload is dropped exactly once, when the last handle goes,
//! - [`Mutex`] — exclusive access; `lock()` is a suspension point,
//! - [`RwLock`] — many readers or one writer; `read()`/`write()` are
//!   suspension points.
//!
//! Every guard releases its lock when dropped, on every exit path,
//! including cancellation and panic unwinding to the task boundary,
//! both of which drop the task's continuation and with it any live
//! guards.
//!
//! Debug builds additionally maintain a held-lock graph across tasks
//! and abort with a diagnostic when a contended acquire would close a
//! cycle; release builds compile the check out.

mod deadlock;
mod mutex;
mod rwlock;
mod shared;

pub use mutex::{Mutex, MutexGuard};
pub use rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};
pub use shared::{Shared, shared};
