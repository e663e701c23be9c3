//! Cooperative cancellation.
//!
//! A [`CancelToken`] is a monotonic boolean flag shared between the
//! party requesting cancellation and the tasks observing it. Setting
//! the flag never interrupts running code: tasks notice it at their
//! next suspension point and wind down from there, running any pending
//! resource release on the way out.
//!
//! Tokens are also waitables, so a task can `select` over "work became
//! ready" and "we were told to stop".

use crate::select::{WaitToken, Waitable};
use crate::utils::WaiterList;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;

/// A shared, monotonic cancellation flag.
///
/// Cloning the token produces another handle to the same flag. Once
/// set, the flag never clears; cancelling an already-cancelled token
/// has no additional effect.
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

struct TokenInner {
    flag: AtomicBool,
    waiters: WaiterList,
}

impl CancelToken {
    /// Creates a new, unset token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                flag: AtomicBool::new(false),
                waiters: WaiterList::new(),
            }),
        }
    }

    /// Sets the flag and wakes every registered waiter.
    ///
    /// Idempotent: only the first call performs the wake.
    pub fn cancel(&self) {
        if !self.inner.flag.swap(true, Ordering::AcqRel) {
            self.inner.waiters.wake_all();
        }
    }

    /// Returns `true` if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }
}

impl Clone for CancelToken {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Waitable for CancelToken {
    fn is_ready(&self) -> bool {
        self.is_cancelled()
    }

    fn register_waiter(&self, waker: Waker) -> WaitToken {
        let id = self.inner.waiters.register(waker);

        // The flag may have been set between the readiness check and
        // the registration; a wake_all here closes that window.
        if self.is_cancelled() {
            self.inner.waiters.wake_all();
        }

        WaitToken(id)
    }

    fn cancel_registration(&self, token: WaitToken) {
        self.inner.waiters.cancel(token.0);
    }
}
