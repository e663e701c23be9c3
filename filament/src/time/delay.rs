use crate::runtime::context;
use crate::select::{WaitToken, Waitable};
use crate::time::driver::DelayState;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

/// Creates a future that completes after the given duration.
///
/// The returned delay registers a timer with the current runtime's
/// driver and completes once the duration has elapsed.
///
/// # Panics
///
/// Panics if polled outside of a running runtime.
///
/// # Examples
///
/// ```rust,ignore
/// use std::time::Duration;
///
/// delay(Duration::from_millis(10)).await;
/// ```
pub fn delay(duration: Duration) -> Delay {
    Delay::new(duration)
}

/// A future that completes once a specific deadline is reached.
///
/// `Delay` integrates with the runtime's timer driver by registering
/// an entry on first poll. The entry is automatically cancelled if the
/// future is dropped before completion, so an abandoned delay (a lost
/// `select` race, a cancelled task) leaves nothing armed behind it.
///
/// `Delay` is also a [`Waitable`], making timers directly usable as
/// select cases.
pub struct Delay {
    /// Absolute point in time when the delay completes.
    deadline: Instant,

    /// State shared with the timer driver.
    state: Arc<DelayState>,

    /// Whether the entry has already been registered with the driver.
    registered: AtomicBool,

    /// Waiter registration from a previous poll.
    waiter: Option<u64>,
}

impl Delay {
    /// Creates a new `Delay` that completes after `duration`.
    ///
    /// The timer is not registered until the future is first polled
    /// or used as a waitable.
    pub(crate) fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
            state: Arc::new(DelayState::new()),
            registered: AtomicBool::new(false),
            waiter: None,
        }
    }

    /// Returns the instant at which the delay completes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Returns `true` once the deadline has been reached.
    pub fn has_elapsed(&self) -> bool {
        self.state.fired.load(Ordering::Acquire) || Instant::now() >= self.deadline
    }

    /// Registers the entry with the current runtime's timer driver,
    /// exactly once.
    fn ensure_registered(&self) {
        if !self.registered.swap(true, Ordering::AcqRel) {
            let handle = context::try_current()
                .expect("delay used outside the context of a runtime");

            handle.timer.register(self.deadline, self.state.clone());
        }
    }
}

impl Future for Delay {
    /// The delay future produces no value.
    type Output = ();

    /// Polls the delay future.
    ///
    /// On the first poll, the timer is registered with the driver.
    /// The task is woken once the deadline is reached.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.has_elapsed() {
            return Poll::Ready(());
        }

        this.ensure_registered();

        match this.waiter {
            Some(id) => this.state.waiters.reregister(id, cx.waker()),
            None => this.waiter = Some(this.state.waiters.register(cx.waker().clone())),
        }

        // The driver may have fired between the first check and the
        // registration.
        if this.has_elapsed() {
            return Poll::Ready(());
        }

        Poll::Pending
    }
}

impl Waitable for Delay {
    fn is_ready(&self) -> bool {
        self.has_elapsed()
    }

    fn register_waiter(&self, waker: Waker) -> WaitToken {
        self.ensure_registered();

        let id = self.state.waiters.register(waker);

        if self.has_elapsed() {
            self.state.waiters.wake_all();
        }

        WaitToken(id)
    }

    fn cancel_registration(&self, token: WaitToken) {
        self.state.waiters.cancel(token.0);
    }
}

impl Drop for Delay {
    /// Cancels the timer if the delay is dropped before completion.
    ///
    /// The driver discards cancelled entries, so no spurious wake-ups
    /// occur and abandoned timers do not accumulate.
    fn drop(&mut self) {
        self.state.cancelled.store(true, Ordering::Release);

        if let Some(id) = self.waiter.take() {
            self.state.waiters.cancel(id);
        }
    }
}
