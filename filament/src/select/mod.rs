//! Multi-wait: suspend on several waitables, commit to one.
//!
//! The [`Waitable`] trait is the small, closed capability every
//! suspendable resource in this crate implements: channel endpoints,
//! join handles, timers, and cancellation tokens. A waitable can
//! report readiness, register a waiter, and cancel a registration,
//! nothing more. Registering is free of side effects, so waiting on a
//! case that ends up losing commits nothing.
//!
//! [`ready_any`] is the engine underneath selection: it resolves to
//! the index of one ready case, chosen **uniformly at random** among
//! the simultaneously ready ones so no case can starve the others, and
//! with every other registration cancelled before it returns. The
//! caller then *claims* the winner with the matching non-parking
//! operation (`try_recv`, `try_send`, awaiting a finished handle); if
//! the claim fails because a concurrent claimant won the race, loop
//! and wait again:
//!
//! ```rust,ignore
//! let value = loop {
//!     match ready_any(&[&rx_a, &rx_b]).await {
//!         0 => match rx_a.try_recv() {
//!             Ok(v) => break v,
//!             Err(TryRecvError::Empty) => continue, // lost the claim race
//!             Err(TryRecvError::Closed) => return,
//!         },
//!         _ => match rx_b.try_recv() {
//!             Ok(v) => break v,
//!             Err(TryRecvError::Empty) => continue,
//!             Err(TryRecvError::Closed) => return,
//!         },
//!     }
//! };
//! ```
//!
//! Because a send claimed through [`try_send`](crate::channel::Sender::try_send)
//! hands the value back on failure, a send case that is not chosen
//! never transfers its value.
//!
//! The [`select!`](crate::select!) macro offers the same multi-wait
//! over arbitrary futures, polling its branches in a freshly shuffled
//! order on every poll.

use crate::utils::rng;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// Proof of a waiter registration on a [`Waitable`].
///
/// Returned by [`Waitable::register_waiter`] and consumed by
/// [`Waitable::cancel_registration`].
pub struct WaitToken(pub(crate) u64);

/// A resource a task can suspend on.
///
/// Implemented by [`Receiver`](crate::channel::Receiver),
/// [`Sender`](crate::channel::Sender),
/// [`JoinHandle`](crate::task::JoinHandle),
/// [`Delay`](crate::time::Delay), and
/// [`CancelToken`](crate::cancel::CancelToken).
///
/// Implementations must wake registered waiters when readiness
/// appears, and must tolerate registrations being cancelled at any
/// point; a cancelled registration simply never existed.
pub trait Waitable: Sync {
    /// Returns `true` if the associated operation would resolve
    /// without parking right now.
    ///
    /// Readiness is a snapshot: a concurrent claimant may take the
    /// resource before the caller does.
    fn is_ready(&self) -> bool;

    /// Registers a waker to be woken when readiness appears.
    ///
    /// If the waitable is already ready, the waker is woken promptly
    /// instead of being lost.
    fn register_waiter(&self, waker: Waker) -> WaitToken;

    /// Cancels a previous registration.
    ///
    /// Cancelling a registration that has already been consumed by a
    /// wake is a no-op.
    fn cancel_registration(&self, token: WaitToken);
}

/// Resolves to the index of one ready case.
///
/// If several cases are ready at the same time the winner is drawn
/// uniformly at random among them. When none are ready, a waiter is
/// registered on every case and the task parks; the first wake
/// re-scans. Every non-winning registration is cancelled before the
/// future resolves, and a dropped `ReadyAny` cancels all of them.
///
/// # Panics
///
/// Panics if `cases` is empty: an empty selection would park forever.
pub fn ready_any<'a>(cases: &'a [&'a dyn Waitable]) -> ReadyAny<'a> {
    assert!(!cases.is_empty(), "ready_any requires at least one case");

    let tokens = cases.iter().map(|_| None).collect();

    ReadyAny { cases, tokens }
}

/// Future returned by [`ready_any`].
pub struct ReadyAny<'a> {
    cases: &'a [&'a dyn Waitable],
    tokens: Vec<Option<WaitToken>>,
}

impl Unpin for ReadyAny<'_> {}

impl Future for ReadyAny<'_> {
    type Output = usize;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<usize> {
        let this = self.get_mut();

        if let Some(winner) = this.pick_ready() {
            this.cancel_all();
            return Poll::Ready(winner);
        }

        // Nothing ready: (re-)register on every case with the current
        // waker.
        for (i, case) in this.cases.iter().enumerate() {
            if let Some(token) = this.tokens[i].take() {
                case.cancel_registration(token);
            }
            this.tokens[i] = Some(case.register_waiter(cx.waker().clone()));
        }

        // Readiness may have appeared while registering.
        if let Some(winner) = this.pick_ready() {
            this.cancel_all();
            return Poll::Ready(winner);
        }

        Poll::Pending
    }
}

impl ReadyAny<'_> {
    /// Scans all cases and draws a winner among the ready ones.
    fn pick_ready(&self) -> Option<usize> {
        let ready: Vec<usize> = self
            .cases
            .iter()
            .enumerate()
            .filter(|(_, case)| case.is_ready())
            .map(|(i, _)| i)
            .collect();

        if ready.is_empty() {
            None
        } else {
            Some(ready[rng::index_below(ready.len())])
        }
    }

    fn cancel_all(&mut self) {
        for (i, case) in self.cases.iter().enumerate() {
            if let Some(token) = self.tokens[i].take() {
                case.cancel_registration(token);
            }
        }
    }
}

impl Drop for ReadyAny<'_> {
    /// Cancels every outstanding registration.
    ///
    /// A selection abandoned mid-wait leaves no waiter behind on any
    /// of its cases.
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Shuffles `order` in place (Fisher-Yates over the per-thread
/// generator).
///
/// Used by the [`select!`](crate::select!) macro to vary the branch
/// polling order on every poll; exposed because the macro expands in
/// caller code.
pub fn shuffle(order: &mut [usize]) {
    for i in (1..order.len()).rev() {
        let j = rng::index_below(i + 1);
        order.swap(i, j);
    }
}
