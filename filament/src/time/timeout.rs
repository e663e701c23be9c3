use crate::time::delay::{Delay, delay};

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Error returned by [`timeout`] when the deadline passes before the
/// wrapped operation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline elapsed before the operation completed")]
pub struct Elapsed;

/// Bounds a future by a deadline.
///
/// The operation and a timer race inside the returned future; the
/// timer only wins if the operation has not completed yet, so a
/// timeout never preempts running work; it merely stops waiting.
pub fn timeout<F>(duration: Duration, future: F) -> Timeout<F>
where
    F: Future,
{
    Timeout::new(duration, future)
}

pub struct Timeout<F> {
    future: F,
    delay: Delay,
}

impl<F> Timeout<F> {
    pub(crate) fn new(duration: Duration, future: F) -> Self {
        Timeout {
            future,
            delay: delay(duration),
        }
    }
}

impl<F> Future for Timeout<F>
where
    F: Future,
{
    type Output = Result<F::Output, Elapsed>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = unsafe { self.get_unchecked_mut() };

        // The operation is polled first: a result that is already
        // available beats a deadline that has already passed.
        let future = unsafe { Pin::new_unchecked(&mut this.future) };
        if let Poll::Ready(value) = future.poll(cx) {
            return Poll::Ready(Ok(value));
        }

        let delay = unsafe { Pin::new_unchecked(&mut this.delay) };
        if let Poll::Ready(()) = delay.poll(cx) {
            return Poll::Ready(Err(Elapsed));
        }

        Poll::Pending
    }
}
