//! Ownership-transferring channels.
//!
//! A channel moves values between tasks: the sender gives a value up,
//! the receiver takes it over, and no moment exists where both sides
//! can observe it. Channels are the preferred way to share data in
//! this runtime; the shared-state primitives in [`crate::sync`] are
//! the explicit opt-out.
//!
//! Three capacities exist:
//! - `bounded(0)` — a rendezvous channel: a send completes only when a
//!   receiver actually takes the value,
//! - `bounded(n)` — a ring buffer of at most `n` values; sends park
//!   when it is full,
//! - `unbounded()` — sends never park.
//!
//! Values are received in the order their sends committed (FIFO per
//! channel). A parked sender keeps its value inside its own queue
//! entry and commits it itself once it reaches the front of the queue,
//! so a send abandoned mid-wait (a lost `select` race, a cancelled
//! task) withdraws the value without the receiver ever seeing it.
//!
//! Closing is idempotent and happens explicitly via `close` or
//! implicitly when all senders (or the receiver) drop. Operations on a
//! closed channel fail immediately instead of parking: `send` hands
//! the value back, `recv` drains whatever was committed and then
//! reports [`RecvError::Closed`].

use crate::select::{WaitToken, Waitable};

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

/// Error returned by [`Sender::send`] on a closed channel.
///
/// The value that could not be sent is handed back to the caller.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError<T> {
    /// The channel was closed before the value could be committed.
    #[error("sending on a closed channel")]
    Closed(T),
}

/// Error returned by [`Receiver::recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// The channel is closed and every committed value has been
    /// drained.
    #[error("receiving on a closed channel")]
    Closed,
}

/// Error returned by [`Sender::try_send`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TrySendError<T> {
    /// The channel cannot accept a value right now.
    #[error("channel is full")]
    Full(T),
    /// The channel is closed.
    #[error("sending on a closed channel")]
    Closed(T),
}

/// Error returned by [`Receiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    /// No value is available right now.
    #[error("channel is empty")]
    Empty,
    /// The channel is closed and drained.
    #[error("receiving on a closed channel")]
    Closed,
}

/// Creates a bounded channel with the given capacity.
///
/// Capacity `0` creates a rendezvous channel: every send parks until a
/// receiver takes its value directly.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    channel(Some(capacity))
}

/// Creates an unbounded channel. Sends never park.
pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    channel(None)
}

fn channel<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    let chan = Arc::new(Chan {
        state: Mutex::new(State {
            buffer: VecDeque::new(),
            capacity,
            tx_waiters: VecDeque::new(),
            rx_waiters: VecDeque::new(),
            tx_watchers: Vec::new(),
            rx_watchers: Vec::new(),
            closed: false,
            senders: 1,
            receivers: 1,
            next_id: 0,
        }),
    });

    (
        Sender { chan: chan.clone() },
        Receiver { chan },
    )
}

/// A parked send: the entry owns the un-sent value until the sender
/// itself commits it or withdraws it.
struct TxWaiter<T> {
    id: u64,
    value: Option<T>,
    waker: Waker,
}

struct State<T> {
    /// Committed values, in commit order.
    buffer: VecDeque<T>,

    /// `None` = unbounded, `Some(0)` = rendezvous.
    capacity: Option<usize>,

    /// Parked sends, each still owning its value.
    tx_waiters: VecDeque<TxWaiter<T>>,

    /// Parked receives.
    rx_waiters: VecDeque<(u64, Waker)>,

    /// Select registrations waiting for send readiness.
    tx_watchers: Vec<(u64, Waker)>,

    /// Select registrations waiting for receive readiness.
    rx_watchers: Vec<(u64, Waker)>,

    closed: bool,

    /// Live handle counts; the channel closes when either reaches zero.
    senders: usize,
    receivers: usize,

    next_id: u64,
}

impl<T> State<T> {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Whether the buffer can take one more value right now.
    ///
    /// Always false for rendezvous channels: their values never rest
    /// in the buffer on the send path.
    fn has_space(&self) -> bool {
        match self.capacity {
            None => true,
            Some(0) => false,
            Some(n) => self.buffer.len() < n,
        }
    }

    /// Whether a `send` polled now would resolve without parking.
    fn send_ready(&self) -> bool {
        if self.closed {
            return true;
        }
        match self.capacity {
            None => true,
            Some(0) => !self.rx_waiters.is_empty(),
            Some(n) => self.buffer.len() < n && self.tx_waiters.is_empty(),
        }
    }

    /// Whether a `recv` polled now would resolve without parking.
    fn recv_ready(&self) -> bool {
        !self.buffer.is_empty() || !self.tx_waiters.is_empty() || self.closed
    }

    /// Commits a value into the buffer and wakes the receive side.
    fn commit(&mut self, value: T, to_wake: &mut Vec<Waker>) {
        self.buffer.push_back(value);

        if let Some((_, waker)) = self.rx_waiters.pop_front() {
            to_wake.push(waker);
        }
        to_wake.extend(self.rx_watchers.drain(..).map(|(_, w)| w));
    }

    /// Takes the next value in FIFO order, if one is claimable.
    fn try_take(&mut self, to_wake: &mut Vec<Waker>) -> Option<T> {
        if let Some(value) = self.buffer.pop_front() {
            // A slot freed up: the longest-parked sender commits next.
            if self.has_space() {
                if let Some(front) = self.tx_waiters.front() {
                    to_wake.push(front.waker.clone());
                }
            }
            to_wake.extend(self.tx_watchers.drain(..).map(|(_, w)| w));
            return Some(value);
        }

        if self.capacity == Some(0) {
            // Rendezvous: take directly from the longest-parked sender.
            while let Some(mut waiter) = self.tx_waiters.pop_front() {
                if let Some(value) = waiter.value.take() {
                    to_wake.push(waiter.waker);
                    to_wake.extend(self.tx_watchers.drain(..).map(|(_, w)| w));
                    return Some(value);
                }
            }
        }

        None
    }

    /// Closes the channel and wakes everything parked on it.
    ///
    /// Parked sends are woken but their entries are left in place, so
    /// each can withdraw its own value and report the failure.
    fn close(&mut self, to_wake: &mut Vec<Waker>) {
        if self.closed {
            return;
        }
        self.closed = true;

        to_wake.extend(self.tx_waiters.iter().map(|w| w.waker.clone()));
        to_wake.extend(self.rx_waiters.drain(..).map(|(_, w)| w));
        to_wake.extend(self.tx_watchers.drain(..).map(|(_, w)| w));
        to_wake.extend(self.rx_watchers.drain(..).map(|(_, w)| w));
    }
}

struct Chan<T> {
    state: Mutex<State<T>>,
}

impl<T> Chan<T> {
    fn close(&self) {
        let mut to_wake = Vec::new();
        self.state.lock().unwrap().close(&mut to_wake);
        wake(to_wake);
    }
}

fn wake(to_wake: Vec<Waker>) {
    for waker in to_wake {
        waker.wake();
    }
}

/// The producing half of a channel.
///
/// Senders can be cloned; the channel closes once every sender has
/// been dropped.
pub struct Sender<T> {
    chan: Arc<Chan<T>>,
}

impl<T> Sender<T> {
    /// Sends a value, parking the calling task while the channel is
    /// full (or, on a rendezvous channel, until a receiver takes the
    /// value).
    ///
    /// The value is moved into the operation. On a closed channel the
    /// send fails immediately, without parking, and the value is
    /// handed back in [`SendError::Closed`].
    ///
    /// Dropping the returned future before it completes withdraws the
    /// value: the receiver never observes it.
    pub fn send(&self, value: T) -> SendFuture<'_, T> {
        SendFuture {
            chan: &self.chan,
            value: Some(value),
            wait_id: None,
        }
    }

    /// Attempts to send without parking.
    ///
    /// On a rendezvous channel this succeeds only while a receiver is
    /// parked waiting. The value is handed back on failure.
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        let mut to_wake = Vec::new();

        let result = {
            let mut state = self.chan.state.lock().unwrap();

            if state.closed {
                Err(TrySendError::Closed(value))
            } else if state.send_ready() {
                state.commit(value, &mut to_wake);
                Ok(())
            } else {
                Err(TrySendError::Full(value))
            }
        };

        wake(to_wake);
        result
    }

    /// Closes the channel. Idempotent.
    ///
    /// Parked receives resolve with [`RecvError::Closed`] once the
    /// buffer drains; parked and future sends fail immediately.
    pub fn close(&self) {
        self.chan.close();
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        self.chan.state.lock().unwrap().senders += 1;
        Self {
            chan: self.chan.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut to_wake = Vec::new();
        {
            let mut state = self.chan.state.lock().unwrap();
            state.senders -= 1;
            if state.senders == 0 {
                state.close(&mut to_wake);
            }
        }
        wake(to_wake);
    }
}

impl<T: Send> Waitable for Sender<T> {
    fn is_ready(&self) -> bool {
        self.chan.state.lock().unwrap().send_ready()
    }

    fn register_waiter(&self, waker: Waker) -> WaitToken {
        let mut to_wake = Vec::new();

        let id = {
            let mut state = self.chan.state.lock().unwrap();
            let id = state.next_id();
            state.tx_watchers.push((id, waker));

            // Readiness may have appeared while registering.
            if state.send_ready() {
                to_wake.extend(state.tx_watchers.drain(..).map(|(_, w)| w));
            }
            id
        };

        wake(to_wake);
        WaitToken(id)
    }

    fn cancel_registration(&self, token: WaitToken) {
        let mut state = self.chan.state.lock().unwrap();
        state.tx_watchers.retain(|(id, _)| *id != token.0);
    }
}

/// The consuming half of a channel.
pub struct Receiver<T> {
    chan: Arc<Chan<T>>,
}

impl<T> Receiver<T> {
    /// Receives the next value in FIFO order, parking the calling task
    /// while the channel is empty.
    ///
    /// On a closed channel, every value committed before the close is
    /// still delivered; once drained, `recv` resolves immediately with
    /// [`RecvError::Closed`] instead of parking forever.
    pub fn recv(&self) -> RecvFuture<'_, T> {
        RecvFuture {
            chan: &self.chan,
            wait_id: None,
        }
    }

    /// Attempts to receive without parking.
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut to_wake = Vec::new();

        let result = {
            let mut state = self.chan.state.lock().unwrap();

            match state.try_take(&mut to_wake) {
                Some(value) => Ok(value),
                None if state.closed => Err(TryRecvError::Closed),
                None => Err(TryRecvError::Empty),
            }
        };

        wake(to_wake);
        result
    }

    /// Closes the channel from the receiving side. Idempotent.
    pub fn close(&self) {
        self.chan.close();
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut to_wake = Vec::new();
        {
            let mut state = self.chan.state.lock().unwrap();
            state.receivers -= 1;
            if state.receivers == 0 {
                state.close(&mut to_wake);
            }
        }
        wake(to_wake);
    }
}

impl<T: Send> Waitable for Receiver<T> {
    fn is_ready(&self) -> bool {
        self.chan.state.lock().unwrap().recv_ready()
    }

    fn register_waiter(&self, waker: Waker) -> WaitToken {
        let mut to_wake = Vec::new();

        let id = {
            let mut state = self.chan.state.lock().unwrap();
            let id = state.next_id();
            state.rx_watchers.push((id, waker));

            if state.recv_ready() {
                to_wake.extend(state.rx_watchers.drain(..).map(|(_, w)| w));
            }
            id
        };

        wake(to_wake);
        WaitToken(id)
    }

    fn cancel_registration(&self, token: WaitToken) {
        let mut state = self.chan.state.lock().unwrap();
        state.rx_watchers.retain(|(id, _)| *id != token.0);
    }
}

/// Future returned by [`Sender::send`].
///
/// While parked, the un-sent value lives inside this operation's queue
/// entry; the entry commits it only from the front of the queue, which
/// is what guarantees per-channel FIFO and lets a dropped send
/// withdraw cleanly.
pub struct SendFuture<'a, T> {
    chan: &'a Arc<Chan<T>>,
    value: Option<T>,
    wait_id: Option<u64>,
}

impl<T> Unpin for SendFuture<'_, T> {}

impl<T: Send> Future for SendFuture<'_, T> {
    type Output = Result<(), SendError<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut to_wake = Vec::new();

        let result = {
            let mut state = this.chan.state.lock().unwrap();

            if let Some(id) = this.wait_id {
                poll_parked_send(&mut this.wait_id, &mut state, id, cx, &mut to_wake)
            } else if state.closed {
                let value = this.value.take().expect("send polled after completion");
                Poll::Ready(Err(SendError::Closed(value)))
            } else {
                let value = this.value.take().expect("send polled after completion");

                match state.capacity {
                    None => {
                        state.commit(value, &mut to_wake);
                        Poll::Ready(Ok(()))
                    }
                    Some(0) => {
                        let id = state.next_id();
                        state.tx_waiters.push_back(TxWaiter {
                            id,
                            value: Some(value),
                            waker: cx.waker().clone(),
                        });
                        this.wait_id = Some(id);

                        // A parked receiver can now claim directly.
                        if let Some((_, waker)) = state.rx_waiters.pop_front() {
                            to_wake.push(waker);
                        }
                        to_wake.extend(state.rx_watchers.drain(..).map(|(_, w)| w));

                        Poll::Pending
                    }
                    Some(n) => {
                        if state.buffer.len() < n && state.tx_waiters.is_empty() {
                            state.commit(value, &mut to_wake);
                            Poll::Ready(Ok(()))
                        } else {
                            let id = state.next_id();
                            state.tx_waiters.push_back(TxWaiter {
                                id,
                                value: Some(value),
                                waker: cx.waker().clone(),
                            });
                            this.wait_id = Some(id);
                            Poll::Pending
                        }
                    }
                }
            }
        };

        wake(to_wake);
        result
    }
}

/// Re-poll of a send that parked earlier.
fn poll_parked_send<T>(
    wait_id: &mut Option<u64>,
    state: &mut State<T>,
    id: u64,
    cx: &mut Context<'_>,
    to_wake: &mut Vec<Waker>,
) -> Poll<Result<(), SendError<T>>> {
    let Some(pos) = state.tx_waiters.iter().position(|w| w.id == id) else {
        // The entry is gone: a rendezvous receiver claimed the value.
        *wait_id = None;
        return Poll::Ready(Ok(()));
    };

    if state.closed {
        let mut waiter = state.tx_waiters.remove(pos).unwrap();
        *wait_id = None;

        return match waiter.value.take() {
            Some(value) => Poll::Ready(Err(SendError::Closed(value))),
            None => Poll::Ready(Ok(())),
        };
    }

    // Only the front of the queue may commit, and only into free
    // space; this keeps commit order equal to send order.
    if pos == 0 && state.has_space() {
        let mut waiter = state.tx_waiters.pop_front().unwrap();
        *wait_id = None;

        if let Some(value) = waiter.value.take() {
            state.commit(value, to_wake);
        }

        // The next parked sender may fit as well.
        if state.has_space() {
            if let Some(front) = state.tx_waiters.front() {
                to_wake.push(front.waker.clone());
            }
        }

        return Poll::Ready(Ok(()));
    }

    state.tx_waiters[pos].waker.clone_from(cx.waker());
    Poll::Pending
}

impl<T> Drop for SendFuture<'_, T> {
    /// Withdraws a parked send.
    ///
    /// If the value has not been committed it is dropped here, still
    /// owned by the sender side; the receiver never observes it. The
    /// wake that may have been aimed at this entry is passed on so the
    /// queue keeps draining.
    fn drop(&mut self) {
        let Some(id) = self.wait_id else { return };

        let mut to_wake = Vec::new();
        {
            let mut state = self.chan.state.lock().unwrap();

            if let Some(pos) = state.tx_waiters.iter().position(|w| w.id == id) {
                state.tx_waiters.remove(pos);

                if state.has_space() {
                    if let Some(front) = state.tx_waiters.front() {
                        to_wake.push(front.waker.clone());
                    }
                }
            }
        }
        wake(to_wake);
    }
}

/// Future returned by [`Receiver::recv`].
///
/// The claim (actually dequeuing the value) happens inside `poll`
/// under the channel lock, so it is atomic with respect to competing
/// receivers; a receive that loses a race simply parks again.
pub struct RecvFuture<'a, T> {
    chan: &'a Arc<Chan<T>>,
    wait_id: Option<u64>,
}

impl<T> Unpin for RecvFuture<'_, T> {}

impl<T: Send> Future for RecvFuture<'_, T> {
    type Output = Result<T, RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut to_wake = Vec::new();

        let result = {
            let mut state = this.chan.state.lock().unwrap();

            if let Some(value) = state.try_take(&mut to_wake) {
                if let Some(id) = this.wait_id.take() {
                    state.rx_waiters.retain(|(i, _)| *i != id);
                }
                Poll::Ready(Ok(value))
            } else if state.closed {
                this.wait_id = None;
                Poll::Ready(Err(RecvError::Closed))
            } else {
                match this.wait_id {
                    Some(id) => {
                        match state.rx_waiters.iter_mut().find(|(i, _)| *i == id) {
                            Some(entry) => entry.1.clone_from(cx.waker()),
                            None => state.rx_waiters.push_back((id, cx.waker().clone())),
                        }
                    }
                    None => {
                        let id = state.next_id();
                        state.rx_waiters.push_back((id, cx.waker().clone()));
                        this.wait_id = Some(id);

                        // On a rendezvous channel a parked receiver is
                        // what makes the send side ready.
                        if state.capacity == Some(0) {
                            to_wake.extend(state.tx_watchers.drain(..).map(|(_, w)| w));
                        }
                    }
                }
                Poll::Pending
            }
        };

        wake(to_wake);
        result
    }
}

impl<T> Drop for RecvFuture<'_, T> {
    /// Deregisters a parked receive.
    ///
    /// A wake aimed at this receiver is passed on to the next one so a
    /// committed value is never stranded behind a dead waiter.
    fn drop(&mut self) {
        let Some(id) = self.wait_id else { return };

        let mut to_wake = Vec::new();
        {
            let mut state = self.chan.state.lock().unwrap();
            state.rx_waiters.retain(|(i, _)| *i != id);

            if state.recv_ready() {
                if let Some((_, waker)) = state.rx_waiters.pop_front() {
                    to_wake.push(waker);
                }
            }
        }
        wake(to_wake);
    }
}
