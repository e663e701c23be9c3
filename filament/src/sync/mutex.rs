use crate::sync::deadlock::{self, LockId};
use crate::utils::WaiterList;

use std::cell::UnsafeCell;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

/// A mutual-exclusion lock for tasks.
///
/// `Mutex<T>` provides exclusive access to its payload. Unlike a
/// standard `std::sync::Mutex`, it never blocks an OS thread: a task
/// that cannot acquire the lock suspends and is woken when the lock is
/// released.
///
/// The guard returned by [`lock`](Self::lock) releases the lock when
/// it goes out of scope, on every exit path including cancellation
/// and panic unwinding to the task boundary, both of which drop the
/// task's continuation and with it the guard.
pub struct Mutex<T> {
    /// Indicates whether the mutex is currently locked.
    locked: AtomicBool,

    /// Tasks waiting to acquire the mutex, woken one at a time in
    /// arrival order.
    waiters: WaiterList,

    /// The underlying data protected by the mutex.
    ///
    /// `UnsafeCell` allows mutable access through shared references,
    /// which is sound because the `locked` flag guarantees exclusion.
    data: UnsafeCell<T>,

    /// Identity in the debug held-lock graph.
    id: LockId,
}

// Safety: access to the payload is serialized by the `locked` flag.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    /// Creates a new mutex wrapping the given value.
    ///
    /// The mutex is initially unlocked, and no waiters are present.
    pub fn new(value: T) -> Mutex<T> {
        Self {
            locked: AtomicBool::new(false),
            waiters: WaiterList::new(),
            data: UnsafeCell::new(value),
            id: deadlock::next_lock_id(),
        }
    }

    /// Returns a future that resolves to a guard once the mutex is
    /// acquired.
    ///
    /// This is a suspension point when the mutex is contended; the
    /// task never spins and the thread never blocks.
    pub fn lock(&self) -> LockFuture<'_, T> {
        LockFuture {
            mutex: self,
            waiter: None,
        }
    }

    /// Attempts to acquire the mutex without suspending.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self.try_acquire() {
            deadlock::acquired(self.id);
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }

    fn try_acquire(&self) -> bool {
        !self.locked.swap(true, Ordering::Acquire)
    }

    /// Consumes the mutex and returns the payload.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

/// Future returned by [`Mutex::lock`].
pub struct LockFuture<'a, T> {
    mutex: &'a Mutex<T>,
    waiter: Option<u64>,
}

impl<T> Unpin for LockFuture<'_, T> {}

impl<'a, T> Future for LockFuture<'a, T> {
    type Output = MutexGuard<'a, T>;

    /// Polls the future to attempt acquiring the mutex.
    ///
    /// The waker is registered **before** the second acquisition
    /// attempt: a release that lands between the two cannot slip by
    /// without either handing us the lock or waking us.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.mutex.try_acquire() {
            this.deregister();
            deadlock::acquired(this.mutex.id);
            return Poll::Ready(MutexGuard { mutex: this.mutex });
        }

        match this.waiter {
            Some(id) => this.mutex.waiters.reregister(id, cx.waker()),
            None => this.waiter = Some(this.mutex.waiters.register(cx.waker().clone())),
        }

        if this.mutex.try_acquire() {
            this.deregister();
            deadlock::acquired(this.mutex.id);
            return Poll::Ready(MutexGuard { mutex: this.mutex });
        }

        deadlock::blocked(this.mutex.id);

        Poll::Pending
    }
}

impl<T> LockFuture<'_, T> {
    fn deregister(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.mutex.waiters.cancel(id);
        }
    }
}

impl<T> Drop for LockFuture<'_, T> {
    /// Gives up the acquisition attempt.
    ///
    /// If a release already aimed its wake at this waiter, the wake is
    /// passed on so the queue keeps draining.
    fn drop(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.mutex.waiters.cancel(id);
        }

        deadlock::unblocked(self.mutex.id);

        if !self.mutex.locked.load(Ordering::Acquire) {
            self.mutex.waiters.wake_one();
        }
    }
}

/// Guard returned by [`Mutex::lock`].
///
/// Releases the mutex when dropped.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<T> Drop for MutexGuard<'_, T> {
    /// Unlocks the mutex and wakes the longest-waiting task, if any.
    fn drop(&mut self) {
        deadlock::released(self.mutex.id);

        self.mutex.locked.store(false, Ordering::Release);
        self.mutex.waiters.wake_one();
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    /// Provides immutable access to the protected data.
    fn deref(&self) -> &Self::Target {
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    /// Provides mutable access to the protected data.
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.mutex.data.get() }
    }
}
