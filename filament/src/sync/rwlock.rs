use crate::sync::deadlock::{self, LockId};
use crate::utils::WaiterList;

use std::cell::UnsafeCell;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// Sentinel state meaning "write-locked".
const WRITER: usize = usize::MAX;

/// A reader-writer lock for tasks.
///
/// Any number of readers may hold the lock at once, or exactly one
/// writer. Both [`read`](Self::read) and [`write`](Self::write) are
/// suspension points when contended.
///
/// The lock prefers writers: while a writer is parked, new readers
/// park behind it instead of overtaking, so a steady stream of readers
/// cannot starve a write.
pub struct RwLock<T> {
    /// Number of readers currently inside, or [`WRITER`].
    state: AtomicUsize,

    /// Number of writers parked or about to park.
    writers_waiting: AtomicUsize,

    /// Parked readers, all woken together when a writer leaves.
    read_waiters: WaiterList,

    /// Parked writers, woken one at a time.
    write_waiters: WaiterList,

    /// The underlying data.
    data: UnsafeCell<T>,

    /// Identity in the debug held-lock graph.
    id: LockId,
}

unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwLock<T> {}

impl<T> RwLock<T> {
    /// Creates a new lock wrapping the given value.
    pub fn new(value: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            writers_waiting: AtomicUsize::new(0),
            read_waiters: WaiterList::new(),
            write_waiters: WaiterList::new(),
            data: UnsafeCell::new(value),
            id: deadlock::next_lock_id(),
        }
    }

    /// Acquires shared read access; a suspension point if a writer is
    /// inside or parked.
    pub fn read(&self) -> ReadLockFuture<'_, T> {
        ReadLockFuture {
            lock: self,
            waiter: None,
        }
    }

    /// Acquires exclusive write access; a suspension point while any
    /// guard is out.
    pub fn write(&self) -> WriteLockFuture<'_, T> {
        WriteLockFuture {
            lock: self,
            waiter: None,
            counted: false,
        }
    }

    /// Attempts shared read access without suspending.
    pub fn try_read(&self) -> Option<RwLockReadGuard<'_, T>> {
        if self.try_acquire_read() {
            Some(RwLockReadGuard { lock: self })
        } else {
            None
        }
    }

    /// Attempts exclusive write access without suspending.
    pub fn try_write(&self) -> Option<RwLockWriteGuard<'_, T>> {
        if self.try_acquire_write() {
            deadlock::acquired(self.id);
            Some(RwLockWriteGuard { lock: self })
        } else {
            None
        }
    }

    /// Consumes the lock and returns the payload.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    fn try_acquire_read(&self) -> bool {
        // Readers defer to parked writers.
        if self.writers_waiting.load(Ordering::Acquire) > 0 {
            return false;
        }

        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current == WRITER {
                return false;
            }

            match self.state.compare_exchange(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn try_acquire_write(&self) -> bool {
        self.state
            .compare_exchange(0, WRITER, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Wakes the appropriate side after the lock became free.
    fn wake_next(&self) {
        if self.writers_waiting.load(Ordering::Acquire) > 0 {
            self.write_waiters.wake_one();
        } else {
            self.read_waiters.wake_all();
        }
    }
}

/// Future returned by [`RwLock::read`].
pub struct ReadLockFuture<'a, T> {
    lock: &'a RwLock<T>,
    waiter: Option<u64>,
}

impl<T> Unpin for ReadLockFuture<'_, T> {}

impl<'a, T> Future for ReadLockFuture<'a, T> {
    type Output = RwLockReadGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.lock.try_acquire_read() {
            this.deregister();
            return Poll::Ready(RwLockReadGuard { lock: this.lock });
        }

        match this.waiter {
            Some(id) => this.lock.read_waiters.reregister(id, cx.waker()),
            None => this.waiter = Some(this.lock.read_waiters.register(cx.waker().clone())),
        }

        if this.lock.try_acquire_read() {
            this.deregister();
            return Poll::Ready(RwLockReadGuard { lock: this.lock });
        }

        Poll::Pending
    }
}

impl<T> ReadLockFuture<'_, T> {
    fn deregister(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.lock.read_waiters.cancel(id);
        }
    }
}

impl<T> Drop for ReadLockFuture<'_, T> {
    fn drop(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.lock.read_waiters.cancel(id);
        }
    }
}

/// Future returned by [`RwLock::write`].
pub struct WriteLockFuture<'a, T> {
    lock: &'a RwLock<T>,
    waiter: Option<u64>,

    /// Whether this future is counted in `writers_waiting`.
    counted: bool,
}

impl<T> Unpin for WriteLockFuture<'_, T> {}

impl<'a, T> Future for WriteLockFuture<'a, T> {
    type Output = RwLockWriteGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.lock.try_acquire_write() {
            this.uncount();
            this.deregister();
            deadlock::acquired(this.lock.id);
            return Poll::Ready(RwLockWriteGuard { lock: this.lock });
        }

        if !this.counted {
            this.counted = true;
            this.lock.writers_waiting.fetch_add(1, Ordering::AcqRel);
        }

        match this.waiter {
            Some(id) => this.lock.write_waiters.reregister(id, cx.waker()),
            None => this.waiter = Some(this.lock.write_waiters.register(cx.waker().clone())),
        }

        if this.lock.try_acquire_write() {
            this.uncount();
            this.deregister();
            deadlock::acquired(this.lock.id);
            return Poll::Ready(RwLockWriteGuard { lock: this.lock });
        }

        deadlock::blocked(this.lock.id);

        Poll::Pending
    }
}

impl<T> WriteLockFuture<'_, T> {
    fn deregister(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.lock.write_waiters.cancel(id);
        }
    }

    fn uncount(&mut self) {
        if self.counted {
            self.counted = false;
            self.lock.writers_waiting.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl<T> Drop for WriteLockFuture<'_, T> {
    /// Gives up the write attempt.
    ///
    /// Readers parked behind this writer are released if no other
    /// writer is waiting.
    fn drop(&mut self) {
        if let Some(id) = self.waiter.take() {
            self.lock.write_waiters.cancel(id);
        }

        deadlock::unblocked(self.lock.id);

        if self.counted {
            self.counted = false;
            if self.lock.writers_waiting.fetch_sub(1, Ordering::AcqRel) == 1 {
                self.lock.read_waiters.wake_all();
            }
        }
    }
}

/// Shared guard returned by [`RwLock::read`].
pub struct RwLockReadGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Drop for RwLockReadGuard<'_, T> {
    /// Releases the read claim; the last reader out wakes a writer.
    fn drop(&mut self) {
        if self.lock.state.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.lock.wake_next();
        }
    }
}

impl<T> Deref for RwLockReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.data.get() }
    }
}

/// Exclusive guard returned by [`RwLock::write`].
pub struct RwLockWriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Drop for RwLockWriteGuard<'_, T> {
    /// Releases the lock and wakes the next writer, or all readers.
    fn drop(&mut self) {
        deadlock::released(self.lock.id);

        self.lock.state.store(0, Ordering::Release);
        self.lock.wake_next();
    }
}

impl<T> Deref for RwLockWriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.lock.data.get() }
    }
}
