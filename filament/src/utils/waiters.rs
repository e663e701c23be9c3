use std::sync::Mutex;
use std::task::Waker;

/// A token-indexed list of wakers.
///
/// `WaiterList` is the registry behind every suspension point in the
/// runtime: join handles, cancellation tokens, timers, and locks all
/// park their wakers here. Each registration returns a numeric token so
/// the registration can later be replaced (when a future is re-polled
/// with a new waker) or cancelled (when a `select` loses the race and
/// must leave no waiter behind).
///
/// Wakers are woken in registration order.
pub(crate) struct WaiterList {
    inner: Mutex<Inner>,
}

struct Inner {
    entries: Vec<(u64, Waker)>,
    next_id: u64,
}

impl WaiterList {
    /// Creates an empty waiter list.
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Registers a waker and returns its token.
    pub(crate) fn register(&self, waker: Waker) -> u64 {
        let mut inner = self.inner.lock().unwrap();

        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, waker));

        id
    }

    /// Replaces the waker stored under `id`, re-inserting the entry if
    /// it was already drained by a wake.
    ///
    /// Re-polling a future between a wake and its completion must not
    /// lose the waiter, so a missing entry is registered again under
    /// the same token.
    pub(crate) fn reregister(&self, id: u64, waker: &Waker) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(entry) = inner.entries.iter_mut().find(|(i, _)| *i == id) {
            entry.1.clone_from(waker);
        } else {
            inner.entries.push((id, waker.clone()));
        }
    }

    /// Removes the registration with the given token, if still present.
    pub(crate) fn cancel(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.retain(|(i, _)| *i != id);
    }

    /// Wakes every registered waiter, in registration order, and
    /// clears the list.
    pub(crate) fn wake_all(&self) {
        let entries = {
            let mut inner = self.inner.lock().unwrap();
            std::mem::take(&mut inner.entries)
        };

        for (_, waker) in entries {
            waker.wake();
        }
    }

    /// Wakes the longest-registered waiter, if any.
    pub(crate) fn wake_one(&self) {
        let entry = {
            let mut inner = self.inner.lock().unwrap();
            if inner.entries.is_empty() {
                None
            } else {
                Some(inner.entries.remove(0))
            }
        };

        if let Some((_, waker)) = entry {
            waker.wake();
        }
    }
}
