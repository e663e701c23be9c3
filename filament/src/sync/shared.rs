use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Creates a new atomically reference-counted container.
///
/// Equivalent to [`Shared::new`].
pub fn shared<T>(value: T) -> Shared<T> {
    Shared::new(value)
}

/// An atomically reference-counted container.
///
/// Cloning a `Shared<T>` increments the count; dropping a handle
/// decrements it; the payload is dropped exactly once, when the count
/// transitions from one to zero. The payload is owned by the cell, not
/// by any single holder.
///
/// A bare `Shared<T>` gives out only shared references. State that
/// must be *mutated* from several tasks combines it with a lock, which
/// is what serializes every mutation:
///
/// ```rust,ignore
/// let counter = shared(Mutex::new(0u64));
///
/// let handle = counter.clone();
/// scope.spawn(async move {
///     *handle.lock().await += 1;
/// });
/// ```
pub struct Shared<T> {
    inner: Arc<T>,
}

impl<T> Shared<T> {
    /// Creates a container with a count of one.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Number of live handles to this payload.
    pub fn handles(this: &Self) -> usize {
        Arc::strong_count(&this.inner)
    }

    /// Returns `true` if both handles point to the same payload.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Recovers the payload if this is the last handle.
    pub fn into_inner(this: Self) -> Result<T, Shared<T>> {
        Arc::try_unwrap(this.inner).map_err(|inner| Shared { inner })
    }
}

impl<T> Clone for Shared<T> {
    /// Increments the reference count.
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Deref for Shared<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&self.inner).finish()
    }
}
