use std::mem::MaybeUninit;

/// A simple slab arena.
///
/// A `Slab` stores values of type `T` in a contiguous array and
/// returns stable indices that can be reused after removal.
///
/// Internally, it keeps track of:
/// - initialized slots,
/// - free indices,
/// - and uninitialized memory using [`MaybeUninit`].
///
/// The runtime uses it as the child arena of a concurrency scope: the
/// scope hands out slot indices to its children and the children write
/// their terminal state back through the index, so no owning pointer
/// ever travels in the other direction.
///
/// # Safety
///
/// This type uses `unsafe` internally but provides a safe API
/// as long as indices returned by [`insert`](Self::insert)
/// are not reused after a slot has been drained.
pub(crate) struct Slab<T> {
    /// Storage for items (may contain uninitialized slots).
    items: Vec<MaybeUninit<T>>,
    /// Stack of free indices that can be reused.
    free: Vec<usize>,
    /// Marks whether a slot is currently initialized.
    used: Vec<bool>,
}

impl<T> Slab<T> {
    /// Creates a new `Slab` with a fixed initial capacity.
    ///
    /// All slots are initially free and uninitialized. The free stack
    /// is kept in descending order so a pure sequence of insertions
    /// receives indices 0, 1, 2, ...; insertion order and index order
    /// coincide until a slot is recycled.
    pub(crate) fn new(size: usize) -> Self {
        let items = (0..size).map(|_| MaybeUninit::<T>::uninit()).collect();
        let free = (0..size).rev().collect();
        let used = (0..size).map(|_| false).collect();

        Self { items, free, used }
    }

    /// Inserts a value into the slab and returns its index.
    ///
    /// If a free slot is available, it is reused.
    /// Otherwise, the slab grows exponentially.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        let index = if let Some(i) = self.free.pop() {
            i
        } else {
            let len = self.items.len();
            let new_len = if len == 0 { 1 } else { 2 * len };

            self.items
                .extend((len..new_len).map(|_| MaybeUninit::<T>::uninit()));
            self.free.extend(((len + 1)..new_len).rev());
            self.used.extend((len..new_len).map(|_| false));

            len
        };

        self.items[index] = MaybeUninit::new(item);
        self.used[index] = true;

        index
    }

    /// Returns the number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.used.iter().filter(|&&u| u).count()
    }

    /// Returns a mutable reference to the value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the slot is not in use.
    pub(crate) fn get_mut(&mut self, index: usize) -> &mut T {
        assert!(index < self.items.len(), "index out of range");
        assert!(self.used[index], "slot is not set");

        unsafe { self.items[index].assume_init_mut() }
    }

    /// Removes and returns all occupied slots in index order.
    ///
    /// The slab is left empty; every slot becomes free again.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());

        for index in 0..self.items.len() {
            if self.used[index] {
                self.used[index] = false;
                self.free.push(index);

                let item = unsafe { self.items[index].assume_init_read() };
                self.items[index] = MaybeUninit::uninit();

                out.push(item);
            }
        }

        out
    }
}

impl<T> Drop for Slab<T> {
    /// Drops all initialized elements stored in the slab.
    ///
    /// Uninitialized slots are ignored.
    fn drop(&mut self) {
        for (slot, &used) in self.items.iter_mut().zip(self.used.iter()) {
            if used {
                unsafe {
                    slot.assume_init_drop();
                }
            }
        }
    }
}
