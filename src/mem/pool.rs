use core::array;
use thiserror::Error;

/// Fixed-size slot pool holding up to `N` values of type `T`.
///
/// The pool is a contiguous slot array addressed by small integer indices,
/// with a separate free-index stack. Free indices are reused LIFO, so a
/// freed slot is reclaimed by the next insert. Every operation is *O(1)*
/// and runs in bounded time; the capacity is fixed for the lifetime of the
/// pool and never grows.
///
/// Each slot carries a generation counter, bumped on removal. A [`SlotRef`]
/// names a slot index together with the generation it was issued for, so a
/// reference that outlives its entry is detected instead of silently
/// aliasing whatever reuses the slot.
///
/// The pool itself performs no locking. Callers serialize access
/// externally.
pub struct SlotPool<T, const N: usize> {
    slots: [Option<T>; N],
    generations: [u32; N],
    free: [usize; N],
    free_len: usize,
}

/// Reference to a live slot: index plus the generation it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    index: usize,
    generation: u32,
}

impl SlotRef {
    /// Returns the slot index.
    pub fn index(self) -> usize {
        self.index
    }
}

/// The slot reference does not name a live entry of this pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("invalid slot reference")]
pub struct InvalidSlot;

impl<T, const N: usize> SlotPool<T, N> {
    /// Creates an empty pool with all `N` slots free.
    pub fn new() -> Self {
        Self {
            slots: array::from_fn(|_| None),
            generations: [0; N],
            free: array::from_fn(|index| index),
            free_len: N,
        }
    }

    /// Returns the fixed capacity `N`.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns the number of occupied slots. Never exceeds `N`.
    pub fn len(&self) -> usize {
        N - self.free_len
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.free_len == N
    }

    /// Returns `true` if every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.free_len == 0
    }

    /// Places `value` into a free slot.
    ///
    /// On success returns the slot reference and a mutable borrow of the
    /// stored value, so the caller can finish in-place initialization. If
    /// the pool is exhausted the value is handed back unchanged; there is
    /// no waiting and no retry.
    pub fn insert(&mut self, value: T) -> Result<(SlotRef, &mut T), T> {
        if self.free_len == 0 {
            return Err(value);
        }
        self.free_len -= 1;
        let index = self.free[self.free_len];
        debug_assert!(self.slots[index].is_none());
        let slot = self.slots[index].insert(value);
        let slot_ref = SlotRef { index, generation: self.generations[index] };
        Ok((slot_ref, slot))
    }

    /// Takes the value out of the slot named by `slot_ref`, returning the
    /// slot to the free stack.
    ///
    /// Fails with [`InvalidSlot`] if the reference is out of bounds, names
    /// a free slot, or carries a stale generation.
    pub fn remove(&mut self, slot_ref: SlotRef) -> Result<T, InvalidSlot> {
        let SlotRef { index, generation } = slot_ref;
        if index >= N || self.generations[index] != generation {
            return Err(InvalidSlot);
        }
        match self.slots[index].take() {
            Some(value) => {
                self.generations[index] = self.generations[index].wrapping_add(1);
                self.free[self.free_len] = index;
                self.free_len += 1;
                Ok(value)
            }
            None => Err(InvalidSlot),
        }
    }

    /// Returns a shared borrow of the value named by `slot_ref`, or `None`
    /// if the reference is not live.
    pub fn get(&self, slot_ref: SlotRef) -> Option<&T> {
        let SlotRef { index, generation } = slot_ref;
        if index >= N || self.generations[index] != generation {
            return None;
        }
        self.slots[index].as_ref()
    }

    /// Returns a mutable borrow of the value named by `slot_ref`, or `None`
    /// if the reference is not live.
    pub fn get_mut(&mut self, slot_ref: SlotRef) -> Option<&mut T> {
        let SlotRef { index, generation } = slot_ref;
        if index >= N || self.generations[index] != generation {
            return None;
        }
        self.slots[index].as_mut()
    }
}

impl<T, const N: usize> Default for SlotPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
