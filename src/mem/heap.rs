use core::alloc::Layout;
use core::ptr::NonNull;
use thiserror::Error;

/// An externally owned heap supplying raw memory blocks.
///
/// The implementation decides its own latency and thread-safety contract;
/// this crate treats both as bounded-but-opaque and never calls the heap
/// outside the controller's lock.
pub trait Heap: Sync {
    /// Allocates a block for `layout`, or `None` if the heap is exhausted.
    fn alloc(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Releases a block previously returned by [`alloc`](Heap::alloc).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `alloc` on this same heap with the
    /// same `layout`, and must not be used afterwards.
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Adapter binding a controller to an injected [`Heap`].
///
/// The adapter has an explicit lifecycle: [`bind`](HeapAdapter::bind) must
/// run exactly once before the first allocation, and
/// [`unbind`](HeapAdapter::unbind) only after every block has been
/// released. The controller enforces the latter by refusing teardown while
/// channels are live.
///
/// The adapter performs no locking and no retries of its own; it only
/// delegates.
pub struct HeapAdapter {
    heap: Option<&'static dyn Heap>,
}

/// Heap adapter failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeapError {
    /// No heap reference is bound.
    #[error("no heap bound")]
    NotBound,
    /// A heap reference is already bound.
    #[error("heap already bound")]
    AlreadyBound,
    /// The delegate heap failed to allocate.
    #[error("heap exhausted")]
    Exhausted,
}

impl HeapAdapter {
    /// Creates an adapter with no heap bound.
    pub const fn new() -> Self {
        Self { heap: None }
    }

    /// Stores the heap reference. Binding twice is a usage error.
    pub fn bind(&mut self, heap: &'static dyn Heap) -> Result<(), HeapError> {
        if self.heap.is_some() {
            return Err(HeapError::AlreadyBound);
        }
        self.heap = Some(heap);
        Ok(())
    }

    /// Clears the heap reference.
    ///
    /// The caller must guarantee that every block obtained through this
    /// adapter has been released.
    pub fn unbind(&mut self) -> Result<(), HeapError> {
        if self.heap.take().is_none() {
            return Err(HeapError::NotBound);
        }
        Ok(())
    }

    /// Returns `true` if a heap reference is bound.
    pub fn is_bound(&self) -> bool {
        self.heap.is_some()
    }

    /// Allocates a block from the bound heap.
    pub fn alloc(&self, layout: Layout) -> Result<NonNull<u8>, HeapError> {
        let heap = self.heap.ok_or(HeapError::NotBound)?;
        heap.alloc(layout).ok_or(HeapError::Exhausted)
    }

    /// Releases a block back to the bound heap.
    ///
    /// # Safety
    ///
    /// `ptr` must have been obtained from [`alloc`](HeapAdapter::alloc) on
    /// this adapter with the same `layout`, the heap must still be bound,
    /// and the block must not be used afterwards. Releasing a foreign
    /// address is a caller contract violation.
    pub unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) {
        debug_assert!(self.heap.is_some());
        if let Some(heap) = self.heap {
            unsafe { heap.dealloc(ptr, layout) };
        }
    }
}

impl Default for HeapAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::UnsafeCell;
    use core::sync::atomic::{AtomicUsize, Ordering};

    // One static block, handed out at most once at a time.
    struct OneBlockHeap {
        taken: AtomicUsize,
    }

    struct Block(UnsafeCell<[u8; 64]>);

    // Exclusive handout is enforced by OneBlockHeap::taken.
    unsafe impl Sync for Block {}

    static BLOCK: Block = Block(UnsafeCell::new([0; 64]));

    impl Heap for OneBlockHeap {
        fn alloc(&self, layout: Layout) -> Option<NonNull<u8>> {
            if layout.size() > 64 {
                return None;
            }
            if self.taken.swap(1, Ordering::Relaxed) == 1 {
                return None;
            }
            NonNull::new(BLOCK.0.get().cast::<u8>())
        }

        unsafe fn dealloc(&self, _ptr: NonNull<u8>, _layout: Layout) {
            self.taken.store(0, Ordering::Relaxed);
        }
    }

    static HEAP: OneBlockHeap = OneBlockHeap { taken: AtomicUsize::new(0) };

    #[test]
    fn alloc_before_bind_fails() {
        let adapter = HeapAdapter::new();
        assert!(!adapter.is_bound());
        let layout = Layout::from_size_align(8, 8).unwrap();
        assert_eq!(adapter.alloc(layout), Err(HeapError::NotBound));
    }

    #[test]
    fn bind_unbind_lifecycle() {
        let mut adapter = HeapAdapter::new();
        assert_eq!(adapter.unbind(), Err(HeapError::NotBound));
        adapter.bind(&HEAP).unwrap();
        assert!(adapter.is_bound());
        assert_eq!(adapter.bind(&HEAP), Err(HeapError::AlreadyBound));
        adapter.unbind().unwrap();
        assert!(!adapter.is_bound());
    }

    #[test]
    fn delegates_exhaustion() {
        let mut adapter = HeapAdapter::new();
        adapter.bind(&HEAP).unwrap();
        let layout = Layout::from_size_align(8, 1).unwrap();
        let ptr = adapter.alloc(layout).unwrap();
        assert_eq!(adapter.alloc(layout), Err(HeapError::Exhausted));
        unsafe { adapter.dealloc(ptr, layout) };
        let ptr = adapter.alloc(layout).unwrap();
        unsafe { adapter.dealloc(ptr, layout) };
    }
}
