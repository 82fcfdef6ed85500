//! Channel storage backings.
//!
//! A controller's channels live either in a fixed-size slot pool embedded
//! in the controller itself, or in an externally injected heap. The
//! backing is resolved at build time from two inputs: the pool capacity
//! `N` (a const generic) and the `heap` cargo feature. The decision table:
//!
//! * `N > 0` — pool-backed, regardless of the `heap` feature;
//! * `N == 0` with `heap` enabled — heap-backed;
//! * `N == 0` without `heap` — invalid: the configuration declares a
//!   channel that can never be allocated, and constant evaluation of the
//!   controller rejects it.
//!
//! The default feature set leaves `heap` off, so every channel must name a
//! concrete bounded backing store unless a heap is opted into explicitly.
//!
//! Pool operations are *O(1)* and run in bounded time. Heap operations
//! inherit the latency contract of the injected allocator. Neither backing
//! locks internally; the controller serializes access with its own lock.

mod heap;
mod pool;

pub use self::heap::{Heap, HeapAdapter, HeapError};
pub use self::pool::{InvalidSlot, SlotPool, SlotRef};

/// Storage backing for the channels of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Fixed-size pool embedded in the controller.
    Pool,
    /// Externally injected heap.
    Heap,
}

/// Resolves the backing policy for a channel capacity.
///
/// Returns `None` for the invalid combination of zero capacity with heap
/// backing disabled.
pub const fn backing_policy(capacity: usize, heap_enabled: bool) -> Option<Policy> {
    if capacity > 0 {
        Some(Policy::Pool)
    } else if heap_enabled {
        Some(Policy::Heap)
    } else {
        None
    }
}
