//! Synchronization primitives.

mod mutex;

pub use self::mutex::{Mutex, MutexGuard};
