use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

#[cfg(not(loom))]
type AtomicBool = core::sync::atomic::AtomicBool;
#[cfg(loom)]
type AtomicBool = loom::sync::atomic::AtomicBool;

use core::sync::atomic::Ordering::{Acquire, Release};

/// A mutual exclusion primitive useful for protecting shared data.
///
/// Acquisition spins; the lock is intended for short critical sections
/// only, such as the channel create/destroy bodies of a controller. No
/// wait queue is maintained and no priority inversion handling is
/// provided.
pub struct Mutex<T> {
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

/// An RAII implementation of a "scoped lock" of a mutex. When this
/// structure is dropped (falls out of scope), the lock will be unlocked.
///
/// The data protected by the mutex can be accessed through this guard via
/// its `Deref` and `DerefMut` implementations.
#[must_use]
pub struct MutexGuard<'a, T> {
    lock: &'a Mutex<T>,
    // Keep the guard on the acquiring thread.
    not_send: PhantomData<*mut ()>,
}

unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

unsafe impl<T: Sync> Sync for MutexGuard<'_, T> {}

impl<T> Mutex<T> {
    /// Creates a new mutex in an unlocked state ready for use.
    #[cfg(not(loom))]
    #[inline]
    pub const fn new(data: T) -> Self {
        Self { lock: AtomicBool::new(false), data: UnsafeCell::new(data) }
    }

    /// Creates a new mutex in an unlocked state ready for use.
    #[cfg(loom)]
    pub fn new(data: T) -> Self {
        Self { lock: AtomicBool::new(false), data: UnsafeCell::new(data) }
    }

    /// Attempts to acquire this lock.
    ///
    /// If the lock could not be acquired at this time, then `None` is
    /// returned. Otherwise, a RAII guard is returned. The lock will be
    /// unlocked when the guard is dropped.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self.lock.swap(true, Acquire) {
            None
        } else {
            Some(MutexGuard { lock: self, not_send: PhantomData })
        }
    }

    /// Acquires this lock, spinning until it becomes available.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                break guard;
            }
            #[cfg(not(loom))]
            core::hint::spin_loop();
            #[cfg(loom)]
            loom::thread::yield_now();
        }
    }

    /// Consumes this mutex, returning the underlying data.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }

    /// Returns a mutable reference to the underlying data.
    ///
    /// Since this call borrows the `Mutex` mutably, no actual locking needs
    /// to take place: the mutable borrow statically guarantees no locks
    /// exist.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        unsafe { &mut *self.data.get() }
    }
}

impl<T: Default> Default for Mutex<T> {
    #[inline]
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.lock.store(false, Release);
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn try_lock_excludes() {
        let mutex = Mutex::new(0_u32);
        let guard = mutex.try_lock().unwrap();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }

    #[test]
    fn guard_derefs_data() {
        let mutex = Mutex::new(7_u32);
        {
            let mut guard = mutex.lock();
            assert_eq!(*guard, 7);
            *guard = 11;
        }
        assert_eq!(mutex.into_inner(), 11);
    }

    #[test]
    fn get_mut_bypasses_lock() {
        let mut mutex = Mutex::new(0_u32);
        *mutex.get_mut() = 3;
        assert_eq!(*mutex.lock(), 3);
    }
}
