//! CAN controller facade.
//!
//! One [`CanController`] owns one physical peripheral: its register block,
//! the data shared by its channels, the storage backing, and the lock
//! serializing channel creation and destruction. The capacity `N` is part
//! of the type; see [`mem`](crate::mem) for how `N` and the `heap` feature
//! select the backing.
//!
//! The controller itself is built in two phases, like its channels: the
//! constructor cannot fail, and [`construct`](CanController::construct)
//! performs the fallible validation. Callers are expected to check
//! [`is_constructed`](CanController::is_constructed) before use; every
//! operation also reports `NotConstructed` rather than tolerating the
//! violation silently.

use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

use crate::config::CanConfig;
use crate::mem::{backing_policy, Heap, HeapAdapter, HeapError, Policy, SlotPool, SlotRef};
use crate::reg::CanRegisters;
use crate::resource::{CanChannel, CanData};
use crate::sync::Mutex;

/// Channel creation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CreateError {
    /// The configuration failed structural validation. Neither the lock
    /// nor the backing was touched.
    #[error("invalid channel configuration")]
    ConfigInvalid,
    /// No free slot in the pool. Nothing waits; try again after a destroy.
    #[error("channel pool exhausted")]
    PoolExhausted,
    /// The injected heap failed to allocate.
    #[error("heap allocation failed")]
    HeapAllocationFailed,
    /// Post-allocation validation of the channel failed. The storage was
    /// released before reporting; no capacity leaks.
    #[error("channel construction failed")]
    ConstructionFailed,
    /// The controller has not been constructed.
    #[error("controller is not constructed")]
    NotConstructed,
}

/// Channel destruction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DestroyError {
    /// The handle was not issued by this controller, or its slot is no
    /// longer live. No state was mutated.
    #[error("handle not owned by this controller")]
    InvalidHandle,
    /// The controller has not been constructed.
    #[error("controller is not constructed")]
    NotConstructed,
}

/// Controller construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConstructError {
    /// The register block handle failed validation.
    #[error("invalid register block")]
    InvalidRegisters,
    /// The shared peripheral clock is not plausible.
    #[error("invalid peripheral clock")]
    InvalidClock,
    /// Heap policy requires a bound heap before construction.
    #[error("no heap bound")]
    HeapNotBound,
    /// A heap reference is already bound.
    #[error("heap already bound")]
    HeapAlreadyBound,
    /// Pool policy has no use for a heap reference.
    #[error("controller is pool-backed")]
    HeapNotSupported,
    /// The controller is already constructed.
    #[error("controller is already constructed")]
    AlreadyConstructed,
}

/// Controller teardown failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DestructError {
    /// Channels are still live; destroy them first.
    #[error("channels still live")]
    ChannelsLive,
    /// The controller has not been constructed.
    #[error("controller is not constructed")]
    NotConstructed,
}

/// Handle to a live channel, issued by
/// [`create_channel`](CanController::create_channel).
///
/// The handle is the only way to reach the channel and is consumed by
/// [`destroy_channel`](CanController::destroy_channel), so a destroyed
/// channel cannot be touched again. It carries the issuing controller's
/// owner tag; passing it to a different controller is rejected, not
/// undefined.
#[derive(Debug)]
pub struct ChannelHandle {
    owner: u32,
    slot: Slot,
}

#[derive(Debug)]
enum Slot {
    Pool(SlotRef),
    Heap(NonNull<CanChannel>),
}

// The heap pointer is only dereferenced by the issuing controller, under
// its lock or via the by-value destroy that ends the handle's life.
unsafe impl Send for ChannelHandle {}
unsafe impl Sync for ChannelHandle {}

enum Backing<const N: usize> {
    Pool(SlotPool<CanChannel, N>),
    Heap(HeapAdapter),
}

struct State<const N: usize> {
    backing: Backing<N>,
    live: usize,
}

/// Driver-side owner of one physical CAN peripheral.
///
/// `N` is the channel pool capacity. With `N == 0` and the `heap` feature,
/// channels are heap-backed instead; `N == 0` without the feature fails to
/// compile.
///
/// The controller outlives all channels it issues and must be torn down
/// with [`destruct`](CanController::destruct) only after every channel is
/// destroyed.
pub struct CanController<const N: usize> {
    reg: CanRegisters,
    data: CanData,
    state: Mutex<State<N>>,
    owner: u32,
    constructed: bool,
}

/// Owner tags distinguish controllers for handle validation; never reused
/// within a process lifetime.
static NEXT_OWNER: AtomicU32 = AtomicU32::new(1);

impl<const N: usize> CanController<N> {
    /// Storage backing, resolved during constant evaluation. Instantiating
    /// a controller with zero capacity while the `heap` feature is
    /// disabled fails to compile here.
    pub const POLICY: Policy = match backing_policy(N, cfg!(feature = "heap")) {
        Some(policy) => policy,
        None => panic!(
            "CAN channel capacity is zero and the `heap` feature is disabled; \
             the channel could never be allocated"
        ),
    };

    /// Phase one: takes ownership of the register block and shared data.
    /// No fallible work.
    pub fn new(reg: CanRegisters, data: CanData) -> Self {
        let backing = match Self::POLICY {
            Policy::Pool => Backing::Pool(SlotPool::new()),
            Policy::Heap => Backing::Heap(HeapAdapter::new()),
        };
        Self {
            reg,
            data,
            state: Mutex::new(State { backing, live: 0 }),
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            constructed: false,
        }
    }

    /// Binds the injected heap. Heap policy only, exactly once, before
    /// [`construct`](CanController::construct).
    pub fn bind_heap(&mut self, heap: &'static dyn Heap) -> Result<(), ConstructError> {
        match &mut self.state.get_mut().backing {
            Backing::Pool(_) => Err(ConstructError::HeapNotSupported),
            Backing::Heap(adapter) => adapter.bind(heap).map_err(|err| match err {
                HeapError::AlreadyBound => ConstructError::HeapAlreadyBound,
                HeapError::NotBound | HeapError::Exhausted => ConstructError::HeapNotBound,
            }),
        }
    }

    /// Phase two: validates the register block and shared data, and checks
    /// that the selected backing is ready (heap bound under heap policy).
    pub fn construct(&mut self) -> Result<(), ConstructError> {
        if self.constructed {
            return Err(ConstructError::AlreadyConstructed);
        }
        if !self.reg.is_valid() {
            return Err(ConstructError::InvalidRegisters);
        }
        if !self.data.is_valid() {
            return Err(ConstructError::InvalidClock);
        }
        if let Backing::Heap(adapter) = &self.state.get_mut().backing {
            if !adapter.is_bound() {
                return Err(ConstructError::HeapNotBound);
            }
        }
        self.constructed = true;
        log::debug!("CAN controller {} constructed, capacity {}", self.owner, N);
        Ok(())
    }

    /// Returns `true` after [`construct`](CanController::construct) has
    /// succeeded. No side effects.
    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Creates a new channel.
    ///
    /// Validates `config` structurally first; an invalid configuration is
    /// rejected before the lock or the backing is touched. Otherwise the
    /// channel storage is acquired under the lock, the channel is built in
    /// place and its construction step runs; if that step fails, the
    /// storage is released again before the error is reported.
    pub fn create_channel(&self, config: CanConfig) -> Result<ChannelHandle, CreateError> {
        if !self.constructed {
            return Err(CreateError::NotConstructed);
        }
        if config.validate().is_err() {
            return Err(CreateError::ConfigInvalid);
        }
        let mut state = self.state.lock();
        let slot = match &mut state.backing {
            Backing::Pool(pool) => {
                let (slot_ref, channel) = match pool.insert(CanChannel::new(config)) {
                    Ok(entry) => entry,
                    Err(_) => {
                        log::warn!("CAN controller {}: channel pool exhausted", self.owner);
                        return Err(CreateError::PoolExhausted);
                    }
                };
                if channel.construct(&self.reg, &self.data).is_err() {
                    let removed = pool.remove(slot_ref);
                    debug_assert!(removed.is_ok());
                    return Err(CreateError::ConstructionFailed);
                }
                Slot::Pool(slot_ref)
            }
            Backing::Heap(adapter) => {
                let layout = Layout::new::<CanChannel>();
                let ptr = match adapter.alloc(layout) {
                    Ok(ptr) => ptr.cast::<CanChannel>(),
                    Err(_) => {
                        log::warn!("CAN controller {}: heap allocation failed", self.owner);
                        return Err(CreateError::HeapAllocationFailed);
                    }
                };
                // Safety: the block was just allocated for this layout and
                // is exclusively ours until it becomes part of a handle.
                unsafe { ptr.as_ptr().write(CanChannel::new(config)) };
                let channel = unsafe { &mut *ptr.as_ptr() };
                if channel.construct(&self.reg, &self.data).is_err() {
                    unsafe {
                        ptr.as_ptr().drop_in_place();
                        adapter.dealloc(ptr.cast(), layout);
                    }
                    return Err(CreateError::ConstructionFailed);
                }
                Slot::Heap(ptr)
            }
        };
        state.live += 1;
        log::debug!("CAN controller {}: channel created, {} live", self.owner, state.live);
        Ok(ChannelHandle { owner: self.owner, slot })
    }

    /// Destroys a channel, consuming its handle.
    ///
    /// The handle must have been issued by this controller; a foreign or
    /// stale handle is rejected with [`DestroyError::InvalidHandle`] and no
    /// state is mutated. Otherwise the channel is torn down explicitly and
    /// its storage returns to the backing.
    pub fn destroy_channel(&self, handle: ChannelHandle) -> Result<(), DestroyError> {
        if !self.constructed {
            return Err(DestroyError::NotConstructed);
        }
        if handle.owner != self.owner {
            return Err(DestroyError::InvalidHandle);
        }
        let mut state = self.state.lock();
        match (&mut state.backing, handle.slot) {
            (Backing::Pool(pool), Slot::Pool(slot_ref)) => {
                let mut channel =
                    pool.remove(slot_ref).map_err(|_| DestroyError::InvalidHandle)?;
                channel.deconstruct();
            }
            (Backing::Heap(adapter), Slot::Heap(ptr)) => {
                // Safety: the owner tag proves the pointer came from this
                // controller's adapter, and the by-value handle guarantees
                // the block is still live.
                let mut channel = unsafe { ptr.as_ptr().read() };
                channel.deconstruct();
                unsafe { adapter.dealloc(ptr.cast(), Layout::new::<CanChannel>()) };
            }
            _ => return Err(DestroyError::InvalidHandle),
        }
        state.live -= 1;
        log::debug!("CAN controller {}: channel destroyed, {} live", self.owner, state.live);
        Ok(())
    }

    /// Runs `f` against the channel behind `handle`.
    ///
    /// Returns `None` for a foreign or stale handle or before
    /// construction.
    pub fn with_channel<R>(
        &self,
        handle: &ChannelHandle,
        f: impl FnOnce(&CanChannel) -> R,
    ) -> Option<R> {
        if !self.constructed || handle.owner != self.owner {
            return None;
        }
        let state = self.state.lock();
        match (&state.backing, &handle.slot) {
            (Backing::Pool(pool), Slot::Pool(slot_ref)) => pool.get(*slot_ref).map(f),
            (Backing::Heap(_), Slot::Heap(ptr)) => {
                // Safety: owner-tagged live handle, see destroy_channel.
                Some(f(unsafe { ptr.as_ref() }))
            }
            _ => None,
        }
    }

    /// Returns the number of live channels.
    pub fn live_channels(&self) -> usize {
        self.state.lock().live
    }

    /// Returns the channel capacity `N`.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Tears the controller down.
    ///
    /// Refused while channels are live: the backing (and, under heap
    /// policy, the bound heap) may only be released once every channel has
    /// been destroyed. On success the controller returns to the
    /// unconstructed state.
    pub fn destruct(&mut self) -> Result<(), DestructError> {
        if !self.constructed {
            return Err(DestructError::NotConstructed);
        }
        let state = self.state.get_mut();
        if state.live > 0 {
            return Err(DestructError::ChannelsLive);
        }
        if let Backing::Heap(adapter) = &mut state.backing {
            let _ = adapter.unbind();
        }
        self.constructed = false;
        log::debug!("CAN controller {} destructed", self.owner);
        Ok(())
    }
}

#[cfg(not(feature = "heap"))]
mod compile_tests {
    //! Zero capacity without the `heap` feature declares a channel that
    //! could never be backed by memory; constant evaluation of `POLICY`
    //! must reject the instantiation.
    //!
    //! ```compile_fail
    //! use candrv::{CanController, CanData, CanRegisters};
    //!
    //! fn main() {
    //!     let reg = unsafe { CanRegisters::new(0x4000_6400) };
    //!     let _can = CanController::<0>::new(reg, CanData::new(80_000_000));
    //! }
    //! ```
}
