//! CAN controller driver core with deterministic channel allocation.
//!
//! This crate manages the lifecycle of the channel objects of a CAN
//! peripheral under hard embedded constraints: no unbounded dynamic memory
//! unless explicitly configured, deterministic allocation and release
//! timing, and failures reported through return values only. It is a
//! passive library: no threads or tasks are spawned, and the only blocking
//! point is a short-held spin lock around channel creation and destruction.
//!
//! Channel storage comes from one of two backings, selected at build time:
//!
//! * **Pool** — a fixed array of `N` channel slots inside the controller,
//!   tracked by a free-index stack. All operations are *O(1)*.
//! * **Heap** — an externally injected allocator, used only when `N == 0`
//!   and the `heap` cargo feature is enabled.
//!
//! Declaring `N == 0` without the `heap` feature is rejected during
//! constant evaluation: a channel that can never be backed by memory is a
//! configuration error, not a runtime condition.
//!
//! # Usage
//!
//! ```
//! use candrv::{CanConfig, CanController, CanData, CanRegisters};
//!
//! // One controller per physical peripheral. The capacity is part of the
//! // type: here up to two channels, pool-backed.
//! let reg = unsafe { CanRegisters::new(0x4000_6400) };
//! let mut can = CanController::<2>::new(reg, CanData::new(80_000_000));
//! can.construct().unwrap();
//!
//! let handle = can.create_channel(CanConfig::new(500_000)).unwrap();
//! assert_eq!(can.live_channels(), 1);
//! can.destroy_channel(handle).unwrap();
//! ```
//!
//! Heap-backed operation (`N == 0`, `heap` feature) binds the allocator
//! before construction:
//!
//! ```ignore
//! let mut can = CanController::<0>::new(reg, CanData::new(80_000_000));
//! can.bind_heap(&MY_HEAP)?;
//! can.construct()?;
//! ```

#![warn(missing_docs, unsafe_op_in_unsafe_fn)]
#![no_std]

pub mod config;
pub mod controller;
pub mod mem;
pub mod reg;
pub mod resource;
pub mod sync;

pub use self::config::{CanConfig, Mode};
pub use self::controller::{CanController, ChannelHandle};
pub use self::reg::CanRegisters;
pub use self::resource::{CanChannel, CanData};
