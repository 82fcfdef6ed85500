//! CAN channel objects.
//!
//! A channel is built in two phases: a trivial constructor that cannot
//! fail, followed by an explicit construction step that validates hardware
//! context and derives the bit timing. A channel is usable only after the
//! second phase succeeds; every operation checks the constructed flag
//! first.

use thiserror::Error;

use crate::config::CanConfig;
use crate::reg::CanRegisters;

/// The nominal bit is sampled as 16 time quanta: sync (1) + propagation
/// and phase 1 (13) + phase 2 (2), an 87.5% sample point.
const BIT_QUANTA: u32 = 16;

/// Largest bit rate prescaler the peripheral supports.
const MAX_PRESCALER: u32 = 1_024;

/// Data shared by all channels of one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanData {
    clock_hz: u32,
}

impl CanData {
    /// Creates shared data with the peripheral kernel clock in Hz.
    pub const fn new(clock_hz: u32) -> Self {
        Self { clock_hz }
    }

    /// Returns the peripheral kernel clock in Hz.
    pub const fn clock_hz(&self) -> u32 {
        self.clock_hz
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.clock_hz != 0
    }
}

/// Derived nominal bit timing of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Bit rate prescaler dividing the peripheral clock down to the time
    /// quantum.
    pub prescaler: u16,
}

/// Channel construction failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// The register block handle failed validation.
    #[error("invalid register block")]
    InvalidRegisters,
    /// The peripheral clock cannot produce the requested bit rate with an
    /// integer prescaler.
    #[error("bit rate unreachable from the peripheral clock")]
    UnreachableBitRate,
    /// The channel has not been constructed.
    #[error("channel is not constructed")]
    NotConstructed,
}

/// One CAN channel of a controller.
///
/// Created by [`CanController::create_channel`], destroyed by
/// [`CanController::destroy_channel`]; a channel never outlives its
/// controller.
///
/// [`CanController::create_channel`]: crate::controller::CanController::create_channel
/// [`CanController::destroy_channel`]: crate::controller::CanController::destroy_channel
#[derive(Debug)]
pub struct CanChannel {
    config: CanConfig,
    timing: Option<BitTiming>,
    constructed: bool,
}

impl CanChannel {
    /// Phase one: stores the configuration. No fallible work.
    pub(crate) fn new(config: CanConfig) -> Self {
        Self { config, timing: None, constructed: false }
    }

    /// Phase two: validates the hardware context and derives the bit
    /// timing, flipping the constructed flag only on success.
    pub(crate) fn construct(
        &mut self,
        reg: &CanRegisters,
        data: &CanData,
    ) -> Result<(), ChannelError> {
        if !reg.is_valid() {
            return Err(ChannelError::InvalidRegisters);
        }
        self.timing = Some(bit_timing(data.clock_hz(), self.config.bit_rate)?);
        self.constructed = true;
        Ok(())
    }

    /// Explicit teardown before the storage is released.
    pub(crate) fn deconstruct(&mut self) {
        self.constructed = false;
        self.timing = None;
    }

    /// Returns `true` after phase two has succeeded.
    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Returns the channel configuration.
    pub fn config(&self) -> &CanConfig {
        &self.config
    }

    /// Returns the derived bit timing.
    pub fn bit_timing(&self) -> Result<BitTiming, ChannelError> {
        if !self.constructed {
            return Err(ChannelError::NotConstructed);
        }
        self.timing.ok_or(ChannelError::NotConstructed)
    }
}

/// Derives the bit timing for `bit_rate` from the peripheral clock.
///
/// The clock must divide into whole time quanta: an integer prescaler in
/// `1..=MAX_PRESCALER` such that `clock_hz == prescaler * bit_rate *
/// BIT_QUANTA`.
fn bit_timing(clock_hz: u32, bit_rate: u32) -> Result<BitTiming, ChannelError> {
    let quanta_hz = match bit_rate.checked_mul(BIT_QUANTA) {
        Some(quanta_hz) if quanta_hz != 0 => quanta_hz,
        _ => return Err(ChannelError::UnreachableBitRate),
    };
    if clock_hz % quanta_hz != 0 {
        return Err(ChannelError::UnreachableBitRate);
    }
    let prescaler = clock_hz / quanta_hz;
    if prescaler == 0 || prescaler > MAX_PRESCALER {
        return Err(ChannelError::UnreachableBitRate);
    }
    Ok(BitTiming { prescaler: prescaler as u16 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_from_even_clock() {
        // 80 MHz / (500 kbit/s * 16 tq) = 10.
        assert_eq!(bit_timing(80_000_000, 500_000), Ok(BitTiming { prescaler: 10 }));
        assert_eq!(bit_timing(16_000_000, 1_000_000), Ok(BitTiming { prescaler: 1 }));
    }

    #[test]
    fn timing_rejects_fractional_prescaler() {
        assert_eq!(bit_timing(10_000_000, 300_000), Err(ChannelError::UnreachableBitRate));
    }

    #[test]
    fn timing_rejects_out_of_range_prescaler() {
        // 32.768 MHz / (1 kbit/s * 16 tq) = 2048, past the divider.
        assert_eq!(bit_timing(32_768_000, 1_000), Err(ChannelError::UnreachableBitRate));
    }

    #[test]
    fn two_phase_construction() {
        let reg = unsafe { CanRegisters::new(0x4000_6400) };
        let data = CanData::new(80_000_000);
        let mut channel = CanChannel::new(CanConfig::new(500_000));
        assert!(!channel.is_constructed());
        assert_eq!(channel.bit_timing(), Err(ChannelError::NotConstructed));
        channel.construct(&reg, &data).unwrap();
        assert!(channel.is_constructed());
        assert_eq!(channel.bit_timing(), Ok(BitTiming { prescaler: 10 }));
        channel.deconstruct();
        assert!(!channel.is_constructed());
    }

    #[test]
    fn construct_rejects_bad_registers() {
        let reg = unsafe { CanRegisters::new(0) };
        let data = CanData::new(80_000_000);
        let mut channel = CanChannel::new(CanConfig::new(500_000));
        assert_eq!(channel.construct(&reg, &data), Err(ChannelError::InvalidRegisters));
        assert!(!channel.is_constructed());
    }
}
