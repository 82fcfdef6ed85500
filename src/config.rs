//! Channel configuration.

use thiserror::Error;

/// Slowest supported bit rate, bit/s.
pub const MIN_BIT_RATE: u32 = 1_000;

/// Fastest supported bit rate for classic CAN, bit/s.
pub const MAX_BIT_RATE: u32 = 1_000_000;

/// Operating mode of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Transmit and receive on the bus.
    #[default]
    Normal,
    /// Frames are looped back internally and also sent to the bus.
    Loopback,
    /// Receive only, no dominant bits are driven.
    Silent,
    /// Loopback without driving the bus.
    SilentLoopback,
}

/// Configuration of one CAN channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanConfig {
    /// Nominal bit rate, bit/s.
    pub bit_rate: u32,
    /// Operating mode.
    pub mode: Mode,
    /// Retransmit frames that lost arbitration or hit an error.
    pub auto_retransmit: bool,
}

/// Structural configuration failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Bit rate is zero or outside the supported range.
    #[error("bit rate outside the supported range")]
    BitRateOutOfRange,
}

impl CanConfig {
    /// Creates a configuration with the given bit rate and the default
    /// mode.
    pub const fn new(bit_rate: u32) -> Self {
        Self { bit_rate, mode: Mode::Normal, auto_retransmit: true }
    }

    /// Checks the configuration structurally, without touching hardware
    /// context. Whether the bit rate is actually reachable from the
    /// peripheral clock is decided later, during channel construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bit_rate < MIN_BIT_RATE || self.bit_rate > MAX_BIT_RATE {
            return Err(ConfigError::BitRateOutOfRange);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_rates() {
        for bit_rate in [125_000, 250_000, 500_000, 1_000_000] {
            assert_eq!(CanConfig::new(bit_rate).validate(), Ok(()));
        }
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(CanConfig::new(0).validate(), Err(ConfigError::BitRateOutOfRange));
        assert_eq!(CanConfig::new(999).validate(), Err(ConfigError::BitRateOutOfRange));
        assert_eq!(CanConfig::new(2_000_000).validate(), Err(ConfigError::BitRateOutOfRange));
    }
}
