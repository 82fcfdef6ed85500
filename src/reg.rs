//! CAN peripheral register model.
//!
//! Register-level access is owned by lower layers; this crate only needs a
//! handle to the register block to validate hardware context during
//! construction.

/// Peripheral register blocks sit on 1 KiB boundaries.
const BLOCK_ALIGN: usize = 0x400;

/// Handle to the memory-mapped register block of one CAN peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanRegisters {
    base: usize,
}

impl CanRegisters {
    /// Creates a handle for the register block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the base address of a CAN peripheral register block
    /// on the target device, and the block must not be claimed by another
    /// controller.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Returns the base address of the register block.
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Checks that the handle looks like a peripheral register block:
    /// non-null and block-aligned.
    pub(crate) fn is_valid(&self) -> bool {
        self.base != 0 && self.base % BLOCK_ALIGN == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity() {
        assert!(unsafe { CanRegisters::new(0x4000_6400) }.is_valid());
        assert!(!unsafe { CanRegisters::new(0) }.is_valid());
        assert!(!unsafe { CanRegisters::new(0x4000_6401) }.is_valid());
    }
}
