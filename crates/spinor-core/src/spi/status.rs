//! Status register 1 bits

use bitflags::bitflags;

bitflags! {
    /// Status register 1 flags common to 25-series NOR flash
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// Write In Progress (busy)
        const WIP  = 1 << 0;
        /// Write Enable Latch
        const WEL  = 1 << 1;
        /// Block Protect bit 0
        const BP0  = 1 << 2;
        /// Block Protect bit 1
        const BP1  = 1 << 3;
        /// Block Protect bit 2
        const BP2  = 1 << 4;
        /// Top/Bottom protect
        const TB   = 1 << 5;
        /// Sector/Block protect
        const SEC  = 1 << 6;
        /// Status Register Protect 0
        const SRP0 = 1 << 7;
    }
}

impl StatusFlags {
    /// Decode a raw status byte, keeping unknown bits
    pub const fn from_raw(value: u8) -> Self {
        Self::from_bits_retain(value)
    }
}
