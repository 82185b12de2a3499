//! Address width types

/// Mask applied to every address sent with a 3-byte address phase
pub const ADDRESS_MASK_3B: u32 = 0x00FF_FFFF;

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
}

impl AddressWidth {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
        }
    }

    /// Encode an address into bytes, MSB first
    ///
    /// Bits above the address width are dropped: on a 3-byte bus an address
    /// at or above 16 MiB is indistinguishable from its low 24 bits.
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        match self {
            Self::None => {}
            Self::ThreeByte => {
                buf[0] = (address >> 16) as u8;
                buf[1] = (address >> 8) as u8;
                buf[2] = address as u8;
            }
        }
    }
}
