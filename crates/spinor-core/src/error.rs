//! Error types for spinor-core
//!
//! This module provides a no_std compatible error type shared by the SPI-NOR
//! driver, the flash-programming algorithm and the EEPROM driver.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Byte exchange or chip-select control failed at the physical layer
    Transport,

    /// Identification code is not present in the chip table
    UnknownDevice {
        /// Manufacturer/device code read from the chip
        code: u16,
    },

    /// The device stayed busy longer than the poll policy allows
    DeviceTimeout,

    /// Address or span is beyond the device capacity
    AddressOutOfRange,

    /// Erase range is not aligned to the erase granularity
    NotAligned,

    /// A single page program would cross a page boundary
    PageBoundary,

    /// Geometry or configuration violates the size invariants
    InvalidGeometry,

    /// Provided buffer is too small for the operation
    BufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport error"),
            Self::UnknownDevice { code } => {
                write!(f, "unknown device (identification code 0x{:04X})", code)
            }
            Self::DeviceTimeout => write!(f, "device did not become ready in time"),
            Self::AddressOutOfRange => write!(f, "address out of range"),
            Self::NotAligned => write!(f, "range not aligned to erase unit"),
            Self::PageBoundary => write!(f, "page program crosses a page boundary"),
            Self::InvalidGeometry => write!(f, "invalid device geometry"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_unknown_device_display() {
        let err = Error::UnknownDevice { code: 0xEF42 };
        assert_eq!(
            err.to_string(),
            "unknown device (identification code 0xEF42)"
        );
    }
}
