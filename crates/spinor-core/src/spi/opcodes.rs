//! Standard SPI NOR flash opcodes
//!
//! Single-byte command values shared by the 25-series parts, plus the
//! per-family [`OpcodeTable`] the driver dispatches through.

use super::StatusFlags;

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any program/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + memory type + capacity)
pub const RDID: u8 = 0x9F;
/// Read Electronic Manufacturer & Device ID (3 address bytes, then 2 ID bytes)
pub const REMS: u8 = 0x90;

// ============================================================================
// Read / program
// ============================================================================

/// Read Data
pub const READ: u8 = 0x03;
/// Page Program
pub const PP: u8 = 0x02;

// ============================================================================
// Erase commands
// ============================================================================

/// Sector Erase 4KB
pub const SE_20: u8 = 0x20;
/// Block Erase 64KB
pub const BE_D8: u8 = 0xD8;
/// Chip Erase (0x60 variant)
pub const CE_60: u8 = 0x60;
/// Chip Erase (0xC7 variant)
pub const CE_C7: u8 = 0xC7;

// ============================================================================
// Per-family opcode table
// ============================================================================

/// Immutable opcode record for one device family
///
/// The protocol layer never hardcodes a command byte; it always goes through
/// the table of the identified family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeTable {
    /// Set the write enable latch
    pub write_enable: u8,
    /// Read the status register holding the busy bit
    pub read_status: u8,
    /// Program up to one page
    pub page_program: u8,
    /// Erase the smallest erase unit
    pub sector_erase: u8,
    /// Erase the intermediate erase unit
    pub block_erase: u8,
    /// Erase the whole array
    pub chip_erase: u8,
    /// Continuous read
    pub read_data: u8,
    /// Manufacturer/device identification
    pub read_id: u8,
    /// Status bit that is set while an internal operation runs
    pub busy: StatusFlags,
}

impl OpcodeTable {
    /// Winbond W25Q / GigaDevice GD25Q command set
    pub const W25Q: Self = Self {
        write_enable: WREN,
        read_status: RDSR,
        page_program: PP,
        sector_erase: SE_20,
        block_erase: BE_D8,
        chip_erase: CE_C7,
        read_data: READ,
        read_id: REMS,
        busy: StatusFlags::WIP,
    };

    /// Macronix MX25L command set (chip erase uses 0x60)
    pub const MX25L: Self = Self {
        chip_erase: CE_60,
        ..Self::W25Q
    };
}
