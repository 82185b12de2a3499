//! Flash chip type definitions

use crate::error::{Error, Result};
use crate::spi::OpcodeTable;

/// Page size shared by every supported 25-series family
pub const PAGE_SIZE: u32 = 256;
/// Smallest erase unit (4 KiB sector)
pub const SECTOR_SIZE: u32 = 4 * 1024;
/// Intermediate erase unit (64 KiB block)
pub const BLOCK_SIZE: u32 = 64 * 1024;
/// Value every byte reads back as after an erase
pub const ERASED_VALUE: u8 = 0xFF;

/// Owned device name, no_std friendly
pub type DeviceName = heapless::String<32>;

/// Build a [`DeviceName`], truncating names that do not fit
pub fn device_name(name: &str) -> DeviceName {
    let mut out = DeviceName::new();
    for ch in name.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Device family
///
/// Selects the opcode table and the fixed page/sector/block sizes. Adding a
/// family means adding a variant here, not branching inside the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
pub enum DeviceFamily {
    /// Winbond W25Q series
    Winbond,
    /// Macronix MX25L series
    Macronix,
    /// GigaDevice GD25Q series
    GigaDevice,
}

impl DeviceFamily {
    /// Vendor name
    pub const fn vendor(&self) -> &'static str {
        match self {
            Self::Winbond => "Winbond",
            Self::Macronix => "Macronix",
            Self::GigaDevice => "GigaDevice",
        }
    }

    /// JEDEC manufacturer ID
    pub const fn manufacturer_id(&self) -> u8 {
        match self {
            Self::Winbond => 0xEF,
            Self::Macronix => 0xC2,
            Self::GigaDevice => 0xC8,
        }
    }

    /// Family for a JEDEC manufacturer ID
    pub const fn from_manufacturer_id(id: u8) -> Option<Self> {
        match id {
            0xEF => Some(Self::Winbond),
            0xC2 => Some(Self::Macronix),
            0xC8 => Some(Self::GigaDevice),
            _ => None,
        }
    }

    /// Command set of this family
    pub const fn opcodes(&self) -> &'static OpcodeTable {
        match self {
            Self::Winbond | Self::GigaDevice => &OpcodeTable::W25Q,
            Self::Macronix => &OpcodeTable::MX25L,
        }
    }

    /// Geometry of a part of this family with the given capacity
    pub fn geometry(&self, capacity: u32) -> Result<FlashGeometry> {
        FlashGeometry::new(capacity, PAGE_SIZE, SECTOR_SIZE, BLOCK_SIZE)
    }
}

/// Device geometry derived from identification
///
/// Immutable once built: `capacity` is a multiple of `sector_size`,
/// `sector_size` a multiple of `page_size`, and `block_size` a multiple of
/// `sector_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashGeometry {
    capacity: u32,
    page_size: u32,
    sector_size: u32,
    block_size: u32,
}

impl FlashGeometry {
    /// Build a geometry, checking the size invariants
    pub fn new(capacity: u32, page_size: u32, sector_size: u32, block_size: u32) -> Result<Self> {
        let geometry = Self {
            capacity,
            page_size,
            sector_size,
            block_size,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.sector_size == 0 || self.block_size == 0 {
            return Err(Error::InvalidGeometry);
        }
        if self.capacity == 0
            || self.capacity % self.sector_size != 0
            || self.sector_size % self.page_size != 0
            || self.block_size % self.sector_size != 0
        {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Total size in bytes
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Program unit in bytes
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Smallest erase unit in bytes
    pub const fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Intermediate erase unit in bytes
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Number of pages
    pub const fn page_count(&self) -> u32 {
        self.capacity / self.page_size
    }

    /// Number of sectors
    pub const fn sector_count(&self) -> u32 {
        self.capacity / self.sector_size
    }

    /// Number of blocks (a trailing partial block is not counted)
    pub const fn block_count(&self) -> u32 {
        self.capacity / self.block_size
    }

    /// Start of the sector containing `addr`
    pub const fn sector_base(&self, addr: u32) -> u32 {
        addr - addr % self.sector_size
    }

    /// Start of the block containing `addr`
    pub const fn block_base(&self, addr: u32) -> u32 {
        addr - addr % self.block_size
    }

    /// Check that `[addr, addr + len)` lies inside the device
    pub fn contains(&self, addr: u32, len: usize) -> bool {
        // Use u64 arithmetic to avoid truncation when len > u32::MAX
        let end = addr as u64 + len as u64;
        end <= self.capacity as u64
    }
}

/// Static chip table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipEntry {
    /// Part name (e.g., "W25Q128")
    pub name: &'static str,
    /// Identification code: manufacturer << 8 | device
    pub code: u16,
    /// Family the part belongs to
    pub family: DeviceFamily,
    /// Capacity in bytes
    pub capacity: u32,
}

impl ChipEntry {
    /// Convert to an owned identification result
    pub fn to_info(&self) -> DeviceInfo {
        DeviceInfo {
            code: self.code,
            name: device_name(self.name),
            family: self.family,
            capacity: self.capacity,
        }
    }
}

/// Identification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Identification code: manufacturer << 8 | device
    pub code: u16,
    /// Part name
    pub name: DeviceName,
    /// Family the part belongs to
    pub family: DeviceFamily,
    /// Capacity in bytes
    pub capacity: u32,
}

impl DeviceInfo {
    /// JEDEC manufacturer ID (high byte of the code)
    pub const fn manufacturer_id(&self) -> u8 {
        (self.code >> 8) as u8
    }

    /// Device ID (low byte of the code)
    pub const fn device_id(&self) -> u8 {
        self.code as u8
    }

    /// Vendor name
    pub const fn vendor(&self) -> &'static str {
        self.family.vendor()
    }

    /// Geometry of this part
    pub fn geometry(&self) -> Result<FlashGeometry> {
        self.family.geometry(self.capacity)
    }
}

/// Closed identification table
pub trait ChipLookup {
    /// Find the part with the given identification code
    fn lookup(&self, code: u16) -> Option<DeviceInfo>;
}

impl ChipLookup for [ChipEntry] {
    fn lookup(&self, code: u16) -> Option<DeviceInfo> {
        self.iter().find(|c| c.code == code).map(ChipEntry::to_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_counts() {
        let g = FlashGeometry::new(16 * 1024 * 1024, 256, 4096, 65536).unwrap();
        assert_eq!(g.page_count(), 65536);
        assert_eq!(g.sector_count(), 4096);
        assert_eq!(g.block_count(), 256);
    }

    #[test]
    fn test_geometry_invariants() {
        assert_eq!(
            FlashGeometry::new(4096 * 3 + 1, 256, 4096, 65536),
            Err(Error::InvalidGeometry)
        );
        assert_eq!(
            FlashGeometry::new(1 << 20, 300, 4096, 65536),
            Err(Error::InvalidGeometry)
        );
        assert_eq!(
            FlashGeometry::new(1 << 20, 256, 4096, 0),
            Err(Error::InvalidGeometry)
        );
        assert_eq!(FlashGeometry::new(0, 256, 4096, 65536), Err(Error::InvalidGeometry));
    }

    #[test]
    fn test_unit_bases() {
        let g = FlashGeometry::new(1 << 20, 256, 4096, 65536).unwrap();
        assert_eq!(g.sector_base(0x1234), 0x1000);
        assert_eq!(g.sector_base(0x1000), 0x1000);
        assert_eq!(g.block_base(0x1_2345), 0x1_0000);
    }

    #[test]
    fn test_contains() {
        let g = FlashGeometry::new(1 << 20, 256, 4096, 65536).unwrap();
        assert!(g.contains(0, 1 << 20));
        assert!(g.contains((1 << 20) - 1, 1));
        assert!(!g.contains((1 << 20) - 1, 2));
        assert!(!g.contains(1 << 20, 1));
        assert!(g.contains(1 << 20, 0));
    }

    #[test]
    fn test_device_name_truncates() {
        let name = device_name("a-very-long-part-number-that-never-ends-at-all");
        assert_eq!(name.len(), 32);
        assert!(name.starts_with("a-very-long"));
    }

    #[test]
    fn test_family_opcodes() {
        assert_eq!(DeviceFamily::Winbond.opcodes().chip_erase, 0xC7);
        assert_eq!(DeviceFamily::Macronix.opcodes().chip_erase, 0x60);
        assert_eq!(
            DeviceFamily::from_manufacturer_id(0xC8),
            Some(DeviceFamily::GigaDevice)
        );
        assert_eq!(DeviceFamily::from_manufacturer_id(0x01), None);
    }
}
