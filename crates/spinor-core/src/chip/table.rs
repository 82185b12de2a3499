//! Built-in identification table
//!
//! Codes are the two bytes returned by the manufacturer/device ID command
//! (0x90), packed as `manufacturer << 8 | device`.

use super::types::{ChipEntry, ChipLookup, DeviceFamily, DeviceInfo};

const MIB: u32 = 1024 * 1024;

const fn chip(name: &'static str, code: u16, family: DeviceFamily, mib: u32) -> ChipEntry {
    ChipEntry {
        name,
        code,
        family,
        capacity: mib * MIB,
    }
}

/// Parts known without loading any database file
pub static BUILTIN_CHIPS: &[ChipEntry] = &[
    // Winbond
    chip("W25Q80", 0xEF13, DeviceFamily::Winbond, 1),
    chip("W25Q16", 0xEF14, DeviceFamily::Winbond, 2),
    chip("W25Q32", 0xEF15, DeviceFamily::Winbond, 4),
    chip("W25Q64", 0xEF16, DeviceFamily::Winbond, 8),
    chip("W25Q128", 0xEF17, DeviceFamily::Winbond, 16),
    chip("W25Q256", 0xEF18, DeviceFamily::Winbond, 32),
    // Macronix
    chip("MX25L8005", 0xC213, DeviceFamily::Macronix, 1),
    chip("MX25L1606E", 0xC214, DeviceFamily::Macronix, 2),
    chip("MX25L3206E", 0xC215, DeviceFamily::Macronix, 4),
    chip("MX25L6406E", 0xC216, DeviceFamily::Macronix, 8),
    chip("MX25L12835F", 0xC217, DeviceFamily::Macronix, 16),
    // GigaDevice
    chip("GD25Q80", 0xC813, DeviceFamily::GigaDevice, 1),
    chip("GD25Q16", 0xC814, DeviceFamily::GigaDevice, 2),
    chip("GD25Q32", 0xC815, DeviceFamily::GigaDevice, 4),
    chip("GD25Q64", 0xC816, DeviceFamily::GigaDevice, 8),
    chip("GD25Q128", 0xC817, DeviceFamily::GigaDevice, 16),
];

/// Lookup over [`BUILTIN_CHIPS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinChips;

impl ChipLookup for BuiltinChips {
    fn lookup(&self, code: u16) -> Option<DeviceInfo> {
        BUILTIN_CHIPS.lookup(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winbond_codes() {
        let w25q128 = BuiltinChips.lookup(0xEF17).unwrap();
        assert_eq!(w25q128.name.as_str(), "W25Q128");
        assert_eq!(w25q128.capacity, 16 * MIB);
        assert_eq!(w25q128.manufacturer_id(), 0xEF);
        assert_eq!(w25q128.device_id(), 0x17);

        assert_eq!(BuiltinChips.lookup(0xEF13).unwrap().capacity, MIB);
        assert_eq!(BuiltinChips.lookup(0xEF18).unwrap().capacity, 32 * MIB);
    }

    #[test]
    fn test_unknown_code() {
        assert!(BuiltinChips.lookup(0xEF42).is_none());
        assert!(BuiltinChips.lookup(0x0000).is_none());
        assert!(BuiltinChips.lookup(0xFFFF).is_none());
    }

    #[test]
    fn test_table_is_consistent() {
        for (i, entry) in BUILTIN_CHIPS.iter().enumerate() {
            assert!(
                entry.to_info().geometry().is_ok(),
                "{} has an invalid geometry",
                entry.name
            );
            assert_eq!((entry.code >> 8) as u8, entry.family.manufacturer_id());
            assert!(
                BUILTIN_CHIPS[i + 1..].iter().all(|other| other.code != entry.code),
                "duplicate code {:#06x}",
                entry.code
            );
        }
    }
}
