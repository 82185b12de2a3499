//! Chip database for runtime loading and lookup
//!
//! This module provides the `ChipDatabase` type for extending the built-in
//! identification table with RON vendor files:
//!
//! ```ron
//! (
//!     vendor: "Winbond",
//!     manufacturer_id: 0xEF,
//!     chips: [
//!         (name: "W25Q512", device_id: 0x19, total_size: MiB(64)),
//!     ],
//! )
//! ```

use std::format;
use std::fs;
use std::io;
use std::path::Path;
use std::string::String;
use std::vec::Vec;

use super::table::BUILTIN_CHIPS;
use super::types::{device_name, ChipLookup, DeviceFamily, DeviceInfo};

/// Error type for chip database operations
#[derive(Debug, thiserror::Error)]
pub enum ChipDbError {
    /// I/O error reading files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// RON parsing error
    #[error("parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// Validation error
    #[error("validation error: {0}")]
    Validation(String),
}

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Size with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
    /// Size in mebibytes (1024 * 1024 bytes)
    MiB(u32),
}

impl Size {
    /// Convert to bytes, `None` on overflow
    pub fn to_bytes(self) -> Option<u32> {
        match self {
            Size::B(n) => Some(n),
            Size::KiB(n) => n.checked_mul(1024),
            Size::MiB(n) => n.checked_mul(1024 * 1024),
        }
    }
}

/// Single chip definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct ChipDef {
    name: String,
    device_id: u8,
    total_size: Size,
}

/// Vendor definition containing multiple chips
#[derive(Debug, Clone, serde::Deserialize)]
struct VendorDef {
    vendor: String,
    manufacturer_id: u8,
    /// Command set; derived from the manufacturer ID when omitted
    #[serde(default)]
    family: Option<DeviceFamily>,
    chips: Vec<ChipDef>,
}

// ============================================================================
// Chip database
// ============================================================================

/// Runtime chip database
///
/// Lookups search the most recently loaded definitions first, so a vendor
/// file can override a built-in entry with the same code.
#[derive(Debug, Clone, Default)]
pub struct ChipDatabase {
    chips: Vec<DeviceInfo>,
}

impl ChipDatabase {
    /// Create an empty chip database
    pub fn new() -> Self {
        Self { chips: Vec::new() }
    }

    /// Create a database seeded with the built-in table
    pub fn with_builtin() -> Self {
        Self {
            chips: BUILTIN_CHIPS.iter().map(|c| c.to_info()).collect(),
        }
    }

    /// Load chip definitions from a single RON file
    pub fn load_file(&mut self, path: &Path) -> Result<usize, ChipDbError> {
        let content = fs::read_to_string(path)?;
        self.load_ron(&content)
    }

    /// Load chip definitions from a RON string
    ///
    /// Nothing is added if any entry in the file is invalid.
    pub fn load_ron(&mut self, content: &str) -> Result<usize, ChipDbError> {
        let vendor_def: VendorDef = ron::from_str(content)?;

        let family = match vendor_def.family {
            Some(family) => family,
            None => DeviceFamily::from_manufacturer_id(vendor_def.manufacturer_id).ok_or_else(
                || {
                    ChipDbError::Validation(format!(
                        "{}: no known command set for manufacturer {:#04x}",
                        vendor_def.vendor, vendor_def.manufacturer_id
                    ))
                },
            )?,
        };

        let mut parsed = Vec::with_capacity(vendor_def.chips.len());
        for chip_def in vendor_def.chips {
            let capacity = chip_def.total_size.to_bytes().ok_or_else(|| {
                ChipDbError::Validation(format!("{}: size overflows 32 bits", chip_def.name))
            })?;
            let info = DeviceInfo {
                code: u16::from_be_bytes([vendor_def.manufacturer_id, chip_def.device_id]),
                name: device_name(&chip_def.name),
                family,
                capacity,
            };
            if info.geometry().is_err() {
                return Err(ChipDbError::Validation(format!(
                    "{}: size {} is not a whole number of sectors",
                    chip_def.name, capacity
                )));
            }
            parsed.push(info);
        }

        let count = parsed.len();
        log::debug!("loaded {} {} chips", count, vendor_def.vendor);
        self.chips.extend(parsed);
        Ok(count)
    }

    /// Load all RON files from a directory
    ///
    /// Files are loaded in file name order, so a later name overrides an
    /// earlier one for the same code.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, ChipDbError> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                paths.push(path);
            }
        }
        // read_dir order is platform dependent
        paths.sort();

        let mut total = 0;
        for path in &paths {
            total += self.load_file(path)?;
        }
        Ok(total)
    }

    /// Get all chips in the database
    pub fn chips(&self) -> &[DeviceInfo] {
        &self.chips
    }

    /// Get the number of chips in the database
    pub fn len(&self) -> usize {
        self.chips.len()
    }

    /// Check if the database is empty
    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    /// Find chips by name (case-insensitive partial match)
    pub fn find_by_name(&self, name: &str) -> Vec<&DeviceInfo> {
        let name_lower = name.to_lowercase();
        self.chips
            .iter()
            .filter(|c| c.name.to_lowercase().contains(&name_lower))
            .collect()
    }
}

impl ChipLookup for ChipDatabase {
    fn lookup(&self, code: u16) -> Option<DeviceInfo> {
        self.chips.iter().rev().find(|c| c.code == code).cloned()
    }
}
