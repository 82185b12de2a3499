//! Flash programming algorithm
//!
//! The entry points a debugger calls when it loads a programming algorithm
//! into target RAM: init, erase (chip or sector), program one page, verify a
//! range, blank check and uninit. Addresses arrive in the memory-mapped window described
//! by [`AlgoConfig`] and are reduced to device offsets by masking to 24 bits.
//!
//! Unlike the block driver, every operation first waits for the device to
//! be idle, since a previous call may have been interrupted by the host.

use crate::chip::{device_name, DeviceFamily, DeviceName, FlashGeometry, ERASED_VALUE};
use crate::config::PollPolicy;
use crate::error::{Error, Result};
use crate::paging::PageChunks;
use crate::protocol::{self, EraseKind};
use crate::spi::{OpcodeTable, SpiCommand, ADDRESS_MASK_3B, MAX_HEADER_LEN};
use crate::transport::{transaction, SpiTransport};

/// Bytes compared per transport read during verify
const VERIFY_CHUNK: usize = 64;

/// Device description record for the programming algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct AlgoConfig {
    /// Name shown by the debugger
    pub name: DeviceName,
    /// Start of the memory-mapped window
    pub base_address: u32,
    /// Device size in bytes
    pub device_size: u32,
    /// Program unit in bytes
    pub page_size: u32,
    /// Content of erased memory
    pub erased_value: u8,
    /// Time budget for one page program, in milliseconds
    pub program_timeout_ms: u32,
    /// Time budget for one sector erase, in milliseconds
    pub erase_timeout_ms: u32,
    /// Time budget for a chip erase, in milliseconds
    pub chip_erase_timeout_ms: u32,
    /// Delay between status polls while programming, in microseconds
    pub program_poll_us: u32,
    /// Delay between status polls while erasing, in microseconds
    pub erase_poll_us: u32,
    /// Uniform sector size in bytes
    pub sector_size: u32,
    /// Command set of the attached device
    pub family: DeviceFamily,
}

impl Default for AlgoConfig {
    fn default() -> Self {
        Self {
            name: device_name("SPINOR_FLASH_SPI"),
            base_address: 0x9000_0000,
            device_size: 0x0100_0000,
            page_size: 256,
            erased_value: ERASED_VALUE,
            program_timeout_ms: 1_000,
            erase_timeout_ms: 3_000,
            chip_erase_timeout_ms: 200_000,
            program_poll_us: 10,
            erase_poll_us: 1_000,
            sector_size: 0x1000,
            family: DeviceFamily::Winbond,
        }
    }
}

/// One entry of the sector layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorInfo {
    /// Absolute start address
    pub start: u32,
    /// Size in bytes
    pub size: u32,
}

impl AlgoConfig {
    /// Check the size invariants and the 24-bit address limit
    pub fn validate(&self) -> Result<()> {
        FlashGeometry::new(
            self.device_size,
            self.page_size,
            self.sector_size,
            self.sector_size,
        )?;
        if self.device_size > ADDRESS_MASK_3B + 1 {
            return Err(Error::InvalidGeometry);
        }
        if self.base_address.checked_add(self.device_size - 1).is_none() {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Device offset of an address in the memory-mapped window
    pub const fn device_offset(&self, adr: u32) -> u32 {
        adr & ADDRESS_MASK_3B
    }

    /// Poll budget for one page program
    pub const fn program_policy(&self) -> PollPolicy {
        PollPolicy::from_millis(self.program_poll_us, self.program_timeout_ms)
    }

    /// Poll budget for one sector erase
    pub const fn erase_policy(&self) -> PollPolicy {
        PollPolicy::from_millis(self.erase_poll_us, self.erase_timeout_ms)
    }

    /// Poll budget for a chip erase
    pub const fn chip_erase_policy(&self) -> PollPolicy {
        PollPolicy::from_millis(self.erase_poll_us, self.chip_erase_timeout_ms)
    }

    /// Uniform sector layout, in address order
    ///
    /// Empty when `sector_size` is zero; run [`validate`](Self::validate)
    /// first to reject such a record.
    pub fn sectors(&self) -> impl Iterator<Item = SectorInfo> + '_ {
        let size = self.sector_size;
        let count = self.device_size.checked_div(size).unwrap_or(0);
        (0..count).map(move |i| SectorInfo {
            start: self.base_address + i * size,
            size,
        })
    }
}

/// Flash programming algorithm bound to one transport
pub struct FlashAlgorithm<T> {
    transport: T,
    config: AlgoConfig,
    ops: &'static OpcodeTable,
}

impl<T: SpiTransport> FlashAlgorithm<T> {
    /// Validate the configuration and put the device in the idle state
    pub fn init(mut transport: T, config: AlgoConfig) -> Result<Self> {
        config.validate()?;
        transport.deselect()?;
        log::debug!(
            "{}: init, window {:#010x} + {} KiB",
            config.name,
            config.base_address,
            config.device_size / 1024
        );
        Ok(Self {
            transport,
            ops: config.family.opcodes(),
            config,
        })
    }

    /// Give back the transport
    pub fn uninit(self) -> T {
        log::debug!("{}: uninit", self.config.name);
        self.transport
    }

    /// Configuration in use
    pub fn config(&self) -> &AlgoConfig {
        &self.config
    }

    fn wait_idle(&mut self, policy: &PollPolicy) -> Result<()> {
        protocol::wait_ready(&mut self.transport, self.ops, policy)
    }

    /// Erase the whole device
    pub fn erase_chip(&mut self) -> Result<()> {
        log::debug!("{}: erase chip", self.config.name);
        self.wait_idle(&self.config.erase_policy())?;
        protocol::erase(
            &mut self.transport,
            self.ops,
            EraseKind::Chip,
            0,
            &self.config.chip_erase_policy(),
        )
    }

    /// Erase the sector containing `adr`
    pub fn erase_sector(&mut self, adr: u32) -> Result<()> {
        let offset = self.config.device_offset(adr);
        let policy = self.config.erase_policy();
        self.wait_idle(&policy)?;
        protocol::erase(&mut self.transport, self.ops, EraseKind::Sector, offset, &policy)
    }

    /// Program `buf` at `adr`, which must fit in the page containing `adr`
    pub fn program_page(&mut self, adr: u32, buf: &[u8]) -> Result<()> {
        let offset = self.config.device_offset(adr);
        let page_remain = (self.config.page_size - offset % self.config.page_size) as usize;
        if buf.len() > page_remain {
            return Err(Error::PageBoundary);
        }
        if buf.is_empty() {
            return Ok(());
        }

        let policy = self.config.program_policy();
        self.wait_idle(&policy)?;
        protocol::program_page(&mut self.transport, self.ops, offset, buf, &policy)
    }

    /// Program an arbitrary range, one page at a time
    pub fn program_range(&mut self, adr: u32, data: &[u8]) -> Result<()> {
        let offset = self.config.device_offset(adr);
        for chunk in PageChunks::new(offset, data.len(), self.config.page_size) {
            self.program_page(chunk.addr, chunk.slice(data))?;
        }
        Ok(())
    }

    /// Compare the device contents at `adr` with `buf`
    ///
    /// Returns `adr + i` for the first differing byte `i`, or
    /// `adr + buf.len()` when everything matches. The read is one continuous
    /// frame, cut short at the first mismatch.
    pub fn verify(&mut self, adr: u32, buf: &[u8]) -> Result<u32> {
        Ok(match self.scan(adr, buf.len(), |i| buf[i])? {
            Some(i) => {
                let bad = adr.wrapping_add(i as u32);
                log::debug!("{}: verify mismatch at {:#010x}", self.config.name, bad);
                bad
            }
            None => adr.wrapping_add(buf.len() as u32),
        })
    }

    /// Check that `len` bytes at `adr` hold the erased value
    pub fn blank_check(&mut self, adr: u32, len: usize) -> Result<bool> {
        let erased = self.config.erased_value;
        Ok(self.scan(adr, len, |_| erased)?.is_none())
    }

    /// Stream `len` bytes from `adr` and return the offset of the first one
    /// that differs from `want(offset)`
    fn scan<F>(&mut self, adr: u32, len: usize, want: F) -> Result<Option<usize>>
    where
        F: Fn(usize) -> u8,
    {
        self.wait_idle(&self.config.program_policy())?;

        let cmd = SpiCommand::read_3b(self.ops.read_data, self.config.device_offset(adr), &mut []);
        let mut header = [0u8; MAX_HEADER_LEN];
        let header_len = cmd.encode_header(&mut header);

        transaction(&mut self.transport, |t| {
            t.write(&header[..header_len])?;
            let mut chunk = [0u8; VERIFY_CHUNK];
            let mut offset = 0;
            while offset < len {
                let n = core::cmp::min(VERIFY_CHUNK, len - offset);
                t.read(&mut chunk[..n])?;
                if let Some(i) = (0..n).find(|&i| chunk[i] != want(offset + i)) {
                    return Ok(Some(offset + i));
                }
                offset += n;
            }
            Ok(None)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_description() {
        let config = AlgoConfig::default();
        assert_eq!(config.name.as_str(), "SPINOR_FLASH_SPI");
        assert_eq!(config.base_address, 0x9000_0000);
        assert_eq!(config.device_size, 16 * 1024 * 1024);
        assert_eq!(config.erased_value, 0xFF);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_device_offset_masks_window() {
        let config = AlgoConfig::default();
        assert_eq!(config.device_offset(0x9000_1234), 0x1234);
        assert_eq!(config.device_offset(0x90FF_FFFF), 0x00FF_FFFF);
    }

    #[test]
    fn test_policies() {
        let config = AlgoConfig::default();
        assert_eq!(config.program_policy(), PollPolicy::new(10, 1_000_000));
        assert_eq!(config.erase_policy().max_polls(), 3_000);
        assert_eq!(config.chip_erase_policy().timeout_us, 200_000_000);
    }

    #[test]
    fn test_sector_layout() {
        let config = AlgoConfig::default();
        let mut sectors = config.sectors();
        assert_eq!(
            sectors.next(),
            Some(SectorInfo {
                start: 0x9000_0000,
                size: 0x1000
            })
        );
        assert_eq!(config.sectors().count(), 4096);
        assert_eq!(config.sectors().last().map(|s| s.start), Some(0x90FF_F000));
    }

    #[test]
    fn test_zero_sector_size_has_no_sectors() {
        let config = AlgoConfig {
            sector_size: 0,
            ..Default::default()
        };
        assert_eq!(config.sectors().count(), 0);
        assert_eq!(config.validate(), Err(Error::InvalidGeometry));
    }

    #[test]
    fn test_validate_rejects_bad_records() {
        let too_big = AlgoConfig {
            device_size: 32 * 1024 * 1024,
            ..Default::default()
        };
        assert_eq!(too_big.validate(), Err(Error::InvalidGeometry));

        let odd_page = AlgoConfig {
            page_size: 300,
            ..Default::default()
        };
        assert_eq!(odd_page.validate(), Err(Error::InvalidGeometry));

        let wraps = AlgoConfig {
            base_address: 0xFF80_0000,
            ..Default::default()
        };
        assert_eq!(wraps.validate(), Err(Error::InvalidGeometry));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_from_toml() {
        let config: AlgoConfig = toml::from_str(
            r#"
            name = "BOARD_QSPI"
            base_address = 0x70000000
            device_size = 0x800000
            family = "Macronix"
            "#,
        )
        .unwrap();
        assert_eq!(config.name.as_str(), "BOARD_QSPI");
        assert_eq!(config.base_address, 0x7000_0000);
        assert_eq!(config.family, DeviceFamily::Macronix);
        assert_eq!(config.page_size, 256);
        assert!(config.validate().is_ok());
    }
}
