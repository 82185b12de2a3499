//! SPI NOR block driver

use crate::chip::{BuiltinChips, ChipLookup, DeviceInfo, FlashGeometry};
use crate::config::DriverConfig;
use crate::error::{Error, Result};
use crate::protocol::{self, EraseKind};
use crate::spi::OpcodeTable;
use crate::transport::SpiTransport;

/// Chunk size used when reading back for verification
const VERIFY_CHUNK: usize = 256;

/// Outcome of a read-back comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Verify {
    /// Every byte matched
    Match,
    /// First differing byte
    Mismatch {
        /// Device address of the first mismatch
        addr: u32,
    },
}

impl Verify {
    /// Returns true if every byte matched
    pub fn is_match(&self) -> bool {
        matches!(self, Self::Match)
    }
}

/// An identified SPI NOR flash device
///
/// Owns the transport for its whole lifetime; every operation takes
/// `&mut self`, so at most one command sequence is in flight. Program and
/// erase calls return only after the device reports ready again.
pub struct SpiNorFlash<T> {
    transport: T,
    info: DeviceInfo,
    geometry: FlashGeometry,
    ops: &'static OpcodeTable,
    config: DriverConfig,
}

impl<T: SpiTransport> SpiNorFlash<T> {
    /// Identify the device against the built-in chip table
    pub fn init(transport: T, config: DriverConfig) -> Result<Self> {
        Self::init_with(transport, config, &BuiltinChips)
    }

    /// Identify the device against a caller-provided chip table
    ///
    /// Releases chip-select, waits out the power-up delay, then reads the
    /// manufacturer/device code. A code missing from `chips` is fatal.
    pub fn init_with<L: ChipLookup + ?Sized>(
        mut transport: T,
        config: DriverConfig,
        chips: &L,
    ) -> Result<Self> {
        transport.deselect()?;
        if config.power_up_delay_ms > 0 {
            transport.delay_ms(config.power_up_delay_ms);
        }

        // Every supported family answers the same identification command
        let code = protocol::read_device_id(&mut transport, &OpcodeTable::W25Q)?;
        let info = match chips.lookup(code) {
            Some(info) => info,
            None => {
                log::debug!("no chip matches identification code {:#06x}", code);
                return Err(Error::UnknownDevice { code });
            }
        };
        let geometry = info.geometry()?;

        log::debug!(
            "found {} {} ({} KiB, code {:#06x})",
            info.vendor(),
            info.name,
            geometry.capacity() / 1024,
            code
        );

        Ok(Self {
            transport,
            ops: info.family.opcodes(),
            info,
            geometry,
            config,
        })
    }

    /// Identification result
    pub fn identify(&self) -> &DeviceInfo {
        &self.info
    }

    /// Device geometry
    pub fn geometry(&self) -> &FlashGeometry {
        &self.geometry
    }

    /// Driver configuration in use
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn check_range(&self, addr: u32, len: usize) -> Result<()> {
        if self.config.bounds_check && !self.geometry.contains(addr, len) {
            return Err(Error::AddressOutOfRange);
        }
        Ok(())
    }

    /// Read `buf.len()` bytes starting at `addr`
    ///
    /// One frame, no page restriction.
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<()> {
        self.check_range(addr, buf.len())?;
        protocol::read(&mut self.transport, self.ops, addr, buf)
    }

    /// Read `len` bytes starting at `addr` into a new vector
    #[cfg(feature = "alloc")]
    pub fn read_vec(&mut self, addr: u32, len: usize) -> Result<alloc::vec::Vec<u8>> {
        let mut buf = alloc::vec![0u8; len];
        self.read(addr, &mut buf)?;
        Ok(buf)
    }

    /// Program `data` at `addr`
    ///
    /// The target range must already be erased; programming only clears
    /// bits. The write is split so that no page program crosses a page. On
    /// failure the pages programmed before the failing one stay programmed.
    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        self.check_range(addr, data.len())?;
        log::debug!("write {:#08x} ({} bytes)", addr, data.len());
        protocol::program_range(
            &mut self.transport,
            self.ops,
            addr,
            data,
            self.geometry.page_size(),
            &self.config.page_program,
        )
    }

    /// Erase the sector containing `addr`
    pub fn erase_sector(&mut self, addr: u32) -> Result<()> {
        self.check_range(addr, 1)?;
        protocol::erase(
            &mut self.transport,
            self.ops,
            EraseKind::Sector,
            addr,
            &self.config.sector_erase,
        )
    }

    /// Erase the block containing `addr`
    pub fn erase_block(&mut self, addr: u32) -> Result<()> {
        self.check_range(addr, 1)?;
        protocol::erase(
            &mut self.transport,
            self.ops,
            EraseKind::Block,
            addr,
            &self.config.block_erase,
        )
    }

    /// Erase the whole device
    pub fn erase_chip(&mut self) -> Result<()> {
        protocol::erase(
            &mut self.transport,
            self.ops,
            EraseKind::Chip,
            0,
            &self.config.chip_erase,
        )
    }

    /// Compare the device contents at `addr` with `expected`
    pub fn verify(&mut self, addr: u32, expected: &[u8]) -> Result<Verify> {
        self.check_range(addr, expected.len())?;

        let mut buf = [0u8; VERIFY_CHUNK];
        let mut offset = 0;
        while offset < expected.len() {
            let len = core::cmp::min(VERIFY_CHUNK, expected.len() - offset);
            let chunk_addr = addr.wrapping_add(offset as u32);
            protocol::read(&mut self.transport, self.ops, chunk_addr, &mut buf[..len])?;

            let want = &expected[offset..offset + len];
            if let Some(i) = buf[..len].iter().zip(want).position(|(a, b)| a != b) {
                let bad = chunk_addr.wrapping_add(i as u32);
                log::debug!("verify mismatch at {:#08x}", bad);
                return Ok(Verify::Mismatch { addr: bad });
            }
            offset += len;
        }

        Ok(Verify::Match)
    }

    /// Check whether an internal operation is still running
    pub fn is_busy(&mut self) -> Result<bool> {
        protocol::is_busy(&mut self.transport, self.ops)
    }

    /// Give back the transport
    pub fn release(self) -> T {
        self.transport
    }
}
