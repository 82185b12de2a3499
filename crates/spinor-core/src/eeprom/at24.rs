//! AT24-series I2C EEPROM driver

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

use crate::config::PollPolicy;
use crate::error::{Error, Result};
use crate::paging::PageChunks;

/// Largest page of any supported part (AT24C512)
pub const MAX_PAGE_SIZE: usize = 64;

/// Value written by [`At24::erase_chip`]
pub const ERASED_VALUE: u8 = 0xFF;

/// Word address plus one page of data
type PageFrame = heapless::Vec<u8, { 2 + MAX_PAGE_SIZE }>;

/// AT24 configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default))]
pub struct At24Config {
    /// 7-bit bus address (0x50 with A0-A2 tied low)
    pub address: u8,
    /// Page size in bytes (8 for the AT24C01/02)
    pub page_size: u16,
    /// Capacity in bytes
    pub total_size: u32,
    /// Acknowledge-polling budget after each page write
    pub ready: PollPolicy,
}

impl Default for At24Config {
    fn default() -> Self {
        // AT24C02: 256 bytes, 8-byte pages, 5ms write cycle
        Self {
            address: 0x50,
            page_size: 8,
            total_size: 256,
            ready: PollPolicy::new(1_000, 10_000),
        }
    }
}

impl At24Config {
    /// Check page and capacity limits
    pub fn validate(&self) -> Result<()> {
        let page = self.page_size as u32;
        if page == 0 || page as usize > MAX_PAGE_SIZE {
            return Err(Error::InvalidGeometry);
        }
        if self.total_size == 0 || self.total_size > 0x1_0000 || self.total_size % page != 0 {
            return Err(Error::InvalidGeometry);
        }
        if self.address > 0x7F || self.address & self.block_bits() != 0 {
            return Err(Error::InvalidGeometry);
        }
        Ok(())
    }

    /// Number of word-address bytes sent before data
    ///
    /// Parts up to 16 Kbit take one byte; larger parts take two.
    pub const fn address_len(&self) -> usize {
        if self.total_size > 2048 {
            2
        } else {
            1
        }
    }

    /// Memory address bits A8-A10 carried in the device address
    ///
    /// Non-zero only for the 4, 8 and 16 Kbit parts, which answer on two,
    /// four or eight consecutive bus addresses.
    const fn block_bits(&self) -> u8 {
        if self.total_size > 256 && self.total_size <= 2048 {
            ((self.total_size - 1) >> 8) as u8
        } else {
            0
        }
    }

    /// Bus address that selects the 256-byte block holding `mem_addr`
    pub const fn device_address(&self, mem_addr: u16) -> u8 {
        self.address | ((mem_addr >> 8) as u8 & self.block_bits())
    }
}

/// AT24 EEPROM on an `embedded-hal` I2C bus
pub struct At24<I2C, D> {
    i2c: I2C,
    delay: D,
    config: At24Config,
}

impl<I2C: I2c, D: DelayNs> At24<I2C, D> {
    /// Validate the configuration and check that the device acknowledges
    pub fn new(i2c: I2C, delay: D, config: At24Config) -> Result<Self> {
        config.validate()?;
        let mut dev = Self { i2c, delay, config };
        if let Err(e) = dev.wait_ready() {
            log::warn!("no acknowledge from AT24 at {:#04x}", config.address);
            return Err(e);
        }
        Ok(dev)
    }

    /// Configuration in use
    pub fn config(&self) -> &At24Config {
        &self.config
    }

    /// Wait for the internal write cycle to finish (acknowledge polling)
    ///
    /// While programming, the device does not acknowledge its address. An
    /// empty write is retried until it is acknowledged or the poll budget
    /// runs out.
    pub fn wait_ready(&mut self) -> Result<()> {
        self.wait_ready_at(self.config.address)
    }

    fn wait_ready_at(&mut self, dev_addr: u8) -> Result<()> {
        let policy = self.config.ready;
        let max_polls = policy.max_polls();

        for poll in 0..max_polls {
            match self.i2c.write(dev_addr, &[]) {
                Ok(()) => {
                    log::trace!("AT24 ready after {} polls", poll);
                    return Ok(());
                }
                Err(e) => match e.kind() {
                    ErrorKind::NoAcknowledge(_) => {}
                    kind => {
                        log::debug!("I2C error while polling: {:?}", kind);
                        return Err(Error::Transport);
                    }
                },
            }
            if policy.poll_delay_us > 0 {
                self.delay.delay_us(policy.poll_delay_us);
            }
        }

        Err(Error::DeviceTimeout)
    }

    fn check_range(&self, mem_addr: u16, len: usize) -> Result<()> {
        if mem_addr as u64 + len as u64 > self.config.total_size as u64 {
            return Err(Error::AddressOutOfRange);
        }
        Ok(())
    }

    fn word_address(&self, mem_addr: u16, out: &mut PageFrame) -> Result<()> {
        let bytes = mem_addr.to_be_bytes();
        let start = 2 - self.config.address_len();
        out.extend_from_slice(&bytes[start..])
            .map_err(|_| Error::BufferTooSmall)
    }

    /// Write a single byte and wait for the write cycle
    pub fn write_byte(&mut self, mem_addr: u16, value: u8) -> Result<()> {
        self.write(mem_addr, &[value])
    }

    /// Read a single byte
    pub fn read_byte(&mut self, mem_addr: u16) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read(mem_addr, &mut buf)?;
        Ok(buf[0])
    }

    /// Write `data` starting at `mem_addr`
    ///
    /// Split at page boundaries; each page write is followed by acknowledge
    /// polling before the next page is addressed.
    pub fn write(&mut self, mem_addr: u16, data: &[u8]) -> Result<()> {
        self.check_range(mem_addr, data.len())?;

        for chunk in PageChunks::new(mem_addr as u32, data.len(), self.config.page_size as u32) {
            let mut frame = PageFrame::new();
            self.word_address(chunk.addr as u16, &mut frame)?;
            frame
                .extend_from_slice(chunk.slice(data))
                .map_err(|_| Error::BufferTooSmall)?;

            let dev_addr = self.config.device_address(chunk.addr as u16);
            log::trace!("AT24 page write {:#06x} ({} bytes)", chunk.addr, chunk.len);
            self.i2c.write(dev_addr, &frame).map_err(i2c_error)?;
            self.wait_ready_at(dev_addr)?;
        }

        Ok(())
    }

    /// Read `buf.len()` bytes starting at `mem_addr`
    ///
    /// One bus transaction; the device auto-increments across pages.
    pub fn read(&mut self, mem_addr: u16, buf: &mut [u8]) -> Result<()> {
        self.check_range(mem_addr, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        let mut addr = PageFrame::new();
        self.word_address(mem_addr, &mut addr)?;
        self.i2c
            .write_read(self.config.device_address(mem_addr), &addr, buf)
            .map_err(i2c_error)
    }

    /// Fill the whole device with [`ERASED_VALUE`]
    pub fn erase_chip(&mut self) -> Result<()> {
        log::debug!("AT24 erase ({} bytes)", self.config.total_size);
        let page = self.config.page_size as usize;
        let blank = [ERASED_VALUE; MAX_PAGE_SIZE];

        let mut addr = 0u32;
        while addr < self.config.total_size {
            self.write(addr as u16, &blank[..page])?;
            addr += page as u32;
        }
        Ok(())
    }

    /// Give back the bus and the delay provider
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

fn i2c_error<E: embedded_hal::i2c::Error>(e: E) -> Error {
    log::debug!("I2C error: {:?}", e.kind());
    Error::Transport
}
