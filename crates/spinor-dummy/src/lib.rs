//! spinor-dummy - In-memory SPI NOR flash emulator for testing
//!
//! This crate provides [`DummyFlash`], a byte-level model of a 25-series SPI
//! NOR flash behind the [`SpiTransport`] trait. Commands are decoded from
//! the bytes clocked while chip-select is asserted and latched when it is
//! released, the way a real part behaves:
//!
//! - page program only clears bits and wraps inside the addressed page
//! - program and erase need the write enable latch and clear it
//! - the device reports busy for a configurable number of status polls
//!   after every program or erase, and ignores commands while busy
//!
//! Fault injection and a transaction log make it possible to test abort
//! paths and exact command sequences without hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use spinor_core::chip::ERASED_VALUE;
use spinor_core::error::{Error, Result};
use spinor_core::spi::{opcodes, StatusFlags};
use spinor_core::transport::SpiTransport;

/// Configuration for the dummy flash
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Manufacturer ID returned by the identification commands
    pub manufacturer_id: u8,
    /// Device ID returned by the manufacturer/device ID command (0x90)
    pub device_id: u8,
    /// Flash size in bytes
    pub size: usize,
    /// Page size for programming
    pub page_size: usize,
    /// Sector size for smallest erase
    pub sector_size: usize,
    /// Block size for 64 KiB erase
    pub block_size: usize,
    /// Status polls answered with busy after each program or erase
    pub busy_polls: u32,
    /// Never leave the busy state once an operation has started
    pub stuck_busy: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xEF, // Winbond
            device_id: 0x17,       // W25Q128
            size: 16 * 1024 * 1024,
            page_size: 256,
            sector_size: 4096,
            block_size: 64 * 1024,
            busy_polls: 0,
            stuck_busy: false,
        }
    }
}

impl DummyConfig {
    /// Small 1 MiB Winbond part (W25Q80), cheap to allocate in tests
    pub fn w25q80() -> Self {
        Self {
            device_id: 0x13,
            size: 1024 * 1024,
            ..Default::default()
        }
    }

    /// Part answering with an arbitrary identification code
    pub fn with_code(code: u16, size: usize) -> Self {
        Self {
            manufacturer_id: (code >> 8) as u8,
            device_id: code as u8,
            size,
            ..Default::default()
        }
    }

    /// 16-bit identification code (manufacturer << 8 | device)
    pub fn code(&self) -> u16 {
        u16::from_be_bytes([self.manufacturer_id, self.device_id])
    }
}

/// One chip-select frame as seen by the emulator
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedFrame {
    /// Bytes clocked out by the host
    pub written: Vec<u8>,
    /// Number of bytes clocked in by the host
    pub read_len: usize,
    /// The frame was cut by an injected fault and not latched
    pub aborted: bool,
}

#[cfg(feature = "alloc")]
impl LoggedFrame {
    /// First byte of the frame
    pub fn opcode(&self) -> Option<u8> {
        self.written.first().copied()
    }

    /// 24-bit address following the opcode, if present
    pub fn address(&self) -> Option<u32> {
        if self.written.len() < 4 {
            return None;
        }
        Some(u32::from_be_bytes([0, self.written[1], self.written[2], self.written[3]]))
    }

    /// Bytes following opcode and address
    pub fn payload(&self) -> &[u8] {
        self.written.get(4..).unwrap_or(&[])
    }
}

/// Transport failure injected on a chosen frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    /// Opcode of the frames to watch
    pub opcode: u8,
    /// Number of matching frames to let through before failing
    pub skip: usize,
}

/// Dummy SPI NOR flash
///
/// Emulates a flash chip in memory for testing purposes.
#[cfg(feature = "alloc")]
pub struct DummyFlash {
    config: DummyConfig,
    data: Vec<u8>,
    selected: bool,
    frame: Vec<u8>,
    read_pos: usize,
    frame_failed: bool,
    write_enabled: bool,
    busy_remaining: u32,
    busy: bool,
    fault: Option<Fault>,
    fault_seen: usize,
    log: Vec<LoggedFrame>,
    elapsed_us: u64,
}

#[cfg(feature = "alloc")]
impl DummyFlash {
    /// Create a new dummy flash with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![ERASED_VALUE; config.size];
        Self {
            config,
            data,
            selected: false,
            frame: Vec::new(),
            read_pos: 0,
            frame_failed: false,
            write_enabled: false,
            busy_remaining: 0,
            busy: false,
            fault: None,
            fault_seen: 0,
            log: Vec::new(),
            elapsed_us: 0,
        }
    }

    /// Create a new dummy flash with default configuration (W25Q128)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a dummy flash with pre-filled data
    pub fn with_data(config: DummyConfig, initial_data: &[u8]) -> Self {
        let mut flash = Self::new(config);
        let len = core::cmp::min(initial_data.len(), flash.data.len());
        flash.data[..len].copy_from_slice(&initial_data[..len]);
        flash
    }

    /// Get a reference to the flash data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the flash data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Whether chip-select is currently asserted
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Whether the write enable latch is set
    pub fn write_enabled(&self) -> bool {
        self.write_enabled
    }

    /// Whether an internal operation is in progress
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Change the number of busy polls reported after each operation
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.config.busy_polls = polls;
    }

    /// Put the device in the busy state, as if an operation were running
    pub fn force_busy(&mut self, polls: u32) {
        self.busy = true;
        self.busy_remaining = polls;
    }

    /// Make the device report busy forever once an operation starts
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.config.stuck_busy = stuck;
    }

    /// Fail the frame described by `fault` with a transport error
    pub fn inject_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
        self.fault_seen = 0;
    }

    /// Every frame since creation or the last [`clear_log`](Self::clear_log)
    pub fn frames(&self) -> &[LoggedFrame] {
        &self.log
    }

    /// Forget the logged frames
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Number of logged frames starting with `opcode`
    pub fn count(&self, opcode: u8) -> usize {
        self.log
            .iter()
            .filter(|f| f.opcode() == Some(opcode))
            .count()
    }

    /// Address and length of every page program frame
    pub fn programs(&self) -> Vec<(u32, usize)> {
        self.log
            .iter()
            .filter(|f| f.opcode() == Some(opcodes::PP) && !f.aborted)
            .filter_map(|f| f.address().map(|a| (a, f.payload().len())))
            .collect()
    }

    /// Total time spent in transport delays
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    fn frame_address(&self) -> usize {
        let a = u32::from_be_bytes([0, self.frame[1], self.frame[2], self.frame[3]]);
        a as usize % self.data.len()
    }

    fn status(&mut self) -> u8 {
        if self.busy && !self.config.stuck_busy {
            if self.busy_remaining == 0 {
                self.busy = false;
            } else {
                self.busy_remaining -= 1;
            }
        }
        let mut status = StatusFlags::empty();
        if self.busy {
            status |= StatusFlags::WIP;
        }
        if self.write_enabled {
            status |= StatusFlags::WEL;
        }
        status.bits()
    }

    fn start_operation(&mut self) {
        self.write_enabled = false;
        self.busy = true;
        self.busy_remaining = self.config.busy_polls;
    }

    /// Latch the command in the finished frame
    fn commit(&mut self) {
        let Some(&opcode) = self.frame.first() else {
            return;
        };

        if self.busy && opcode != opcodes::RDSR {
            log::debug!("dummy: ignoring {:#04x} while busy", opcode);
            return;
        }

        match opcode {
            opcodes::WREN => self.write_enabled = true,
            opcodes::WRDI => self.write_enabled = false,
            opcodes::PP => self.page_program(),
            opcodes::SE_20 => self.erase_unit(self.config.sector_size),
            opcodes::BE_D8 => self.erase_unit(self.config.block_size),
            opcodes::CE_C7 | opcodes::CE_60 => self.chip_erase(),
            _ => {}
        }
    }

    fn page_program(&mut self) {
        if !self.write_enabled || self.frame.len() < 4 {
            log::debug!("dummy: page program ignored (WEL clear or short frame)");
            return;
        }
        let addr = self.frame_address();
        let page = self.config.page_size;
        let page_base = addr - addr % page;
        let mut offset = addr % page;

        // Programming only clears bits and wraps inside the page
        for &byte in &self.frame[4..] {
            self.data[page_base + offset] &= byte;
            offset = (offset + 1) % page;
        }
        self.start_operation();
    }

    fn erase_unit(&mut self, size: usize) {
        if !self.write_enabled || self.frame.len() < 4 {
            log::debug!("dummy: erase ignored (WEL clear or short frame)");
            return;
        }
        let addr = self.frame_address();
        let base = addr - addr % size;
        let end = core::cmp::min(base + size, self.data.len());
        self.data[base..end].fill(ERASED_VALUE);
        self.start_operation();
    }

    fn chip_erase(&mut self) {
        if !self.write_enabled {
            log::debug!("dummy: chip erase ignored (WEL clear)");
            return;
        }
        self.data.fill(ERASED_VALUE);
        self.start_operation();
    }
}

#[cfg(feature = "alloc")]
impl SpiTransport for DummyFlash {
    fn select(&mut self) -> Result<()> {
        if self.selected {
            log::warn!("dummy: chip-select asserted twice");
            return Err(Error::Transport);
        }
        self.selected = true;
        self.frame.clear();
        self.read_pos = 0;
        self.frame_failed = false;
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        if !self.selected {
            // Releasing an idle line is harmless
            return Ok(());
        }
        self.selected = false;

        if !self.frame_failed {
            self.commit();
        }
        self.log.push(LoggedFrame {
            written: core::mem::take(&mut self.frame),
            read_len: self.read_pos,
            aborted: self.frame_failed,
        });
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if !self.selected {
            log::warn!("dummy: write without chip-select");
            return Err(Error::Transport);
        }

        let first = self.frame.is_empty();
        self.frame.extend_from_slice(data);

        if let (true, Some(fault), Some(&opcode)) = (first, self.fault, self.frame.first()) {
            if opcode == fault.opcode {
                let hit = self.fault_seen == fault.skip;
                self.fault_seen += 1;
                if hit {
                    self.frame_failed = true;
                    return Err(Error::Transport);
                }
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.selected {
            log::warn!("dummy: read without chip-select");
            return Err(Error::Transport);
        }

        match self.frame.first().copied() {
            Some(opcodes::RDSR) => {
                for b in buf.iter_mut() {
                    *b = self.status();
                }
            }
            Some(opcodes::REMS) => {
                let id = [self.config.manufacturer_id, self.config.device_id];
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = id[(self.read_pos + i) % 2];
                }
            }
            Some(opcodes::RDID) => {
                let capacity = self.data.len().trailing_zeros() as u8;
                let id = [self.config.manufacturer_id, 0x40, capacity];
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = id.get(self.read_pos + i).copied().unwrap_or(0xFF);
                }
            }
            Some(opcodes::READ) if self.frame.len() >= 4 && !self.busy => {
                let start = self.frame_address() + self.read_pos;
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = self.data[(start + i) % self.data.len()];
                }
            }
            _ => buf.fill(0xFF),
        }

        self.read_pos += buf.len();
        Ok(())
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}
