//! SPI25 protocol implementation
//!
//! This module implements the common 25-series command sequences: status
//! polling, identification, read, page program and erase. Every function
//! takes the [`OpcodeTable`] of the device family so no command byte is
//! hardcoded here.
//!
//! Program and erase sequences are always `WREN`, command, then a bounded
//! busy-poll. The function only returns once the device reports ready (or
//! the poll budget runs out).

use crate::config::PollPolicy;
use crate::error::{Error, Result};
use crate::paging::PageChunks;
use crate::spi::{OpcodeTable, SpiCommand, StatusFlags};
use crate::transport::{execute, SpiTransport};

/// Read the status register holding the busy bit
pub fn read_status<T: SpiTransport + ?Sized>(t: &mut T, ops: &OpcodeTable) -> Result<StatusFlags> {
    let mut buf = [0u8; 1];
    let mut cmd = SpiCommand::read_reg(ops.read_status, &mut buf);
    execute(t, &mut cmd)?;
    Ok(StatusFlags::from_raw(buf[0]))
}

/// Send the Write Enable command
pub fn write_enable<T: SpiTransport + ?Sized>(t: &mut T, ops: &OpcodeTable) -> Result<()> {
    let mut cmd = SpiCommand::simple(ops.write_enable);
    execute(t, &mut cmd)
}

/// Check whether the device is still running an internal operation
pub fn is_busy<T: SpiTransport + ?Sized>(t: &mut T, ops: &OpcodeTable) -> Result<bool> {
    Ok(read_status(t, ops)?.intersects(ops.busy))
}

/// Wait for the busy bit to clear
///
/// Each poll is its own chip-select frame. The device is polled at most
/// [`PollPolicy::max_polls`] times with `poll_delay_us` between polls; a
/// device that stays busy past that yields [`Error::DeviceTimeout`]. A device
/// that reports busy N times and then ready is read exactly N + 1 times.
///
/// # Typical poll delays
/// * Page program: 10us
/// * 4KB sector erase: 10,000us (10ms)
/// * 64KB block erase: 100,000us (100ms)
/// * Chip erase: 1,000,000us (1s)
pub fn wait_ready<T: SpiTransport + ?Sized>(
    t: &mut T,
    ops: &OpcodeTable,
    policy: &PollPolicy,
) -> Result<()> {
    let max_polls = policy.max_polls();

    for poll in 0..max_polls {
        if !is_busy(t, ops)? {
            log::trace!("device ready after {} busy polls", poll);
            return Ok(());
        }
        if policy.poll_delay_us > 0 {
            t.delay_us(policy.poll_delay_us);
        }
    }

    log::warn!(
        "device still busy after {} polls ({}us budget)",
        max_polls,
        policy.timeout_us
    );
    Err(Error::DeviceTimeout)
}

/// Read the 16-bit manufacturer/device identification code
///
/// The identification command takes three zero address bytes and returns
/// the manufacturer ID followed by the device ID. The code is
/// `manufacturer << 8 | device`.
pub fn read_device_id<T: SpiTransport + ?Sized>(t: &mut T, ops: &OpcodeTable) -> Result<u16> {
    let mut buf = [0u8; 2];
    let mut cmd = SpiCommand::read_3b(ops.read_id, 0, &mut buf);
    execute(t, &mut cmd)?;
    Ok(u16::from_be_bytes(buf))
}

/// Read data with 3-byte addressing
///
/// The whole buffer is filled by one frame; the device auto-increments the
/// address across page boundaries.
pub fn read<T: SpiTransport + ?Sized>(
    t: &mut T,
    ops: &OpcodeTable,
    addr: u32,
    buf: &mut [u8],
) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let mut cmd = SpiCommand::read_3b(ops.read_data, addr, buf);
    execute(t, &mut cmd)
}

/// Program a single page (up to page_size bytes)
///
/// The data must not cross a page boundary: the device wraps within the page
/// instead of carrying into the next one.
pub fn program_page<T: SpiTransport + ?Sized>(
    t: &mut T,
    ops: &OpcodeTable,
    addr: u32,
    data: &[u8],
    policy: &PollPolicy,
) -> Result<()> {
    log::trace!("page program {:#08x} ({} bytes)", addr, data.len());
    write_enable(t, ops)?;
    let mut cmd = SpiCommand::write_3b(ops.page_program, addr, data);
    execute(t, &mut cmd)?;
    wait_ready(t, ops, policy)
}

/// Program an arbitrary span, one page program per page touched
///
/// Stops at the first failing page; pages already programmed stay
/// programmed. A zero-length span sends nothing.
pub fn program_range<T: SpiTransport + ?Sized>(
    t: &mut T,
    ops: &OpcodeTable,
    addr: u32,
    data: &[u8],
    page_size: u32,
    policy: &PollPolicy,
) -> Result<()> {
    for chunk in PageChunks::new(addr, data.len(), page_size) {
        program_page(t, ops, chunk.addr, chunk.slice(data), policy)?;
    }
    Ok(())
}

/// Erase granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseKind {
    /// Smallest erase unit (4 KiB)
    Sector,
    /// Intermediate erase unit (64 KiB)
    Block,
    /// Whole array
    Chip,
}

impl EraseKind {
    /// Opcode for this erase in the given command set
    pub const fn opcode(&self, ops: &OpcodeTable) -> u8 {
        match self {
            Self::Sector => ops.sector_erase,
            Self::Block => ops.block_erase,
            Self::Chip => ops.chip_erase,
        }
    }

    /// Whether the command carries an address
    pub const fn has_address(&self) -> bool {
        !matches!(self, Self::Chip)
    }
}

/// Erase one unit (or the whole chip)
///
/// `addr` is ignored for [`EraseKind::Chip`]. An unaligned sector or block
/// address erases the unit containing it; the device drops the low bits.
pub fn erase<T: SpiTransport + ?Sized>(
    t: &mut T,
    ops: &OpcodeTable,
    kind: EraseKind,
    addr: u32,
    policy: &PollPolicy,
) -> Result<()> {
    log::debug!("{:?} erase at {:#08x}", kind, addr);
    write_enable(t, ops)?;
    let opcode = kind.opcode(ops);
    let mut cmd = if kind.has_address() {
        SpiCommand::erase_3b(opcode, addr)
    } else {
        SpiCommand::simple(opcode)
    };
    execute(t, &mut cmd)?;
    wait_ready(t, ops, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::opcodes;
    use alloc::vec;
    use alloc::vec::Vec;

    /// Records every frame and answers status reads from a busy countdown
    #[derive(Default)]
    struct Scripted {
        selected: bool,
        current: Vec<u8>,
        frames: Vec<Vec<u8>>,
        busy_polls: u32,
        fail_opcode: Option<u8>,
        id: [u8; 2],
        delay_total: u64,
    }

    impl Scripted {
        fn count(&self, opcode: u8) -> usize {
            self.frames.iter().filter(|f| f[0] == opcode).count()
        }
    }

    impl SpiTransport for Scripted {
        fn select(&mut self) -> Result<()> {
            assert!(!self.selected, "nested select");
            self.selected = true;
            self.current.clear();
            Ok(())
        }

        fn deselect(&mut self) -> Result<()> {
            self.selected = false;
            self.frames.push(core::mem::take(&mut self.current));
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<()> {
            assert!(self.selected);
            self.current.extend_from_slice(data);
            if self.fail_opcode.is_some() && self.fail_opcode == self.current.first().copied() {
                return Err(Error::Transport);
            }
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            assert!(self.selected);
            match self.current[0] {
                opcodes::RDSR => {
                    let busy = self.busy_polls > 0;
                    if busy {
                        self.busy_polls -= 1;
                    }
                    buf[0] = if busy { 0x03 } else { 0x00 };
                }
                opcodes::REMS => buf.copy_from_slice(&self.id),
                _ => buf.fill(0xA5),
            }
            Ok(())
        }

        fn delay_us(&mut self, us: u32) {
            self.delay_total += us as u64;
        }
    }

    const OPS: &OpcodeTable = &OpcodeTable::W25Q;

    #[test]
    fn test_wait_ready_counts_polls() {
        for n in [0u32, 1, 5, 17] {
            let mut t = Scripted {
                busy_polls: n,
                ..Default::default()
            };
            wait_ready(&mut t, OPS, &PollPolicy::new(10, 10_000)).unwrap();
            assert_eq!(t.count(opcodes::RDSR), n as usize + 1);
            assert_eq!(t.delay_total, n as u64 * 10);
            assert!(!t.selected);
        }
    }

    #[test]
    fn test_wait_ready_times_out() {
        let mut t = Scripted {
            busy_polls: u32::MAX,
            ..Default::default()
        };
        let policy = PollPolicy::new(100, 1_000);
        assert_eq!(wait_ready(&mut t, OPS, &policy), Err(Error::DeviceTimeout));
        assert_eq!(t.count(opcodes::RDSR), 10);
        assert!(!t.selected);
    }

    #[test]
    fn test_wait_ready_polls_at_least_once() {
        let mut t = Scripted::default();
        wait_ready(&mut t, OPS, &PollPolicy::new(1_000, 0)).unwrap();
        assert_eq!(t.count(opcodes::RDSR), 1);
    }

    #[test]
    fn test_read_device_id() {
        let mut t = Scripted {
            id: [0xEF, 0x17],
            ..Default::default()
        };
        assert_eq!(read_device_id(&mut t, OPS).unwrap(), 0xEF17);
        assert_eq!(t.frames, vec![vec![0x90, 0, 0, 0]]);
    }

    #[test]
    fn test_program_page_sequence() {
        let mut t = Scripted {
            busy_polls: 2,
            ..Default::default()
        };
        program_page(&mut t, OPS, 0x0102_0304, &[1, 2, 3], &PollPolicy::PAGE_PROGRAM).unwrap();
        assert_eq!(t.frames[0], vec![opcodes::WREN]);
        assert_eq!(t.frames[1], vec![opcodes::PP, 0x02, 0x03, 0x04, 1, 2, 3]);
        assert_eq!(&t.frames[2..], &vec![vec![opcodes::RDSR]; 3][..]);
    }

    #[test]
    fn test_program_range_splits_at_pages() {
        let mut t = Scripted::default();
        let data: Vec<u8> = (0..300).map(|i| i as u8).collect();
        program_range(&mut t, OPS, 200, &data, 256, &PollPolicy::PAGE_PROGRAM).unwrap();

        let programs: Vec<&Vec<u8>> = t.frames.iter().filter(|f| f[0] == opcodes::PP).collect();
        assert_eq!(programs.len(), 2);
        assert_eq!(&programs[0][..4], &[0x02, 0x00, 0x00, 200]);
        assert_eq!(programs[0].len() - 4, 56);
        assert_eq!(&programs[1][..4], &[0x02, 0x00, 0x01, 0x00]);
        assert_eq!(programs[1].len() - 4, 244);
        assert_eq!(t.count(opcodes::WREN), 2);
    }

    #[test]
    fn test_program_range_empty_sends_nothing() {
        let mut t = Scripted::default();
        program_range(&mut t, OPS, 0x40, &[], 256, &PollPolicy::PAGE_PROGRAM).unwrap();
        assert!(t.frames.is_empty());
    }

    #[test]
    fn test_erase_kinds() {
        let mut t = Scripted::default();
        erase(&mut t, OPS, EraseKind::Sector, 0x1234, &PollPolicy::SECTOR_ERASE).unwrap();
        erase(&mut t, OPS, EraseKind::Block, 0x1_0000, &PollPolicy::BLOCK_ERASE).unwrap();
        erase(&mut t, OPS, EraseKind::Chip, 0xFFFF, &PollPolicy::CHIP_ERASE).unwrap();

        assert!(t.frames.contains(&vec![0x20, 0x00, 0x12, 0x34]));
        assert!(t.frames.contains(&vec![0xD8, 0x01, 0x00, 0x00]));
        assert!(t.frames.contains(&vec![0xC7]));
        assert_eq!(t.count(opcodes::WREN), 3);
    }

    #[test]
    fn test_macronix_chip_erase_opcode() {
        let mut t = Scripted::default();
        erase(&mut t, &OpcodeTable::MX25L, EraseKind::Chip, 0, &PollPolicy::CHIP_ERASE).unwrap();
        assert!(t.frames.contains(&vec![0x60]));
    }

    #[test]
    fn test_transport_error_releases_chip_select() {
        let mut t = Scripted {
            fail_opcode: Some(opcodes::PP),
            ..Default::default()
        };
        let result = program_page(&mut t, OPS, 0, &[0xAA], &PollPolicy::PAGE_PROGRAM);
        assert_eq!(result, Err(Error::Transport));
        assert!(!t.selected);
        // No status poll after the failed program frame
        assert_eq!(t.count(opcodes::RDSR), 0);
    }
}
