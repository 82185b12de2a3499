//! SPI command structure

use super::AddressWidth;

/// Largest header produced by the encoder: opcode + 3 address bytes
pub const MAX_HEADER_LEN: usize = 4;

/// A single SPI transaction
///
/// Designed to avoid allocation - uses slices for data.
/// The lifetime parameter `'a` ties the command to the buffers it references.
///
/// On the wire a command is `{opcode}`, `{opcode, a2, a1, a0}` or
/// `{opcode, a2, a1, a0, payload...}`, optionally followed by a read phase
/// inside the same chip-select frame.
pub struct SpiCommand<'a> {
    /// The opcode byte
    pub opcode: u8,

    /// Address (if any)
    pub address: Option<u32>,

    /// Address width
    pub address_width: AddressWidth,

    /// Data to write after opcode/address
    pub write_data: &'a [u8],

    /// Buffer to read into (mutable)
    pub read_buf: &'a mut [u8],
}

impl<'a> SpiCommand<'a> {
    /// Create a simple command with no address or data (e.g., WREN, chip erase)
    pub fn simple(opcode: u8) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Create a read register command with no address (e.g., RDSR)
    pub fn read_reg(opcode: u8, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: None,
            address_width: AddressWidth::None,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a read command with 3-byte address (e.g., READ, REMS)
    pub fn read_3b(opcode: u8, addr: u32, buf: &'a mut [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: &[],
            read_buf: buf,
        }
    }

    /// Create a write command with 3-byte address (e.g., PP)
    pub fn write_3b(opcode: u8, addr: u32, data: &'a [u8]) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: data,
            read_buf: &mut [],
        }
    }

    /// Create an erase command with 3-byte address
    pub fn erase_3b(opcode: u8, addr: u32) -> Self {
        Self {
            opcode,
            address: Some(addr),
            address_width: AddressWidth::ThreeByte,
            write_data: &[],
            read_buf: &mut [],
        }
    }

    /// Returns true if this command has a read phase
    pub fn has_read(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Returns true if this command has a write phase
    pub fn has_write(&self) -> bool {
        !self.write_data.is_empty()
    }

    /// Returns true if this command has an address phase
    pub fn has_address(&self) -> bool {
        self.address.is_some()
    }

    /// Number of header bytes (opcode + address)
    pub fn header_len(&self) -> usize {
        let addr_len = if self.address.is_some() {
            self.address_width.bytes() as usize
        } else {
            0
        };
        1 + addr_len
    }

    /// Encode opcode and address into `buf`, returning the header length
    ///
    /// `buf` must hold at least [`MAX_HEADER_LEN`] bytes.
    pub fn encode_header(&self, buf: &mut [u8]) -> usize {
        buf[0] = self.opcode;
        if let Some(addr) = self.address {
            self.address_width.encode(addr, &mut buf[1..]);
        }
        self.header_len()
    }

    /// Calculate the total number of bytes clocked in this transaction
    pub fn total_bytes(&self) -> usize {
        self.header_len() + self.write_data.len() + self.read_buf.len()
    }
}
