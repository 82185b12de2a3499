//! SPI types and command structures
//!
//! This module provides types for representing SPI transactions,
//! status register bits, and the per-family opcode tables.

mod address;
mod command;
pub mod opcodes;
mod status;

pub use address::{AddressWidth, ADDRESS_MASK_3B};
pub use command::{SpiCommand, MAX_HEADER_LEN};
pub use opcodes::OpcodeTable;
pub use status::StatusFlags;
