//! SPI NOR flash block driver
//!
//! [`SpiNorFlash`] identifies the device once at start-up and then exposes
//! byte-addressed read, write, erase and verify on top of the protocol layer.
//! It also implements the `embedded-storage` NOR flash traits.

mod device;
mod storage;

pub use device::{SpiNorFlash, Verify};
