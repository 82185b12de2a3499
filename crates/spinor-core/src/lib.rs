//! spinor-core - SPI NOR flash and I2C EEPROM programming layer
//!
//! This crate turns byte-addressed read, write and erase requests into
//! framed command sequences for 25-series SPI NOR flash and AT24-series
//! EEPROMs. It is `no_std` and allocation free by default.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), the RON
//!   chip database and TOML configuration
//! - `alloc` - Enable heap allocation for convenience readers
//!
//! # Example
//!
//! ```ignore
//! use spinor_core::config::DriverConfig;
//! use spinor_core::flash::SpiNorFlash;
//! use spinor_core::transport::HalSpi;
//!
//! let transport = HalSpi::new(spi_bus, cs_pin, delay);
//! let mut flash = SpiNorFlash::init(transport, DriverConfig::default())?;
//! log::info!("found {} ({} bytes)", flash.identify().name, flash.geometry().capacity());
//!
//! flash.erase_sector(0x1000)?;
//! flash.write(0x1000, b"hello")?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(any(feature = "alloc", test))]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod algo;
pub mod chip;
pub mod config;
pub mod eeprom;
pub mod error;
pub mod flash;
pub mod paging;
pub mod protocol;
pub mod spi;
pub mod transport;

pub use error::{Error, Result};
