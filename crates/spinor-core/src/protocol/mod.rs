//! Protocol implementations
//!
//! Command sequences for 25-series SPI NOR flash, built on the
//! [`SpiTransport`](crate::transport::SpiTransport) framing helpers.

mod spi25;

pub use spi25::*;
