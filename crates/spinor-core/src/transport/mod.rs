//! Transport abstraction
//!
//! This module defines the [`SpiTransport`] trait the drivers are written
//! against, the framing helpers built on it, and an adapter for
//! `embedded-hal` buses.

mod hal;
mod traits;

pub use hal::HalSpi;
pub use traits::*;
