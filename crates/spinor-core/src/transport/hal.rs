//! `embedded-hal` 1.0 transport adapter
//!
//! Binds a bare `SpiBus`, a GPIO chip-select pin and a delay provider into a
//! [`SpiTransport`]. The bus must not be shared with another chip-select
//! unless the caller serializes whole transactions.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, SpiBus};

use super::SpiTransport;
use crate::error::{Error, Result};

/// SPI transport over `embedded-hal` traits
pub struct HalSpi<SPI, CS, D> {
    spi: SPI,
    cs: CS,
    delay: D,
}

impl<SPI, CS, D> HalSpi<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    /// Create a new adapter; chip-select is left untouched until first use
    pub fn new(spi: SPI, cs: CS, delay: D) -> Self {
        Self { spi, cs, delay }
    }

    /// Give back the bus, pin and delay
    pub fn into_parts(self) -> (SPI, CS, D) {
        (self.spi, self.cs, self.delay)
    }
}

fn bus_error<E: spi::Error>(e: E) -> Error {
    log::debug!("SPI bus error: {:?}", e.kind());
    Error::Transport
}

fn pin_error<E: digital::Error>(e: E) -> Error {
    log::debug!("chip-select pin error: {:?}", e.kind());
    Error::Transport
}

impl<SPI, CS, D> SpiTransport for HalSpi<SPI, CS, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    fn select(&mut self) -> Result<()> {
        self.cs.set_low().map_err(pin_error)
    }

    fn deselect(&mut self) -> Result<()> {
        // CS must not rise before the last byte has left the shifter
        let flushed = self.spi.flush().map_err(bus_error);
        self.cs.set_high().map_err(pin_error)?;
        flushed
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.spi.write(data).map_err(bus_error)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.spi.read(buf).map_err(bus_error)
    }

    fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
