//! Transport trait definitions
//!
//! The driver only needs four things from the physical link: assert and
//! release chip-select, clock bytes out, clock bytes in, and wait.

use crate::error::Result;
use crate::spi::{SpiCommand, MAX_HEADER_LEN};

/// Chip-select framed byte transport
///
/// This trait represents the exclusive owner of one device's chip-select line
/// and the byte-exchange channel behind it. Implementations are synchronous
/// and blocking; every call returns once the bytes have been clocked.
///
/// ## Example: GPIO chip-select over a HAL SPI bus
///
/// ```ignore
/// impl SpiTransport for Board {
///     fn select(&mut self) -> Result<()> {
///         self.cs.set_low();
///         Ok(())
///     }
///
///     fn deselect(&mut self) -> Result<()> {
///         self.spi.flush()?;
///         self.cs.set_high();
///         Ok(())
///     }
///
///     // write/read/delay_us forward to the peripheral
/// }
/// ```
pub trait SpiTransport {
    /// Assert chip-select, starting a transaction
    fn select(&mut self) -> Result<()>;

    /// Release chip-select, ending the transaction
    ///
    /// Devices latch program and erase commands on this edge.
    fn deselect(&mut self) -> Result<()>;

    /// Clock `data` out, discarding what is clocked in
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Clock `buf.len()` bytes in, sending filler bytes
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Delay for the specified number of microseconds
    fn delay_us(&mut self, us: u32);

    /// Delay for the specified number of milliseconds
    fn delay_ms(&mut self, ms: u32) {
        for _ in 0..ms {
            self.delay_us(1_000);
        }
    }
}

/// Lend a transport to a driver without giving up ownership
impl<T: SpiTransport + ?Sized> SpiTransport for &mut T {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }

    fn delay_us(&mut self, us: u32) {
        (**self).delay_us(us)
    }

    fn delay_ms(&mut self, ms: u32) {
        (**self).delay_ms(ms)
    }
}

/// Run `f` inside one chip-select frame
///
/// Chip-select is released on every exit path. The first error wins: a
/// failure inside the frame is reported even if releasing also fails.
pub fn transaction<T, R, F>(transport: &mut T, f: F) -> Result<R>
where
    T: SpiTransport + ?Sized,
    F: FnOnce(&mut T) -> Result<R>,
{
    if let Err(e) = transport.select() {
        let _ = transport.deselect();
        return Err(e);
    }

    let result = f(transport);
    let released = transport.deselect();

    let value = result?;
    released?;
    Ok(value)
}

/// Execute a single SPI command as one chip-select frame
///
/// Sends the encoded header, then the write phase, then fills the read
/// buffer.
pub fn execute<T: SpiTransport + ?Sized>(transport: &mut T, cmd: &mut SpiCommand<'_>) -> Result<()> {
    let mut header = [0u8; MAX_HEADER_LEN];
    let header_len = cmd.encode_header(&mut header);

    transaction(transport, |t| {
        t.write(&header[..header_len])?;
        if cmd.has_write() {
            t.write(cmd.write_data)?;
        }
        if cmd.has_read() {
            t.read(cmd.read_buf)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct Pins {
        selected: bool,
        deselects: usize,
        fail_deselect: bool,
    }

    impl SpiTransport for Pins {
        fn select(&mut self) -> Result<()> {
            self.selected = true;
            Ok(())
        }

        fn deselect(&mut self) -> Result<()> {
            self.selected = false;
            self.deselects += 1;
            if self.fail_deselect {
                return Err(Error::Transport);
            }
            Ok(())
        }

        fn write(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            buf.fill(0);
            Ok(())
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    #[test]
    fn test_transaction_releases_on_error() {
        let mut pins = Pins::default();
        let result: Result<()> = transaction(&mut pins, |t| {
            assert!(t.selected);
            Err(Error::DeviceTimeout)
        });
        assert_eq!(result, Err(Error::DeviceTimeout));
        assert!(!pins.selected);
        assert_eq!(pins.deselects, 1);
    }

    #[test]
    fn test_first_error_wins() {
        let mut pins = Pins {
            fail_deselect: true,
            ..Default::default()
        };
        let result: Result<()> = transaction(&mut pins, |_| Err(Error::PageBoundary));
        assert_eq!(result, Err(Error::PageBoundary));

        let result = transaction(&mut pins, |_| Ok(7));
        assert_eq!(result, Err(Error::Transport));
    }
}
