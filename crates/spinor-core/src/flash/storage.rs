//! `embedded-storage` integration

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

use super::SpiNorFlash;
use crate::chip::SECTOR_SIZE;
use crate::error::{Error, Result};
use crate::transport::SpiTransport;

impl NorFlashError for Error {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            Error::AddressOutOfRange => NorFlashErrorKind::OutOfBounds,
            _ => NorFlashErrorKind::Other,
        }
    }
}

impl<T: SpiTransport> ErrorType for SpiNorFlash<T> {
    type Error = Error;
}

impl<T: SpiTransport> ReadNorFlash for SpiNorFlash<T> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<()> {
        SpiNorFlash::read(self, offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.geometry().capacity() as usize
    }
}

impl<T: SpiTransport> NorFlash for SpiNorFlash<T> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    /// Erase `[from, to)` using 64 KiB blocks where aligned, sectors elsewhere
    fn erase(&mut self, from: u32, to: u32) -> Result<()> {
        let geometry = *self.geometry();
        if from > to || to > geometry.capacity() {
            return Err(Error::AddressOutOfRange);
        }
        let sector = geometry.sector_size();
        if from % sector != 0 || to % sector != 0 {
            return Err(Error::NotAligned);
        }

        let block = geometry.block_size();
        let mut addr = from;
        while addr < to {
            if addr % block == 0 && to - addr >= block {
                self.erase_block(addr)?;
                addr += block;
            } else {
                self.erase_sector(addr)?;
                addr += sector;
            }
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<()> {
        SpiNorFlash::write(self, offset, bytes)
    }
}
