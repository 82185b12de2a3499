//! I2C EEPROM drivers
//!
//! Page-programmed EEPROMs share the write-splitting rule of NOR flash but
//! signal completion by refusing to acknowledge their address instead of
//! through a status register.

mod at24;

pub use at24::{At24, At24Config, ERASED_VALUE, MAX_PAGE_SIZE};
