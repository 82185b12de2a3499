//! Flash chip types and identification tables
//!
//! This module maps the identification code read at start-up to a device
//! family (command set) and geometry.

mod table;
mod types;

#[cfg(feature = "std")]
mod database;

pub use table::*;
pub use types::*;

#[cfg(feature = "std")]
pub use database::*;
