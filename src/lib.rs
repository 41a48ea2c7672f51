//! Boot-time SD-card loader: drives the SD SPI command set over a
//! byte-granularity link, mounts the first FAT16 partition, and streams a
//! named file into a caller-supplied buffer.
//!
//! Two layers, consumed strictly bottom-up: [`card`] owns every hardware
//! exchange, [`fat`] only ever asks it to read whole sectors. Everything is
//! synchronous and single-threaded; waits are bounded busy loops.

#![no_std]

#[cfg(test)]
extern crate std;

pub mod card;
pub mod fat;
pub mod link;

#[cfg(test)]
pub(crate) mod sim;

pub use card::{CardState, SdCard, SdCardError};
pub use fat::{FatError, FatVolume};
pub use link::{ChipSelect, HalSpiLink, SpiLink};

/// Transfer unit of the transport and allocation granularity of the volume
/// reader. CMD16 pins the card's block length to this during bring-up.
pub const SECTOR_SIZE: usize = 512;
