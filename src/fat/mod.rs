//! FAT16 volume reader, built entirely on the transport's `read_sector`.
//! Mounting parses the partition table and boot sector, then loads the FAT
//! and the root directory in full; both are immutable afterwards.

use crate::card::SdCardError;

mod layout;
mod read;
mod volume;

pub use layout::{BootSector, DirEntry, NameDisplay, PartitionEntry};
pub use volume::{FatVolume, DEFAULT_FAT_CAPACITY, DEFAULT_ROOT_CAPACITY};

pub(crate) const DIR_ENTRY_SIZE: usize = 32;
pub(crate) const PARTITION_TABLE_OFFSET: usize = 446;
/// Partition type bytes for the FAT16 variants.
pub(crate) const FAT16_PARTITION_TYPES: [u8; 3] = [4, 6, 14];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatError {
    Sd(SdCardError),
    InvalidPartitionFlag(u8),
    NotFat16(u8),
    InvalidBootSector,
    UnsupportedSectorSize(u16),
    FatCapacityExceeded { needed: usize },
    RootCapacityExceeded { needed: usize },
    NameTooLong,
    NotFound,
    BufferTooSmall { needed: usize },
    BadCluster(u16),
}

impl From<SdCardError> for FatError {
    fn from(value: SdCardError) -> Self {
        Self::Sd(value)
    }
}
