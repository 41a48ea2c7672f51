//! Bit-exact decoders for the on-disk structures. Every field is pulled out
//! of the raw sector little-endian, byte by byte; nothing is overlaid.

use core::fmt::{self, Write};

use crate::SECTOR_SIZE;

use super::{FatError, FAT16_PARTITION_TYPES, PARTITION_TABLE_OFFSET};

/// One MBR partition-table slot. CHS fields are skipped; addressing is LBA
/// throughout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionEntry {
    pub boot_flag: u8,
    pub partition_type: u8,
    pub start_sector: u32,
    pub length_sectors: u32,
}

impl PartitionEntry {
    /// Decodes the first partition slot of an MBR sector and checks the
    /// invariants the mount relies on.
    pub fn first_from_mbr(sector: &[u8; SECTOR_SIZE]) -> Result<Self, FatError> {
        let raw = &sector[PARTITION_TABLE_OFFSET..PARTITION_TABLE_OFFSET + 16];
        let entry = Self {
            boot_flag: raw[0],
            partition_type: raw[4],
            start_sector: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
            length_sectors: u32::from_le_bytes([raw[12], raw[13], raw[14], raw[15]]),
        };
        if entry.boot_flag != 0x00 && entry.boot_flag != 0x80 {
            log::warn!("partition 1 not valid: flag {:#04x}", entry.boot_flag);
            return Err(FatError::InvalidPartitionFlag(entry.boot_flag));
        }
        if !FAT16_PARTITION_TYPES.contains(&entry.partition_type) {
            log::warn!("partition 1 not FAT16: type {:#04x}", entry.partition_type);
            return Err(FatError::NotFat16(entry.partition_type));
        }
        Ok(entry)
    }
}

/// The BIOS Parameter Block fields the reader consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootSector {
    pub sector_size: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub number_of_fats: u8,
    pub root_dir_entries: u16,
    pub fat_size_sectors: u16,
    pub total_sectors_long: u32,
    pub volume_label: [u8; 11],
}

impl BootSector {
    pub fn decode(sector: &[u8; SECTOR_SIZE]) -> Result<Self, FatError> {
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&sector[43..54]);
        let boot = Self {
            sector_size: u16::from_le_bytes([sector[11], sector[12]]),
            sectors_per_cluster: sector[13],
            reserved_sectors: u16::from_le_bytes([sector[14], sector[15]]),
            number_of_fats: sector[16],
            root_dir_entries: u16::from_le_bytes([sector[17], sector[18]]),
            fat_size_sectors: u16::from_le_bytes([sector[22], sector[23]]),
            total_sectors_long: u32::from_le_bytes([
                sector[32], sector[33], sector[34], sector[35],
            ]),
            volume_label,
        };
        if boot.total_sectors_long == 0 {
            log::warn!("boot sector declares zero total sectors");
            return Err(FatError::InvalidBootSector);
        }
        if !boot.sector_size.is_power_of_two() || boot.sector_size as usize != SECTOR_SIZE {
            // CMD16 pins the transfer size, so only one sector size works.
            log::warn!("unsupported sector size {}", boot.sector_size);
            return Err(FatError::UnsupportedSectorSize(boot.sector_size));
        }
        if boot.sectors_per_cluster == 0 || boot.number_of_fats == 0 {
            log::warn!("boot sector geometry invalid");
            return Err(FatError::InvalidBootSector);
        }
        Ok(boot)
    }
}

/// One 32-byte root-directory entry, kept in on-disk order.
#[derive(Clone, Copy, Debug)]
pub struct DirEntry {
    pub name: [u8; 8],
    pub ext: [u8; 3],
    pub attributes: u8,
    pub modify_time: u16,
    pub modify_date: u16,
    pub starting_cluster: u16,
    pub file_size: u32,
}

impl DirEntry {
    /// `raw` is one 32-byte slot out of a directory sector.
    pub fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; 8];
        name.copy_from_slice(&raw[0..8]);
        let mut ext = [0u8; 3];
        ext.copy_from_slice(&raw[8..11]);
        Self {
            name,
            ext,
            attributes: raw[11],
            modify_time: u16::from_le_bytes([raw[22], raw[23]]),
            modify_date: u16::from_le_bytes([raw[24], raw[25]]),
            starting_cluster: u16::from_le_bytes([raw[26], raw[27]]),
            file_size: u32::from_le_bytes([raw[28], raw[29], raw[30], raw[31]]),
        }
    }

    /// In use iff the name has been written and the entry carries data.
    pub fn in_use(&self) -> bool {
        self.name[0] != 0 && self.file_size != 0
    }

    pub fn display_name(&self) -> NameDisplay {
        NameDisplay {
            name: self.name,
            ext: self.ext,
        }
    }
}

/// Renders a stored 8+3 name the way a directory listing prints it:
/// printable bytes verbatim, anything else as a space.
pub struct NameDisplay {
    name: [u8; 8],
    ext: [u8; 3],
}

impl fmt::Display for NameDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.name {
            f.write_char(printable(byte))?;
        }
        f.write_char('.')?;
        for &byte in &self.ext {
            f.write_char(printable(byte))?;
        }
        Ok(())
    }
}

fn printable(byte: u8) -> char {
    if (32..127).contains(&byte) {
        byte as char
    } else {
        ' '
    }
}

/// Space-pads a query string into a fixed directory-entry field. Matching
/// is exact against the padded field, never a prefix.
pub(crate) fn pad_field<const N: usize>(text: &str) -> Result<[u8; N], FatError> {
    let bytes = text.as_bytes();
    if bytes.len() > N {
        return Err(FatError::NameTooLong);
    }
    let mut field = [b' '; N];
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(field)
}
