use heapless::Vec;

use crate::card::SdCard;
use crate::link::SpiLink;
use crate::SECTOR_SIZE;

use super::layout::{BootSector, DirEntry, PartitionEntry};
use super::{FatError, DIR_ENTRY_SIZE};

const FAT_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / 2;

/// Default table capacities: a 4096-cluster FAT and a 512-entry root
/// directory cover the small boot volumes this loader targets. Bigger
/// volumes pick their own const parameters.
pub const DEFAULT_FAT_CAPACITY: usize = 4096;
pub const DEFAULT_ROOT_CAPACITY: usize = 512;

/// A mounted FAT16 volume: the geometry derived once from the boot sector
/// plus the fully loaded FAT and root directory. Owned, explicitly sized
/// buffers; loaded once per mount and read-only afterwards.
pub struct FatVolume<
    const FAT_CAP: usize = DEFAULT_FAT_CAPACITY,
    const ROOT_CAP: usize = DEFAULT_ROOT_CAPACITY,
> {
    pub(super) boot: BootSector,
    pub(super) fat_start: u32,
    pub(super) root_dir_start: u32,
    pub(super) data_start: u32,
    pub(super) fat: Vec<u16, FAT_CAP>,
    pub(super) root_dir: Vec<DirEntry, ROOT_CAP>,
}

impl<const FAT_CAP: usize, const ROOT_CAP: usize> FatVolume<FAT_CAP, ROOT_CAP> {
    /// Reads the MBR and boot sector, then loads the FAT and the root
    /// directory in full. Any sector failure aborts the mount; nothing is
    /// retained from a failed attempt.
    pub fn mount<L: SpiLink>(card: &mut SdCard<L>) -> Result<Self, FatError> {
        let mut sector = [0u8; SECTOR_SIZE];

        card.read_sector(0, &mut sector)?;
        let partition = PartitionEntry::first_from_mbr(&sector)?;
        log::info!(
            "partition 1: active={:#04x} type={:#04x} lba_start={} sectors={}",
            partition.boot_flag,
            partition.partition_type,
            partition.start_sector,
            partition.length_sectors,
        );

        card.read_sector(partition.start_sector, &mut sector)?;
        let boot = BootSector::decode(&sector)?;
        log::info!(
            "boot sector: {} B/sector, {} sectors/cluster, {} reserved, {} fat(s) of {} sectors, {} root entries, {} sectors total",
            boot.sector_size,
            boot.sectors_per_cluster,
            boot.reserved_sectors,
            boot.number_of_fats,
            boot.fat_size_sectors,
            boot.root_dir_entries,
            boot.total_sectors_long,
        );

        let fat_start = partition.start_sector + boot.reserved_sectors as u32;
        let root_dir_start =
            fat_start + boot.number_of_fats as u32 * boot.fat_size_sectors as u32;
        let root_dir_sectors = (boot.root_dir_entries as u32 * DIR_ENTRY_SIZE as u32)
            .div_ceil(SECTOR_SIZE as u32);
        let data_start = root_dir_start + root_dir_sectors;

        let mut volume = Self {
            boot,
            fat_start,
            root_dir_start,
            data_start,
            fat: Vec::new(),
            root_dir: Vec::new(),
        };
        volume.load_fat(card)?;
        volume.load_root_dir(card)?;
        volume.log_listing();
        Ok(volume)
    }

    fn load_fat<L: SpiLink>(&mut self, card: &mut SdCard<L>) -> Result<(), FatError> {
        let needed = self.boot.fat_size_sectors as usize * FAT_ENTRIES_PER_SECTOR;
        if needed > FAT_CAP {
            log::warn!("fat table needs {} entries, capacity is {}", needed, FAT_CAP);
            return Err(FatError::FatCapacityExceeded { needed });
        }

        let mut sector = [0u8; SECTOR_SIZE];
        for n in 0..self.boot.fat_size_sectors as u32 {
            card.read_sector(self.fat_start + n, &mut sector)?;
            for pair in sector.chunks_exact(2) {
                let _ = self.fat.push(u16::from_le_bytes([pair[0], pair[1]]));
            }
        }
        Ok(())
    }

    fn load_root_dir<L: SpiLink>(&mut self, card: &mut SdCard<L>) -> Result<(), FatError> {
        let needed = self.boot.root_dir_entries as usize;
        if needed > ROOT_CAP {
            log::warn!("root dir has {} entries, capacity is {}", needed, ROOT_CAP);
            return Err(FatError::RootCapacityExceeded { needed });
        }

        let sectors = (needed * DIR_ENTRY_SIZE).div_ceil(SECTOR_SIZE) as u32;
        let mut sector = [0u8; SECTOR_SIZE];
        for n in 0..sectors {
            card.read_sector(self.root_dir_start + n, &mut sector)?;
            for raw in sector.chunks_exact(DIR_ENTRY_SIZE) {
                if self.root_dir.len() == needed {
                    break;
                }
                let _ = self.root_dir.push(DirEntry::decode(raw));
            }
        }
        Ok(())
    }

    /// In-use root entries in on-disk order.
    pub fn entries(&self) -> impl Iterator<Item = &DirEntry> {
        self.root_dir.iter().filter(|entry| entry.in_use())
    }

    pub fn volume_label(&self) -> &[u8; 11] {
        &self.boot.volume_label
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot
    }

    fn log_listing(&self) {
        log::info!("root directory:");
        for (index, entry) in self.root_dir.iter().enumerate() {
            if !entry.in_use() {
                continue;
            }
            log::info!(
                "  file {} [{}] @ cluster {} for {} bytes",
                index,
                entry.display_name(),
                entry.starting_cluster,
                entry.file_size,
            );
        }
    }
}
