use crate::card::SdCard;
use crate::link::SpiLink;
use crate::SECTOR_SIZE;

use super::layout::{pad_field, DirEntry};
use super::{FatError, FatVolume};

/// FAT16 end-of-chain markers start here. The walk below is length-driven,
/// so seeing one while bytes remain means the directory entry and the chain
/// disagree.
const END_OF_CHAIN: u16 = 0xFFF8;

impl<const FAT_CAP: usize, const ROOT_CAP: usize> FatVolume<FAT_CAP, ROOT_CAP> {
    /// Resolves `name`/`ext` in the root directory and streams the file's
    /// bytes into `dest`. The byte count returned on success always equals
    /// the directory entry's declared size.
    ///
    /// Full sectors are read straight into `dest`; a final partial sector
    /// bounces through a scratch buffer. A failed read leaves `dest`
    /// partially written.
    pub fn load_file<L: SpiLink>(
        &self,
        card: &mut SdCard<L>,
        name: &str,
        ext: &str,
        dest: &mut [u8],
    ) -> Result<usize, FatError> {
        let entry = self.find_entry(name, ext)?;
        let file_size = entry.file_size as usize;
        log::info!(
            "reading [{}]: cluster {} length {}",
            entry.display_name(),
            entry.starting_cluster,
            entry.file_size,
        );

        if file_size == 0 {
            return Ok(0);
        }
        if dest.len() < file_size {
            return Err(FatError::BufferTooSmall { needed: file_size });
        }

        let sectors_per_cluster = self.boot.sectors_per_cluster as u32;
        let mut cluster = entry.starting_cluster;
        let mut remaining = file_size;
        let mut written = 0usize;

        while remaining > 0 {
            let first_lba = self.cluster_lba(cluster)?;
            for sector_offset in 0..sectors_per_cluster {
                if remaining == 0 {
                    break;
                }
                let lba = first_lba + sector_offset;
                if remaining >= SECTOR_SIZE {
                    let Some((chunk, _)) = dest[written..].split_first_chunk_mut() else {
                        return Err(FatError::BufferTooSmall { needed: file_size });
                    };
                    card.read_sector(lba, chunk)?;
                    written += SECTOR_SIZE;
                    remaining -= SECTOR_SIZE;
                } else {
                    let mut scratch = [0u8; SECTOR_SIZE];
                    card.read_sector(lba, &mut scratch)?;
                    dest[written..written + remaining].copy_from_slice(&scratch[..remaining]);
                    written += remaining;
                    remaining = 0;
                }
            }
            if remaining > 0 {
                cluster = self.next_cluster(cluster)?;
            }
        }

        Ok(written)
    }

    /// Exact match against the space-padded 8+3 fields, case-sensitive as
    /// stored; the first hit in on-disk order wins.
    fn find_entry(&self, name: &str, ext: &str) -> Result<&DirEntry, FatError> {
        let padded_name: [u8; 8] = pad_field(name)?;
        let padded_ext: [u8; 3] = pad_field(ext)?;
        self.root_dir
            .iter()
            .find(|entry| {
                entry.name[0] != 0 && entry.name == padded_name && entry.ext == padded_ext
            })
            .ok_or_else(|| {
                log::warn!("file not found: {}.{}", name, ext);
                FatError::NotFound
            })
    }

    /// Conventional FAT addressing: cluster 2 opens the data region.
    fn cluster_lba(&self, cluster: u16) -> Result<u32, FatError> {
        if cluster < 2 || cluster as usize >= self.fat.len() {
            return Err(FatError::BadCluster(cluster));
        }
        Ok(self.data_start + (cluster as u32 - 2) * self.boot.sectors_per_cluster as u32)
    }

    fn next_cluster(&self, cluster: u16) -> Result<u16, FatError> {
        let value = *self
            .fat
            .get(cluster as usize)
            .ok_or(FatError::BadCluster(cluster))?;
        if value < 2 || value >= END_OF_CHAIN {
            return Err(FatError::BadCluster(value));
        }
        Ok(value)
    }
}
