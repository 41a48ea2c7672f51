//! Byte-level simulated SD card plus a FAT16 fixture image, for host tests.
//! The simulation models the receive register the way the hardware does:
//! `recv_byte` samples it, only `send_byte` clocks.

use std::collections::VecDeque;
use std::vec;
use std::vec::Vec;

use crate::link::{ChipSelect, SpiLink};
use crate::SECTOR_SIZE;

/// Simulated SPI-mode SD card backed by an in-memory disk image. Speaks the
/// command subset the driver uses; fault-injection fields cover the failure
/// paths.
pub struct SimCard {
    image: Vec<u8>,
    shift_in: u8,
    cs_asserted: bool,
    settled_clocks: u32,
    frame: Vec<u8>,
    queue: VecDeque<u8>,
    idle_polls_before_ready: u32,
    /// Completed CMD17 data transfers.
    pub sector_reads: usize,
    /// R1 returned for CMD17; 0x00 accepts the read.
    pub cmd17_r1: u8,
    /// Token sent ahead of sector data; 0xFE is block start.
    pub data_token: u8,
    /// A mute card never drives the line low.
    pub mute: bool,
}

impl SimCard {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            shift_in: 0xFF,
            cs_asserted: false,
            settled_clocks: 0,
            frame: Vec::new(),
            queue: VecDeque::new(),
            idle_polls_before_ready: 2,
            sector_reads: 0,
            cmd17_r1: 0x00,
            data_token: 0xFE,
            mute: false,
        }
    }

    fn execute(&mut self) {
        let cmd = self.frame[0] & 0x3F;
        let arg = u32::from_be_bytes([self.frame[1], self.frame[2], self.frame[3], self.frame[4]]);
        self.frame.clear();
        // One latency byte before every response, like a real card.
        self.queue.push_back(0xFF);
        match cmd {
            0 => {
                // Reset drops the card back to idle, so a later bring-up
                // walks ACMD41 again.
                self.idle_polls_before_ready = 2;
                self.queue.push_back(0x01);
            }
            8 => {
                self.queue.push_back(0x01);
                self.queue.extend([0x00, 0x00, 0x01, 0xAA]);
            }
            55 => self.queue.push_back(0x01),
            41 => {
                if self.idle_polls_before_ready > 0 {
                    self.idle_polls_before_ready -= 1;
                    self.queue.push_back(0x01);
                } else {
                    self.queue.push_back(0x00);
                }
            }
            58 => {
                self.queue.push_back(0x00);
                self.queue.extend([0x00, 0xFF, 0x80, 0x00]);
            }
            16 => {
                let r1 = if arg == SECTOR_SIZE as u32 { 0x00 } else { 0x40 };
                self.queue.push_back(r1);
            }
            17 => {
                self.queue.push_back(self.cmd17_r1);
                if self.cmd17_r1 == 0x00 {
                    self.queue.push_back(0xFF);
                    self.queue.push_back(self.data_token);
                    if self.data_token == 0xFE {
                        let start = arg as usize * SECTOR_SIZE;
                        for offset in 0..SECTOR_SIZE {
                            let byte = self.image.get(start + offset).copied().unwrap_or(0);
                            self.queue.push_back(byte);
                        }
                        // Data CRC16 placeholder.
                        self.queue.extend([0xAA, 0xBB]);
                        self.sector_reads += 1;
                    }
                }
            }
            _ => self.queue.push_back(0x04),
        }
    }
}

impl SpiLink for SimCard {
    fn send_byte(&mut self, byte: u8) {
        if self.mute {
            self.shift_in = 0xFF;
            return;
        }
        if !self.frame.is_empty() {
            self.frame.push(byte);
            self.shift_in = 0xFF;
            if self.frame.len() == 6 {
                self.execute();
            }
            return;
        }
        if self.queue.is_empty() && byte & 0xC0 == 0x40 {
            self.frame.push(byte);
            self.shift_in = 0xFF;
            return;
        }
        if !self.cs_asserted {
            self.settled_clocks = self.settled_clocks.saturating_add(1);
            self.shift_in = 0xFF;
            return;
        }
        self.shift_in = match self.queue.pop_front() {
            Some(byte) => byte,
            // Past the native-mode settle window an unaddressed poll gets
            // the idle token.
            None if self.settled_clocks >= 10 => 0x01,
            None => 0xFF,
        };
    }

    fn recv_byte(&mut self) -> u8 {
        self.shift_in
    }

    fn set_chip_select(&mut self, select: ChipSelect) {
        self.cs_asserted = matches!(select, ChipSelect::Asserted);
        self.frame.clear();
        self.queue.clear();
    }
}

// Fixture volume geometry: MBR at 0, partition at 1, one reserved sector,
// one FAT sector, a 16-entry root directory (one sector), data from 4.
pub const PART_START: u32 = 1;
pub const FAT_START: u32 = 2;
pub const ROOT_DIR_START: u32 = 3;
pub const DATA_START: u32 = 4;
pub const TOTAL_SECTORS: u32 = 64;
pub const ROOT_ENTRIES: u16 = 16;

pub fn cluster_lba(cluster: u16, sectors_per_cluster: u8) -> u32 {
    DATA_START + (cluster as u32 - 2) * sectors_per_cluster as u32
}

/// A blank, valid FAT16 fixture image. Clusters 0 and 1 carry the usual
/// reserved markers; files are layered on with the helpers below.
pub fn fixture_image(sectors_per_cluster: u8) -> Vec<u8> {
    let mut image = vec![0u8; TOTAL_SECTORS as usize * SECTOR_SIZE];

    let mbr = 446;
    image[mbr] = 0x00;
    image[mbr + 4] = 6;
    image[mbr + 8..mbr + 12].copy_from_slice(&PART_START.to_le_bytes());
    image[mbr + 12..mbr + 16].copy_from_slice(&(TOTAL_SECTORS - PART_START).to_le_bytes());
    image[510] = 0x55;
    image[511] = 0xAA;

    let boot = PART_START as usize * SECTOR_SIZE;
    image[boot + 11..boot + 13].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
    image[boot + 13] = sectors_per_cluster;
    image[boot + 14..boot + 16].copy_from_slice(&1u16.to_le_bytes());
    image[boot + 16] = 1;
    image[boot + 17..boot + 19].copy_from_slice(&ROOT_ENTRIES.to_le_bytes());
    image[boot + 21] = 0xF8;
    image[boot + 22..boot + 24].copy_from_slice(&1u16.to_le_bytes());
    image[boot + 32..boot + 36].copy_from_slice(&(TOTAL_SECTORS - PART_START).to_le_bytes());
    image[boot + 43..boot + 54].copy_from_slice(b"BOOTVOL    ");
    image[boot + 510] = 0x55;
    image[boot + 511] = 0xAA;

    set_fat_entry(&mut image, 0, 0xFFF8);
    set_fat_entry(&mut image, 1, 0xFFFF);
    image
}

pub fn set_fat_entry(image: &mut [u8], cluster: u16, value: u16) {
    let off = FAT_START as usize * SECTOR_SIZE + cluster as usize * 2;
    image[off..off + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn add_root_entry(
    image: &mut [u8],
    slot: usize,
    name: &[u8; 8],
    ext: &[u8; 3],
    cluster: u16,
    size: u32,
) {
    let off = ROOT_DIR_START as usize * SECTOR_SIZE + slot * 32;
    image[off..off + 8].copy_from_slice(name);
    image[off + 8..off + 11].copy_from_slice(ext);
    image[off + 11] = 0x20;
    image[off + 26..off + 28].copy_from_slice(&cluster.to_le_bytes());
    image[off + 28..off + 32].copy_from_slice(&size.to_le_bytes());
}

pub fn write_data(image: &mut [u8], lba: u32, data: &[u8]) {
    let off = lba as usize * SECTOR_SIZE;
    image[off..off + data.len()].copy_from_slice(data);
}
