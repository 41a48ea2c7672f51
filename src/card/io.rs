use crate::link::SpiLink;
use crate::SECTOR_SIZE;

use super::{
    CardState, SdCard, SdCardError, CMD17, DATA_START_TOKEN, DATA_TOKEN_LIMIT, FILLER,
    R1_POLL_LIMIT,
};

impl<L: SpiLink> SdCard<L> {
    /// Clocks one command frame: leading filler, command byte, big-endian
    /// argument, CRC, then the R1 wait.
    pub(super) fn command(&mut self, cmd: u8, arg: u32, crc: u8) -> u8 {
        self.link.send_byte(FILLER);
        self.link.send_byte(0x40 | cmd);
        for byte in arg.to_be_bytes() {
            self.link.send_byte(byte);
        }
        self.link.send_byte(crc);
        self.wait_r1()
    }

    /// The card holds the line high until its response is ready; poll with
    /// filler bytes until the high bit clears or the budget runs out. The
    /// caller validates whatever comes back.
    pub(super) fn wait_r1(&mut self) -> u8 {
        let mut response = self.link.recv_byte();
        let mut budget = R1_POLL_LIMIT;
        while response & 0x80 != 0 && budget > 0 {
            self.link.send_byte(FILLER);
            response = self.link.recv_byte();
            budget -= 1;
        }
        response
    }

    /// Clocks one trailing or data byte out of the card. No wait semantics:
    /// once a response has started, every clock yields a byte.
    pub(super) fn read_byte(&mut self) -> u8 {
        self.link.send_byte(FILLER);
        self.link.recv_byte()
    }

    pub(super) fn discard_bytes(&mut self, count: usize) {
        for _ in 0..count {
            let _ = self.read_byte();
        }
    }

    /// Reads one sector via CMD17. No retry at this layer; the caller owns
    /// retry policy.
    pub fn read_sector(
        &mut self,
        lba: u32,
        out: &mut [u8; SECTOR_SIZE],
    ) -> Result<(), SdCardError> {
        if self.state != CardState::BlockSizeSet {
            return Err(SdCardError::NotInitialized);
        }

        let r1 = self.command(CMD17, lba, 0xFF);
        if r1 != 0x00 {
            log::warn!("cmd17 rejected: lba={} r1={:#04x}", lba, r1);
            return Err(SdCardError::Cmd17Unexpected(r1));
        }

        let mut token = self.read_byte();
        let mut budget = DATA_TOKEN_LIMIT;
        while token != DATA_START_TOKEN && budget > 0 {
            token = self.read_byte();
            budget -= 1;
        }
        if token != DATA_START_TOKEN {
            log::warn!("no data token: lba={} last={:#04x}", lba, token);
            return Err(SdCardError::DataTokenTimeout(token));
        }

        for slot in out.iter_mut() {
            *slot = self.read_byte();
        }
        // CRC16 placeholder plus trailing clocks, all discarded.
        self.discard_bytes(8);
        Ok(())
    }
}
