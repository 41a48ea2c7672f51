use crate::link::{ChipSelect, SpiLink};
use crate::SECTOR_SIZE;

use super::{
    CardState, SdCard, SdCardError, ACMD41, ACMD41_LIMIT, CMD0, CMD16, CMD55, CMD58, CMD8,
    FILLER, MODE_SWITCH_LIMIT,
};

impl<L: SpiLink> SdCard<L> {
    /// Runs the SPI mode switch plus the full bring-up command sequence.
    /// Re-runnable: every call restarts from scratch, and a failed call
    /// leaves the session `Uninitialized`.
    pub fn initialize(&mut self) -> Result<(), SdCardError> {
        self.state = CardState::Uninitialized;
        let result = self.bring_up();
        if let Err(err) = &result {
            self.state = CardState::Uninitialized;
            log::warn!("card bring-up failed: {:?}", err);
        }
        result
    }

    fn bring_up(&mut self) -> Result<(), SdCardError> {
        self.enter_spi_mode()?;

        // CMD0, software reset. 0x01 = idle.
        let r1 = self.command(CMD0, 0, 0x95);
        if r1 != 0x01 {
            return Err(SdCardError::Cmd0Failed(r1));
        }
        self.state = CardState::Idle;

        // CMD8, interface condition. The four trailing R7 bytes are not
        // checked, only consumed.
        let r1 = self.command(CMD8, 0x0000_01AA, 0x87);
        if r1 != 0x01 {
            return Err(SdCardError::Cmd8Unexpected(r1));
        }
        self.discard_bytes(4);

        // CMD55 + ACMD41 until the card leaves idle.
        let mut r1 = FILLER;
        let mut budget = ACMD41_LIMIT;
        while budget > 0 {
            let _ = self.command(CMD55, 0, 0x00);
            r1 = self.command(ACMD41, 0x4000_0000, 0x00);
            if r1 == 0x00 {
                break;
            }
            budget -= 1;
        }
        if r1 != 0x00 {
            return Err(SdCardError::Acmd41Timeout(r1));
        }
        self.state = CardState::Ready;

        // CMD58, operating conditions. Idle and ready are both acceptable
        // here; the four trailing R3 bytes are consumed unchecked.
        let r1 = self.command(CMD58, 0, 0xFF);
        if r1 > 0x01 {
            return Err(SdCardError::Cmd58Unexpected(r1));
        }
        self.discard_bytes(4);

        // CMD16, fix the block length to one sector.
        let r1 = self.command(CMD16, SECTOR_SIZE as u32, 0xFF);
        if r1 != 0x00 {
            return Err(SdCardError::Cmd16Unexpected(r1));
        }
        self.state = CardState::BlockSizeSet;

        log::info!("card ready, block length {}", SECTOR_SIZE);
        Ok(())
    }

    /// Clocks the card into SPI mode: ten filler bytes with chip-select
    /// released to let it settle, then a response probe with it asserted.
    fn enter_spi_mode(&mut self) -> Result<(), SdCardError> {
        let mut last = FILLER;
        for _ in 0..MODE_SWITCH_LIMIT {
            self.link.set_chip_select(ChipSelect::Released);
            for _ in 0..10 {
                self.link.send_byte(FILLER);
            }
            self.link.set_chip_select(ChipSelect::Asserted);
            last = self.wait_r1();
            if last & 0x80 == 0 {
                self.state = CardState::SpiModeSet;
                return Ok(());
            }
        }
        Err(SdCardError::SpiModeTimeout(last))
    }
}
