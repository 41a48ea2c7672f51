//! SD-card SPI transport: command framing, R1/R3/R7 handling, bring-up, and
//! single-sector reads. Knows nothing about filesystems.

use crate::link::SpiLink;

mod init;
mod io;

const CMD0: u8 = 0;
const CMD8: u8 = 8;
const CMD16: u8 = 16;
const CMD17: u8 = 17;
const CMD55: u8 = 55;
const ACMD41: u8 = 41;
const CMD58: u8 = 58;

const FILLER: u8 = 0xFF;
const DATA_START_TOKEN: u8 = 0xFE;

/// Retry budgets for the bounded busy-wait loops.
pub const R1_POLL_LIMIT: u32 = 32;
pub const MODE_SWITCH_LIMIT: u32 = 32;
pub const ACMD41_LIMIT: u32 = 32;
pub const DATA_TOKEN_LIMIT: u32 = 16384;

/// Bring-up progress. Each state is entered by exactly one successful
/// command exchange; any failure drops the session back to `Uninitialized`,
/// there is no partial success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardState {
    Uninitialized,
    SpiModeSet,
    Idle,
    Ready,
    BlockSizeSet,
}

/// Transport failures, carrying the last response byte observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SdCardError {
    SpiModeTimeout(u8),
    Cmd0Failed(u8),
    Cmd8Unexpected(u8),
    Acmd41Timeout(u8),
    Cmd58Unexpected(u8),
    Cmd16Unexpected(u8),
    Cmd17Unexpected(u8),
    DataTokenTimeout(u8),
    NotInitialized,
}

pub struct SdCard<L> {
    link: L,
    state: CardState,
}

impl<L: SpiLink> SdCard<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            state: CardState::Uninitialized,
        }
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn release(self) -> L {
        self.link
    }
}
