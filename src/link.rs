use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

/// Chip-select line state. Asserted drives the line low.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChipSelect {
    Asserted,
    Released,
}

/// The three host primitives the driver is built on.
///
/// `recv_byte` samples the most recently shifted-in byte without driving the
/// clock; pairing it with `send_byte(0xFF)` gives the usual full-duplex read.
/// The trait carries no error channel: a wedged link keeps the receive
/// register at `0xFF`, which surfaces as a protocol timeout one layer up.
/// Hardware must be initialized before the first call.
pub trait SpiLink {
    fn send_byte(&mut self, byte: u8);
    fn recv_byte(&mut self) -> u8;
    fn set_chip_select(&mut self, select: ChipSelect);
}

/// Adapter over an `embedded-hal` SPI bus plus a GPIO chip-select.
pub struct HalSpiLink<S, P> {
    spi: S,
    cs: P,
    shift_in: u8,
}

impl<S, P> HalSpiLink<S, P>
where
    S: SpiBus<u8>,
    P: OutputPin,
{
    pub fn new(spi: S, mut cs: P) -> Self {
        let _ = cs.set_high();
        Self {
            spi,
            cs,
            shift_in: 0xFF,
        }
    }

    pub fn release(self) -> (S, P) {
        (self.spi, self.cs)
    }
}

impl<S, P> SpiLink for HalSpiLink<S, P>
where
    S: SpiBus<u8>,
    P: OutputPin,
{
    fn send_byte(&mut self, byte: u8) {
        let mut frame = [byte];
        self.shift_in = match self.spi.transfer_in_place(&mut frame) {
            Ok(()) => frame[0],
            Err(_) => 0xFF,
        };
    }

    fn recv_byte(&mut self) -> u8 {
        self.shift_in
    }

    fn set_chip_select(&mut self, select: ChipSelect) {
        let _ = match select {
            ChipSelect::Asserted => self.cs.set_low(),
            ChipSelect::Released => self.cs.set_high(),
        };
    }
}
