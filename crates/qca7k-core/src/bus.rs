//! SPI bus abstraction
//!
//! The QCA7000 sits on a plain SPI bus with a dedicated chip select.
//! Platforms differ in how they drive it (memory-mapped controllers,
//! spidev, bit-banged GPIO), so the driver asks only for the four
//! operations the protocol is built from and stays out of the transport
//! business otherwise.

use crate::error::Result;

/// Low-level SPI transport the driver runs on.
///
/// A transaction is the span between [`begin`](SpiBus::begin) and
/// [`end`](SpiBus::end): chip select asserted, any number of bytes
/// clocked, chip select released. The driver brackets every register
/// access and every frame transfer in exactly one transaction and never
/// nests them.
///
/// Implementations map their platform failures to
/// [`Error::SpiTransferFailed`](crate::Error::SpiTransferFailed).
pub trait SpiBus {
    /// Assert chip select and open a transaction.
    fn begin(&mut self) -> Result<()>;

    /// Release chip select and close the transaction.
    fn end(&mut self) -> Result<()>;

    /// Clock one byte out to the chip.
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Clock one byte in from the chip.
    fn read_byte(&mut self) -> Result<u8>;
}

impl<T: SpiBus + ?Sized> SpiBus for &mut T {
    fn begin(&mut self) -> Result<()> {
        (**self).begin()
    }

    fn end(&mut self) -> Result<()> {
        (**self).end()
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        (**self).write_byte(byte)
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }
}

/// Runs `f` inside a chip-select transaction.
///
/// `end` runs whether or not `f` succeeded, so an error mid-transfer
/// cannot leave the chip selected. When both fail, the closure's error
/// wins.
pub fn transaction<B: SpiBus + ?Sized, T>(
    bus: &mut B,
    f: impl FnOnce(&mut B) -> Result<T>,
) -> Result<T> {
    bus.begin()?;
    let res = f(bus);
    match bus.end() {
        Ok(()) => res,
        Err(e) => res.and(Err(e)),
    }
}
