//! Driver object tying the protocol layers to one chip
//!
//! [`Qca7000`] owns the bus and the receive state machine for a single
//! chip. Holding both behind `&mut self` is what makes the protocol safe
//! to use: register sequences cannot interleave and the resumable receive
//! context has exactly one driver, so the original non-reentrancy hazard
//! cannot be expressed.

use crate::bus::{self, SpiBus};
use crate::error::{Error, Result};
use crate::framing::{
    self, FrameDecoder, RecvStatus, Step, EOF, EOF_LEN, FRAME_MAX, FRAME_MIN, RESERVED,
    RESERVED_LEN, SOF, SOF_LEN,
};
use crate::regs::{self, Interrupts, Register, CONFIG_SLAVE_RESET, SIGNATURE};

/// Driver for one QCA7000 on one SPI bus.
///
/// Construct it with a platform [`SpiBus`] implementation, run
/// [`startup`](Self::startup) once the chip has power, and from then on
/// service [`interrupt_reasons`](Self::interrupt_reasons) /
/// [`recv`](Self::recv) from a single polling loop or interrupt handler.
#[derive(Debug)]
pub struct Qca7000<B: SpiBus> {
    bus: B,
    rx: FrameDecoder,
}

impl<B: SpiBus> Qca7000<B> {
    /// Creates a driver for the chip behind `bus`.
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            rx: FrameDecoder::new(),
        }
    }

    /// Consumes the driver and hands the bus back.
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Borrows the underlying bus, e.g. for platform-specific control.
    ///
    /// Issuing protocol traffic through this borrow bypasses the driver;
    /// do it between operations, not inside one.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Reads the device signature register.
    pub fn signature(&mut self) -> Result<u16> {
        regs::read_internal(&mut self.bus, Register::Signature)
    }

    /// Runs the recommended startup sequence.
    ///
    /// Reads the signature twice, the first read is discarded because the
    /// first access after power-up can return garbage. When the second
    /// read matches the expected value all interrupts are enabled;
    /// otherwise nothing is enabled and [`Error::BadSignature`] reports
    /// what the register held.
    ///
    /// Run this after power-on, and again after a `CPU_ON` interrupt
    /// signals the chip came back from a reset.
    pub fn startup(&mut self) -> Result<()> {
        let _ = self.signature()?;

        let found = self.signature()?;
        if found != SIGNATURE {
            log::warn!("startup failed: signature read 0x{:04X}", found);
            return Err(Error::BadSignature { found });
        }

        self.enable_all_interrupts()?;
        log::debug!("startup complete, interrupts enabled");
        Ok(())
    }

    /// Soft-resets the chip.
    ///
    /// Read-modify-write of the configuration register: only the reset
    /// bit is documented, so every other bit is carried back unchanged.
    /// The chip raises `CPU_ON` once it has come back up.
    pub fn soft_reset(&mut self) -> Result<()> {
        let config = regs::read_internal(&mut self.bus, Register::SpiConfig)?;
        regs::write_internal(
            &mut self.bus,
            Register::SpiConfig,
            config | CONFIG_SLAVE_RESET,
        )?;
        log::debug!("soft reset issued");
        Ok(())
    }

    /// Reads the interrupt enable mask.
    ///
    /// Undocumented bits come through untouched (`from_bits_retain`).
    pub fn interrupt_mask(&mut self) -> Result<Interrupts> {
        let mask = regs::read_internal(&mut self.bus, Register::IntrEnable)?;
        Ok(Interrupts::from_bits_retain(mask))
    }

    /// Overwrites the interrupt enable mask.
    pub fn set_interrupt_mask(&mut self, mask: Interrupts) -> Result<()> {
        regs::write_internal(&mut self.bus, Register::IntrEnable, mask.bits())
    }

    /// Enables the given interrupts on top of the current mask.
    pub fn enable_interrupts(&mut self, mask: Interrupts) -> Result<()> {
        let current = self.interrupt_mask()?;
        self.set_interrupt_mask(current.union(mask))
    }

    /// Disables the given interrupts, leaving the rest of the mask alone.
    pub fn disable_interrupts(&mut self, mask: Interrupts) -> Result<()> {
        let current = self.interrupt_mask()?;
        // difference() keeps bits outside the known set; the complement
        // operator would strip them.
        self.set_interrupt_mask(current.difference(mask))
    }

    /// Enables every known interrupt.
    pub fn enable_all_interrupts(&mut self) -> Result<()> {
        self.set_interrupt_mask(Interrupts::all())
    }

    /// Disables all interrupts, known bits and unknown alike.
    pub fn disable_all_interrupts(&mut self) -> Result<()> {
        self.set_interrupt_mask(Interrupts::empty())
    }

    /// Fetches and acknowledges the pending interrupt causes.
    ///
    /// The full handling sequence: disable all interrupts, read the cause
    /// register, write the same value back to acknowledge, return the
    /// causes. Interrupts stay disabled on return; re-arm with
    /// [`enable_all_interrupts`](Self::enable_all_interrupts) once the
    /// causes are dealt with, typically after draining [`recv`](Self::recv).
    pub fn interrupt_reasons(&mut self) -> Result<Interrupts> {
        self.disable_all_interrupts()?;

        let reasons = regs::read_internal(&mut self.bus, Register::IntrCause)?;
        regs::write_internal(&mut self.bus, Register::IntrCause, reasons)?;

        log::trace!("interrupt causes 0x{:04X} acknowledged", reasons);
        Ok(Interrupts::from_bits_retain(reasons))
    }

    /// Transmits one frame.
    ///
    /// Payloads shorter than [`FRAME_MIN`] go out zero-padded, and the
    /// envelope's length field counts the padded size. Admission is
    /// all-or-nothing: the chip's advertised write buffer space is
    /// checked before anything is streamed, because the external write
    /// has no mid-stream flow control. [`Error::WriteBufferInsufficient`]
    /// means nothing was written and the frame can be retried once the
    /// chip drains.
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        if frame.len() > FRAME_MAX {
            return Err(Error::FrameOverflow { len: frame.len() });
        }

        let padded = frame.len().max(FRAME_MIN);
        let needed = framing::wire_len(frame.len()) as u16;

        let available = regs::read_internal(&mut self.bus, Register::WrbufSpcAva)?;
        if available < needed {
            log::debug!(
                "send deferred: {} bytes needed, {} free",
                needed,
                available
            );
            return Err(Error::WriteBufferInsufficient { needed, available });
        }

        regs::write_internal(&mut self.bus, Register::BfrSize, needed)?;

        bus::transaction(&mut self.bus, |bus| {
            regs::send_command(bus, false, false, 0)?;

            for _ in 0..SOF_LEN {
                bus.write_byte(SOF)?;
            }
            for byte in (padded as u16).to_le_bytes() {
                bus.write_byte(byte)?;
            }
            for _ in 0..RESERVED_LEN {
                bus.write_byte(RESERVED)?;
            }
            for &byte in frame {
                bus.write_byte(byte)?;
            }
            for _ in frame.len()..padded {
                bus.write_byte(0x00)?;
            }
            for _ in 0..EOF_LEN {
                bus.write_byte(EOF)?;
            }
            Ok(())
        })?;

        log::trace!("sent frame, {} payload bytes on the wire", padded);
        Ok(())
    }

    /// Receives one frame into `buf`, resuming across calls.
    ///
    /// `buf` must hold at least [`FRAME_MAX`] bytes. One call consumes at
    /// most the bytes the chip currently has buffered; a frame that is
    /// still incomplete when they run out returns
    /// [`RecvStatus::InProgress`], and calling again **with the same
    /// buffer** picks up where parsing stopped. Handing in a different
    /// buffer abandons the partial frame and starts fresh, as does the
    /// first call after a completed frame.
    ///
    /// A completed frame returns [`RecvStatus::Frame`] immediately; bytes
    /// the chip had buffered beyond it stay there for the next call.
    /// [`Error::EmptyReadBuffer`] just means there is nothing to do yet.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<RecvStatus> {
        if buf.len() < FRAME_MAX {
            return Err(Error::BufferTooSmall);
        }

        let Self { bus, rx } = self;
        rx.bind(buf.as_ptr() as usize);

        let available = regs::read_internal(bus, Register::RdbufByteAva)?;
        if available == 0 {
            return Err(Error::EmptyReadBuffer);
        }

        bus::transaction(bus, |bus| {
            regs::send_command(bus, true, false, 0)?;

            let mut taken: u16 = 0;
            while taken < available || rx.has_pending() {
                // A parked lookahead byte is re-examined before anything
                // fresh is clocked and never counts against `available`.
                let byte = match rx.take_pending() {
                    Some(byte) => byte,
                    None => {
                        taken += 1;
                        bus.read_byte()?
                    }
                };

                match rx.feed(byte, buf) {
                    Step::More => {}
                    Step::Frame(len) => {
                        log::trace!("received frame, {} payload bytes", len);
                        return Ok(RecvStatus::Frame(len));
                    }
                    Step::Fault => {
                        log::warn!("receive state machine fault, context reset");
                        return Err(Error::InternalError);
                    }
                }
            }

            Ok(RecvStatus::InProgress(rx.stage()))
        })
    }
}
