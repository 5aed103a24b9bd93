//! Register map and command codec
//!
//! Every exchange with the chip opens with a 16-bit command word: bit 15
//! selects read (1) or write (0), bit 14 selects internal register access
//! (1) or external frame data (0), and the low 14 bits carry the register
//! address, forced to zero for external transfers. Command words and
//! register values travel big-endian on the wire regardless of host byte
//! order; the frame length field is the one little-endian exception and
//! lives in [`framing`](crate::framing).

use bitflags::bitflags;

use crate::bus::{self, SpiBus};
use crate::error::Result;

/// Command word bit selecting a read (cleared for a write).
pub const CMD_READ: u16 = 1 << 15;
/// Command word bit selecting internal register access (cleared for frame data).
pub const CMD_INTERNAL: u16 = 1 << 14;
/// Low 14 command word bits carrying the register address.
pub const CMD_ADDR_MASK: u16 = 0x3FFF;

/// Value a healthy chip returns from the signature register.
pub const SIGNATURE: u16 = 0xAA55;

/// Soft-reset bit in the [`Register::SpiConfig`] register.
pub const CONFIG_SLAVE_RESET: u16 = 1 << 6;

/// Internal registers of the QCA7000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Register {
    /// Size in bytes of the next external transfer (write-only).
    BfrSize = 0x0100,
    /// Free space in the chip write buffer (read-only).
    WrbufSpcAva = 0x0200,
    /// Bytes waiting in the chip read buffer (read-only).
    RdbufByteAva = 0x0300,
    /// SPI configuration; bit 6 soft-resets the chip.
    SpiConfig = 0x0400,
    /// Pending interrupt causes; writing a bit back acknowledges it.
    IntrCause = 0x0C00,
    /// Interrupt enable mask.
    IntrEnable = 0x0D00,
    /// Device signature, reads back [`SIGNATURE`].
    Signature = 0x1A00,
}

impl Register {
    /// Raw address as carried in the command word.
    pub const fn addr(self) -> u16 {
        self as u16
    }

    /// Looks an address up in the register map.
    pub const fn from_addr(addr: u16) -> Option<Self> {
        Some(match addr {
            0x0100 => Self::BfrSize,
            0x0200 => Self::WrbufSpcAva,
            0x0300 => Self::RdbufByteAva,
            0x0400 => Self::SpiConfig,
            0x0C00 => Self::IntrCause,
            0x0D00 => Self::IntrEnable,
            0x1A00 => Self::Signature,
            _ => return None,
        })
    }
}

bitflags! {
    /// Interrupt bits shared by the cause and enable registers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Interrupts: u16 {
        /// A received frame is waiting in the read buffer.
        const PKT_AVLBL = 1 << 0;
        /// Read buffer fault.
        const RDBUF_ERR = 1 << 1;
        /// Write buffer fault.
        const WRBUF_ERR = 1 << 2;
        /// The chip CPU finished starting up, after power-on or soft reset.
        const CPU_ON = 1 << 6;
    }
}

/// Encodes a command word from its three fields.
///
/// External commands address the frame-data stream and never carry a
/// register address; internal commands carry `register` masked to 14 bits.
pub const fn command_word(read: bool, internal: bool, register: u16) -> u16 {
    let mut cmd = if internal {
        CMD_INTERNAL | (register & CMD_ADDR_MASK)
    } else {
        0
    };
    if read {
        cmd |= CMD_READ;
    }
    cmd
}

/// Clocks a command word out, high byte first.
///
/// The caller holds the transaction open; data bytes follow immediately.
pub fn send_command<B: SpiBus + ?Sized>(
    bus: &mut B,
    read: bool,
    internal: bool,
    register: u16,
) -> Result<()> {
    write_register(bus, command_word(read, internal, register))
}

/// Clocks one 16-bit value out in the chip's byte order (big-endian).
///
/// Used for command words and register values alike. Assumes an open
/// transaction.
pub fn write_register<B: SpiBus + ?Sized>(bus: &mut B, value: u16) -> Result<()> {
    let bytes = value.to_be_bytes();
    bus.write_byte(bytes[0])?;
    bus.write_byte(bytes[1])
}

/// Clocks one 16-bit value in, in the chip's byte order (big-endian).
///
/// Assumes an open transaction.
pub fn read_register<B: SpiBus + ?Sized>(bus: &mut B) -> Result<u16> {
    let hi = bus.read_byte()?;
    let lo = bus.read_byte()?;
    Ok(u16::from_be_bytes([hi, lo]))
}

/// Reads an internal register in its own transaction.
pub fn read_internal<B: SpiBus + ?Sized>(bus: &mut B, register: Register) -> Result<u16> {
    bus::transaction(bus, |bus| {
        send_command(bus, true, true, register.addr())?;
        read_register(bus)
    })
}

/// Writes an internal register in its own transaction.
pub fn write_internal<B: SpiBus + ?Sized>(
    bus: &mut B,
    register: Register,
    value: u16,
) -> Result<()> {
    bus::transaction(bus, |bus| {
        send_command(bus, false, true, register.addr())?;
        write_register(bus, value)
    })
}
