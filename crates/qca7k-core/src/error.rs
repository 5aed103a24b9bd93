//! Error types for qca7k-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Device errors
    /// Signature register did not read back the expected value
    BadSignature {
        /// The value the signature register actually returned
        found: u16,
    },

    // Transmit errors
    /// Frame payload is longer than the maximum the chip accepts
    FrameOverflow {
        /// Length of the rejected payload
        len: usize,
    },
    /// The chip write buffer has no room for the frame right now; nothing
    /// was written, retry once the chip drains
    WriteBufferInsufficient {
        /// Bytes the framed transfer needs
        needed: u16,
        /// Bytes the chip advertised as free
        available: u16,
    },

    // Receive errors
    /// Provided receive buffer cannot hold a maximum-size frame
    BufferTooSmall,
    /// The chip read buffer is empty; nothing to receive this call
    EmptyReadBuffer,
    /// Receive state machine reached an impossible state (driver bug)
    InternalError,

    // Bus errors
    /// SPI transfer failed
    SpiTransferFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSignature { found } => {
                write!(f, "bad device signature: expected 0xAA55, found 0x{:04X}", found)
            }
            Self::FrameOverflow { len } => {
                write!(f, "frame of {} bytes exceeds the maximum frame size", len)
            }
            Self::WriteBufferInsufficient { needed, available } => {
                write!(
                    f,
                    "chip write buffer has {} bytes free, frame needs {}",
                    available, needed
                )
            }
            Self::BufferTooSmall => write!(f, "receive buffer too small for a full frame"),
            Self::EmptyReadBuffer => write!(f, "chip read buffer is empty"),
            Self::InternalError => write!(f, "receive state machine in an invalid state"),
            Self::SpiTransferFailed => write!(f, "SPI transfer failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
