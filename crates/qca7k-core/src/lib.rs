//! qca7k-core - Core driver library for QCA7000 powerline bridge chips
//!
//! The QCA7000 is a powerline-communication bridge that hangs off a host
//! SPI bus. It exposes a small register file (signature, buffer
//! availability, interrupt cause/enable, configuration) and moves
//! Ethernet-style frames through a byte stream wrapped in a
//! sentinel-delimited envelope. This crate implements the host side of
//! that protocol: the command/register codec, interrupt management, and
//! the framing layer for transmit and receive. It is `no_std` compatible
//! for use in embedded environments.
//!
//! The SPI transport itself stays with the integrator: implement
//! [`SpiBus`] for your platform and hand it to [`Qca7000`].
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` for [`Error`])
//!
//! # Example
//!
//! ```ignore
//! use qca7k_core::{Qca7000, RecvStatus};
//!
//! let mut chip = Qca7000::new(bus);
//! chip.startup()?;
//!
//! let mut buf = [0u8; qca7k_core::framing::FRAME_MAX];
//! match chip.recv(&mut buf)? {
//!     RecvStatus::Frame(len) => handle_frame(&buf[..len]),
//!     RecvStatus::InProgress(_) => {} // more bytes on the next poll
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod bus;
pub mod device;
pub mod error;
pub mod framing;
pub mod regs;

pub use bus::SpiBus;
pub use device::Qca7000;
pub use error::{Error, Result};
pub use framing::{RecvState, RecvStatus};
pub use regs::{Interrupts, Register};
