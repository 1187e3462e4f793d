//! Driver crate for the nRF24L01 2.4 GHz transceiver
//!
//! The chip's registers are described by a bit-field [register model]. The
//! [high-level interface] builds the operating modes and packet I/O on top of
//! it; the [register-level interface] exposes the raw command set.
//!
//! [register model]: register/index.html
//! [high-level interface]: hl/index.html
//! [register-level interface]: ll/index.html

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod configs;
pub mod hl;
pub mod ll;
pub mod register;

#[cfg(test)]
mod mock;

pub use crate::{
    configs::{DataRate, Direction, Mode, Pipe, ResetConfig},
    hl::{Error, Packet, NRF24},
    register::{Bound, Field, Register, Value, WriteBack},
};
