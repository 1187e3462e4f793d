//! Configuration structs for resetting the chip
//!
//! This module houses the datastructures that control how the nRF24L01 is set
//! up. A [`ResetConfig`] is passed to [`hl::NRF24::reset`], which derives the
//! [`BusConfig`] from it.
//!
//! [`hl::NRF24::reset`]: ../hl/struct.NRF24.html#method.reset

use embedded_hal::spi;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};

/// Reset configuration
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResetConfig {
    /// Protocol the chip is set up for
    pub mode: Mode,
    /// Whether the chip is the transmitting or the receiving side
    pub direction: Direction,
    /// Air data rate. `Auto` keeps what the mode sets up.
    pub data_rate: DataRate,
    /// SPI clock rate in Hz
    pub frequency: u32,
}

impl Default for ResetConfig {
    fn default() -> Self {
        ResetConfig {
            mode: Default::default(),
            direction: Default::default(),
            data_rate: Default::default(),
            frequency: 100_000,
        }
    }
}

impl ResetConfig {
    /// Bus parameters that go with this configuration
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            frequency: self.frequency,
            ..Default::default()
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// Protocol the chip is set up for
pub enum Mode {
    /// Constant carrier output, for RF testing
    Test,
    /// Enhanced ShockBurst: auto-ack, retransmits, dynamic payloads
    Esb,
    /// ShockBurst: no acknowledgement, fixed 32 byte payloads
    Sb,
    /// Raw air interface that BLE advertisements can be built on
    ///
    /// Only partially set up; the caller has to finish the configuration.
    Ble,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Esb
    }
}

impl Mode {
    /// Whether the mode uses the chip's CRC
    pub fn uses_crc(&self) -> bool {
        matches!(self, Mode::Esb | Mode::Sb)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
/// Transmitting or receiving side
pub enum Direction {
    /// Primary transmitter
    Send,
    /// Primary receiver
    Recv,
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Recv
    }
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
/// Air data rate
///
/// The discriminant is `RF_DR_LOW` and `RF_DR_HIGH` of RF_SETUP, in that
/// order. The chip reserves `0b11`; it stands for `Auto` here.
pub enum DataRate {
    /// 1 megabit per second
    Mbps1 = 0b00,
    /// 2 megabits per second
    Mbps2 = 0b01,
    /// 250 kilobits per second. nRF24L01+ only.
    Kbps250 = 0b10,
    /// Leave the rate the mode sets up
    Auto = 0b11,
}

impl Default for DataRate {
    fn default() -> Self {
        DataRate::Auto
    }
}

impl DataRate {
    /// The `(RF_DR_LOW, RF_DR_HIGH)` bits, `None` for `Auto`
    pub fn bits(&self) -> Option<(u64, u64)> {
        match self {
            DataRate::Auto => None,
            rate => {
                let code = u8::from(*rate) as u64;
                Some((code >> 1, code & 1))
            }
        }
    }
}

#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
/// Data pipe number, as reported in `RX_P_NO`
pub enum Pipe {
    /// Pipe 0
    P0 = 0,
    /// Pipe 1
    P1 = 1,
    /// Pipe 2
    P2 = 2,
    /// Pipe 3
    P3 = 3,
    /// Pipe 4
    P4 = 4,
    /// Pipe 5
    P5 = 5,
}

/// Bus parameters
///
/// Passed to [`ll::ConfigureBus::configure`].
///
/// [`ll::ConfigureBus::configure`]: ../ll/trait.ConfigureBus.html#tymethod.configure
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusConfig {
    /// Clock rate in Hz
    pub frequency: u32,
    /// Clock polarity and phase
    pub mode: spi::Mode,
    /// Order of the bits within a word
    pub bit_order: BitOrder,
    /// Bits per word
    pub word_bits: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            frequency: 100_000,
            mode: spi::MODE_0,
            bit_order: BitOrder::MsbFirst,
            word_bits: 8,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
/// Order of the bits within a word
pub enum BitOrder {
    /// Most significant bit first
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}
