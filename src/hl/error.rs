use core::fmt;

use embedded_hal::{digital, spi};

use crate::{ll, register::UnknownField};

/// An error that can occur when using the nRF24L01
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// Error occured while using SPI bus
    Spi(ll::Error<SPI>),

    /// The bus refused the requested configuration
    ///
    /// Returned by [`NRF24::reset`] before anything was sent to the chip.
    ///
    /// [`NRF24::reset`]: struct.NRF24.html#method.reset
    Configuration(SPI::Error),

    /// Error occured while driving CE or reading IRQ
    Pin(digital::ErrorKind),

    /// Buffer too small
    BufferTooSmall {
        /// Indicates how large a buffer would have been required
        required_len: usize,
    },

    /// The chip reported a payload width above 32 bytes
    ///
    /// The RX FIFO has been flushed.
    InvalidPayloadWidth(u8),

    /// A field was accessed by a name its register doesn't have
    UnknownField(UnknownField),
}

impl<SPI> From<ll::Error<SPI>> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: ll::Error<SPI>) -> Self {
        Error::Spi(error)
    }
}

impl<SPI> From<UnknownField> for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn from(error: UnknownField) -> Self {
        Error::UnknownField(error)
    }
}

// We can't derive this implementation, as `Debug` would then be required for
// `SPI` itself.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::Configuration(error) => write!(f, "Configuration({:?})", error),
            Error::Pin(error) => write!(f, "Pin({:?})", error),
            Error::BufferTooSmall { required_len } => {
                write!(f, "BufferTooSmall {{ required_len: {:?} }}", required_len,)
            }
            Error::InvalidPayloadWidth(width) => write!(f, "InvalidPayloadWidth({:?})", width),
            Error::UnknownField(error) => write!(f, "UnknownField({:?})", error),
        }
    }
}
