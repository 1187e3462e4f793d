//! High-level interface to the nRF24L01
//!
//! The entry point to this API is the [NRF24] struct. Please refer to the
//! documentation there for more details.
//!
//! This module implements a high-level interface to the nRF24L01. This is the
//! recommended way to access the nRF24L01 using this crate, unless you need
//! the greater flexibility provided by the [register-level interface].
//!
//! [register-level interface]: ../ll/index.html

use core::fmt;

use embedded_hal::{
    digital::{Error as _, InputPin, OutputPin},
    spi::SpiDevice,
};

use crate::{
    ll,
    register::{Bound, Register, Value, WriteBack},
};

pub use error::*;
pub use packet::*;
pub use reset::POWER_UP_DELAY_US;

mod error;
mod packet;
mod reset;

/// Entry point to the nRF24L01 driver API
///
/// Besides the SPI device, the driver owns the chip enable (CE) pin and,
/// optionally, the interrupt request (IRQ) pin.
///
/// Registers are accessed through [`NRF24::register`], which returns a value
/// that is bound to the driver: every field that is changed on it is written
/// to the chip right away.
///
/// ``` ignore
/// use nrf24::ll::{config, CONFIG};
///
/// let mut config = nrf24.register(&CONFIG)?;
/// config.set(config::PWR_UP, 1)?;
/// ```
pub struct NRF24<SPI, CE, IRQ> {
    ll: ll::NRF24<SPI>,
    ce: CE,
    irq: Option<IRQ>,
    ce_line: bool,
}

// Can't be derived without putting requirements on the type parameters.
impl<SPI, CE, IRQ> fmt::Debug for NRF24<SPI, CE, IRQ> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NRF24 {{ ce: {:?}, .. }}", self.ce_line)
    }
}

impl<SPI, CE, IRQ> NRF24<SPI, CE, IRQ> {
    /// Create a new instance of `NRF24`
    ///
    /// Nothing is sent to the chip. Call [`NRF24::reset`] to bring it into a
    /// known state.
    pub fn new(spi: SPI, ce: CE, irq: Option<IRQ>) -> Self {
        NRF24 {
            ll: ll::NRF24::new(spi),
            ce,
            irq,
            ce_line: false,
        }
    }

    /// Provides direct access to the register-level API
    ///
    /// Be aware that by using the register-level API, you can invalidate
    /// various assumptions that the high-level API makes about the operation
    /// of the nRF24L01. Don't use the register-level and high-level APIs in
    /// tandem, unless you know what you're doing.
    pub fn ll(&mut self) -> &mut ll::NRF24<SPI> {
        &mut self.ll
    }

    /// Last level the driver put on CE
    pub fn ce(&self) -> bool {
        self.ce_line
    }

    /// Release the SPI device and the pins
    pub fn release(self) -> (SPI, CE, Option<IRQ>) {
        (self.ll.release(), self.ce, self.irq)
    }
}

impl<SPI, CE, IRQ> NRF24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
{
    /// Read a register
    ///
    /// The returned value is bound to the driver. Changing one of its fields
    /// writes the whole register to the chip before the setter returns.
    /// Call [`Bound::detach`] to get a plain copy.
    pub fn register(
        &mut self,
        register: &'static Register,
    ) -> Result<Bound<'_, Self>, Error<SPI>> {
        let (_, value) = self.ll.read_register(register)?;
        Ok(value.bind(self))
    }

    /// Write a register
    ///
    /// Returns STATUS.
    pub fn write(&mut self, value: &Value) -> Result<Value, Error<SPI>> {
        Ok(self.ll.write_register(value)?)
    }

    /// Read STATUS
    pub fn status(&mut self) -> Result<Value, Error<SPI>> {
        Ok(self.ll.nop()?)
    }

    /// Acknowledge all pending interrupt flags
    ///
    /// The flags in STATUS are cleared by writing 1 to them, so this writes
    /// back what it read. Returns the STATUS that was read.
    pub fn clear_status(&mut self) -> Result<Value, Error<SPI>> {
        let (_, status) = self.ll.read_register(&ll::STATUS)?;
        self.ll.write_register(&status)?;
        Ok(status)
    }

    /// Discard the TX FIFO
    pub fn flush_tx(&mut self) -> Result<Value, Error<SPI>> {
        Ok(self.ll.flush_tx()?)
    }

    /// Discard the RX FIFO
    pub fn flush_rx(&mut self) -> Result<Value, Error<SPI>> {
        Ok(self.ll.flush_rx()?)
    }
}

impl<SPI, CE, IRQ> NRF24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    CE: OutputPin,
{
    /// Drive CE
    pub fn set_ce(&mut self, level: bool) -> Result<(), Error<SPI>> {
        let result = if level {
            self.ce.set_high()
        } else {
            self.ce.set_low()
        };
        result.map_err(|error| Error::Pin(error.kind()))?;
        self.ce_line = level;

        Ok(())
    }
}

impl<SPI, CE, IRQ> NRF24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    IRQ: InputPin,
{
    /// Level of the IRQ line
    ///
    /// The line is active low. Returns `None`, if the driver was created
    /// without an IRQ pin.
    pub fn irq(&mut self) -> Result<Option<bool>, Error<SPI>> {
        match &mut self.irq {
            Some(irq) => irq
                .is_high()
                .map(Some)
                .map_err(|error| Error::Pin(error.kind())),
            None => Ok(None),
        }
    }
}

impl<SPI, CE, IRQ> WriteBack for NRF24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
{
    type Error = Error<SPI>;

    fn write_back(&mut self, value: &Value) -> Result<(), Self::Error> {
        self.ll.write_register(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ll::{config, status, CONFIG, STATUS},
        mock::{self, PinMock, PinState, PinTransaction},
    };

    #[test]
    fn bound_register_writes_back_on_every_change() {
        let mut nrf = mock::driver(
            &[
                (vec![0x00, 0x00], vec![0x0e, 0x08]),
                (vec![0x20, 0x0a], vec![0x0e, 0x00]),
                (vec![0x20, 0x0b], vec![0x0e, 0x00]),
            ],
            &[],
        );

        {
            let mut value = nrf.register(&CONFIG).unwrap();
            assert_eq!(value.get(config::EN_CRC), 1);

            value.set(config::PWR_UP, 1).unwrap();
            value.set_field("PRIM_RX", 1).unwrap();
            assert!(matches!(
                value.set_field("NOPE", 1),
                Err(Error::UnknownField(_))
            ));

            let mut detached = value.detach();
            detached.set(config::CRCO, 1);
            assert_eq!(detached, 0x0f);
        }

        mock::done(nrf);
    }

    #[test]
    fn clear_status_writes_back_the_flags() {
        let mut nrf = mock::driver(
            &[
                (vec![0x07, 0x00], vec![0x2e, 0x2e]),
                (vec![0x27, 0x2e], vec![0x2e, 0x00]),
            ],
            &[],
        );

        let status = nrf.clear_status().unwrap();
        assert_eq!(status.register(), &STATUS);
        assert_eq!(status.get(status::TX_DS), 1);

        mock::done(nrf);
    }

    #[test]
    fn pins() {
        let mut nrf = mock::driver(
            &[],
            &[
                PinTransaction::set(PinState::High),
                PinTransaction::set(PinState::Low),
            ],
        );
        assert_eq!(nrf.irq().unwrap(), None);

        let (bus, ce, _) = nrf.release();
        let irq = PinMock::new(&[PinTransaction::get(PinState::Low)]);
        let mut nrf = NRF24::new(bus, ce, Some(irq));

        assert!(!nrf.ce());
        nrf.set_ce(true).unwrap();
        assert!(nrf.ce());
        assert_eq!(nrf.irq().unwrap(), Some(false));
        nrf.set_ce(false).unwrap();
        assert!(!nrf.ce());

        mock::done(nrf);
    }
}
