use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiDevice};
use log::{debug, warn};

use super::{Error, NRF24};
use crate::{
    configs::{Direction, Mode, ResetConfig},
    ll::{self, ConfigureBus},
    register::{Field, Register, Value},
};

/// Time the chip needs to go from power down to standby, in microseconds
pub const POWER_UP_DELAY_US: u32 = 1500;

/// Static payload width the SB mode and ESB pipes 1 to 5 are set up with
const DEFAULT_PAYLOAD_WIDTH: u64 = 32;

impl<SPI, CE, IRQ> NRF24<SPI, CE, IRQ>
where
    SPI: SpiDevice + ConfigureBus,
    CE: OutputPin,
{
    /// Bring the chip into a known state
    ///
    /// This is the only way to change mode or direction, and it always
    /// configures the chip from scratch:
    ///
    /// 1. Sets up the bus. If the bus refuses, nothing is sent and
    ///    [`Error::Configuration`] is returned.
    /// 2. Powers the chip up with CRC and direction set for the mode, then
    ///    waits for the power-up to settle.
    /// 3. Applies the register defaults of the mode. In ESB and SB mode, the
    ///    receiving side starts listening right away (CE is asserted).
    /// 4. Overwrites the data rate, unless it is `DataRate::Auto`.
    ///
    /// In [`Mode::Test`], the caller still needs to select a channel and
    /// assert CE to get the carrier going.
    pub fn reset<D>(&mut self, config: &ResetConfig, delay: &mut D) -> Result<(), Error<SPI>>
    where
        D: DelayNs,
    {
        let bus = config.bus_config();
        self.ll
            .spi()
            .configure(&bus)
            .map_err(Error::Configuration)?;
        debug!("reset: bus at {} Hz", bus.frequency);

        self.set_ce(false)?;

        let receive = config.direction == Direction::Recv
            && matches!(config.mode, Mode::Esb | Mode::Sb);
        self.write(&ll::CONFIG.instantiate(
            0,
            &[
                (ll::config::PWR_UP, 1),
                (ll::config::EN_CRC, config.mode.uses_crc() as u64),
                (ll::config::PRIM_RX, receive as u64),
            ],
        ))?;
        delay.delay_us(POWER_UP_DELAY_US);

        debug!("reset: mode {:?}, receive {}", config.mode, receive);
        match config.mode {
            Mode::Test => self.reset_test()?,
            Mode::Esb => self.reset_esb(receive)?,
            Mode::Sb => self.reset_sb(receive)?,
            Mode::Ble => self.reset_ble()?,
        }

        if let Some((low, high)) = config.data_rate.bits() {
            debug!("reset: data rate {:?}", config.data_rate);
            let mut rf_setup = self.register(&ll::RF_SETUP)?;
            rf_setup.set(ll::rf_setup::RF_DR_HIGH, high)?;
            rf_setup.set(ll::rf_setup::RF_DR_LOW, low)?;
        }

        Ok(())
    }

    fn reset_test(&mut self) -> Result<(), Error<SPI>> {
        self.write(&ll::EN_AA.value())?;
        self.write(&ll::SETUP_RETR.value())?;
        self.write(&ll::RF_SETUP.instantiate(
            0,
            &[
                (ll::rf_setup::CONT_WAVE, 1),
                (ll::rf_setup::PLL_LOCK, 1),
            ],
        ))?;

        Ok(())
    }

    fn reset_esb(&mut self, receive: bool) -> Result<(), Error<SPI>> {
        self.write(&all_pipes(&ll::EN_RXADDR, &ERX))?;
        self.write(&all_pipes(&ll::EN_AA, &ENAA))?;

        // Pipe 0 only takes ACKs unless ACK payloads are used.
        for (pipe, register) in ll::RX_PW.iter().copied().enumerate() {
            let width = if pipe == 0 { 0 } else { DEFAULT_PAYLOAD_WIDTH };
            self.write(&register.with_raw(width))?;
        }

        self.write(&ll::SETUP_RETR.instantiate(
            0,
            &[(ll::setup_retr::ARD, 0b0100), (ll::setup_retr::ARC, 0b0011)],
        ))?;
        self.write(&ll::RF_SETUP.instantiate(0, &[(ll::rf_setup::RF_DR_HIGH, 1)]))?;

        let feature = ll::FEATURE.instantiate(
            0,
            &[
                (ll::feature::EN_DPL, 1),
                (ll::feature::EN_ACK_PAY, 1),
                (ll::feature::EN_DYN_ACK, 1),
            ],
        );
        self.write(&feature)?;
        let (_, readback) = self.ll.read_register(&ll::FEATURE)?;
        if !readback.is_nonzero() {
            debug!("reset: FEATURE is locked, activating");
            self.ll.activate()?;
            self.write(&feature)?;
        }

        self.write(&all_pipes(&ll::DYNPD, &DPL))?;

        if receive {
            self.set_ce(true)?;
        }

        Ok(())
    }

    fn reset_sb(&mut self, receive: bool) -> Result<(), Error<SPI>> {
        self.write(&all_pipes(&ll::EN_RXADDR, &ERX))?;
        self.write(&ll::EN_AA.value())?;
        self.write(&ll::SETUP_RETR.value())?;
        self.write(&ll::RF_SETUP.value())?;

        for register in ll::RX_PW.iter().copied() {
            self.write(&register.with_raw(DEFAULT_PAYLOAD_WIDTH))?;
        }

        if receive {
            self.set_ce(true)?;
        }

        Ok(())
    }

    fn reset_ble(&mut self) -> Result<(), Error<SPI>> {
        warn!("reset: BLE mode is incomplete, finish the setup in the application");

        self.write(&ll::EN_AA.value())?;
        self.write(&ll::SETUP_RETR.value())?;
        self.register(&ll::RF_SETUP)?.modify(|rf_setup| {
            rf_setup
                .set(ll::rf_setup::PLL_LOCK, 0)
                .set(ll::rf_setup::RF_DR_HIGH, 0);
        })?;
        self.write(&ll::FEATURE.value())?;

        Ok(())
    }
}

const ERX: [Field; 6] = [
    ll::en_rxaddr::ERX_P0,
    ll::en_rxaddr::ERX_P1,
    ll::en_rxaddr::ERX_P2,
    ll::en_rxaddr::ERX_P3,
    ll::en_rxaddr::ERX_P4,
    ll::en_rxaddr::ERX_P5,
];

const ENAA: [Field; 6] = [
    ll::en_aa::ENAA_P0,
    ll::en_aa::ENAA_P1,
    ll::en_aa::ENAA_P2,
    ll::en_aa::ENAA_P3,
    ll::en_aa::ENAA_P4,
    ll::en_aa::ENAA_P5,
];

const DPL: [Field; 6] = [
    ll::dynpd::DPL_P0,
    ll::dynpd::DPL_P1,
    ll::dynpd::DPL_P2,
    ll::dynpd::DPL_P3,
    ll::dynpd::DPL_P4,
    ll::dynpd::DPL_P5,
];

fn all_pipes(register: &'static Register, fields: &[Field]) -> Value {
    fields
        .iter()
        .fold(register.value(), |value, &field| value.with(field, 1))
}
