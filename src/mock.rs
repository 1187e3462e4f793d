//! Fakes for driver tests

use embedded_hal::{
    delay::DelayNs,
    spi::{self, ErrorKind, Operation, SpiDevice},
};
pub use embedded_hal_mock::eh1::{
    digital::{Mock as PinMock, State as PinState, Transaction as PinTransaction},
    spi::{Mock as SpiMock, Transaction as SpiTransaction},
};

use crate::{configs::BusConfig, hl::NRF24, ll::ConfigureBus};

/// SPI device that also accepts bus configuration
pub struct Bus {
    pub spi: SpiMock<u8>,
    pub reject: bool,
    pub configured: Option<BusConfig>,
    /// Index of the transaction that fails instead of reaching the mock
    pub fail_at: Option<usize>,
    pub transactions: usize,
}

impl spi::ErrorType for Bus {
    type Error = ErrorKind;
}

impl SpiDevice for Bus {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
        let index = self.transactions;
        self.transactions += 1;
        if self.fail_at == Some(index) {
            return Err(ErrorKind::Other);
        }
        self.spi.transaction(operations)
    }
}

impl ConfigureBus for Bus {
    fn configure(&mut self, config: &BusConfig) -> Result<(), ErrorKind> {
        if self.reject {
            return Err(ErrorKind::Other);
        }
        self.configured = Some(*config);
        Ok(())
    }
}

/// Adds up requested delays instead of waiting
#[derive(Default)]
pub struct RecordingDelay {
    pub total_ns: u64,
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}

/// One full-duplex command per `(sent, received)` pair
pub fn spi(commands: &[(Vec<u8>, Vec<u8>)]) -> SpiMock<u8> {
    let mut expectations = Vec::new();
    for (sent, received) in commands {
        expectations.push(SpiTransaction::transaction_start());
        expectations.push(SpiTransaction::transfer_in_place(
            sent.clone(),
            received.clone(),
        ));
        expectations.push(SpiTransaction::transaction_end());
    }
    SpiMock::new(&expectations)
}

pub fn driver(
    commands: &[(Vec<u8>, Vec<u8>)],
    ce: &[PinTransaction],
) -> NRF24<Bus, PinMock, PinMock> {
    let bus = Bus {
        spi: spi(commands),
        reject: false,
        configured: None,
        fail_at: None,
        transactions: 0,
    };
    NRF24::new(bus, PinMock::new(ce), None)
}

/// Checks that every expected transaction happened
pub fn done(nrf: NRF24<Bus, PinMock, PinMock>) -> Bus {
    let (mut bus, mut ce, irq) = nrf.release();
    bus.spi.done();
    ce.done();
    if let Some(mut irq) = irq {
        irq.done();
    }
    bus
}
