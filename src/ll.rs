//! Low-level interface to the nRF24L01
//!
//! This module implements a register-level interface to the nRF24L01. Users of
//! this library should typically not need to use this. Please consider using
//! the [high-level interface] instead.
//!
//! The register table is generated by a macro: every register gets a
//! `static` [`Register`] descriptor named after it, and a module of the same
//! name in lower case that holds one [`Field`] constant per named field.
//!
//! **NOTE**: The chip transfers multi-byte values least significant byte
//! first. Every command in this module takes care of that, so register values
//! and payloads always appear in their natural order to the caller.
//!
//! [high-level interface]: ../hl/index.html
//! [`Field`]: ../register/struct.Field.html

use core::fmt;

use embedded_hal::spi::{self, SpiDevice};

use crate::{
    configs::BusConfig,
    register::{Register, Value, MAX_REGISTER_LEN},
};

/// Largest payload the chip accepts, in bytes
pub const MAX_PAYLOAD_LEN: usize = 32;

/// Highest data pipe number
pub const MAX_PIPE: u8 = 5;

/// Command opcodes
pub mod opcode {
    /// Read a register, ORed with the register address
    pub const R_REGISTER: u8 = 0x00;
    /// Write a register, ORed with the register address
    pub const W_REGISTER: u8 = 0x20;
    /// Read the payload at the head of the RX FIFO
    pub const R_RX_PAYLOAD: u8 = 0x61;
    /// Put a payload into the TX FIFO
    pub const W_TX_PAYLOAD: u8 = 0xa0;
    /// Discard the TX FIFO
    pub const FLUSH_TX: u8 = 0xe1;
    /// Discard the RX FIFO
    pub const FLUSH_RX: u8 = 0xe2;
    /// Send the last payload again
    pub const REUSE_TX_PL: u8 = 0xe3;
    /// Toggle the extended feature registers, followed by [`ACTIVATE_KEY`]
    pub const ACTIVATE: u8 = 0x50;
    /// Data byte that goes with [`ACTIVATE`]
    pub const ACTIVATE_KEY: u8 = 0x73;
    /// Read the width of the payload at the head of the RX FIFO
    pub const R_RX_PL_WID: u8 = 0x60;
    /// Put an ACK payload into the TX FIFO, ORed with the pipe number
    pub const W_ACK_PAYLOAD: u8 = 0xa8;
    /// Put a payload that must not be acknowledged into the TX FIFO
    pub const W_TX_PAYLOAD_NOACK: u8 = 0xb0;
    /// Do nothing; only shifts out STATUS
    pub const NOP: u8 = 0xff;
}

/// Entry point to the nRF24L01 driver's low-level API
///
/// Please consider using [hl::NRF24] instead.
///
/// Every command returns the STATUS register, which the chip shifts out while
/// the command byte is shifted in.
///
/// [hl::NRF24]: ../hl/struct.NRF24.html
pub struct NRF24<SPI> {
    spi: SPI,
}

impl<SPI> NRF24<SPI> {
    /// Create a new instance of `NRF24`
    ///
    /// Requires the SPI device the nRF24L01 is connected to. Chip select is
    /// the device's business.
    pub fn new(spi: SPI) -> Self {
        NRF24 { spi }
    }

    /// Access the SPI device
    ///
    /// This can be used to change the bus parameters.
    pub fn spi(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Release the SPI device
    pub fn release(self) -> SPI {
        self.spi
    }
}

impl<SPI> NRF24<SPI>
where
    SPI: SpiDevice,
{
    /// Shift out STATUS without doing anything else
    pub fn nop(&mut self) -> Result<Value, Error<SPI>> {
        let mut buffer = [opcode::NOP];
        self.exchange(&mut buffer)
    }

    /// Read a register
    ///
    /// Returns the STATUS register and the value that was read. The value is
    /// detached; see [`hl::NRF24::register`] for a bound read.
    ///
    /// [`hl::NRF24::register`]: ../hl/struct.NRF24.html#method.register
    pub fn read_register(
        &mut self,
        register: &'static Register,
    ) -> Result<(Value, Value), Error<SPI>> {
        let len = register.byte_len();
        let mut buffer = [0; 1 + MAX_REGISTER_LEN];
        buffer[0] = opcode::R_REGISTER | register.address();

        let status = self.exchange(&mut buffer[..=len])?;

        let data = &mut buffer[1..=len];
        data.reverse();

        Ok((status, Value::from_be_bytes(register, data)))
    }

    /// Write a register
    pub fn write_register(&mut self, value: &Value) -> Result<Value, Error<SPI>> {
        let register = value.register();
        let len = register.byte_len();
        let mut buffer = [0; 1 + MAX_REGISTER_LEN];
        buffer[0] = opcode::W_REGISTER | register.address();

        value.to_be_bytes(&mut buffer[1..]).reverse();

        self.exchange(&mut buffer[..=len])
    }

    /// Read the payload at the head of the RX FIFO
    ///
    /// Reads as many bytes as `buffer` is long, which must be between 1 and
    /// [`MAX_PAYLOAD_LEN`]. The payload is removed from the FIFO.
    pub fn read_rx_payload(&mut self, buffer: &mut [u8]) -> Result<Value, Error<SPI>> {
        let len = buffer.len();
        check_payload_len::<SPI>(len)?;

        let mut frame = [0; 1 + MAX_PAYLOAD_LEN];
        frame[0] = opcode::R_RX_PAYLOAD;

        let status = self.exchange(&mut frame[..=len])?;

        for (b, received) in buffer.iter_mut().zip(frame[1..=len].iter().rev()) {
            *b = *received;
        }

        Ok(status)
    }

    /// Put a payload into the TX FIFO
    pub fn write_tx_payload(&mut self, payload: &[u8]) -> Result<Value, Error<SPI>> {
        self.write_payload(opcode::W_TX_PAYLOAD, payload)
    }

    /// Put a payload into the TX FIFO and disable auto-acknowledgement for it
    ///
    /// Requires `EN_DYN_ACK` in FEATURE.
    pub fn write_tx_payload_no_ack(&mut self, payload: &[u8]) -> Result<Value, Error<SPI>> {
        self.write_payload(opcode::W_TX_PAYLOAD_NOACK, payload)
    }

    /// Put a payload that goes out with the next ACK on `pipe`
    ///
    /// Requires `EN_ACK_PAY` in FEATURE.
    pub fn write_ack_payload(&mut self, pipe: u8, payload: &[u8]) -> Result<Value, Error<SPI>> {
        if pipe > MAX_PIPE {
            return Err(Error::InvalidPipe(pipe));
        }
        self.write_payload(opcode::W_ACK_PAYLOAD | pipe, payload)
    }

    /// Discard the TX FIFO
    pub fn flush_tx(&mut self) -> Result<Value, Error<SPI>> {
        self.exchange(&mut [opcode::FLUSH_TX])
    }

    /// Discard the RX FIFO
    pub fn flush_rx(&mut self) -> Result<Value, Error<SPI>> {
        self.exchange(&mut [opcode::FLUSH_RX])
    }

    /// Keep sending the last transmitted payload
    pub fn reuse_tx_payload(&mut self) -> Result<Value, Error<SPI>> {
        self.exchange(&mut [opcode::REUSE_TX_PL])
    }

    /// Toggle access to FEATURE and DYNPD
    ///
    /// Only the nRF24L01 needs this. On the nRF24L01+ the extended registers
    /// are always accessible and the command does nothing.
    pub fn activate(&mut self) -> Result<Value, Error<SPI>> {
        self.exchange(&mut [opcode::ACTIVATE, opcode::ACTIVATE_KEY])
    }

    /// Read the width of the payload at the head of the RX FIFO
    ///
    /// The chip reports whatever it has; a width above [`MAX_PAYLOAD_LEN`]
    /// means the FIFO content is garbage and should be flushed.
    pub fn read_rx_payload_width(&mut self) -> Result<(Value, u8), Error<SPI>> {
        let mut buffer = [opcode::R_RX_PL_WID, 0];
        let status = self.exchange(&mut buffer)?;
        Ok((status, buffer[1]))
    }

    fn write_payload(&mut self, command: u8, payload: &[u8]) -> Result<Value, Error<SPI>> {
        check_payload_len::<SPI>(payload.len())?;

        let mut frame = [0; 1 + MAX_PAYLOAD_LEN];
        frame[0] = command;
        for (b, sent) in frame[1..=payload.len()].iter_mut().zip(payload.iter().rev()) {
            *b = *sent;
        }

        self.exchange(&mut frame[..=payload.len()])
    }

    fn exchange(&mut self, buffer: &mut [u8]) -> Result<Value, Error<SPI>> {
        log::trace!("command 0x{:02x}, {} data bytes", buffer[0], buffer.len() - 1);

        self.spi.transfer_in_place(buffer).map_err(Error::Spi)?;

        Ok(STATUS.with_raw(buffer[0] as u64))
    }
}

fn check_payload_len<SPI: spi::ErrorType>(len: usize) -> Result<(), Error<SPI>> {
    if len == 0 || len > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadLength { len });
    }
    Ok(())
}

/// A bus that can be reconfigured at runtime
///
/// `embedded-hal` leaves clock rate and SPI mode to the HAL that created the
/// device. Implement this for your device to let [`hl::NRF24::reset`] set them
/// up. A device that can't honor the request must return an error; the reset
/// is aborted before anything is sent.
///
/// [`hl::NRF24::reset`]: ../hl/struct.NRF24.html#method.reset
pub trait ConfigureBus: spi::ErrorType {
    /// Apply the given bus parameters
    fn configure(&mut self, config: &BusConfig) -> Result<(), Self::Error>;
}

/// An SPI error that can occur when communicating with the nRF24L01
pub enum Error<SPI>
where
    SPI: spi::ErrorType,
{
    /// SPI error occured during a transfer
    Spi(SPI::Error),

    /// A payload was empty or longer than 32 bytes
    PayloadLength {
        /// Length of the rejected payload
        len: usize,
    },

    /// There is no data pipe with this number
    InvalidPipe(u8),
}

// We can't derive this implementation, as the compiler would require `SPI`
// itself to implement `Debug`.
impl<SPI> fmt::Debug for Error<SPI>
where
    SPI: spi::ErrorType,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::PayloadLength { len } => write!(f, "PayloadLength {{ len: {:?} }}", len),
            Error::InvalidPipe(pipe) => write!(f, "InvalidPipe({:?})", pipe),
        }
    }
}

/// Builds the layout of one register
///
/// Munches `NAME: width,` and `_: width,` entries into an array of
/// `FieldSpec`s.
macro_rules! field_specs {
    (@acc [$($out:expr,)*]) => {
        [$($out,)*]
    };
    (@acc [$($out:expr,)*] _ : $width:literal, $($rest:tt)*) => {
        field_specs!(@acc [
            $($out,)*
            $crate::register::FieldSpec::padding($width),
        ] $($rest)*)
    };
    (@acc [$($out:expr,)*] $(#[$doc:meta])* $field:ident : $width:literal, $($rest:tt)*) => {
        field_specs!(@acc [
            $($out,)*
            $crate::register::FieldSpec::named(stringify!($field), $width),
        ] $($rest)*)
    };
}

/// Generates one `Field` constant per named entry of a register layout
macro_rules! field_consts {
    ($descriptor:ident;) => {};
    ($descriptor:ident; _ : $width:literal, $($rest:tt)*) => {
        field_consts!($descriptor; $($rest)*);
    };
    ($descriptor:ident; $(#[$doc:meta])* $field:ident : $width:literal, $($rest:tt)*) => {
        $(#[$doc])*
        pub const $field: $crate::register::Field =
            $descriptor.field_const(stringify!($field));

        field_consts!($descriptor; $($rest)*);
    };
}

/// Generates the register table
macro_rules! impl_register {
    (
        $(
            $(#[$doc:meta])*
            $name:ident($name_lower:ident) = $address:literal {
                $($fields:tt)*
            }
        )*
    ) => {
        $(
            $(#[$doc])*
            pub static $name: Register = $name_lower::DESCRIPTOR;

            $(#[$doc])*
            pub mod $name_lower {
                const LAYOUT: &[$crate::register::FieldSpec] =
                    &field_specs!(@acc [] $($fields)*);

                pub(crate) const DESCRIPTOR: $crate::register::Register =
                    match $crate::register::Register::define(
                        stringify!($name),
                        $address,
                        LAYOUT,
                    ) {
                        Ok(register) => register,
                        Err(_) => panic!("invalid register layout"),
                    };

                field_consts!(DESCRIPTOR; $($fields)*);
            }
        )*

        /// All registers, ordered by address
        pub static REGISTERS: &[&Register] = &[$(&$name,)*];
    }
}

impl_register! {
    /// Configuration
    CONFIG(config) = 0x00 {
        _: 1,
        /// Keep RX_DR off the IRQ pin
        MASK_RX_DR: 1,
        /// Keep TX_DS off the IRQ pin
        MASK_TX_DS: 1,
        /// Keep MAX_RT off the IRQ pin
        MASK_MAX_RT: 1,
        /// Enable CRC
        EN_CRC: 1,
        /// CRC encoding scheme (0: 1 byte, 1: 2 bytes)
        CRCO: 1,
        /// Power up
        PWR_UP: 1,
        /// RX/TX control (1: PRX, 0: PTX)
        PRIM_RX: 1,
    }
    /// Enable auto acknowledgement
    EN_AA(en_aa) = 0x01 {
        _: 2,
        /// Auto acknowledgement on pipe 5
        ENAA_P5: 1,
        /// Auto acknowledgement on pipe 4
        ENAA_P4: 1,
        /// Auto acknowledgement on pipe 3
        ENAA_P3: 1,
        /// Auto acknowledgement on pipe 2
        ENAA_P2: 1,
        /// Auto acknowledgement on pipe 1
        ENAA_P1: 1,
        /// Auto acknowledgement on pipe 0
        ENAA_P0: 1,
    }
    /// Enabled RX addresses
    EN_RXADDR(en_rxaddr) = 0x02 {
        _: 2,
        /// Enable pipe 5
        ERX_P5: 1,
        /// Enable pipe 4
        ERX_P4: 1,
        /// Enable pipe 3
        ERX_P3: 1,
        /// Enable pipe 2
        ERX_P2: 1,
        /// Enable pipe 1
        ERX_P1: 1,
        /// Enable pipe 0
        ERX_P0: 1,
    }
    /// Setup of address widths
    SETUP_AW(setup_aw) = 0x03 {
        _: 6,
        /// Address width (1: 3 bytes, 2: 4 bytes, 3: 5 bytes)
        AW: 2,
    }
    /// Setup of automatic retransmission
    SETUP_RETR(setup_retr) = 0x04 {
        /// Auto retransmit delay, in steps of 250 µs
        ARD: 4,
        /// Auto retransmit count
        ARC: 4,
    }
    /// RF channel
    RF_CH(rf_ch) = 0x05 {
        _: 1,
        /// Frequency channel, 2400 MHz + RF_CH
        RF_CH: 7,
    }
    /// RF setup
    RF_SETUP(rf_setup) = 0x06 {
        /// Continuous carrier transmit
        CONT_WAVE: 1,
        _: 1,
        /// Set 250 kbps, overrides RF_DR_HIGH
        RF_DR_LOW: 1,
        /// Force PLL lock signal, test only
        PLL_LOCK: 1,
        /// Set 2 Mbps
        RF_DR_HIGH: 1,
        /// Output power in TX mode
        RF_PWR: 2,
        /// LNA gain, nRF24L01 only
        LNA_HCURR: 1,
    }
    /// Status
    STATUS(status) = 0x07 {
        _: 1,
        /// Data ready in RX FIFO, write 1 to clear
        RX_DR: 1,
        /// Data sent, write 1 to clear
        TX_DS: 1,
        /// Maximum number of retransmits reached, write 1 to clear
        MAX_RT: 1,
        /// Pipe number of the payload at the head of the RX FIFO (7: empty)
        RX_P_NO: 3,
        /// TX FIFO full
        TX_FULL: 1,
    }
    /// Transmit observe
    OBSERVE_TX(observe_tx) = 0x08 {
        /// Lost packets
        PLOS_CNT: 4,
        /// Retransmitted packets
        ARC_CNT: 4,
    }
    /// Carrier detect
    CD(cd) = 0x09 {
        _: 7,
        /// Carrier detected
        CD: 1,
    }
    /// Receive address of pipe 0
    RX_ADDR_P0(rx_addr_p0) = 0x0a {
        /// Address
        RX_ADDR_P0: 40,
    }
    /// Receive address of pipe 1
    RX_ADDR_P1(rx_addr_p1) = 0x0b {
        /// Address
        RX_ADDR_P1: 40,
    }
    /// Receive address of pipe 2, least significant byte
    RX_ADDR_P2(rx_addr_p2) = 0x0c {
        /// Address byte
        RX_ADDR_P2: 8,
    }
    /// Receive address of pipe 3, least significant byte
    RX_ADDR_P3(rx_addr_p3) = 0x0d {
        /// Address byte
        RX_ADDR_P3: 8,
    }
    /// Receive address of pipe 4, least significant byte
    RX_ADDR_P4(rx_addr_p4) = 0x0e {
        /// Address byte
        RX_ADDR_P4: 8,
    }
    /// Receive address of pipe 5, least significant byte
    RX_ADDR_P5(rx_addr_p5) = 0x0f {
        /// Address byte
        RX_ADDR_P5: 8,
    }
    /// Transmit address
    TX_ADDR(tx_addr) = 0x10 {
        /// Address
        TX_ADDR: 40,
    }
    /// Payload width of pipe 0
    RX_PW_P0(rx_pw_p0) = 0x11 {
        _: 2,
        /// Static payload width (0: pipe not used)
        RX_PW_P0: 6,
    }
    /// Payload width of pipe 1
    RX_PW_P1(rx_pw_p1) = 0x12 {
        _: 2,
        /// Static payload width (0: pipe not used)
        RX_PW_P1: 6,
    }
    /// Payload width of pipe 2
    RX_PW_P2(rx_pw_p2) = 0x13 {
        _: 2,
        /// Static payload width (0: pipe not used)
        RX_PW_P2: 6,
    }
    /// Payload width of pipe 3
    RX_PW_P3(rx_pw_p3) = 0x14 {
        _: 2,
        /// Static payload width (0: pipe not used)
        RX_PW_P3: 6,
    }
    /// Payload width of pipe 4
    RX_PW_P4(rx_pw_p4) = 0x15 {
        _: 2,
        /// Static payload width (0: pipe not used)
        RX_PW_P4: 6,
    }
    /// Payload width of pipe 5
    RX_PW_P5(rx_pw_p5) = 0x16 {
        _: 2,
        /// Static payload width (0: pipe not used)
        RX_PW_P5: 6,
    }
    /// FIFO status
    FIFO_STATUS(fifo_status) = 0x17 {
        _: 1,
        /// Reusing the last TX payload
        TX_REUSE: 1,
        /// TX FIFO full
        TX_FULL: 1,
        /// TX FIFO empty
        TX_EMPTY: 1,
        _: 2,
        /// RX FIFO full
        RX_FULL: 1,
        /// RX FIFO empty
        RX_EMPTY: 1,
    }
    /// Enable dynamic payload length
    DYNPD(dynpd) = 0x1c {
        _: 2,
        /// Dynamic payload length on pipe 5
        DPL_P5: 1,
        /// Dynamic payload length on pipe 4
        DPL_P4: 1,
        /// Dynamic payload length on pipe 3
        DPL_P3: 1,
        /// Dynamic payload length on pipe 2
        DPL_P2: 1,
        /// Dynamic payload length on pipe 1
        DPL_P1: 1,
        /// Dynamic payload length on pipe 0
        DPL_P0: 1,
    }
    /// Feature
    FEATURE(feature) = 0x1d {
        _: 5,
        /// Enable dynamic payload length
        EN_DPL: 1,
        /// Enable payload with ACK
        EN_ACK_PAY: 1,
        /// Enable the W_TX_PAYLOAD_NOACK command
        EN_DYN_ACK: 1,
    }
}

/// Payload width registers, indexed by pipe
pub static RX_PW: [&Register; 6] = [
    &RX_PW_P0, &RX_PW_P1, &RX_PW_P2, &RX_PW_P3, &RX_PW_P4, &RX_PW_P5,
];

/// Look up a register by name
pub fn register_by_name(name: &str) -> Option<&'static Register> {
    REGISTERS.iter().copied().find(|register| register.name() == name)
}
