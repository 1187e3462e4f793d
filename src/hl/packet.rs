use embedded_hal::{digital::OutputPin, spi::SpiDevice};
use log::{debug, warn};

use super::{Error, NRF24};
use crate::{
    configs::Pipe,
    ll::{self, fifo_status, status, MAX_PAYLOAD_LEN},
    register::Value,
};

/// A packet that was read from the RX FIFO
#[derive(Debug)]
pub struct Packet<'b> {
    /// STATUS, as the chip reported it while the payload was read
    pub status: Value,

    /// The pipe the packet was received on
    ///
    /// `None`, if the chip didn't report a valid pipe number.
    pub pipe: Option<Pipe>,

    /// The payload
    pub data: &'b [u8],
}

impl<SPI, CE, IRQ> NRF24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
{
    /// Put a payload into the TX FIFO
    ///
    /// With `None`, the last payload is sent again instead.
    pub fn queue(&mut self, payload: Option<&[u8]>) -> Result<Value, Error<SPI>> {
        let status = match payload {
            Some(payload) => self.ll.write_tx_payload(payload)?,
            None => self.ll.reuse_tx_payload()?,
        };
        Ok(status)
    }

    /// Put a payload into the TX FIFO that the receiver must not acknowledge
    pub fn queue_no_ack(&mut self, payload: &[u8]) -> Result<Value, Error<SPI>> {
        Ok(self.ll.write_tx_payload_no_ack(payload)?)
    }

    /// Attach a payload to the next ACK sent on `pipe`
    pub fn queue_ack_payload(&mut self, pipe: Pipe, payload: &[u8]) -> Result<Value, Error<SPI>> {
        Ok(self.ll.write_ack_payload(pipe.into(), payload)?)
    }

    /// Receive a packet, if there is one
    ///
    /// Returns `Ok(None)` right away if the RX FIFO is empty. Otherwise reads
    /// `length` bytes or, if `length` is `None`, as many bytes as the chip
    /// reports for the packet (dynamic payload length).
    ///
    /// A reported width that is not between 1 and 32 means the FIFO is
    /// corrupted; it is flushed and [`Error::InvalidPayloadWidth`] is
    /// returned.
    pub fn recv<'b>(
        &mut self,
        buffer: &'b mut [u8],
        length: Option<usize>,
    ) -> Result<Option<Packet<'b>>, Error<SPI>> {
        let (_, fifo) = self.ll.read_register(&ll::FIFO_STATUS)?;
        if fifo.get(fifo_status::RX_EMPTY) != 0 {
            return Ok(None);
        }

        let len = match length {
            Some(len) => len,
            None => {
                let (_, width) = self.ll.read_rx_payload_width()?;
                if width == 0 || width as usize > MAX_PAYLOAD_LEN {
                    self.ll.flush_rx()?;
                    return Err(Error::InvalidPayloadWidth(width));
                }
                width as usize
            }
        };

        if buffer.len() < len {
            return Err(Error::BufferTooSmall { required_len: len });
        }

        let data = &mut buffer[..len];
        let status = self.ll.read_rx_payload(data)?;
        let pipe = Pipe::try_from(status.get(status::RX_P_NO) as u8).ok();

        Ok(Some(Packet {
            status,
            pipe,
            data,
        }))
    }
}

impl<SPI, CE, IRQ> NRF24<SPI, CE, IRQ>
where
    SPI: SpiDevice,
    CE: OutputPin,
{
    /// Start sending what is in the TX FIFO
    ///
    /// Asserts CE and acknowledges pending interrupt flags. Follow up with
    /// [`NRF24::poll_flush`] until it returns. If acknowledging fails, CE is
    /// deasserted again before the error is returned.
    pub fn start_flush(&mut self) -> Result<(), Error<SPI>> {
        self.set_ce(true)?;
        if let Err(error) = self.clear_status() {
            return Err(self.abort_flush(error));
        }
        Ok(())
    }

    /// Check whether sending has finished
    ///
    /// Finished means the TX FIFO is empty, or the chip gave up on a packet
    /// after the maximum number of retransmits. Check `MAX_RT` in the returned
    /// STATUS to tell the two apart; it must be cleared before the chip sends
    /// again. CE is deasserted once sending has finished, and also when the
    /// bus fails, so the chip doesn't keep transmitting after an error.
    ///
    /// There is no timeout. If the chip never finishes, this keeps returning
    /// `WouldBlock`.
    pub fn poll_flush(&mut self) -> nb::Result<Value, Error<SPI>> {
        let (status, fifo) = match self.ll.read_register(&ll::FIFO_STATUS) {
            Ok(read) => read,
            Err(error) => return Err(nb::Error::Other(self.abort_flush(error.into()))),
        };

        let tx_empty = fifo.get(fifo_status::TX_EMPTY) != 0;
        let max_rt = status.get(status::MAX_RT) != 0;
        if !tx_empty && !max_rt {
            return Err(nb::Error::WouldBlock);
        }

        self.set_ce(false).map_err(nb::Error::Other)?;
        debug!("flush: done, TX empty {}, max retransmits {}", tx_empty, max_rt);

        Ok(status)
    }

    /// Send what is in the TX FIFO and wait until sending has finished
    ///
    /// Blocks without a timeout; use [`NRF24::start_flush`] and
    /// [`NRF24::poll_flush`] to bound the wait.
    pub fn flush(&mut self) -> Result<Value, Error<SPI>> {
        self.start_flush()?;
        nb::block!(self.poll_flush())
    }

    /// Deassert CE after a failed flush
    ///
    /// Returns `error`; a pin error on the way out is only logged.
    fn abort_flush(&mut self, error: Error<SPI>) -> Error<SPI> {
        if let Err(pin_error) = self.set_ce(false) {
            warn!("flush: failed to deassert CE: {:?}", pin_error);
        }
        error
    }

    /// Queue a payload and send it
    ///
    /// See [`NRF24::queue`] and [`NRF24::flush`].
    pub fn send(&mut self, payload: Option<&[u8]>) -> Result<Value, Error<SPI>> {
        self.queue(payload)?;
        self.flush()
    }
}
