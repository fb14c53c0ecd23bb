//! Receive dispatch.
//!
//! A frame lands either in the dedicated slot its filter points at or in the
//! FIFO region. Dedicated slots are addressed directly; the FIFO is read
//! through the sentinel, where the hardware's next-read pointer chooses the
//! slot and advances in ring order once the full bit is cleared.

use crate::buffer::{Destination, Direction};
use crate::bus::{Can, Error};
use crate::message::Message;

impl<'a, TX, RX> Can<'a, TX, RX> {
    /// Parses a received frame without consuming it.
    ///
    /// Repeated calls return the same frame; the slot's full bit stays set.
    /// Fails with [`nb::Error::WouldBlock`] while the source is empty and
    /// with [`Error::Input`] for a source that does not exist, transmits, or
    /// lies inside the FIFO region.
    pub fn peek(&self, source: impl Into<Destination>) -> nb::Result<Message, Error> {
        let index = self.rx_index(source.into()).map_err(nb::Error::Other)?;
        self.peek_at(index)
    }

    /// Returns a received frame and marks its slot free.
    ///
    /// For the FIFO sentinel the slot is the one the hardware reports as
    /// next to read; clearing its full bit advances the ring.
    pub fn read(&mut self, source: impl Into<Destination>) -> nb::Result<Message, Error> {
        let index = self.rx_index(source.into()).map_err(nb::Error::Other)?;
        let message = self.peek_at(index)?;
        self.clear_rxful(index);
        Ok(message)
    }

    fn rx_index(&self, source: Destination) -> Result<usize, Error> {
        match source {
            Destination::Fifo => Ok(self.fifo_next_read()),
            Destination::Buffer(buffer) => {
                if !self.buffer_exists(buffer)
                    || self.config.fifo.contains(buffer)
                    || self.buffer_direction(buffer) == Direction::Tx
                {
                    return Err(Error::Input);
                }
                Ok(buffer.index())
            }
        }
    }

    fn peek_at(&self, index: usize) -> nb::Result<Message, Error> {
        if !self.rxful(index) {
            return Err(nb::Error::WouldBlock);
        }
        Ok(self
            .memory
            .get(index)
            .ok_or(nb::Error::Other(Error::Assert))?
            .get()
            .decode())
    }
}
