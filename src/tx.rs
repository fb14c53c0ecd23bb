//! Transmit scheduling.
//!
//! Slots `B0..=B7` configured as transmit slots take one message each,
//! tagged with a two-bit priority. The hardware empties pending slots in
//! priority order; on a tie the lower slot number wins, so emission order is
//! a function of priority and slot index, never of submission time.

use crate::buffer::{Buffer, Direction};
use crate::bus::{Can, Error};
use crate::message::{Message, RawMessage};
use crate::reg::trcon;

/// Transmit priority. On a priority tie the lower slot number is emitted
/// first.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Lowest priority.
    Lowest,
    /// Below the middle.
    Low,
    /// Above the middle.
    High,
    /// Highest priority.
    Highest,
}

impl Priority {
    fn code(self) -> u16 {
        match self {
            Self::Lowest => 0,
            Self::Low => 1,
            Self::High => 2,
            Self::Highest => 3,
        }
    }

    fn from_code(code: u16) -> Result<Self, Error> {
        match code {
            0 => Ok(Self::Lowest),
            1 => Ok(Self::Low),
            2 => Ok(Self::High),
            3 => Ok(Self::Highest),
            _ => Err(Error::Assert),
        }
    }
}

/// Snapshot of one transmit slot's control flags.
///
/// The error flags report the outcome of the most recent attempt; the driver
/// never retries on its own.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxStatus {
    /// A transmission is requested and not yet completed.
    pub pending: bool,
    /// The last transmission was aborted.
    pub aborted: bool,
    /// Arbitration was lost during the last transmission.
    pub lost_arbitration: bool,
    /// A bus error occurred during the last transmission.
    pub bus_error: bool,
    /// The slot's current priority tag.
    pub priority: Priority,
}

impl<'a, TX, RX> Can<'a, TX, RX> {
    /// Places `message` into the transmit slot `buffer` and requests its
    /// transmission at `priority`.
    ///
    /// Fails with [`Error::Input`] for a slot outside the transmit-capable
    /// range or a data length code above eight, with [`Error::Write`] for a
    /// slot without backing store or not configured to transmit, and with
    /// [`nb::Error::WouldBlock`] while the slot still holds an earlier
    /// request.
    pub fn write(
        &mut self,
        buffer: Buffer,
        message: &Message,
        priority: Priority,
    ) -> nb::Result<(), Error> {
        if !buffer.transmit_capable() || message.raw_dlc() > 8 {
            return Err(nb::Error::Other(Error::Input));
        }
        if !self.buffer_exists(buffer) || self.buffer_direction(buffer) != Direction::Tx {
            return Err(nb::Error::Other(Error::Write));
        }
        if self.tx_pending(buffer) {
            return Err(nb::Error::WouldBlock);
        }

        self.memory
            .get_mut(buffer.index())
            .ok_or(nb::Error::Other(Error::Assert))?
            .set(RawMessage::encode(message));

        let shift = trcon::slot_shift(buffer.index());
        let reg = &self.regs.regs().trcon[buffer.index() / 2];
        reg.modify(|v| (v & !(trcon::TXPRI_MASK << shift)) | (priority.code() << shift));
        reg.modify(|v| v | (trcon::TXREQ << shift));
        Ok(())
    }

    /// Aborts a requested transmission.
    ///
    /// Sets the slot's abort bit and spins until the hardware clears it
    /// again. Returns `true` if a message was pending, `false` if the slot
    /// was already empty.
    pub fn abort_write(&mut self, buffer: Buffer) -> Result<bool, Error> {
        if !buffer.transmit_capable() {
            return Err(Error::Input);
        }
        if !self.buffer_exists(buffer) || self.buffer_direction(buffer) != Direction::Tx {
            return Err(Error::Write);
        }

        let shift = trcon::slot_shift(buffer.index());
        let reg = &self.regs.regs().trcon[buffer.index() / 2];
        if reg.read() & (trcon::TXREQ << shift) == 0 {
            return Ok(false);
        }
        reg.modify(|v| v | (trcon::TXABT << shift));
        while reg.read() & (trcon::TXABT << shift) != 0 {}
        Ok(true)
    }

    /// Reads a transmit slot's control flags.
    pub fn tx_status(&self, buffer: Buffer) -> Result<TxStatus, Error> {
        if !buffer.transmit_capable() {
            return Err(Error::Input);
        }
        let shift = trcon::slot_shift(buffer.index());
        let bits = self.regs.regs().trcon[buffer.index() / 2].read() >> shift;
        Ok(TxStatus {
            pending: bits & trcon::TXREQ != 0,
            aborted: bits & trcon::TXABT != 0,
            lost_arbitration: bits & trcon::TXLARB != 0,
            bus_error: bits & trcon::TXERR != 0,
            priority: Priority::from_code(bits & trcon::TXPRI_MASK)?,
        })
    }
}
