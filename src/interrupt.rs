//! Interrupt event reporting.

use crate::reg::intf;
use bitfield::bitfield;

bitfield! {
    /// A set of controller events, as reported by [`Can::isr`] and accepted
    /// by the event enable calls. Bit positions match the hardware flag
    /// register.
    ///
    /// [`Can::isr`]: crate::bus::Can::isr
    #[derive(Copy, Clone)]
    pub struct Events(u16);

    /// A transmit slot completed.
    pub tx_done, set_tx_done: 0;
    /// A receive buffer was filled.
    pub rx_done, set_rx_done: 1;
    /// A receive buffer overflowed; the incoming frame was lost.
    pub rx_overflow, set_rx_overflow: 2;
    /// The FIFO region is almost full.
    pub fifo_almost_full, set_fifo_almost_full: 3;
    /// Bus error activity was observed.
    pub bus_error, set_bus_error: 5;
    /// Bus activity during sleep.
    pub wakeup, set_wakeup: 6;
    /// A malformed frame was observed on the bus.
    pub invalid_message, set_invalid_message: 7;
}

impl Events {
    /// The empty event set.
    pub const fn none() -> Self {
        Self(0)
    }

    /// Every event the driver services.
    pub const fn all() -> Self {
        Self(intf::ALL)
    }

    /// `true` if no event is set.
    pub fn is_empty(&self) -> bool {
        self.0 & intf::ALL == 0
    }

    pub(crate) fn bits(&self) -> u16 {
        self.0 & intf::ALL
    }

    pub(crate) fn from_bits(bits: u16) -> Self {
        Self(bits & intf::ALL)
    }
}

impl core::fmt::Debug for Events {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Events {{ ")?;
        if self.tx_done() {
            write!(f, "TB ")?;
        }
        if self.rx_done() {
            write!(f, "RB ")?;
        }
        if self.rx_overflow() {
            write!(f, "RBOV ")?;
        }
        if self.fifo_almost_full() {
            write!(f, "FIFO ")?;
        }
        if self.bus_error() {
            write!(f, "ERR ")?;
        }
        if self.wakeup() {
            write!(f, "WAK ")?;
        }
        if self.invalid_message() {
            write!(f, "IVR ")?;
        }
        write!(f, "}}")
    }
}
