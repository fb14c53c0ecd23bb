//! Buffer addressing model.
//!
//! The peripheral owns thirty-two message slots of eight words each. Slots
//! `B0..=B7` may be configured to transmit or receive, `B8..=B31` only
//! receive. A contiguous sub-range of the slots forms the FIFO region; reads
//! from it go through the [`Destination::Fifo`] sentinel rather than a slot
//! index, since the hardware advances the ring on its own.

/// Number of message slots the peripheral decodes.
pub const NUM_BUFFERS: usize = 32;

/// Number of slots that may be configured as transmit slots.
pub const NUM_TX_BUFFERS: usize = 8;

/// Index of one of the thirty-two message slots.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Buffer(u8);

macro_rules! buffer_consts {
    ($($name:ident = $index:literal),+ $(,)?) => {
        $(
            #[doc = concat!("Buffer ", $index, ".")]
            pub const $name: Buffer = Buffer($index);
        )+
    };
}

impl Buffer {
    buffer_consts!(
        B0 = 0, B1 = 1, B2 = 2, B3 = 3, B4 = 4, B5 = 5, B6 = 6, B7 = 7,
        B8 = 8, B9 = 9, B10 = 10, B11 = 11, B12 = 12, B13 = 13, B14 = 14,
        B15 = 15, B16 = 16, B17 = 17, B18 = 18, B19 = 19, B20 = 20, B21 = 21,
        B22 = 22, B23 = 23, B24 = 24, B25 = 25, B26 = 26, B27 = 27, B28 = 28,
        B29 = 29, B30 = 30, B31 = 31,
    );

    /// Constructs a buffer index. Returns `None` for `index >= 32`.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < NUM_BUFFERS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// The raw slot number.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// `true` for the slots that may be configured as transmit slots.
    #[inline]
    pub const fn transmit_capable(self) -> bool {
        (self.0 as usize) < NUM_TX_BUFFERS
    }
}

/// Direction a message slot is configured for.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// The slot transmits.
    Tx,
    /// The slot receives.
    Rx,
}

/// A receive source or filter destination: one dedicated slot, or the FIFO
/// region as a whole.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Destination {
    /// A dedicated message slot.
    Buffer(Buffer),
    /// The hardware-managed FIFO ring; the next slot to read is chosen by
    /// the peripheral.
    Fifo,
}

impl From<Buffer> for Destination {
    fn from(buffer: Buffer) -> Self {
        Self::Buffer(buffer)
    }
}

/// Destination nibble written to the `BUFPNT` registers for the FIFO
/// sentinel.
pub(crate) const FIFO_POINTER: u16 = 0xf;

/// Highest slot number a filter may point at directly.
pub(crate) const MAX_FILTER_TARGET: usize = 14;
