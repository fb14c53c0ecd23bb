//! Acceptance filters and masks.
//!
//! Sixteen filters compare incoming identifiers, three masks select which
//! identifier bits each comparison looks at. A filter routes its matches to
//! one dedicated slot or to the FIFO region, and is live only while its
//! enable bit is set.
//!
//! The filter and mask registers sit in the banked filter window; every
//! operation here briefly flips the window select bit through the register
//! handle's guard. These operations must not run from interrupt context.

use crate::buffer::{Destination, Direction, FIFO_POINTER, MAX_FILTER_TARGET};
use crate::bus::{Can, Error};
use crate::reg::sid;
use core::ops::Range;
use embedded_can::{ExtendedId, Id, StandardId};

/// Number of acceptance filters.
pub const NUM_FILTERS: usize = 16;

/// Number of acceptance masks.
pub const NUM_MASKS: usize = 3;

/// Index of one of the sixteen acceptance filters.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FilterId(u8);

macro_rules! filter_consts {
    ($($name:ident = $index:literal),+ $(,)?) => {
        $(
            #[doc = concat!("Filter ", $index, ".")]
            pub const $name: FilterId = FilterId($index);
        )+
    };
}

impl FilterId {
    filter_consts!(
        F0 = 0, F1 = 1, F2 = 2, F3 = 3, F4 = 4, F5 = 5, F6 = 6, F7 = 7,
        F8 = 8, F9 = 9, F10 = 10, F11 = 11, F12 = 12, F13 = 13, F14 = 14,
        F15 = 15,
    );

    /// Constructs a filter index. Returns `None` for `index >= 16`.
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < NUM_FILTERS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// The raw filter number.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One of the three acceptance masks.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MaskId {
    /// Mask 0.
    Mask0,
    /// Mask 1.
    Mask1,
    /// Mask 2.
    Mask2,
}

impl MaskId {
    /// The raw mask number.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Mask operand: one mask, every mask, or the inert selector.
///
/// [`MaskSelect::None`] turns the operation into a successful no-op so that
/// disabled entries in caller-side configuration tables stay inert.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MaskSelect {
    /// A single mask.
    Mask(MaskId),
    /// All three masks.
    All,
    /// No mask; the operation does nothing.
    None,
}

impl From<MaskId> for MaskSelect {
    fn from(mask: MaskId) -> Self {
        Self::Mask(mask)
    }
}

/// Filter operand: one filter, every filter, or the inert selector.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterSelect {
    /// A single filter.
    Filter(FilterId),
    /// All sixteen filters.
    All,
    /// No filter; the operation does nothing.
    None,
}

impl From<FilterId> for FilterSelect {
    fn from(filter: FilterId) -> Self {
        Self::Filter(filter)
    }
}

impl FilterSelect {
    fn indices(self) -> Option<Range<usize>> {
        match self {
            Self::Filter(f) => Some(f.index()..f.index() + 1),
            Self::All => Some(0..NUM_FILTERS),
            Self::None => None,
        }
    }
}

/// Identifier bit pattern for an acceptance mask.
///
/// Only identifier bits set in the pattern participate in the comparison; an
/// all-zero pattern accepts every identifier.
#[derive(Copy, Clone, Debug)]
pub struct IdMask {
    pattern: Id,
    match_ide: bool,
}

impl IdMask {
    /// A mask that accepts every frame.
    pub fn accept_all() -> Self {
        Self {
            pattern: Id::Standard(StandardId::ZERO),
            match_ide: false,
        }
    }

    /// Masks standard identifier bits and requires the received identifier
    /// length to match the filter's.
    ///
    /// A pattern of all ones (`0x7FF`) demands an exact identifier match, a
    /// pattern of zero accepts all standard identifiers.
    pub fn standard(pattern: StandardId) -> Self {
        Self {
            pattern: Id::Standard(pattern),
            match_ide: true,
        }
    }

    /// Masks all twenty-nine identifier bits and requires the received
    /// identifier length to match the filter's.
    pub fn extended(pattern: ExtendedId) -> Self {
        Self {
            pattern: Id::Extended(pattern),
            match_ide: true,
        }
    }

    /// A mask with an explicit pattern and identifier-length policy.
    pub fn new(pattern: Id, match_ide: bool) -> Self {
        Self { pattern, match_ide }
    }

    fn register_bits(&self) -> (u16, u16) {
        id_register_bits(self.pattern, self.match_ide)
    }
}

/// Splits an identifier into the SID/EID register pair layout shared by
/// filters and masks.
pub(crate) fn id_register_bits(id: Id, flag: bool) -> (u16, u16) {
    let (sid_bits, eid_bits) = match id {
        Id::Standard(id) => (id.as_raw(), 0),
        Id::Extended(id) => ((id.as_raw() >> 18) as u16, id.as_raw() & 0x3ffff),
    };
    let mut sid_reg = (sid_bits & sid::SID_MASK) << sid::SID_SHIFT;
    if flag {
        sid_reg |= sid::EXIDE;
    }
    sid_reg |= ((eid_bits >> 16) as u16) & sid::EID_HI_MASK;
    (sid_reg, eid_bits as u16)
}

impl<'a, TX, RX> Can<'a, TX, RX> {
    /// Writes an acceptance mask.
    ///
    /// Not gated on configuration mode, but the value only takes effect once
    /// no filter bound to the mask is actively matching; callers that need a
    /// clean cut-over should reconfigure from a quiescent mode.
    pub fn set_mask(&mut self, mask: impl Into<MaskSelect>, value: &IdMask) -> Result<(), Error> {
        let range = match mask.into() {
            MaskSelect::Mask(m) => m.index()..m.index() + 1,
            MaskSelect::All => 0..NUM_MASKS,
            MaskSelect::None => return Ok(()),
        };
        let (sid_reg, eid_reg) = value.register_bits();
        let window = self.regs.filter_window();
        let bank = window.regs();
        for index in range {
            bank.rxm[index].sid.write(sid_reg);
            bank.rxm[index].eid.write(eid_reg);
        }
        Ok(())
    }

    /// Writes a filter's identifier target. An extended `id` also sets the
    /// filter's identifier-length discriminator.
    pub fn set_filter(&mut self, filter: impl Into<FilterSelect>, id: Id) -> Result<(), Error> {
        let range = match filter.into().indices() {
            Some(range) => range,
            None => return Ok(()),
        };
        let (sid_reg, eid_reg) = id_register_bits(id, matches!(id, Id::Extended(_)));
        let window = self.regs.filter_window();
        let bank = window.regs();
        for index in range {
            bank.rxf[index].sid.write(sid_reg);
            bank.rxf[index].eid.write(eid_reg);
        }
        Ok(())
    }

    /// Binds filters to `mask`. The selector registers live in the buffer
    /// window, so no window flip happens here.
    pub fn assign_mask(
        &mut self,
        mask: MaskId,
        filter: impl Into<FilterSelect>,
    ) -> Result<(), Error> {
        let range = match filter.into().indices() {
            Some(range) => range,
            None => return Ok(()),
        };
        let code = mask.index() as u16;
        for index in range {
            let reg = if index < 8 {
                &self.regs.regs().fmsksel1
            } else {
                &self.regs.regs().fmsksel2
            };
            let shift = (index % 8) * 2;
            // Clear the whole two-bit field before setting the new code.
            reg.modify(|v| (v & !(0b11 << shift)) | (code << shift));
        }
        Ok(())
    }

    /// Points filters at a receive destination and enables them.
    ///
    /// The destination must be a slot `B0..=B14` outside the FIFO region and
    /// not configured to transmit, or the FIFO sentinel.
    pub fn connect(
        &mut self,
        filter: impl Into<FilterSelect>,
        destination: Destination,
    ) -> Result<(), Error> {
        let range = match filter.into().indices() {
            Some(range) => range,
            None => return Ok(()),
        };
        let pointer = match destination {
            Destination::Fifo => FIFO_POINTER,
            Destination::Buffer(buffer) => {
                if buffer.index() > MAX_FILTER_TARGET
                    || !self.buffer_exists(buffer)
                    || self.config.fifo.contains(buffer)
                    || self.buffer_direction(buffer) == Direction::Tx
                {
                    return Err(Error::Input);
                }
                buffer.index() as u16
            }
        };

        {
            let window = self.regs.filter_window();
            let bank = window.regs();
            for index in range.clone() {
                let shift = (index % 4) * 4;
                bank.bufpnt[index / 4].modify(|v| (v & !(0xf << shift)) | (pointer << shift));
            }
        }

        let mut bits = 0u16;
        for index in range {
            bits |= 1 << index;
        }
        self.regs.regs().fen1.modify(|v| v | bits);
        Ok(())
    }

    /// Disables filters. The stored destination pointer keeps its value;
    /// enablement and binding are separate.
    pub fn disconnect(&mut self, filter: impl Into<FilterSelect>) -> Result<(), Error> {
        let range = match filter.into().indices() {
            Some(range) => range,
            None => return Ok(()),
        };
        let mut bits = 0u16;
        for index in range {
            bits |= 1 << index;
        }
        self.regs.regs().fen1.modify(|v| v & !bits);
        Ok(())
    }

    /// `true` if `filter`'s enable bit is set.
    pub fn filter_enabled(&self, filter: FilterId) -> bool {
        self.regs.regs().fen1.read() & (1 << filter.index()) != 0
    }
}
