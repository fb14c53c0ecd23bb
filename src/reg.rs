//! Typed view of the ECAN register file.
//!
//! The peripheral exposes sixteen-bit registers organised into two banked
//! windows: the *buffer window* carries the control, status and transmit
//! bookkeeping registers, the *filter window* carries the acceptance filter
//! and mask registers. Which bank is decoded is selected by [`CTRL1.WIN`];
//! the [`Ecan`] handle only hands out the filter bank through a
//! [`FilterWindowGuard`] so the select bit is restored on every exit path.
//!
//! [`CTRL1.WIN`]: ctrl1::WIN

use core::marker::PhantomData;
use core::ptr::NonNull;
use vcell::VolatileCell;

/// A single sixteen-bit hardware register.
#[repr(transparent)]
pub struct Reg(VolatileCell<u16>);

impl Reg {
    /// Reads the register.
    #[inline]
    pub fn read(&self) -> u16 {
        self.0.get()
    }

    /// Writes the register.
    #[inline]
    pub fn write(&self, value: u16) {
        self.0.set(value);
    }

    /// Read-modify-write access.
    #[inline]
    pub fn modify<F: FnOnce(u16) -> u16>(&self, f: F) {
        self.0.set(f(self.0.get()));
    }
}

/// A `SID`/`EID` register pair describing one identifier-shaped value
/// (a filter target or a mask pattern).
#[repr(C)]
pub struct IdRegs {
    /// SID(15:5), EXIDE/MIDE(3), EID17:16(1:0)
    pub sid: Reg,
    /// EID(15:0)
    pub eid: Reg,
}

/// Buffer-window register bank (`CTRL1.WIN` clear).
#[repr(C)]
pub struct RegisterBlock {
    /// Module control: window select, mode request/acknowledge, options.
    pub ctrl1: Reg,
    /// Module control 2. Unused by this driver, reset to default only.
    pub ctrl2: Reg,
    /// Interrupt vector status: ICODE, FILHIT.
    pub vec: Reg,
    /// FIFO control: start area and DMA buffer size.
    pub fctrl: Reg,
    /// FIFO status: next-read and next-write buffer numbers.
    pub fifo: Reg,
    /// Interrupt flags.
    pub intf: Reg,
    /// Interrupt enables.
    pub inte: Reg,
    /// Receive and transmit error counters.
    pub ec: Reg,
    /// Bit timing: baud rate prescaler and synchronisation jump width.
    pub cfg1: Reg,
    /// Bit timing: segment lengths, sampling, wake-up filter.
    pub cfg2: Reg,
    /// Acceptance filter enable bits.
    pub fen1: Reg,
    /// Filter-to-mask selector, filters 0..=7.
    pub fmsksel1: Reg,
    /// Filter-to-mask selector, filters 8..=15.
    pub fmsksel2: Reg,
    _reserved0: [Reg; 3],
    /// Buffer-full bits, buffers 0..=15 / 16..=31.
    pub rxful: [Reg; 2],
    /// Buffer-overflow bits, buffers 0..=15 / 16..=31.
    pub rxovf: [Reg; 2],
    _reserved1: [Reg; 4],
    /// Transmit slot control, one register per slot pair (0/1 .. 6/7).
    pub trcon: [Reg; 4],
    _reserved2: [Reg; 4],
    /// Receive data port serviced by DMA.
    pub rxd: Reg,
    /// Transmit data port serviced by DMA.
    pub txd: Reg,
    _reserved3: [Reg; 30],
}

/// Filter-window register bank (`CTRL1.WIN` set).
#[repr(C)]
pub struct FilterWindow {
    /// Module control; the same physical register as in the buffer window.
    pub ctrl1: Reg,
    _reserved0: [Reg; 15],
    /// Filter destination nibbles, four filters per register.
    pub bufpnt: [Reg; 4],
    _reserved1: [Reg; 4],
    /// Acceptance mask registers.
    pub rxm: [IdRegs; 3],
    _reserved2: [Reg; 2],
    /// Acceptance filter registers.
    pub rxf: [IdRegs; 16],
}

/// Handle to one ECAN peripheral instance's register file.
///
/// The handle is freely copyable; the constructor's safety contract makes
/// the caller responsible for not handing the same instance to two owners.
#[derive(Copy, Clone)]
pub struct Ecan {
    regs: NonNull<RegisterBlock>,
    filter: NonNull<FilterWindow>,
}

impl Ecan {
    /// Constructs a handle for the usual silicon decoding, where the filter
    /// bank is multiplexed onto the same address range as the buffer bank.
    ///
    /// # Safety
    /// `base` must point at the register block of an ECAN instance and the
    /// caller must guarantee exclusive ownership of it; constructing two
    /// handles for the same instance aliases hardware state.
    pub const unsafe fn from_ptr(base: *mut ()) -> Self {
        Self {
            regs: NonNull::new_unchecked(base as *mut RegisterBlock),
            filter: NonNull::new_unchecked(base as *mut FilterWindow),
        }
    }

    /// Constructs a handle for a decoding where the filter bank is mapped
    /// apart from the buffer bank (behavioural models, emulation
    /// environments). The window select bit is driven all the same.
    ///
    /// # Safety
    /// Same requirements as [`Self::from_ptr`], for both pointers.
    pub const unsafe fn from_banked_ptr(base: *mut (), filter_base: *mut ()) -> Self {
        Self {
            regs: NonNull::new_unchecked(base as *mut RegisterBlock),
            filter: NonNull::new_unchecked(filter_base as *mut FilterWindow),
        }
    }

    /// Buffer-window registers.
    #[inline]
    pub fn regs(&self) -> &RegisterBlock {
        // Safety: construction guarantees a valid, exclusively owned block.
        unsafe { self.regs.as_ref() }
    }

    /// Opens the filter window. The window select bit stays set for the
    /// lifetime of the guard and is cleared when it drops.
    ///
    /// Filter and mask accesses form a non-reentrant critical region; this
    /// must not be called from interrupt context.
    pub fn filter_window(&self) -> FilterWindowGuard<'_> {
        self.regs().ctrl1.modify(|v| v | ctrl1::WIN);
        FilterWindowGuard {
            ecan: self,
            _not_send: PhantomData,
        }
    }
}

/// Scoped access to the filter-window bank.
///
/// Holding the guard keeps `CTRL1.WIN` set; dropping it restores the buffer
/// window, including on early error returns.
pub struct FilterWindowGuard<'a> {
    ecan: &'a Ecan,
    _not_send: PhantomData<*const ()>,
}

impl FilterWindowGuard<'_> {
    /// Filter-window registers.
    #[inline]
    pub fn regs(&self) -> &FilterWindow {
        // Safety: construction of `Ecan` guarantees a valid pointer, and the
        // guard holds the window select bit for its whole lifetime.
        unsafe { self.ecan.filter.as_ref() }
    }
}

impl Drop for FilterWindowGuard<'_> {
    fn drop(&mut self) {
        self.ecan.regs().ctrl1.modify(|v| v & !ctrl1::WIN);
    }
}

/// `CTRL1` field encodings.
pub mod ctrl1 {
    /// Window select: set decodes the filter bank.
    pub const WIN: u16 = 1 << 0;
    /// Message timestamp capture enable.
    pub const CANCAP: u16 = 1 << 3;
    /// Acknowledged operating mode.
    pub const OPMODE_SHIFT: u16 = 5;
    /// Acknowledged operating mode mask (pre-shift).
    pub const OPMODE_MASK: u16 = 0x7;
    /// Requested operating mode.
    pub const REQOP_SHIFT: u16 = 8;
    /// Requested operating mode mask (pre-shift).
    pub const REQOP_MASK: u16 = 0x7;
    /// Abort all pending transmissions.
    pub const ABAT: u16 = 1 << 12;
    /// Stop the module when the CPU enters idle.
    pub const CSIDL: u16 = 1 << 13;
}

/// `VEC` field encodings.
pub mod vec {
    /// Interrupt code.
    pub const ICODE_MASK: u16 = 0x7f;
    /// Filter that accepted the most recent message.
    pub const FILHIT_SHIFT: u16 = 8;
    /// Filter-hit mask (pre-shift).
    pub const FILHIT_MASK: u16 = 0x1f;
}

/// `FCTRL` field encodings.
pub mod fctrl {
    /// FIFO start area: buffer number of the first FIFO slot.
    pub const FSA_MASK: u16 = 0x1f;
    /// FIFO length code.
    pub const DMABS_SHIFT: u16 = 13;
    /// FIFO length code mask (pre-shift).
    pub const DMABS_MASK: u16 = 0x7;
}

/// `FIFO` status field encodings.
pub mod fifo {
    /// Next buffer the FIFO will be read from.
    pub const FNRB_MASK: u16 = 0x3f;
    /// Next buffer the FIFO will be written to.
    pub const FBP_SHIFT: u16 = 8;
    /// FIFO write pointer mask (pre-shift).
    pub const FBP_MASK: u16 = 0x3f;
}

/// `INTF`/`INTE` flag bits.
pub mod intf {
    /// A transmit slot completed.
    pub const TBIF: u16 = 1 << 0;
    /// A receive buffer was filled.
    pub const RBIF: u16 = 1 << 1;
    /// A receive buffer overflowed.
    pub const RBOVIF: u16 = 1 << 2;
    /// The FIFO region is almost full.
    pub const FIFOIF: u16 = 1 << 3;
    /// Bus error activity.
    pub const ERRIF: u16 = 1 << 5;
    /// Bus activity during sleep.
    pub const WAKIF: u16 = 1 << 6;
    /// A malformed frame was observed.
    pub const IVRIF: u16 = 1 << 7;
    /// All flags serviced by the driver.
    pub const ALL: u16 = TBIF | RBIF | RBOVIF | FIFOIF | ERRIF | WAKIF | IVRIF;
}

/// `CFG1` field encodings.
pub mod cfg1 {
    /// Baud rate prescaler.
    pub const BRP_MASK: u16 = 0x3f;
    /// Synchronisation jump width.
    pub const SJW_SHIFT: u16 = 6;
    /// Synchronisation jump width mask (pre-shift).
    pub const SJW_MASK: u16 = 0x3;
}

/// `CFG2` field encodings.
pub mod cfg2 {
    /// Propagation segment.
    pub const PRSEG_MASK: u16 = 0x7;
    /// Phase segment 1.
    pub const SEG1PH_SHIFT: u16 = 3;
    /// Phase segment 1 mask (pre-shift).
    pub const SEG1PH_MASK: u16 = 0x7;
    /// Three samples per bit instead of one.
    pub const SAM: u16 = 1 << 6;
    /// Phase segment 2 is freely programmable.
    pub const SEG2PHTS: u16 = 1 << 7;
    /// Phase segment 2.
    pub const SEG2PH_SHIFT: u16 = 8;
    /// Phase segment 2 mask (pre-shift).
    pub const SEG2PH_MASK: u16 = 0x7;
    /// Wake-up filter enable.
    pub const WAKFIL: u16 = 1 << 14;
}

/// Per-slot fields of the `TRxyCON` registers. The even slot of a pair lives
/// in the low byte, the odd slot in the high byte; shift these by
/// [`slot_shift`] before use.
pub mod trcon {
    /// Transmit priority (two bits, `0` lowest).
    pub const TXPRI_MASK: u16 = 0x3;
    /// Answer remote transmission requests automatically.
    pub const RTREN: u16 = 1 << 2;
    /// Transmission requested and not yet completed.
    pub const TXREQ: u16 = 1 << 3;
    /// A bus error occurred during the last transmission.
    pub const TXERR: u16 = 1 << 4;
    /// Arbitration was lost during the last transmission.
    pub const TXLARB: u16 = 1 << 5;
    /// The last transmission was aborted.
    pub const TXABT: u16 = 1 << 6;
    /// The slot transmits; clear means the slot receives.
    pub const TXEN: u16 = 1 << 7;

    /// Bit offset of `slot`'s control byte within its pair register.
    #[inline]
    pub fn slot_shift(slot: usize) -> u16 {
        if slot % 2 == 0 {
            0
        } else {
            8
        }
    }
}

/// SID-shaped register field encodings, shared by filters and masks.
pub mod sid {
    /// Standard identifier.
    pub const SID_SHIFT: u16 = 5;
    /// Standard identifier mask (pre-shift).
    pub const SID_MASK: u16 = 0x7ff;
    /// Filter: match only the configured identifier length.
    /// Mask: include the identifier length in the comparison.
    pub const EXIDE: u16 = 1 << 3;
    /// Extended identifier bits 17:16.
    pub const EID_HI_MASK: u16 = 0x3;
}
