//! Driver object and lifecycle.
//!
//! [`Can`] owns one ECAN instance: the register handle, a private copy of
//! the attribute block, both DMA channel handles and the borrow of the
//! DMA-shared slot array. All driver operations hang off it.

use crate::buffer::{Buffer, Destination, Direction, NUM_BUFFERS};
use crate::config::{CanConfig, CpuIdle};
use crate::dma::{DmaChannel, TransferConfig, TransferDirection, Trigger};
use crate::interrupt::Events;
use crate::message::{RawMessage, SLOT_WORDS};
use crate::reg::{ctrl1, fifo, intf, trcon, Ecan, Reg};
use core::fmt::{self, Debug};
use vcell::VolatileCell;

/// Error kinds returned by the driver.
///
/// Operations that complete with "not yet" outcomes (an occupied transmit
/// slot, an empty receive buffer) report those as [`nb::Error::WouldBlock`]
/// instead of an error kind, so callers can poll.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The driver object is unusable.
    Object,
    /// An index, length or destination argument is out of range or conflicts
    /// with the configured buffer layout.
    Input,
    /// The supplied backing store cannot hold a single message slot.
    Alloc,
    /// The write target has no backing store or is not a transmit slot.
    Write,
    /// An internal invariant was violated.
    Assert,
}

/// Requested operating modes.
///
/// Configuration mode is not requestable; the driver enters it on its own
/// around initialisation and shutdown.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Quiescent state; no bus activity.
    Disable,
    /// Full bus participation.
    Normal,
    /// Receive without acknowledging or transmitting.
    Listen,
    /// Transmissions are looped internally to the receive path.
    Loopback,
    /// Receive every frame regardless of filters.
    ListenAll,
}

pub(crate) mod opmode {
    pub const NORMAL: u16 = 0;
    pub const DISABLE: u16 = 1;
    pub const LOOPBACK: u16 = 2;
    pub const LISTEN: u16 = 3;
    pub const CONFIGURATION: u16 = 4;
    pub const LISTEN_ALL: u16 = 7;
}

impl Mode {
    fn code(self) -> u16 {
        match self {
            Self::Normal => opmode::NORMAL,
            Self::Disable => opmode::DISABLE,
            Self::Loopback => opmode::LOOPBACK,
            Self::Listen => opmode::LISTEN,
            Self::ListenAll => opmode::LISTEN_ALL,
        }
    }
}

/// Receive and transmit error counters.
#[derive(Copy, Clone)]
pub struct ErrorCounters {
    /// Receive error counter.
    pub receive: u8,
    /// Transmit error counter.
    pub transmit: u8,
}

impl Debug for ErrorCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCounters")
            .field("rec", &self.receive)
            .field("tec", &self.transmit)
            .finish()
    }
}

/// One ECAN controller instance.
pub struct Can<'a, TX, RX> {
    pub(crate) regs: Ecan,
    pub(crate) config: CanConfig,
    pub(crate) exists: u32,
    pub(crate) tx_channel: TX,
    pub(crate) rx_channel: RX,
    pub(crate) memory: &'a mut [VolatileCell<RawMessage>],
}

impl<'a, TX: DmaChannel, RX: DmaChannel> Can<'a, TX, RX> {
    /// Brings the controller up.
    ///
    /// Enters configuration mode, resets the register file to its defaults,
    /// wipes the filter and mask table, binds both DMA channels to the slot
    /// array, marks the slots covered by `memory` as existing, applies
    /// `config` and parks the controller in [`Mode::Disable`].
    ///
    /// Fails with [`Error::Alloc`] if `memory` is empty and with
    /// [`Error::Input`] if the FIFO region leaves the slot range or overlaps
    /// a transmit-configured slot.
    pub fn init(
        regs: Ecan,
        config: &CanConfig,
        tx_channel: TX,
        rx_channel: RX,
        memory: &'a mut [VolatileCell<RawMessage>],
    ) -> Result<Self, Error> {
        if memory.is_empty() {
            return Err(Error::Alloc);
        }
        if config.fifo.start.index() + config.fifo.length.buffers() > NUM_BUFFERS {
            return Err(Error::Input);
        }
        for (index, dir) in config.buffer_dir.iter().enumerate() {
            let buffer = Buffer::new(index as u8).ok_or(Error::Assert)?;
            if *dir == Direction::Tx && config.fifo.contains(buffer) {
                return Err(Error::Input);
            }
        }

        let slots = memory.len().min(NUM_BUFFERS);
        let exists = if slots >= NUM_BUFFERS {
            u32::MAX
        } else {
            (1 << slots) - 1
        };

        let mut can = Self {
            regs,
            config: *config,
            exists,
            tx_channel,
            rx_channel,
            memory,
        };

        can.request_mode(opmode::CONFIGURATION);
        can.reset_registers();
        can.bind_dma();
        can.apply_config();
        can.request_mode(opmode::DISABLE);
        Ok(can)
    }

    /// Shuts the controller down: back to configuration mode, registers to
    /// their defaults, DMA channels released and handed back.
    pub fn clean_up(mut self) -> (TX, RX) {
        self.request_mode(opmode::CONFIGURATION);
        self.reset_registers();
        self.tx_channel.cleanup();
        self.rx_channel.cleanup();
        (self.tx_channel, self.rx_channel)
    }

    fn bind_dma(&mut self) {
        let memory = self.memory.as_ptr() as *const ();
        self.tx_channel.init(&TransferConfig {
            direction: TransferDirection::MemoryToPeripheral,
            trigger: Trigger::CanTx,
            peripheral: &self.regs.regs().txd as *const Reg as *const (),
            memory,
        });
        self.tx_channel.set_block_size(SLOT_WORDS);
        self.tx_channel.enable();

        self.rx_channel.init(&TransferConfig {
            direction: TransferDirection::PeripheralToMemory,
            trigger: Trigger::CanRx,
            peripheral: &self.regs.regs().rxd as *const Reg as *const (),
            memory,
        });
        self.rx_channel.set_block_size(SLOT_WORDS);
        self.rx_channel.enable();
    }
}

impl<'a, TX, RX> Can<'a, TX, RX> {
    /// Requests `mode` and spins until the controller acknowledges it.
    ///
    /// There is no timeout; on a hung bus (bus-off with a transmission
    /// outstanding) this does not return until the condition clears.
    pub fn set_mode(&mut self, mode: Mode) {
        self.request_mode(mode.code());
    }

    /// The mode the controller currently acknowledges, `None` while it sits
    /// in internal configuration mode.
    pub fn mode(&self) -> Option<Mode> {
        let code = (self.regs.regs().ctrl1.read() >> ctrl1::OPMODE_SHIFT) & ctrl1::OPMODE_MASK;
        match code {
            opmode::NORMAL => Some(Mode::Normal),
            opmode::DISABLE => Some(Mode::Disable),
            opmode::LOOPBACK => Some(Mode::Loopback),
            opmode::LISTEN => Some(Mode::Listen),
            opmode::LISTEN_ALL => Some(Mode::ListenAll),
            _ => None,
        }
    }

    /// `true` while the object holds at least one backed slot.
    pub fn is_valid(&self) -> bool {
        self.exists != 0
    }

    /// `true` if `buffer` received backing store during initialisation.
    pub fn buffer_exists(&self, buffer: Buffer) -> bool {
        self.exists & (1 << buffer.index()) != 0
    }

    /// Direction a destination is configured for. The FIFO region and every
    /// slot outside the transmit-capable range receive.
    pub fn direction(&self, destination: impl Into<Destination>) -> Direction {
        match destination.into() {
            Destination::Fifo => Direction::Rx,
            Destination::Buffer(buffer) => self.buffer_direction(buffer),
        }
    }

    /// Tests a destination for pending content.
    ///
    /// Transmit slots are empty while no transmission is requested, receive
    /// slots while their full bit is clear, and the FIFO while the slot the
    /// hardware will read next is not full.
    pub fn is_empty(&self, destination: impl Into<Destination>) -> Result<bool, Error> {
        match destination.into() {
            Destination::Fifo => Ok(!self.rxful(self.fifo_next_read())),
            Destination::Buffer(buffer) => {
                if !self.buffer_exists(buffer) {
                    return Err(Error::Input);
                }
                match self.buffer_direction(buffer) {
                    Direction::Tx => Ok(!self.tx_pending(buffer)),
                    Direction::Rx => Ok(!self.rxful(buffer.index())),
                }
            }
        }
    }

    /// Current receive and transmit error counters.
    pub fn error_counters(&self) -> ErrorCounters {
        let ec = self.regs.regs().ec.read();
        ErrorCounters {
            receive: ec as u8,
            transmit: (ec >> 8) as u8,
        }
    }

    /// Allows `events` to raise the controller's interrupt line.
    pub fn enable_events(&mut self, events: Events) {
        self.regs.regs().inte.modify(|v| v | events.bits());
    }

    /// Stops `events` from raising the controller's interrupt line.
    pub fn disable_events(&mut self, events: Events) {
        self.regs.regs().inte.modify(|v| v & !events.bits());
    }

    /// Services the controller from the hardware interrupt vector.
    ///
    /// Collects and clears the pending event flags and returns them. The
    /// main context must hold off filter and mask operations while this can
    /// run; the window select bit is shared state.
    pub fn isr(&mut self) -> Events {
        let regs = self.regs.regs();
        let flags = regs.intf.read() & intf::ALL;
        if flags & intf::RBOVIF != 0 {
            regs.rxovf[0].write(0);
            regs.rxovf[1].write(0);
        }
        regs.intf.modify(|v| v & !flags);
        Events::from_bits(flags)
    }

    fn request_mode(&mut self, code: u16) {
        let ctrl1 = &self.regs.regs().ctrl1;
        ctrl1.modify(|v| {
            (v & !(ctrl1::REQOP_MASK << ctrl1::REQOP_SHIFT)) | (code << ctrl1::REQOP_SHIFT)
        });
        while (ctrl1.read() >> ctrl1::OPMODE_SHIFT) & ctrl1::OPMODE_MASK != code {}
    }

    /// Returns every register the driver owns to its documented default.
    /// Must only run in configuration mode.
    fn reset_registers(&mut self) {
        let regs = self.regs.regs();
        regs.ctrl1
            .modify(|v| v & !(ctrl1::CANCAP | ctrl1::ABAT | ctrl1::CSIDL));
        regs.ctrl2.write(0);
        regs.fctrl.write(0);
        regs.intf.write(0);
        regs.inte.write(0);
        regs.cfg1.write(0);
        regs.cfg2.write(0);
        regs.fen1.write(0);
        regs.fmsksel1.write(0);
        regs.fmsksel2.write(0);
        for reg in regs.rxful.iter().chain(regs.rxovf.iter()) {
            reg.write(0);
        }
        for reg in regs.trcon.iter() {
            reg.write(0);
        }

        let window = self.regs.filter_window();
        let bank = window.regs();
        for reg in bank.bufpnt.iter() {
            reg.write(0);
        }
        for pair in bank.rxm.iter().chain(bank.rxf.iter()) {
            pair.sid.write(0);
            pair.eid.write(0);
        }
    }

    fn apply_config(&mut self) {
        let regs = self.regs.regs();
        regs.cfg1.write(self.config.bit_timing.cfg1_bits());
        regs.cfg2
            .write(self.config.bit_timing.cfg2_bits(self.config.module.wakeup));
        regs.fctrl.write(self.config.fifo.fctrl_bits());

        let module = self.config.module;
        regs.ctrl1.modify(|mut v| {
            v &= !(ctrl1::CSIDL | ctrl1::CANCAP);
            if let CpuIdle::Stop = module.cpu_idle {
                v |= ctrl1::CSIDL;
            }
            if module.timestamp {
                v |= ctrl1::CANCAP;
            }
            v
        });

        for (index, dir) in self.config.buffer_dir.iter().enumerate() {
            if let Direction::Tx = dir {
                let shift = trcon::slot_shift(index);
                regs.trcon[index / 2].modify(|v| v | (trcon::TXEN << shift));
            }
        }
    }

    pub(crate) fn buffer_direction(&self, buffer: Buffer) -> Direction {
        if buffer.transmit_capable() && !self.config.fifo.contains(buffer) {
            self.config.buffer_dir[buffer.index()]
        } else {
            Direction::Rx
        }
    }

    pub(crate) fn fifo_next_read(&self) -> usize {
        // The field is six bits wide but only slot numbers are valid.
        (self.regs.regs().fifo.read() & fifo::FNRB_MASK) as usize % NUM_BUFFERS
    }

    pub(crate) fn rxful(&self, index: usize) -> bool {
        self.regs.regs().rxful[index / 16].read() & (1 << (index % 16)) != 0
    }

    pub(crate) fn clear_rxful(&self, index: usize) {
        self.regs.regs().rxful[index / 16].modify(|v| v & !(1 << (index % 16)));
    }

    pub(crate) fn tx_pending(&self, buffer: Buffer) -> bool {
        let shift = trcon::slot_shift(buffer.index());
        self.regs.regs().trcon[buffer.index() / 2].read() & (trcon::TXREQ << shift) != 0
    }
}
