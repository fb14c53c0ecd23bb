#![allow(dead_code)]
//! Behavioural model of the ECAN controller for host-side testing.
//!
//! The driver is pointed at two plain-memory register pages (the buffer and
//! filter banks) and a slot array. A service thread stands in for the
//! silicon: it acknowledges mode requests, arbitrates pending transmit
//! slots, loops frames back through the acceptance filters, keeps the FIFO
//! pointers moving and answers abort requests. Handshakes follow the
//! hardware contract, so the driver code under test is exactly the code
//! that runs on target.

use ecan::dma::{DmaChannel, TransferConfig, TransferDirection};
use ecan::message::RawMessage;
use ecan::reg::Ecan;
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use vcell::VolatileCell;

const PAGE_WORDS: usize = 0x40;

// Buffer-window word offsets.
const CTRL1: usize = 0x00;
const FCTRL: usize = 0x03;
const FIFO: usize = 0x04;
const INTF: usize = 0x05;
const FEN1: usize = 0x0a;
const FMSKSEL1: usize = 0x0b;
const RXFUL1: usize = 0x10;
const RXOVF1: usize = 0x12;
const TRCON: usize = 0x18;

// Filter-window word offsets.
const BUFPNT: usize = 0x10;
const RXM: usize = 0x18;
const RXF: usize = 0x20;

// CTRL1 fields.
const OPMODE_SHIFT: u16 = 5;
const REQOP_SHIFT: u16 = 8;
const MODE_MASK: u16 = 0x7;
const MODE_NORMAL: u16 = 0;
const MODE_LOOPBACK: u16 = 2;
const MODE_CONFIGURATION: u16 = 4;

// Per-slot TRCON fields.
const TXPRI_MASK: u16 = 0x3;
const TXREQ: u16 = 1 << 3;
const TXABT: u16 = 1 << 6;
const TXEN: u16 = 1 << 7;

// INTF flags.
const TBIF: u16 = 1 << 0;
const RBIF: u16 = 1 << 1;
const RBOVIF: u16 = 1 << 2;

const FIFO_SIZES: [usize; 8] = [4, 6, 8, 12, 16, 24, 32, 32];

struct Model {
    regs: *mut u16,
    filters: *mut u16,
    ram: *mut u16,
}

unsafe impl Send for Model {}

impl Model {
    unsafe fn rd(&self, offset: usize) -> u16 {
        ptr::read_volatile(self.regs.add(offset))
    }

    unsafe fn wr(&self, offset: usize, value: u16) {
        ptr::write_volatile(self.regs.add(offset), value);
    }

    unsafe fn frd(&self, offset: usize) -> u16 {
        ptr::read_volatile(self.filters.add(offset))
    }

    unsafe fn ram_rd(&self, slot: usize, word: usize) -> u16 {
        ptr::read_volatile(self.ram.add(slot * 8 + word))
    }

    unsafe fn ram_wr(&self, slot: usize, word: usize, value: u16) {
        ptr::write_volatile(self.ram.add(slot * 8 + word), value);
    }

    unsafe fn rxful(&self, slot: usize) -> bool {
        self.rd(RXFUL1 + slot / 16) & (1 << (slot % 16)) != 0
    }

    unsafe fn set_rxful(&self, slot: usize) {
        let offset = RXFUL1 + slot / 16;
        self.wr(offset, self.rd(offset) | 1 << (slot % 16));
    }

    unsafe fn raise(&self, flag: u16) {
        self.wr(INTF, self.rd(INTF) | flag);
    }

    unsafe fn fifo_geometry(&self) -> (usize, usize) {
        let fctrl = self.rd(FCTRL);
        let start = (fctrl & 0x1f) as usize;
        let len = FIFO_SIZES[(fctrl >> 13 & 0x7) as usize];
        (start, len)
    }

    unsafe fn service(&self) {
        self.ack_mode();
        self.service_aborts();
        self.advance_fifo();
        let mode = self.rd(CTRL1) >> OPMODE_SHIFT & MODE_MASK;
        if mode == MODE_NORMAL || mode == MODE_LOOPBACK {
            self.arbitrate(mode == MODE_LOOPBACK);
        }
    }

    unsafe fn ack_mode(&self) {
        let ctrl1 = self.rd(CTRL1);
        let requested = ctrl1 >> REQOP_SHIFT & MODE_MASK;
        let acknowledged = ctrl1 >> OPMODE_SHIFT & MODE_MASK;
        if requested != acknowledged {
            if acknowledged == MODE_CONFIGURATION {
                // Leaving configuration: FIFO pointers restart at the
                // configured start area, before the new mode is visible.
                let (start, _) = self.fifo_geometry();
                self.wr(FIFO, start as u16 | (start as u16) << 8);
            }
            self.wr(
                CTRL1,
                (ctrl1 & !(MODE_MASK << OPMODE_SHIFT)) | requested << OPMODE_SHIFT,
            );
        }
    }

    unsafe fn service_aborts(&self) {
        for slot in 0..8 {
            let offset = TRCON + slot / 2;
            let shift = (slot % 2) * 8;
            let bits = self.rd(offset) >> shift;
            if bits & TXABT != 0 {
                self.wr(offset, self.rd(offset) & !((TXREQ | TXABT) << shift));
            }
        }
    }

    unsafe fn advance_fifo(&self) {
        let fifo = self.rd(FIFO);
        let next_read = (fifo & 0x3f) as usize;
        let next_write = (fifo >> 8 & 0x3f) as usize;
        if next_read != next_write && !self.rxful(next_read) {
            let (start, len) = self.fifo_geometry();
            let advanced = if next_read + 1 >= start + len {
                start
            } else {
                next_read + 1
            };
            self.wr(FIFO, advanced as u16 | (next_write as u16) << 8);
        }
    }

    unsafe fn arbitrate(&self, loopback: bool) {
        let mut winner: Option<(u16, usize)> = None;
        for slot in 0..8 {
            let bits = self.rd(TRCON + slot / 2) >> ((slot % 2) * 8);
            if bits & TXEN != 0 && bits & TXREQ != 0 {
                let priority = bits & TXPRI_MASK;
                let better = match winner {
                    None => true,
                    Some((best, index)) => priority > best || (priority == best && slot < index),
                };
                if better {
                    winner = Some((priority, slot));
                }
            }
        }
        let Some((_, slot)) = winner else { return };

        if loopback {
            let mut words = [0u16; 8];
            for (word, value) in words.iter_mut().enumerate() {
                *value = self.ram_rd(slot, word);
            }
            self.accept(&words);
        }

        let offset = TRCON + slot / 2;
        let shift = (slot % 2) * 8;
        self.wr(offset, self.rd(offset) & !(TXREQ << shift));
        self.raise(TBIF);
    }

    unsafe fn accept(&self, words: &[u16; 8]) {
        let ide = words[0] & 1 != 0;
        let sid = words[0] >> 2 & 0x7ff;
        let eid = if ide {
            ((words[1] & 0xfff) as u32) << 6 | (words[2] >> 10) as u32
        } else {
            0
        };

        let enabled = self.rd(FEN1);
        for filter in 0..16usize {
            if enabled & (1 << filter) == 0 {
                continue;
            }
            let fsid_reg = self.frd(RXF + 2 * filter);
            let feid_reg = self.frd(RXF + 2 * filter + 1);
            let exide = fsid_reg & (1 << 3) != 0;
            let fsid = fsid_reg >> 5 & 0x7ff;
            let feid = ((fsid_reg & 0x3) as u32) << 16 | feid_reg as u32;

            let selector = self.rd(FMSKSEL1 + filter / 8) >> ((filter % 8) * 2) & 0x3;
            let (msid, mide, meid) = if (selector as usize) < 3 {
                let msid_reg = self.frd(RXM + 2 * selector as usize);
                let meid_reg = self.frd(RXM + 2 * selector as usize + 1);
                (
                    msid_reg >> 5 & 0x7ff,
                    msid_reg & (1 << 3) != 0,
                    ((msid_reg & 0x3) as u32) << 16 | meid_reg as u32,
                )
            } else {
                // No mask assigned: every bit participates.
                (0x7ff, true, 0x3ffff)
            };

            if mide && ide != exide {
                continue;
            }
            if sid & msid != fsid & msid {
                continue;
            }
            if ide && eid & meid != feid & meid {
                continue;
            }

            self.deposit(filter, words);
            return;
        }
    }

    unsafe fn deposit(&self, filter: usize, words: &[u16; 8]) {
        let pointer = self.frd(BUFPNT + filter / 4) >> ((filter % 4) * 4) & 0xf;
        let slot = if pointer == 0xf {
            let fifo = self.rd(FIFO);
            let next_write = (fifo >> 8 & 0x3f) as usize;
            if self.rxful(next_write) {
                let offset = RXOVF1 + next_write / 16;
                self.wr(offset, self.rd(offset) | 1 << (next_write % 16));
                self.raise(RBOVIF);
                return;
            }
            let (start, len) = self.fifo_geometry();
            let advanced = if next_write + 1 >= start + len {
                start
            } else {
                next_write + 1
            };
            self.wr(FIFO, (fifo & 0xff) | (advanced as u16) << 8);
            next_write
        } else {
            let slot = pointer as usize;
            if self.rxful(slot) {
                let offset = RXOVF1 + slot / 16;
                self.wr(offset, self.rd(offset) | 1 << (slot % 16));
                self.raise(RBOVIF);
                return;
            }
            slot
        };

        for (word, value) in words.iter().enumerate() {
            self.ram_wr(slot, word, *value);
        }
        self.ram_wr(slot, 7, (filter as u16) << 8);
        self.set_rxful(slot);
        self.raise(RBIF);
    }
}

/// A register/memory fixture plus the service thread emulating the silicon.
pub struct Bench {
    pub regs: Ecan,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Bench {
    /// Builds a fixture with `slots` backed message slots and starts the
    /// service thread.
    pub fn new(slots: usize) -> (Self, &'static mut [VolatileCell<RawMessage>]) {
        let page: &'static mut [u16; PAGE_WORDS] = Box::leak(Box::new([0; PAGE_WORDS]));
        let filter_page: &'static mut [u16; PAGE_WORDS] = Box::leak(Box::new([0; PAGE_WORDS]));
        let memory: &'static mut [VolatileCell<RawMessage>] = Box::leak(
            (0..slots)
                .map(|_| VolatileCell::new(RawMessage::new()))
                .collect::<Vec<_>>()
                .into_boxed_slice(),
        );

        let model = Model {
            regs: page.as_mut_ptr(),
            filters: filter_page.as_mut_ptr(),
            ram: memory.as_mut_ptr() as *mut u16,
        };
        // Safety: the pages and the slot array are leaked, so the model's
        // pointers stay valid for the whole process.
        let regs = unsafe {
            Ecan::from_banked_ptr(
                page.as_mut_ptr() as *mut (),
                filter_page.as_mut_ptr() as *mut (),
            )
        };

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::spawn(move || {
            while !stop_flag.load(Ordering::Relaxed) {
                unsafe { model.service() };
                thread::sleep(Duration::from_micros(20));
            }
        });

        (
            Self {
                regs,
                stop,
                thread: Some(thread),
            },
            memory,
        )
    }
}

impl Drop for Bench {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Records the calls the driver makes into its DMA collaborator.
#[derive(Default)]
pub struct StubChannel {
    pub direction: Option<TransferDirection>,
    pub block_size: Option<usize>,
    pub enabled: bool,
    pub released: bool,
}

impl DmaChannel for StubChannel {
    fn init(&mut self, transfer: &TransferConfig) {
        self.direction = Some(transfer.direction);
    }

    fn set_block_size(&mut self, words: usize) {
        self.block_size = Some(words);
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn cleanup(&mut self) {
        self.released = true;
    }
}

/// Polls a non-blocking operation until it completes, with a test timeout.
pub fn poll<T, E: std::fmt::Debug>(mut operation: impl FnMut() -> nb::Result<T, E>) -> T {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match operation() {
            Ok(value) => return value,
            Err(nb::Error::WouldBlock) if Instant::now() < deadline => thread::yield_now(),
            Err(nb::Error::WouldBlock) => panic!("timed out waiting for the controller"),
            Err(nb::Error::Other(error)) => panic!("operation failed: {error:?}"),
        }
    }
}
