#![no_std]
#![warn(missing_docs)]
//! # ECAN
//!
//! ## Overview
//! This crate provides a platform-agnostic HAL for the ECAN controller
//! found on motor-control oriented MCUs: sixteen acceptance filters, three
//! acceptance masks, thirty-two message slots of eight words each (the first
//! eight transmit-capable) and a DMA-backed FIFO region for reception.
//!
//! It provides the following features:
//!
//! - a mode state machine covering disable, normal, listen-only, loopback
//!   and listen-all operation
//! - filter and mask configuration with per-filter destination binding
//! - priority-tagged transmission from dedicated slots with abort support
//! - reception into dedicated slots or the hardware-managed FIFO ring
//! - interrupt event collection for the instance's interrupt vector
//!
//! The controller does not move message words itself. Two DMA channels,
//! supplied by the platform HAL through the [`DmaChannel`](dma::DmaChannel)
//! trait, connect
//! the transmit and receive data ports to a caller-provided array of
//! eight-word slots; the driver borrows that array for its lifetime, marks
//! the slots it actually covers as existing and shares it with the
//! peripheral under the hardware's full/pending-bit handshake.
//!
//! ## Usage
//!
//! ```no_run
//! use ecan::buffer::{Buffer, Destination, Direction};
//! use ecan::bus::{Can, Mode};
//! use ecan::config::CanConfig;
//! use ecan::filter::{FilterId, IdMask, MaskId};
//! use ecan::message::{Message, RawMessage};
//! use ecan::prelude::*;
//! use ecan::reg::Ecan;
//! use ecan::tx::Priority;
//! use embedded_can::StandardId;
//! use vcell::VolatileCell;
//!
//! # struct Channel;
//! # impl ecan::dma::DmaChannel for Channel {
//! #     fn init(&mut self, _: &ecan::dma::TransferConfig) {}
//! #     fn set_block_size(&mut self, _: usize) {}
//! #     fn enable(&mut self) {}
//! #     fn cleanup(&mut self) {}
//! # }
//! # fn dma_channels() -> (Channel, Channel) { (Channel, Channel) }
//! // The slot array lives in RAM the DMA engine can reach; platform code
//! // usually places it with a `#[link_section]` attribute.
//! static mut MESSAGE_RAM: [VolatileCell<RawMessage>; 32] =
//!     [const { VolatileCell::new(RawMessage::new()) }; 32];
//!
//! let mut config = CanConfig::default();
//! config.buffer_dir[0] = Direction::Tx;
//!
//! let (tx_channel, rx_channel) = dma_channels();
//! // Safety: the base address decodes this instance's register block and
//! // nothing else owns it.
//! let regs = unsafe { Ecan::from_ptr(0x0400 as *mut ()) };
//! let mut can = Can::init(
//!     regs,
//!     &config,
//!     tx_channel,
//!     rx_channel,
//!     unsafe { &mut *core::ptr::addr_of_mut!(MESSAGE_RAM) },
//! )
//! .unwrap();
//!
//! // Accept one identifier into the FIFO region.
//! let id = StandardId::new(0x123).unwrap();
//! can.set_mask(MaskId::Mask0, &IdMask::standard(StandardId::MAX)).unwrap();
//! can.set_filter(FilterId::F0, id.into()).unwrap();
//! can.assign_mask(MaskId::Mask0, FilterId::F0).unwrap();
//! can.connect(FilterId::F0, Destination::Fifo).unwrap();
//!
//! can.set_mode(Mode::Loopback);
//! let message = Message::new(id, &[0x11, 0x22, 0x33]).unwrap();
//! nb::block!(can.write(Buffer::B0, &message, Priority::Highest)).unwrap();
//! let echoed = nb::block!(can.read(Destination::Fifo)).unwrap();
//! assert_eq!(echoed.data(), message.data());
//! ```

pub mod buffer;
pub mod bus;
pub mod config;
pub mod dma;
pub mod filter;
pub mod interrupt;
pub mod message;
pub mod prelude;
pub mod reg;
pub mod rx;
pub mod tx;

pub use embedded_can;
