//! DMA collaborator seam.
//!
//! The controller does not move message words itself: one DMA channel drains
//! the transmit port from the slot array and one fills the slot array from
//! the receive port. The driver owns both channel handles for its whole
//! lifetime and programs them through this trait during [`Can::init`];
//! platform HALs implement it on their channel types.
//!
//! [`Can::init`]: crate::bus::Can::init

/// Direction of a channel's transfers.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferDirection {
    /// Slot array to peripheral data port.
    MemoryToPeripheral,
    /// Peripheral data port to slot array.
    PeripheralToMemory,
}

/// Peripheral request line that paces a channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Trigger {
    /// The controller requests words for transmission.
    CanTx,
    /// The controller offers received words.
    CanRx,
}

/// Endpoints and trigger of one channel association.
#[derive(Copy, Clone, Debug)]
pub struct TransferConfig {
    /// Transfer direction.
    pub direction: TransferDirection,
    /// Request line pacing the channel.
    pub trigger: Trigger,
    /// Address of the peripheral data port.
    pub peripheral: *const (),
    /// Base address of the slot array.
    pub memory: *const (),
}

/// One DMA channel as the driver consumes it.
pub trait DmaChannel {
    /// Associates the channel with a peripheral request line and its
    /// endpoints.
    fn init(&mut self, transfer: &TransferConfig);

    /// Sets the number of sixteen-bit words moved per request.
    fn set_block_size(&mut self, words: usize);

    /// Arms the channel.
    fn enable(&mut self);

    /// Releases the channel.
    fn cleanup(&mut self);
}
