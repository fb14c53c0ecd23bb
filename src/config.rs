//! Driver configuration.
//!
//! [`CanConfig`] is the attribute block handed to [`Can::init`]; the driver
//! stores its own copy and applies it to the bit-timing, module-option, FIFO
//! and slot-direction registers while the controller sits in configuration
//! mode.
//!
//! [`Can::init`]: crate::bus::Can::init

use crate::buffer::{Buffer, Direction};
use crate::reg::{cfg1, cfg2, fctrl};
use core::ops::RangeInclusive;
use fugit::HertzU32;

/// Configuration for the CAN controller.
#[derive(Copy, Clone)]
pub struct CanConfig {
    /// Bit timing parameters.
    pub bit_timing: BitTiming,
    /// Module-wide options.
    pub module: ModuleConfig,
    /// Placement of the hardware-managed FIFO region.
    pub fifo: FifoConfig,
    /// Direction of the eight transmit-capable slots.
    pub buffer_dir: [Direction; 8],
}

impl Default for CanConfig {
    fn default() -> Self {
        Self {
            bit_timing: Default::default(),
            module: Default::default(),
            fifo: Default::default(),
            buffer_dir: [Direction::Rx; 8],
        }
    }
}

/// Bit-timing parameters in the register domain: every field is the raw
/// register value, so segment lengths are one less than their length in time
/// quanta.
#[derive(Copy, Clone)]
pub struct BitTiming {
    /// Baud rate prescaler (`BRP`), `0..=63`.
    pub prescaler: u8,
    /// Synchronisation jump width, `0..=3`.
    pub sync_jump: u8,
    /// Propagation segment, `0..=7`.
    pub prop_seg: u8,
    /// Phase segment 1, `0..=7`.
    pub phase_seg1: u8,
    /// Phase segment 2 is taken from [`Self::phase_seg2`] instead of being
    /// derived from phase segment 1.
    pub phase_seg2_prog: bool,
    /// Phase segment 2, `0..=7`.
    pub phase_seg2: u8,
    /// Bus sampling mode.
    pub sample: Sample,
}

impl Default for BitTiming {
    fn default() -> Self {
        // 16 time quanta per bit with the sample point at 75%.
        Self {
            prescaler: 0,
            sync_jump: 0,
            prop_seg: 4,
            phase_seg1: 5,
            phase_seg2_prog: true,
            phase_seg2: 3,
            sample: Sample::Single,
        }
    }
}

impl BitTiming {
    /// Returns the number of time quanta that make up one bit time.
    pub fn time_quanta_per_bit(&self) -> u32 {
        4 + u32::from(self.prop_seg) + u32::from(self.phase_seg1) + u32::from(self.phase_seg2)
    }

    /// Derives a configuration for `bitrate` from the default segment
    /// profile. The peripheral clock must divide into time quanta such that
    /// the bit time is a whole number of quanta.
    pub fn from_bitrate(can_clock: HertzU32, bitrate: HertzU32) -> Result<Self, BitTimingError> {
        let mut timing = Self::default();
        let quanta = timing.time_quanta_per_bit();
        let f_tq = bitrate * quanta;
        // The time quantum is derived from half the instruction clock.
        if let Some(0) = can_clock.to_Hz().checked_rem(2 * f_tq.to_Hz()) {
            let prescaler = can_clock.to_Hz() / (2 * f_tq.to_Hz());
            if !PRESCALER_RANGE.contains(&prescaler) {
                Err(BitTimingError::PrescalerOutOfRange(PRESCALER_RANGE))
            } else {
                timing.prescaler = (prescaler - 1) as u8;
                Ok(timing)
            }
        } else {
            Err(BitTimingError::NoValidPrescaler {
                can_clock,
                bitrate,
                time_quanta_per_bit: quanta,
            })
        }
    }

    pub(crate) fn cfg1_bits(&self) -> u16 {
        (self.prescaler as u16 & cfg1::BRP_MASK)
            | (self.sync_jump as u16 & cfg1::SJW_MASK) << cfg1::SJW_SHIFT
    }

    pub(crate) fn cfg2_bits(&self, wakeup_filter: bool) -> u16 {
        let mut bits = (self.prop_seg as u16 & cfg2::PRSEG_MASK)
            | (self.phase_seg1 as u16 & cfg2::SEG1PH_MASK) << cfg2::SEG1PH_SHIFT
            | (self.phase_seg2 as u16 & cfg2::SEG2PH_MASK) << cfg2::SEG2PH_SHIFT;
        if self.phase_seg2_prog {
            bits |= cfg2::SEG2PHTS;
        }
        if let Sample::Triple = self.sample {
            bits |= cfg2::SAM;
        }
        if wakeup_filter {
            bits |= cfg2::WAKFIL;
        }
        bits
    }
}

const PRESCALER_RANGE: RangeInclusive<u32> = 1..=64;

/// Misconfigurations of [`BitTiming`].
#[derive(Debug)]
pub enum BitTimingError {
    /// The derived prescaler is outside the wrapped `RangeInclusive`.
    PrescalerOutOfRange(RangeInclusive<u32>),
    /// No whole-number prescaler exists.
    ///
    /// `can_clock` must be divisible by `2 * bitrate * time_quanta_per_bit`.
    NoValidPrescaler {
        /// Provided peripheral clock.
        can_clock: HertzU32,
        /// Requested bitrate.
        bitrate: HertzU32,
        /// Time quanta per bit of the default segment profile.
        time_quanta_per_bit: u32,
    },
}

/// Bus sampling mode.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sample {
    /// The bus is sampled once, at the sample point.
    #[default]
    Single,
    /// The bus is sampled three times around the sample point.
    Triple,
}

/// Behaviour of the module when the CPU idles.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpuIdle {
    /// Keep running while the CPU idles.
    #[default]
    Continue,
    /// Stop when the CPU idles.
    Stop,
}

/// Module-wide options.
#[derive(Copy, Clone, Default)]
pub struct ModuleConfig {
    /// Filter bus activity during sleep to wake the module up.
    pub wakeup: bool,
    /// Behaviour when the CPU idles.
    pub cpu_idle: CpuIdle,
    /// Capture a timestamp on message reception.
    pub timestamp: bool,
}

/// Number of slots in the FIFO region.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FifoLength {
    /// Four slots.
    Four,
    /// Six slots.
    Six,
    /// Eight slots.
    Eight,
    /// Twelve slots.
    Twelve,
    /// Sixteen slots.
    Sixteen,
    /// Twenty-four slots.
    TwentyFour,
    /// Thirty-two slots.
    ThirtyTwo,
}

impl FifoLength {
    /// Number of slots this length selects.
    pub fn buffers(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Six => 6,
            Self::Eight => 8,
            Self::Twelve => 12,
            Self::Sixteen => 16,
            Self::TwentyFour => 24,
            Self::ThirtyTwo => 32,
        }
    }

    pub(crate) fn code(self) -> u16 {
        match self {
            Self::Four => 0,
            Self::Six => 1,
            Self::Eight => 2,
            Self::Twelve => 3,
            Self::Sixteen => 4,
            Self::TwentyFour => 5,
            Self::ThirtyTwo => 6,
        }
    }
}

/// Placement of the hardware-managed FIFO region.
#[derive(Copy, Clone)]
pub struct FifoConfig {
    /// First slot of the region, `B0..=B28`.
    pub start: Buffer,
    /// Region length in slots.
    pub length: FifoLength,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            start: Buffer::B8,
            length: FifoLength::Four,
        }
    }
}

impl FifoConfig {
    /// `true` if `buffer` lies inside the FIFO region.
    pub fn contains(&self, buffer: Buffer) -> bool {
        let start = self.start.index();
        (start..start + self.length.buffers()).contains(&buffer.index())
    }

    pub(crate) fn fctrl_bits(&self) -> u16 {
        (self.start.index() as u16 & fctrl::FSA_MASK) | self.length.code() << fctrl::DMABS_SHIFT
    }
}
