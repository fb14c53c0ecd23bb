//! Convenience re-exports of the traits needed to use the driver.

pub use crate::dma::DmaChannel as _;
pub use embedded_can::Frame as _;
