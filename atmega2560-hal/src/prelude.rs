//! Prelude which exports the traits needed to use the timer drivers.
pub use embedded_hal::delay::DelayNs as _;

pub use crate::timer::Timer as _;
