//! Domain models for the timeclock bridge

mod attendance;
mod device;

pub use attendance::*;
pub use device::*;
