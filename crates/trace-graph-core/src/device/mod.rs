//! Process-wide working device selection.
//!
//! The working device is written once at setup time and thereafter only
//! read: all bridge conversions and model placement go through it. Callers
//! must not change it after model construction begins.

mod core;
mod placement;

pub use self::core::{init_working_device, working_device};
pub use placement::DevicePlacement;
