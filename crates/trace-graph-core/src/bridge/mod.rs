//! Host/device tensor bridge.
//!
//! Converts between host numeric arrays and device-resident tensors,
//! recursively over nested list/tuple structures, always through the
//! process-wide working device. Host data is carried as f32 (the
//! documented downcast); wider float tensors convert down, integer and
//! quantized tensors are rejected with the offending dtype named.

mod convert;
mod host;


pub use convert::{set_model, to_device_value, to_host_value};
pub use host::{HostArray, HostValue, TensorValue};
