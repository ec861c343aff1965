//! Working device singleton.
//!
//! The device is selected once and shared globally, in the same spirit as a
//! single CUDA context: consistent placement for every conversion and every
//! relocated model parameter.

use std::sync::OnceLock;

use candle_core::Device;

use crate::error::GraphResult;

use super::DevicePlacement;

/// Global working device. Written once, then read-only.
static WORKING_DEVICE: OnceLock<Device> = OnceLock::new();

/// Select the process-wide working device.
///
/// Safe to call from multiple threads; only the first call selects. A
/// second call with a different placement keeps the existing device and
/// logs a warning rather than re-selecting mid-run.
///
/// # Errors
///
/// Returns an error when an explicit CUDA placement is requested and the
/// device cannot be initialized. `Auto` never fails: it falls back to CPU.
pub fn init_working_device(placement: DevicePlacement) -> GraphResult<&'static Device> {
    if let Some(device) = WORKING_DEVICE.get() {
        tracing::warn!(
            ?placement,
            current = ?device,
            "working device already selected, keeping existing"
        );
        return Ok(device);
    }

    let device = select_device(placement)?;
    tracing::info!(?placement, ?device, "working device selected");
    Ok(WORKING_DEVICE.get_or_init(|| device))
}

/// The current working device.
///
/// Defaults to CPU when [`init_working_device`] was never called.
pub fn working_device() -> &'static Device {
    WORKING_DEVICE.get_or_init(|| Device::Cpu)
}

fn select_device(placement: DevicePlacement) -> GraphResult<Device> {
    match placement {
        DevicePlacement::Cpu => Ok(Device::Cpu),
        DevicePlacement::Cuda(id) => Ok(Device::new_cuda(id as usize)?),
        DevicePlacement::Auto => Ok(Device::cuda_if_available(0)?),
    }
}
