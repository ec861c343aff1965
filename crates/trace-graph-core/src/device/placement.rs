//! Device placement options for graph preparation and inference.

use serde::{Deserialize, Serialize};

/// Where tensors are created and models are placed.
///
/// # Serialization
///
/// Serializes as snake_case strings:
/// - `"cpu"` -> `DevicePlacement::Cpu`
/// - `"auto"` -> `DevicePlacement::Auto`
/// - `{ "cuda": 0 }` -> `DevicePlacement::Cuda(0)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DevicePlacement {
    /// CPU-only. Slower but always available.
    Cpu,

    /// Specific CUDA device by index.
    Cuda(u32),

    /// Prefer CUDA device 0 when available, fall back to CPU.
    #[default]
    Auto,
}

impl DevicePlacement {
    /// Returns true if this placement requires a GPU.
    pub fn requires_gpu(&self) -> bool {
        matches!(self, DevicePlacement::Cuda(_))
    }
}
