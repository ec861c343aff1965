//! Patched validation path.
//!
//! The unpatched validators expect the original merged head output. After
//! surgery the model emits the intermediate bundle instead, so the patched
//! validators reconstruct the merged layout first and then delegate to the
//! base step unchanged: composition around the boundary, no subclassing.

mod base;
mod patched;
mod run;
mod setup;

pub use base::{BaseDetectionValidator, BaseSegmentationValidator};
pub use patched::{PatchedDetectionValidator, PatchedSegmentationValidator};
pub use run::{val, ValReport};
pub use setup::register_patched_validators;
