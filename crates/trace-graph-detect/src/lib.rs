//! Traceable variants and graph surgery for detection models.
//!
//! This crate makes a trained detection/segmentation model exportable by a
//! static-graph tracer while keeping the retained computation numerically
//! identical:
//!
//! - [`blocks`]: the original (pre-surgery) building blocks, including the
//!   dynamic head tails the tracer cannot represent
//! - [`variants`]: drop-in traceable replacements that stop short of the
//!   dynamic tail and emit an intermediate output bundle instead
//! - [`replacers`]: typed structural-introspection config extractors and
//!   the build-with-adoption step for each replaced type
//! - [`postprocess`]: the excluded tail, recomputed deterministically from
//!   the static model descriptor after inference
//! - [`model`]: spec-built detection models over the core module graph
//! - [`validate`]: patched validators that accept the bundle and return
//!   output in the layout the unpatched validation path expects
//!
//! # Flow
//!
//! ```text
//! DetectionModel ──prepare_for_export──> traceable model ──> tracer/quantizer
//!                                             │
//!                                        inference
//!                                             │
//!                            bundle ──reconstruct──> original output layout
//! ```

pub mod blocks;
pub mod error;
pub mod model;
pub mod postprocess;
pub mod prepare;
pub mod replacers;
pub mod validate;
pub mod variants;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{DetectError, DetectResult};
pub use model::{DetectionModel, ModelDescriptor, ModelSpec};
pub use prepare::prepare_for_export;
