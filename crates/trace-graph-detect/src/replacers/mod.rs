//! Structural-introspection replacers for the surgery targets.
//!
//! Each replacer pairs a typed config record with an extraction function
//! that recovers it by walking a built module's structure: channel counts
//! from weight shapes, group counts from conv configs, flags from baked-in
//! decisions. Nothing relies on stored constructor arguments, so a model
//! loaded without them converts the same as a freshly built one.
//!
//! Extraction validates the structure it walks; a module that does not
//! match the assumed shape aborts the whole replacement pass (see
//! [`trace_graph_core::replace`]).

mod csp;
mod detect;
mod segment;

pub use csp::{CspConfig, CspReplacer};
pub use detect::{DetectConfig, DetectReplacer};
pub use segment::{SegmentConfig, SegmentReplacer};
