//! Post-processing reconstruction of the excluded head tail.
//!
//! Everything here is a pure function of the intermediate output bundle
//! and the static model descriptor, with no dependence on traced tensors.
//! That is what lets this stage run outside the exported graph while
//! reproducing the original output exactly.

mod anchors;
mod decode;
mod reconstruct;

pub use anchors::{anchor_grid, make_anchors};
pub use decode::{dist2bbox, split_channels};
pub use reconstruct::{reconstruct_detection, reconstruct_segmentation};
