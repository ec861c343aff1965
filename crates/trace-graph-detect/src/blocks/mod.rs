//! Original (pre-surgery) building blocks.
//!
//! These are the submodule types a trained model arrives with. The head
//! blocks carry the dynamic inference tails (anchor grids derived from
//! runtime feature shapes, merged output assembly) that the static-graph
//! tracer cannot represent; their traceable counterparts live in
//! [`crate::variants`].
//!
//! Every block is built from explicit tensors, so a replacement can adopt
//! a donor's parameters by cloning its parts (tensor clones share
//! storage). Channel counts and flags are derived from the built structure
//! at construction time, which is what the replacers introspect.

mod bottleneck;
mod conv;
mod csp;
mod detect;
mod dfl;
mod head;
mod proto;
mod routing;
mod segment;

pub use bottleneck::Bottleneck;
pub use conv::ConvNorm;
pub use csp::CspBlock;
pub use detect::DetectHead;
pub use dfl::Dfl;
pub use head::{forward_scales, HeadBranch};
pub use proto::Proto;
pub use routing::{Concat, Upsample};
pub use segment::{mask_coefficients, SegmentHead};
