//! The block capability: what every graph node can do.

use std::any::Any;

use candle_core::{Device, Tensor};

use crate::error::{GraphError, GraphResult};

/// Output of a block: most blocks produce one tensor, heads produce the
/// intermediate output bundle as an ordered list.
#[derive(Debug, Clone)]
pub enum BlockOutput {
    One(Tensor),
    Many(Vec<Tensor>),
}

impl BlockOutput {
    /// The single tensor, or a routing error when the output is a bundle.
    pub fn as_single(&self, context: &str) -> GraphResult<&Tensor> {
        match self {
            BlockOutput::One(t) => Ok(t),
            BlockOutput::Many(ts) => Err(GraphError::Routing {
                context: context.to_string(),
                message: format!("expected a single tensor, got a bundle of {}", ts.len()),
            }),
        }
    }

    /// All tensors in order, regardless of arity.
    pub fn tensors(&self) -> Vec<Tensor> {
        match self {
            BlockOutput::One(t) => vec![t.clone()],
            BlockOutput::Many(ts) => ts.clone(),
        }
    }
}

/// A module-graph node implementation.
///
/// Blocks expose two explicit forward paths: [`Block::forward`] is the
/// statically-shaped export/eval path, [`Block::forward_train`] the
/// training path. The graph's [`super::RunMode`] picks one at preparation
/// time; nothing branches on tensor values at call time.
pub trait Block: Send + Sync {
    /// Short diagnostic tag, also the default `type_name` metadata.
    fn type_tag(&self) -> &'static str;

    /// Export/eval forward: fixed shapes, no data-dependent branching.
    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput>;

    /// Training forward. Defaults to the export path for blocks whose
    /// behavior does not differ.
    fn forward_train(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        self.forward(xs)
    }

    /// Parameter enumeration, for adoption checks and placement.
    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        Vec::new()
    }

    /// Move every parameter to `device`. Parameterless blocks keep the
    /// default no-op.
    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        let _ = device;
        Ok(())
    }

    /// Downcasting seam for type-driven replacement.
    fn as_any(&self) -> &dyn Any;
}

/// Unwrap a single-input slice, with the block's tag in the error.
pub fn expect_single<'a>(xs: &'a [Tensor], tag: &str) -> GraphResult<&'a Tensor> {
    match xs {
        [x] => Ok(x),
        _ => Err(GraphError::Routing {
            context: tag.to_string(),
            message: format!("expected exactly one input, got {}", xs.len()),
        }),
    }
}
