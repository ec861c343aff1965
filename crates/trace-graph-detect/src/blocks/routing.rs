//! Parameterless routing blocks for the neck.

use std::any::Any;

use candle_core::Tensor;

use trace_graph_core::graph::{expect_single, Block, BlockOutput};
use trace_graph_core::GraphResult;

/// Nearest-neighbor spatial upsampling by an integer factor.
#[derive(Debug, Clone, Copy)]
pub struct Upsample {
    scale: usize,
}

impl Upsample {
    pub fn new(scale: usize) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> usize {
        self.scale
    }
}

impl Block for Upsample {
    fn type_tag(&self) -> &'static str {
        "Upsample"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let x = expect_single(xs, self.type_tag())?;
        let (_, _, h, w) = x.dims4()?;
        Ok(BlockOutput::One(
            x.upsample_nearest2d(h * self.scale, w * self.scale)?,
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Concatenation of all inputs along a fixed dimension.
#[derive(Debug, Clone, Copy)]
pub struct Concat {
    dim: usize,
}

impl Concat {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Block for Concat {
    fn type_tag(&self) -> &'static str {
        "Concat"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        Ok(BlockOutput::One(Tensor::cat(xs, self.dim)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
