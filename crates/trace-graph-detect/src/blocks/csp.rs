//! Feature-aggregation block (cross-stage partial fusion).

use std::any::Any;

use candle_core::{Device, Tensor};

use trace_graph_core::graph::{expect_single, Block, BlockOutput};
use trace_graph_core::GraphResult;

use super::{Bottleneck, ConvNorm};

/// Split-transform-fuse block: a 1x1 stem splits into two halves, a chain
/// of bottlenecks transforms one half, and everything is fused by a 1x1
/// projection.
///
/// The forward grows the fuse list one bottleneck at a time, chaining each
/// repeat off the previous entry. The traceable variant pins this down to a
/// fixed arity.
#[derive(Clone)]
pub struct CspBlock {
    cv1: ConvNorm,
    cv2: ConvNorm,
    m: Vec<Bottleneck>,
}

impl CspBlock {
    pub fn new(cv1: ConvNorm, cv2: ConvNorm, m: Vec<Bottleneck>) -> Self {
        Self { cv1, cv2, m }
    }

    pub fn init(
        c1: usize,
        c2: usize,
        n: usize,
        shortcut: bool,
        groups: usize,
        expansion: f64,
        device: &Device,
    ) -> GraphResult<Self> {
        let cc = (c2 as f64 * expansion) as usize;
        let cv1 = ConvNorm::init(c1, 2 * cc, 1, 1, 1, device)?;
        let cv2 = ConvNorm::init((2 + n) * cc, c2, 1, 1, 1, device)?;
        let m = (0..n)
            .map(|_| Bottleneck::init(cc, cc, shortcut, groups, device))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Self::new(cv1, cv2, m))
    }

    pub fn cv1(&self) -> &ConvNorm {
        &self.cv1
    }

    pub fn cv2(&self) -> &ConvNorm {
        &self.cv2
    }

    pub fn bottlenecks(&self) -> &[Bottleneck] {
        &self.m
    }

    /// Hidden width of each branch, read off the stem.
    pub fn hidden_channels(&self) -> usize {
        self.cv1.out_channels() / 2
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> GraphResult<Tensor> {
        let mut ys = self.cv1.forward_t(xs, train)?.chunk(2, 1)?;
        for m in &self.m {
            let next = m.forward_t(&ys[ys.len() - 1], train)?;
            ys.push(next);
        }
        self.cv2.forward_t(&Tensor::cat(&ys, 1)?, train)
    }

    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (name, t) in self.cv1.named_parameters() {
            params.push((format!("cv1.{name}"), t));
        }
        for (name, t) in self.cv2.named_parameters() {
            params.push((format!("cv2.{name}"), t));
        }
        for (i, m) in self.m.iter().enumerate() {
            for (name, t) in m.named_parameters() {
                params.push((format!("m.{i}.{name}"), t));
            }
        }
        params
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        self.cv1.relocate(device)?;
        self.cv2.relocate(device)?;
        for m in &mut self.m {
            m.relocate(device)?;
        }
        Ok(())
    }
}

impl Block for CspBlock {
    fn type_tag(&self) -> &'static str {
        "Csp"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let x = expect_single(xs, self.type_tag())?;
        Ok(BlockOutput::One(self.forward_t(x, false)?))
    }

    fn forward_train(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let x = expect_single(xs, self.type_tag())?;
        Ok(BlockOutput::One(self.forward_t(x, true)?))
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        CspBlock::named_parameters(self)
    }

    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        CspBlock::relocate(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_shape() {
        let device = Device::Cpu;
        let block = CspBlock::init(32, 32, 2, true, 1, 0.5, &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 32, 8, 8), &device).unwrap();
        let y = block.forward_t(&x, false).unwrap();
        assert_eq!(y.dims(), &[1, 32, 8, 8]);
    }

    #[test]
    fn test_structural_accessors() {
        let device = Device::Cpu;
        let block = CspBlock::init(64, 64, 1, true, 1, 0.5, &device).unwrap();
        assert_eq!(block.cv1().in_channels(), 64);
        assert_eq!(block.hidden_channels(), 32);
        assert_eq!(block.cv2().in_channels(), 96);
        assert_eq!(block.cv2().out_channels(), 64);
        assert_eq!(block.bottlenecks().len(), 1);
    }
}
