//! Mask prototype head.

use candle_core::{Device, Tensor};

use trace_graph_core::GraphResult;

use super::ConvNorm;

/// Produces prototype masks from the highest-resolution feature scale.
#[derive(Clone)]
pub struct Proto {
    cv1: ConvNorm,
    cv2: ConvNorm,
    cv3: ConvNorm,
}

impl Proto {
    pub fn new(cv1: ConvNorm, cv2: ConvNorm, cv3: ConvNorm) -> Self {
        Self { cv1, cv2, cv3 }
    }

    pub fn init(c1: usize, npr: usize, nm: usize, device: &Device) -> GraphResult<Self> {
        let cv1 = ConvNorm::init(c1, npr, 3, 1, 1, device)?;
        let cv2 = ConvNorm::init(npr, npr, 3, 1, 1, device)?;
        let cv3 = ConvNorm::init(npr, nm, 1, 1, 1, device)?;
        Ok(Self::new(cv1, cv2, cv3))
    }

    /// Prototype channel width, read off the stem.
    pub fn stem_channels(&self) -> usize {
        self.cv1.out_channels()
    }

    /// Mask channels, read off the projection.
    pub fn mask_channels(&self) -> usize {
        self.cv3.out_channels()
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> GraphResult<Tensor> {
        let xs = self.cv1.forward_t(xs, train)?;
        let (_, _, h, w) = xs.dims4()?;
        let xs = xs.upsample_nearest2d(2 * h, 2 * w)?;
        let xs = self.cv2.forward_t(&xs, train)?;
        self.cv3.forward_t(&xs, train)
    }

    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (prefix, conv) in [("cv1", &self.cv1), ("cv2", &self.cv2), ("cv3", &self.cv3)] {
            for (name, t) in conv.named_parameters() {
                params.push((format!("{prefix}.{name}"), t));
            }
        }
        params
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        self.cv1.relocate(device)?;
        self.cv2.relocate(device)?;
        self.cv3.relocate(device)
    }
}
