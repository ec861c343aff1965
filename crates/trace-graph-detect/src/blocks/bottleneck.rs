//! Residual bottleneck used inside the feature-aggregation block.

use candle_core::{Device, Tensor};

use trace_graph_core::GraphResult;

use super::ConvNorm;

/// Two 3x3 convolutions with an optional residual add.
///
/// The residual is taken only when the caller asked for a shortcut *and*
/// the channel counts allow it; the decision is baked in at construction
/// and visible afterwards through [`Bottleneck::add`].
#[derive(Clone)]
pub struct Bottleneck {
    cv1: ConvNorm,
    cv2: ConvNorm,
    add: bool,
}

impl Bottleneck {
    pub fn new(cv1: ConvNorm, cv2: ConvNorm, shortcut: bool) -> Self {
        let add = shortcut && cv1.in_channels() == cv2.out_channels();
        Self { cv1, cv2, add }
    }

    pub fn init(
        c1: usize,
        c2: usize,
        shortcut: bool,
        groups: usize,
        device: &Device,
    ) -> GraphResult<Self> {
        let cv1 = ConvNorm::init(c1, c2, 3, 1, 1, device)?;
        let cv2 = ConvNorm::init(c2, c2, 3, 1, groups, device)?;
        Ok(Self::new(cv1, cv2, shortcut))
    }

    /// Whether the residual add is active.
    pub fn add(&self) -> bool {
        self.add
    }

    /// Group count of the second convolution.
    pub fn groups(&self) -> usize {
        self.cv2.groups()
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> GraphResult<Tensor> {
        let y = self.cv2.forward_t(&self.cv1.forward_t(xs, train)?, train)?;
        if self.add {
            Ok((xs + y)?)
        } else {
            Ok(y)
        }
    }

    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (name, t) in self.cv1.named_parameters() {
            params.push((format!("cv1.{name}"), t));
        }
        for (name, t) in self.cv2.named_parameters() {
            params.push((format!("cv2.{name}"), t));
        }
        params
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        self.cv1.relocate(device)?;
        self.cv2.relocate(device)
    }
}
