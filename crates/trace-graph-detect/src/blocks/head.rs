//! Per-scale prediction branches shared by the head blocks.

use candle_core::{Device, Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig};

use trace_graph_core::error::GraphError;
use trace_graph_core::GraphResult;

use super::ConvNorm;

/// One per-scale prediction stack: two 3x3 conv units and a biased 1x1
/// projection to the prediction channels.
#[derive(Clone)]
pub struct HeadBranch {
    cv0: ConvNorm,
    cv1: ConvNorm,
    out: Conv2d,
    out_channels: usize,
}

impl HeadBranch {
    pub fn new(cv0: ConvNorm, cv1: ConvNorm, out: Conv2d) -> GraphResult<Self> {
        let out_channels = out.weight().dims4()?.0;
        Ok(Self {
            cv0,
            cv1,
            out,
            out_channels,
        })
    }

    pub fn init(c_in: usize, c_mid: usize, c_out: usize, device: &Device) -> GraphResult<Self> {
        let cv0 = ConvNorm::init(c_in, c_mid, 3, 1, 1, device)?;
        let cv1 = ConvNorm::init(c_mid, c_mid, 3, 1, 1, device)?;
        let weight = Tensor::randn(0f32, 0.05, (c_out, c_mid, 1, 1), device)?;
        let bias = Tensor::randn(0f32, 0.05, (c_out,), device)?;
        let out = Conv2d::new(weight, Some(bias), Conv2dConfig::default());
        Self::new(cv0, cv1, out)
    }

    pub fn in_channels(&self) -> usize {
        self.cv0.in_channels()
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> GraphResult<Tensor> {
        let xs = self.cv1.forward_t(&self.cv0.forward_t(xs, train)?, train)?;
        Ok(self.out.forward(&xs)?)
    }

    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (name, t) in self.cv0.named_parameters() {
            params.push((format!("0.{name}"), t));
        }
        for (name, t) in self.cv1.named_parameters() {
            params.push((format!("1.{name}"), t));
        }
        params.push(("2.weight".to_string(), self.out.weight().clone()));
        if let Some(b) = self.out.bias() {
            params.push(("2.bias".to_string(), b.clone()));
        }
        params
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        self.cv0.relocate(device)?;
        self.cv1.relocate(device)?;
        let config = *self.out.config();
        let weight = self.out.weight().to_device(device)?;
        let bias = match self.out.bias() {
            Some(b) => Some(b.to_device(device)?),
            None => None,
        };
        self.out = Conv2d::new(weight, bias, config);
        Ok(())
    }
}

/// Run paired box/class branches over the per-scale features and
/// concatenate each scale's predictions on the channel dim.
pub fn forward_scales(
    box_branches: &[HeadBranch],
    cls_branches: &[HeadBranch],
    xs: &[Tensor],
    train: bool,
) -> GraphResult<Vec<Tensor>> {
    if xs.len() != box_branches.len() || xs.len() != cls_branches.len() {
        return Err(GraphError::Routing {
            context: "detection head".to_string(),
            message: format!(
                "expected {} scale inputs, got {}",
                box_branches.len(),
                xs.len()
            ),
        });
    }
    let mut feats = Vec::with_capacity(xs.len());
    for ((x, reg), cls) in xs.iter().zip(box_branches).zip(cls_branches) {
        let reg_out = reg.forward_t(x, train)?;
        let cls_out = cls.forward_t(x, train)?;
        feats.push(Tensor::cat(&[&reg_out, &cls_out], 1)?);
    }
    Ok(feats)
}
