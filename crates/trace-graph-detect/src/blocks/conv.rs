//! Convolution + batch-norm + SiLU, the basic unit every block composes.

use std::any::Any;

use candle_core::{Device, Module, ModuleT, Tensor};
use candle_nn::{BatchNorm, Conv2d, Conv2dConfig};

use trace_graph_core::graph::{expect_single, Block, BlockOutput};
use trace_graph_core::GraphResult;

/// Batch-norm epsilon used across the model family.
pub(crate) const BN_EPS: f64 = 1e-3;

/// 2d convolution (bias-free), batch normalization, SiLU.
#[derive(Clone)]
pub struct ConvNorm {
    conv: Conv2d,
    bn: BatchNorm,
    in_channels: usize,
    out_channels: usize,
}

impl ConvNorm {
    /// Assemble from explicit tensors.
    ///
    /// Channel counts are derived from the weight's shape, not passed in:
    /// `weight` is `(c_out, c_in / groups, k, k)`.
    pub fn new(
        weight: Tensor,
        bn_weight: Tensor,
        bn_bias: Tensor,
        running_mean: Tensor,
        running_var: Tensor,
        stride: usize,
        padding: usize,
        groups: usize,
    ) -> GraphResult<Self> {
        let (out_channels, per_group, _, _) = weight.dims4()?;
        let in_channels = per_group * groups;
        let conv = Conv2d::new(
            weight,
            None,
            Conv2dConfig {
                padding,
                stride,
                groups,
                ..Default::default()
            },
        );
        let bn = BatchNorm::new(
            out_channels,
            running_mean,
            running_var,
            bn_weight,
            bn_bias,
            BN_EPS,
        )?;
        Ok(Self {
            conv,
            bn,
            in_channels,
            out_channels,
        })
    }

    /// Fresh random initialization (square kernel, autopad `k / 2`).
    pub fn init(
        c1: usize,
        c2: usize,
        k: usize,
        stride: usize,
        groups: usize,
        device: &Device,
    ) -> GraphResult<Self> {
        let weight = Tensor::randn(0f32, 0.05, (c2, c1 / groups, k, k), device)?;
        let bn_weight = Tensor::rand(0.8f32, 1.2, (c2,), device)?;
        let bn_bias = Tensor::randn(0f32, 0.05, (c2,), device)?;
        let running_mean = Tensor::randn(0f32, 0.1, (c2,), device)?;
        // Running variance must stay positive.
        let running_var = Tensor::rand(0.5f32, 1.5, (c2,), device)?;
        Self::new(
            weight,
            bn_weight,
            bn_bias,
            running_mean,
            running_var,
            stride,
            k / 2,
            groups,
        )
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn groups(&self) -> usize {
        self.conv.config().groups
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> GraphResult<Tensor> {
        let xs = self.conv.forward(xs)?;
        let xs = self.bn.forward_t(&xs, train)?;
        Ok(xs.silu()?)
    }

    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = vec![("conv.weight".to_string(), self.conv.weight().clone())];
        if let Some((w, b)) = self.bn.weight_and_bias() {
            params.push(("bn.weight".to_string(), w.clone()));
            params.push(("bn.bias".to_string(), b.clone()));
        }
        params.push(("bn.running_mean".to_string(), self.bn.running_mean().clone()));
        params.push(("bn.running_var".to_string(), self.bn.running_var().clone()));
        params
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        let config = *self.conv.config();
        self.conv = Conv2d::new(self.conv.weight().to_device(device)?, None, config);
        let (w, b) = match self.bn.weight_and_bias() {
            Some((w, b)) => (w.to_device(device)?, b.to_device(device)?),
            None => unreachable!("ConvNorm always constructs an affine batch norm"),
        };
        self.bn = BatchNorm::new(
            self.out_channels,
            self.bn.running_mean().to_device(device)?,
            self.bn.running_var().to_device(device)?,
            w,
            b,
            BN_EPS,
        )?;
        Ok(())
    }
}

impl Block for ConvNorm {
    fn type_tag(&self) -> &'static str {
        "Conv"
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
        ConvNorm::named_parameters(self)
    }

    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        ConvNorm::relocate(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_and_introspection() {
        let device = Device::Cpu;
        let conv = ConvNorm::init(8, 16, 3, 2, 1, &device).unwrap();
        assert_eq!(conv.in_channels(), 8);
        assert_eq!(conv.out_channels(), 16);
        assert_eq!(conv.groups(), 1);

        let x = Tensor::randn(0f32, 1.0, (1, 8, 16, 16), &device).unwrap();
        let y = conv.forward_t(&x, false).unwrap();
        assert_eq!(y.dims(), &[1, 16, 8, 8]);
    }

    #[test]
    fn test_grouped_conv_channels() {
        let device = Device::Cpu;
        let conv = ConvNorm::init(8, 8, 3, 1, 2, &device).unwrap();
        assert_eq!(conv.in_channels(), 8);
        assert_eq!(conv.groups(), 2);
    }

    #[test]
    fn test_eval_forward_is_deterministic() {
        let device = Device::Cpu;
        let conv = ConvNorm::init(4, 4, 1, 1, 1, &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 4, 4, 4), &device).unwrap();
        let a = conv
            .forward_t(&x, false)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        let b = conv
            .forward_t(&x, false)
            .unwrap()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_relocate_keeps_values() {
        let device = Device::Cpu;
        let mut conv = ConvNorm::init(4, 4, 1, 1, 1, &device).unwrap();
        let before: Vec<_> = conv
            .named_parameters()
            .iter()
            .map(|(_, t)| t.flatten_all().unwrap().to_vec1::<f32>().unwrap())
            .collect();
        conv.relocate(&device).unwrap();
        let after: Vec<_> = conv
            .named_parameters()
            .iter()
            .map(|(_, t)| t.flatten_all().unwrap().to_vec1::<f32>().unwrap())
            .collect();
        assert_eq!(before, after);
    }
}
