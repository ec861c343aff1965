//! Distribution-focal decoding of box side distances.

use candle_core::{Device, Module, Tensor};
use candle_nn::{Conv2d, Conv2dConfig};

use trace_graph_core::GraphResult;

/// Collapses a per-side distance distribution into its expected value.
///
/// The 1x1 convolution carries a fixed `0..reg_max` arange weight. It is a
/// buffer, not a learned parameter, and is identical in every model.
#[derive(Clone)]
pub struct Dfl {
    conv: Conv2d,
    reg_max: usize,
}

impl Dfl {
    pub fn new(reg_max: usize, device: &Device) -> GraphResult<Self> {
        let weight = Tensor::arange(0f32, reg_max as f32, device)?.reshape((1, reg_max, 1, 1))?;
        Ok(Self {
            conv: Conv2d::new(weight, None, Conv2dConfig::default()),
            reg_max,
        })
    }

    pub fn reg_max(&self) -> usize {
        self.reg_max
    }

    /// `(b, 4 * reg_max, a)` distances in, `(b, 4, a)` expected values out.
    pub fn forward(&self, xs: &Tensor) -> GraphResult<Tensor> {
        let (b, _, a) = xs.dims3()?;
        let xs = xs
            .reshape((b, 4, self.reg_max, a))?
            .transpose(1, 2)?
            .contiguous()?;
        let xs = candle_nn::ops::softmax(&xs, 1)?;
        Ok(self.conv.forward(&xs)?.reshape((b, 4, a))?)
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        let config = *self.conv.config();
        self.conv = Conv2d::new(self.conv.weight().to_device(device)?, None, config);
        Ok(())
    }
}
