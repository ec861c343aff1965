//! Fixed-arity variant of the feature-aggregation block.

use std::any::Any;

use candle_core::{Device, Tensor};

use trace_graph_core::error::GraphError;
use trace_graph_core::graph::{expect_single, Block, BlockOutput};
use trace_graph_core::GraphResult;

use crate::blocks::{Bottleneck, ConvNorm, CspBlock};
use crate::replacers::CspConfig;

/// Split-transform-fuse block with the fuse list materialized up front.
///
/// The chunk pair and every bottleneck output land in a list whose length
/// is fixed by the architecture, so the concat arity is known at build
/// time. Arithmetic is identical to [`CspBlock`].
#[derive(Clone)]
pub struct TraceableCsp {
    cv1: ConvNorm,
    cv2: ConvNorm,
    m: Vec<Bottleneck>,
}

impl TraceableCsp {
    /// Build from a config record, adopting the donor's parameters.
    pub fn from_config(config: &CspConfig, donor: &CspBlock) -> GraphResult<Self> {
        if donor.cv1().in_channels() != config.c1
            || donor.cv2().out_channels() != config.c2
            || donor.bottlenecks().len() != config.n
        {
            return Err(GraphError::config_extraction::<CspBlock>(
                "donor structure does not match the extracted config",
            ));
        }
        Ok(Self {
            cv1: donor.cv1().clone(),
            cv2: donor.cv2().clone(),
            m: donor.bottlenecks().to_vec(),
        })
    }

    /// Fresh build from a config record alone.
    pub fn init(config: &CspConfig, device: &Device) -> GraphResult<Self> {
        let donor = CspBlock::init(
            config.c1,
            config.c2,
            config.n,
            config.shortcut,
            config.groups,
            config.expansion,
            device,
        )?;
        Ok(Self {
            cv1: donor.cv1().clone(),
            cv2: donor.cv2().clone(),
            m: donor.bottlenecks().to_vec(),
        })
    }

    pub fn forward_t(&self, xs: &Tensor, train: bool) -> GraphResult<Tensor> {
        let halves = self.cv1.forward_t(xs, train)?.chunk(2, 1)?;
        let mut ys: Vec<Tensor> = Vec::with_capacity(2 + self.m.len());
        ys.push(halves[0].clone());
        ys.push(halves[1].clone());
        let mut last = halves[1].clone();
        for m in &self.m {
            last = m.forward_t(&last, train)?;
            ys.push(last.clone());
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

impl Block for TraceableCsp {
    fn type_tag(&self) -> &'static str {
        "TraceableCsp"
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
        TraceableCsp::named_parameters(self)
    }

    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        TraceableCsp::relocate(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::replacers::CspReplacer;
    use crate::test_util::{max_abs_diff, TOL};
    use trace_graph_core::ModuleReplacer;

    use super::*;

    #[test]
    fn test_matches_original_in_eval_and_train() {
        let device = Device::Cpu;
        let original = CspBlock::init(32, 32, 2, true, 1, 0.5, &device).unwrap();
        let config = CspReplacer::default().extract_config(&original).unwrap();
        let variant = TraceableCsp::from_config(&config, &original).unwrap();

        let x = Tensor::randn(0f32, 1.0, (2, 32, 8, 8), &device).unwrap();
        for train in [false, true] {
            let a = original.forward_t(&x, train).unwrap();
            let b = variant.forward_t(&x, train).unwrap();
            assert!(max_abs_diff(&a, &b) < TOL, "train={train}");
        }
    }

    #[test]
    fn test_adopts_parameters_identically() {
        let device = Device::Cpu;
        let original = CspBlock::init(16, 16, 1, true, 1, 0.5, &device).unwrap();
        let config = CspReplacer::default().extract_config(&original).unwrap();
        let variant = TraceableCsp::from_config(&config, &original).unwrap();

        let a = original.named_parameters();
        let b = TraceableCsp::named_parameters(&variant);
        assert_eq!(a.len(), b.len());
        for ((name_a, t_a), (name_b, t_b)) in a.iter().zip(&b) {
            assert_eq!(name_a, name_b);
            assert_eq!(
                t_a.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
                t_b.flatten_all().unwrap().to_vec1::<f32>().unwrap()
            );
        }
    }

    #[test]
    fn test_mismatched_donor_is_rejected() {
        let device = Device::Cpu;
        let original = CspBlock::init(16, 16, 1, true, 1, 0.5, &device).unwrap();
        let other = CspBlock::init(32, 32, 1, true, 1, 0.5, &device).unwrap();
        let config = CspReplacer::default().extract_config(&original).unwrap();
        assert!(TraceableCsp::from_config(&config, &other).is_err());
    }
}
