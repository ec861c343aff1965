//! Segmentation head: detection plus mask coefficients and prototypes.

use std::any::Any;

use candle_core::{Device, Tensor};

use trace_graph_core::graph::{Block, BlockOutput};
use trace_graph_core::GraphResult;

use super::{DetectHead, HeadBranch, Proto};

/// Concatenate per-scale mask-coefficient predictions to `(b, nm, N)`.
///
/// The per-scale concat order must stay aligned with the detection head's
/// scale order so the merged channels line up anchor-for-anchor.
pub fn mask_coefficients(
    cv4: &[HeadBranch],
    nm: usize,
    xs: &[Tensor],
    train: bool,
) -> GraphResult<Tensor> {
    let b = xs[0].dims4()?.0;
    let mut views = Vec::with_capacity(cv4.len());
    for (branch, x) in cv4.iter().zip(xs) {
        views.push(branch.forward_t(x, train)?.reshape((b, nm, ()))?);
    }
    Ok(Tensor::cat(&views, 2)?)
}

/// Segmentation head composed of a detection head, a prototype head and
/// per-scale mask-coefficient branches.
///
/// Inference returns `(merged-with-mask-coeffs, protos)`; the merged
/// tensor goes through the same dynamic tail as detection.
#[derive(Clone)]
pub struct SegmentHead {
    detect: DetectHead,
    proto: Proto,
    cv4: Vec<HeadBranch>,
    nm: usize,
}

impl SegmentHead {
    pub fn init(
        nc: usize,
        nm: usize,
        npr: usize,
        ch: &[usize],
        strides: &[usize],
        device: &Device,
    ) -> GraphResult<Self> {
        // The inner head validates the scale layout first.
        let detect = DetectHead::init(nc, ch, strides, device)?;
        let c4 = (ch[0] / 4).max(nm);
        let cv4 = ch
            .iter()
            .map(|&c| HeadBranch::init(c, c4, nm, device))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Self {
            detect,
            proto: Proto::init(ch[0], npr, nm, device)?,
            cv4,
            nm,
        })
    }

    pub fn detect(&self) -> &DetectHead {
        &self.detect
    }

    pub fn proto(&self) -> &Proto {
        &self.proto
    }

    pub fn mask_branches(&self) -> &[HeadBranch] {
        &self.cv4
    }

    pub fn nm(&self) -> usize {
        self.nm
    }

    pub fn forward_t(&self, xs: &[Tensor], train: bool) -> GraphResult<BlockOutput> {
        let protos = self.proto.forward_t(&xs[0], train)?;
        let coeffs = mask_coefficients(&self.cv4, self.nm, xs, train)?;
        if train {
            let mut outputs = self.detect.scale_features(xs, true)?;
            outputs.push(coeffs);
            outputs.push(protos);
            return Ok(BlockOutput::Many(outputs));
        }
        let merged = self.detect.predict(xs)?;
        let with_coeffs = Tensor::cat(&[&merged, &coeffs], 1)?;
        Ok(BlockOutput::Many(vec![with_coeffs, protos]))
    }

    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (name, t) in self.detect.named_parameters() {
            params.push((format!("detect.{name}"), t));
        }
        for (name, t) in self.proto.named_parameters() {
            params.push((format!("proto.{name}"), t));
        }
        for (i, branch) in self.cv4.iter().enumerate() {
            for (name, t) in branch.named_parameters() {
                params.push((format!("cv4.{i}.{name}"), t));
            }
        }
        params
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        self.detect.relocate(device)?;
        self.proto.relocate(device)?;
        for branch in &mut self.cv4 {
            branch.relocate(device)?;
        }
        Ok(())
    }
}

impl Block for SegmentHead {
    fn type_tag(&self) -> &'static str {
        "Segment"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        self.forward_t(xs, false)
    }

    fn forward_train(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        self.forward_t(xs, true)
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        SegmentHead::named_parameters(self)
    }

    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        SegmentHead::relocate(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_outputs() {
        let device = Device::Cpu;
        let head = SegmentHead::init(2, 4, 16, &[32, 64], &[8, 16], &device).unwrap();
        let xs = vec![
            Tensor::randn(0f32, 1.0, (1, 32, 8, 8), &device).unwrap(),
            Tensor::randn(0f32, 1.0, (1, 64, 4, 4), &device).unwrap(),
        ];
        match head.forward_t(&xs, false).unwrap() {
            BlockOutput::Many(outputs) => {
                assert_eq!(outputs.len(), 2);
                // 4 box + 2 classes + 4 mask coefficients.
                assert_eq!(outputs[0].dims(), &[1, 10, 8 * 8 + 4 * 4]);
                // Protos upsample the stride-8 scale by 2.
                assert_eq!(outputs[1].dims(), &[1, 4, 16, 16]);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn test_training_outputs_flattened() {
        let device = Device::Cpu;
        let head = SegmentHead::init(2, 4, 16, &[32, 64], &[8, 16], &device).unwrap();
        let xs = vec![
            Tensor::randn(0f32, 1.0, (1, 32, 8, 8), &device).unwrap(),
            Tensor::randn(0f32, 1.0, (1, 64, 4, 4), &device).unwrap(),
        ];
        match head.forward_t(&xs, true).unwrap() {
            BlockOutput::Many(outputs) => {
                // Two per-scale maps, then coefficients and protos.
                assert_eq!(outputs.len(), 4);
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }
}
