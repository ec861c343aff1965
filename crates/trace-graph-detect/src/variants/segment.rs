//! Traceable segmentation head.

use std::any::Any;

use candle_core::{Device, Tensor};

use trace_graph_core::graph::{Block, BlockOutput};
use trace_graph_core::GraphResult;

use crate::blocks::{mask_coefficients, HeadBranch, Proto, SegmentHead};
use crate::replacers::SegmentConfig;

use super::{SplitLayout, TraceableDetect};

/// Segmentation head that emits the four-tensor bundle
/// `[box_preimage, class_scores, mask_coeffs, protos]` instead of the
/// merged output.
///
/// The mask-coefficient concat runs in the detection head's scale order,
/// so the channels stay aligned with the detection split when the merged
/// tensor is reassembled downstream.
#[derive(Clone)]
pub struct TraceableSegment {
    detect: TraceableDetect,
    proto: Proto,
    cv4: Vec<HeadBranch>,
    nm: usize,
}

impl TraceableSegment {
    /// Build from a config record, adopting the donor's parameters.
    pub fn from_config(
        config: &SegmentConfig,
        donor: &SegmentHead,
        layout: SplitLayout,
    ) -> GraphResult<Self> {
        let detect = TraceableDetect::from_config(&config.detect, donor.detect(), layout)?;
        Ok(Self {
            detect,
            proto: donor.proto().clone(),
            cv4: donor.mask_branches().to_vec(),
            nm: config.nm,
        })
    }

    pub fn nm(&self) -> usize {
        self.nm
    }

    pub fn detect(&self) -> &TraceableDetect {
        &self.detect
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

impl Block for TraceableSegment {
    fn type_tag(&self) -> &'static str {
        "TraceableSegment"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let protos = self.proto.forward_t(&xs[0], false)?;
        let coeffs = mask_coefficients(&self.cv4, self.nm, xs, false)?;
        let (boxes_pre, class_scores) = self.detect.bundle(xs)?;
        Ok(BlockOutput::Many(vec![
            boxes_pre,
            class_scores,
            coeffs,
            protos,
        ]))
    }

    fn forward_train(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let protos = self.proto.forward_t(&xs[0], true)?;
        let coeffs = mask_coefficients(&self.cv4, self.nm, xs, true)?;
        let mut outputs = self.detect.scale_features(xs, true)?;
        outputs.push(coeffs);
        outputs.push(protos);
        Ok(BlockOutput::Many(outputs))
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        TraceableSegment::named_parameters(self)
    }

    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        TraceableSegment::relocate(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::model::ModelDescriptor;
    use crate::postprocess::reconstruct_segmentation;
    use crate::replacers::SegmentReplacer;
    use crate::test_util::{max_abs_diff, TOL};
    use trace_graph_core::ModuleReplacer;

    use super::*;

    #[test]
    fn test_reconstruction_matches_original_inference() {
        let device = Device::Cpu;
        let original = SegmentHead::init(2, 4, 16, &[32, 64], &[8, 16], &device).unwrap();
        let config = SegmentReplacer::default().extract_config(&original).unwrap();
        let variant =
            TraceableSegment::from_config(&config, &original, SplitLayout::Grouped).unwrap();

        let xs = vec![
            Tensor::randn(0f32, 1.0, (1, 32, 8, 8), &device).unwrap(),
            Tensor::randn(0f32, 1.0, (1, 64, 4, 4), &device).unwrap(),
        ];

        let original_out = match original.forward_t(&xs, false).unwrap() {
            BlockOutput::Many(outputs) => outputs,
            other => panic!("unexpected output: {other:?}"),
        };

        let bundle = match variant.forward(&xs).unwrap() {
            BlockOutput::Many(outputs) => outputs,
            other => panic!("unexpected output: {other:?}"),
        };
        assert_eq!(bundle.len(), 4);

        let descriptor =
            ModelDescriptor::new(vec![8, 16], 2, vec!["a".into(), "b".into()], 64);
        let (full, (_cls, _mc, protos)) =
            reconstruct_segmentation(&bundle, &descriptor).unwrap();

        assert!(max_abs_diff(&original_out[0], &full) < TOL);
        assert!(max_abs_diff(&original_out[1], &protos) < TOL);
    }

    #[test]
    fn test_training_output_matches_original_arity() {
        let device = Device::Cpu;
        let original = SegmentHead::init(2, 4, 16, &[32, 64], &[8, 16], &device).unwrap();
        let config = SegmentReplacer::default().extract_config(&original).unwrap();
        let variant =
            TraceableSegment::from_config(&config, &original, SplitLayout::Grouped).unwrap();

        let xs = vec![
            Tensor::randn(0f32, 1.0, (1, 32, 8, 8), &device).unwrap(),
            Tensor::randn(0f32, 1.0, (1, 64, 4, 4), &device).unwrap(),
        ];
        let a = match original.forward_t(&xs, true).unwrap() {
            BlockOutput::Many(outputs) => outputs,
            other => panic!("unexpected output: {other:?}"),
        };
        let b = match variant.forward_train(&xs).unwrap() {
            BlockOutput::Many(outputs) => outputs,
            other => panic!("unexpected output: {other:?}"),
        };
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!(max_abs_diff(x, y) < TOL);
        }
    }
}
