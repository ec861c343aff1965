//! Validators that accept the intermediate output bundle.

use std::sync::Arc;

use trace_graph_core::bridge::TensorValue;
use trace_graph_core::traits::{ModelInfo, Task, Validator};
use trace_graph_core::GraphResult;

use crate::postprocess::{reconstruct_detection, reconstruct_segmentation};

/// Detection validator over the intermediate bundle.
///
/// Reconstructs the merged tensor the base step expects, then delegates.
pub struct PatchedDetectionValidator {
    base: Box<dyn Validator>,
    model: Arc<dyn ModelInfo>,
}

impl PatchedDetectionValidator {
    pub fn new(base: Box<dyn Validator>, model: Arc<dyn ModelInfo>) -> Self {
        Self { base, model }
    }
}

impl Validator for PatchedDetectionValidator {
    fn task(&self) -> Task {
        Task::Detect
    }

    fn postprocess(&self, preds: TensorValue) -> GraphResult<TensorValue> {
        let bundle = preds.as_tensor_list()?;
        let merged = reconstruct_detection(&bundle, self.model.as_ref())?;
        self.base.postprocess(TensorValue::Tensor(merged))
    }
}

/// Segmentation validator over the four-tensor bundle.
pub struct PatchedSegmentationValidator {
    base: Box<dyn Validator>,
    model: Arc<dyn ModelInfo>,
}

impl PatchedSegmentationValidator {
    pub fn new(base: Box<dyn Validator>, model: Arc<dyn ModelInfo>) -> Self {
        Self { base, model }
    }
}

impl Validator for PatchedSegmentationValidator {
    fn task(&self) -> Task {
        Task::Segment
    }

    fn postprocess(&self, preds: TensorValue) -> GraphResult<TensorValue> {
        let bundle = preds.as_tensor_list()?;
        let (full, (class_scores, mask_coeffs, protos)) =
            reconstruct_segmentation(&bundle, self.model.as_ref())?;
        self.base.postprocess(TensorValue::Tuple(vec![
            TensorValue::Tensor(full),
            TensorValue::Tuple(vec![
                TensorValue::Tensor(class_scores),
                TensorValue::Tensor(mask_coeffs),
                TensorValue::Tensor(protos),
            ]),
        ]))
    }
}
