//! Boundary stand-ins for the unpatched validation steps.
//!
//! The real downstream steps (confidence filtering, overlap suppression,
//! metric accumulation) are external collaborators. These stand-ins hold
//! the one contract the patched path must satisfy: the input layout.

use trace_graph_core::bridge::TensorValue;
use trace_graph_core::error::GraphError;
use trace_graph_core::traits::{Task, Validator};
use trace_graph_core::GraphResult;

/// Expects the merged `(b, 4 + nc, N)` detection tensor.
pub struct BaseDetectionValidator {
    expected_channels: usize,
}

impl BaseDetectionValidator {
    pub fn new(expected_channels: usize) -> Self {
        Self { expected_channels }
    }
}

impl Validator for BaseDetectionValidator {
    fn task(&self) -> Task {
        Task::Detect
    }

    fn postprocess(&self, preds: TensorValue) -> GraphResult<TensorValue> {
        let tensor = preds.as_tensor()?;
        let (_, channels, _) = tensor.dims3()?;
        if channels != self.expected_channels {
            return Err(GraphError::ShapeMismatch {
                context: "detection validator input".to_string(),
                expected: vec![self.expected_channels],
                actual: vec![channels],
            });
        }
        Ok(preds)
    }
}

/// Expects `(merged-with-mask-coeffs, (class_scores, mask_coeffs, protos))`.
pub struct BaseSegmentationValidator {
    min_channels: usize,
}

impl BaseSegmentationValidator {
    pub fn new(min_channels: usize) -> Self {
        Self { min_channels }
    }
}

impl Validator for BaseSegmentationValidator {
    fn task(&self) -> Task {
        Task::Segment
    }

    fn postprocess(&self, preds: TensorValue) -> GraphResult<TensorValue> {
        let TensorValue::Tuple(parts) = &preds else {
            return Err(GraphError::Routing {
                context: "segmentation validator input".to_string(),
                message: "expected a (merged, extras) pair".to_string(),
            });
        };
        let [merged, TensorValue::Tuple(extras)] = parts.as_slice() else {
            return Err(GraphError::Routing {
                context: "segmentation validator input".to_string(),
                message: "expected a (merged, extras) pair".to_string(),
            });
        };
        let (_, channels, _) = merged.as_tensor()?.dims3()?;
        if channels < self.min_channels {
            return Err(GraphError::ShapeMismatch {
                context: "segmentation validator input".to_string(),
                expected: vec![self.min_channels],
                actual: vec![channels],
            });
        }
        if extras.len() != 3 {
            return Err(GraphError::Routing {
                context: "segmentation validator input".to_string(),
                message: format!("expected 3 extra tensors, got {}", extras.len()),
            });
        }
        Ok(preds)
    }
}
