//! Validation entry point.

use std::sync::Arc;

use candle_core::Tensor;

use trace_graph_core::bridge::TensorValue;
use trace_graph_core::config::{checked_image_size, ValArgs, ValOverrides};
use trace_graph_core::graph::BlockOutput;
use trace_graph_core::registry;

use crate::error::DetectResult;
use crate::model::DetectionModel;

use super::register_patched_validators;

/// Outcome of a validation run.
pub struct ValReport {
    /// The fully resolved arguments the run used.
    pub args: ValArgs,
    /// Post-processed output per input batch.
    pub outputs: Vec<TensorValue>,
}

/// Validate a prepared model over the given batches.
///
/// Argument precedence: explicit `overrides` > the model's stored training
/// arguments > defaults. The image size snaps to the model's stride grid.
/// The validator comes from the task routing table, so the patched
/// implementations apply without any call-site changes.
///
/// The model must already be prepared (see [`crate::prepare_for_export`])
/// so its head emits the intermediate bundle the patched validators
/// expect.
pub fn val(
    model: &DetectionModel,
    batches: &[Tensor],
    overrides: &ValOverrides,
) -> DetectResult<ValReport> {
    register_patched_validators();

    let mut args = ValArgs::resolve(Some(model.stored_args()), overrides);
    args.image_size = checked_image_size(args.image_size, model.max_stride());

    let descriptor = Arc::new(model.descriptor(args.image_size));
    let validator = registry::validator_for(args.task, args.clone(), descriptor)?;

    let mut outputs = Vec::with_capacity(batches.len());
    for batch in batches {
        let preds = match model.forward(batch)? {
            BlockOutput::One(t) => TensorValue::Tensor(t),
            BlockOutput::Many(ts) => {
                TensorValue::Tuple(ts.into_iter().map(TensorValue::Tensor).collect())
            }
        };
        outputs.push(validator.postprocess(preds)?);
    }
    tracing::info!(
        batches = outputs.len(),
        task = %args.task,
        image_size = args.image_size,
        "validation complete"
    );
    Ok(ValReport { args, outputs })
}

#[cfg(test)]
mod tests {
    use candle_core::Device;

    use trace_graph_core::traits::Task;

    use crate::model::ModelSpec;
    use crate::prepare::prepare_for_export;

    use super::*;

    #[test]
    fn test_val_reconstructs_the_merged_layout() {
        let device = Device::Cpu;
        let mut model = DetectionModel::from_spec(ModelSpec::tiny_detect(2), &device).unwrap();
        prepare_for_export(&mut model).unwrap();

        let batch = Tensor::randn(0f32, 1.0, (1, 3, 64, 64), &device).unwrap();
        let report = val(&model, &[batch], &ValOverrides::default()).unwrap();

        assert_eq!(report.args.image_size, 64);
        assert_eq!(report.outputs.len(), 1);
        let merged = report.outputs[0].as_tensor().unwrap();
        assert_eq!(merged.dims(), &[1, 6, 8 * 8 + 4 * 4]);
    }

    #[test]
    fn test_val_resolves_override_precedence() {
        let device = Device::Cpu;
        let mut model = DetectionModel::from_spec(ModelSpec::tiny_detect(2), &device).unwrap();
        prepare_for_export(&mut model).unwrap();

        // 60 snaps up to the stride grid; the stored 64 is overridden.
        let batch = Tensor::randn(0f32, 1.0, (1, 3, 64, 64), &device).unwrap();
        let overrides = ValOverrides::default().with_image_size(60);
        let report = val(&model, &[batch], &overrides).unwrap();
        assert_eq!(report.args.image_size, 64);
    }

    #[test]
    fn test_val_segmentation_layout() {
        let device = Device::Cpu;
        let mut model =
            DetectionModel::from_spec(ModelSpec::tiny_segment(2, 4, 16), &device).unwrap();
        prepare_for_export(&mut model).unwrap();

        let batch = Tensor::randn(0f32, 1.0, (1, 3, 64, 64), &device).unwrap();
        let report = val(&model, &[batch], &ValOverrides::default()).unwrap();
        assert_eq!(report.args.task, Task::Segment);

        let TensorValue::Tuple(parts) = &report.outputs[0] else {
            panic!("expected a (merged, extras) pair");
        };
        let merged = parts[0].as_tensor().unwrap();
        // 4 box + 2 classes + 4 mask coefficients.
        assert_eq!(merged.dims(), &[1, 10, 8 * 8 + 4 * 4]);
    }
}
