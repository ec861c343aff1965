//! Reassembly of the original head outputs from the intermediate bundle.

use candle_core::Tensor;

use trace_graph_core::error::GraphError;
use trace_graph_core::traits::ModelInfo;
use trace_graph_core::GraphResult;

use super::{anchor_grid, dist2bbox};

/// Rebuild the merged detection tensor from the intermediate bundle.
///
/// `bundle` is `[box_preimage (b, 4, N), class_scores (b, nc, N)]`. The
/// anchor grid comes from the static descriptor, the decode arithmetic is
/// the original center-offset form scaled by stride, and the channel order
/// of the result matches the original merged tensor, so downstream
/// consumers see no difference.
pub fn reconstruct_detection(bundle: &[Tensor], model: &dyn ModelInfo) -> GraphResult<Tensor> {
    let [boxes_pre, class_scores] = bundle else {
        return Err(GraphError::Routing {
            context: "detection reconstruction".to_string(),
            message: format!("expected a bundle of 2 tensors, got {}", bundle.len()),
        });
    };
    let (anchors, strides) = anchor_grid(model.strides(), model.image_size(), boxes_pre.device())?;
    let decoded = dist2bbox(boxes_pre, &anchors.unsqueeze(0)?, true, 1)?;
    let decoded = decoded.broadcast_mul(&strides)?;
    Ok(Tensor::cat(&[&decoded, class_scores], 1)?)
}

/// Rebuild the segmentation outputs from the intermediate bundle.
///
/// `bundle` is `[box_preimage, class_scores, mask_coeffs (b, nm, N),
/// protos]`. Returns the merged tensor with mask coefficients appended,
/// in the exact layout the unpatched validation path consumes, plus the
/// `(class_scores, mask_coeffs, protos)` triple it also expects.
pub fn reconstruct_segmentation(
    bundle: &[Tensor],
    model: &dyn ModelInfo,
) -> GraphResult<(Tensor, (Tensor, Tensor, Tensor))> {
    let [boxes_pre, class_scores, mask_coeffs, protos] = bundle else {
        return Err(GraphError::Routing {
            context: "segmentation reconstruction".to_string(),
            message: format!("expected a bundle of 4 tensors, got {}", bundle.len()),
        });
    };
    let merged =
        reconstruct_detection(&[boxes_pre.clone(), class_scores.clone()], model)?;
    let full = Tensor::cat(&[&merged, mask_coeffs], 1)?;
    Ok((
        full,
        (class_scores.clone(), mask_coeffs.clone(), protos.clone()),
    ))
}

#[cfg(test)]
mod tests {
    use candle_core::{DType, Device};

    use crate::model::ModelDescriptor;

    use super::*;

    fn descriptor(strides: Vec<usize>, nc: usize, image_size: usize) -> ModelDescriptor {
        let names = (0..nc).map(|i| format!("class_{i}")).collect();
        ModelDescriptor::new(strides, nc, names, image_size)
    }

    #[test]
    fn test_zero_bundle_decodes_to_scaled_anchor_centers() {
        let device = Device::Cpu;
        let strides = vec![8usize, 16, 32];
        let image_size = 640;
        let n = 80 * 80 + 40 * 40 + 20 * 20;
        let nc = 2;

        let bundle = vec![
            Tensor::zeros((1, 4, n), DType::F32, &device).unwrap(),
            Tensor::zeros((1, nc, n), DType::F32, &device).unwrap(),
        ];
        let model = descriptor(strides.clone(), nc, image_size);
        let merged = reconstruct_detection(&bundle, &model).unwrap();
        assert_eq!(merged.dims(), &[1, 4 + nc, n]);

        let values = merged.to_vec3::<f32>().unwrap();
        let (anchors, stride_row) = anchor_grid(&strides, image_size, &device).unwrap();
        let anchor_values = anchors.to_vec2::<f32>().unwrap();
        let stride_values = stride_row.to_vec2::<f32>().unwrap();
        for i in [0usize, 1, 80, 80 * 80, 80 * 80 + 40 * 40, n - 1] {
            let s = stride_values[0][i];
            assert_eq!(values[0][0][i], anchor_values[0][i] * s, "cx at {i}");
            assert_eq!(values[0][1][i], anchor_values[1][i] * s, "cy at {i}");
            assert_eq!(values[0][2][i], 0.0, "w at {i}");
            assert_eq!(values[0][3][i], 0.0, "h at {i}");
        }
        // Class channels pass through untouched.
        assert_eq!(values[0][4][0], 0.0);
    }

    #[test]
    fn test_wrong_bundle_arity_is_a_routing_error() {
        let device = Device::Cpu;
        let t = Tensor::zeros((1, 4, 4), DType::F32, &device).unwrap();
        let model = descriptor(vec![8], 1, 16);
        let err = reconstruct_detection(&[t], &model).unwrap_err();
        assert!(format!("{err}").contains("bundle of 2"));
    }

    #[test]
    fn test_segmentation_layout() {
        let device = Device::Cpu;
        let strides = vec![8usize, 16];
        let image_size = 64;
        let n = 8 * 8 + 4 * 4;
        let (nc, nm) = (3, 4);
        let bundle = vec![
            Tensor::zeros((1, 4, n), DType::F32, &device).unwrap(),
            Tensor::zeros((1, nc, n), DType::F32, &device).unwrap(),
            Tensor::zeros((1, nm, n), DType::F32, &device).unwrap(),
            Tensor::zeros((1, nm, 16, 16), DType::F32, &device).unwrap(),
        ];
        let model = descriptor(strides, nc, image_size);
        let (full, (cls, mc, protos)) = reconstruct_segmentation(&bundle, &model).unwrap();
        assert_eq!(full.dims(), &[1, 4 + nc + nm, n]);
        assert_eq!(cls.dims(), &[1, nc, n]);
        assert_eq!(mc.dims(), &[1, nm, n]);
        assert_eq!(protos.dims(), &[1, nm, 16, 16]);
    }
}
