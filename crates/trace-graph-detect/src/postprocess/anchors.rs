//! Anchor/stride grid construction.

use candle_core::{Device, Tensor};

use trace_graph_core::error::GraphError;
use trace_graph_core::GraphResult;

/// Build anchor points and per-anchor strides for the given feature
/// shapes.
///
/// Anchors are cell centers at `index + offset`, laid out row-major per
/// scale, scales in stride order. Returns `(anchors (2, N), strides (1, N))`,
/// transposed for direct broadcasting against `(b, 4, N)` predictions.
pub fn make_anchors(
    shapes: &[(usize, usize)],
    strides: &[usize],
    offset: f32,
    device: &Device,
) -> GraphResult<(Tensor, Tensor)> {
    if shapes.len() != strides.len() {
        return Err(GraphError::Config {
            message: format!(
                "{} feature shapes for {} strides",
                shapes.len(),
                strides.len()
            ),
        });
    }
    let total: usize = shapes.iter().map(|(h, w)| h * w).sum();
    let mut xs = Vec::with_capacity(total);
    let mut ys = Vec::with_capacity(total);
    let mut per_anchor_stride = Vec::with_capacity(total);
    for (&(h, w), &stride) in shapes.iter().zip(strides) {
        for y in 0..h {
            for x in 0..w {
                xs.push(x as f32 + offset);
                ys.push(y as f32 + offset);
                per_anchor_stride.push(stride as f32);
            }
        }
    }
    let mut points = xs;
    points.extend(ys);
    let anchors = Tensor::from_vec(points, (2, total), device)?;
    let stride_tensor = Tensor::from_vec(per_anchor_stride, (1, total), device)?;
    Ok((anchors, stride_tensor))
}

/// Derive the anchor/stride grid from static configuration alone.
///
/// Feature shapes are `image_size / stride` per scale. No traced tensors
/// are consulted, and the result matches the grid the original head
/// computed from its runtime feature maps.
pub fn anchor_grid(
    strides: &[usize],
    image_size: usize,
    device: &Device,
) -> GraphResult<(Tensor, Tensor)> {
    let shapes = strides
        .iter()
        .map(|&s| {
            if s == 0 || image_size % s != 0 {
                return Err(GraphError::Config {
                    message: format!("image size {image_size} is not divisible by stride {s}"),
                });
            }
            Ok((image_size / s, image_size / s))
        })
        .collect::<GraphResult<Vec<_>>>()?;
    make_anchors(&shapes, strides, 0.5, device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_size_and_first_cells() {
        let device = Device::Cpu;
        let (anchors, strides) = anchor_grid(&[8, 16, 32], 640, &device).unwrap();
        let n = 80 * 80 + 40 * 40 + 20 * 20;
        assert_eq!(anchors.dims(), &[2, n]);
        assert_eq!(strides.dims(), &[1, n]);

        let points = anchors.to_vec2::<f32>().unwrap();
        // First cell of the first scale: (0.5, 0.5).
        assert_eq!(points[0][0], 0.5);
        assert_eq!(points[1][0], 0.5);
        // Second cell moves along x.
        assert_eq!(points[0][1], 1.5);
        assert_eq!(points[1][1], 0.5);
        // First cell of the second scale.
        assert_eq!(points[0][80 * 80], 0.5);

        let stride_row = strides.to_vec2::<f32>().unwrap();
        assert_eq!(stride_row[0][0], 8.0);
        assert_eq!(stride_row[0][80 * 80], 16.0);
        assert_eq!(stride_row[0][n - 1], 32.0);
    }

    #[test]
    fn test_static_grid_matches_runtime_grid() {
        let device = Device::Cpu;
        let from_config = anchor_grid(&[8, 16], 64, &device).unwrap();
        let from_shapes = make_anchors(&[(8, 8), (4, 4)], &[8, 16], 0.5, &device).unwrap();
        assert_eq!(
            from_config.0.to_vec2::<f32>().unwrap(),
            from_shapes.0.to_vec2::<f32>().unwrap()
        );
        assert_eq!(
            from_config.1.to_vec2::<f32>().unwrap(),
            from_shapes.1.to_vec2::<f32>().unwrap()
        );
    }

    #[test]
    fn test_indivisible_image_size_is_rejected() {
        let device = Device::Cpu;
        let err = anchor_grid(&[7], 64, &device).unwrap_err();
        assert!(format!("{err}").contains("not divisible"));
    }
}
