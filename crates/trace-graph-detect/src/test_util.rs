//! Shared helpers for numerical tests.

use candle_core::Tensor;

/// Largest elementwise absolute difference between two same-shaped tensors.
pub(crate) fn max_abs_diff(a: &Tensor, b: &Tensor) -> f32 {
    assert_eq!(a.dims(), b.dims(), "shape mismatch in comparison");
    let av = a.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    let bv = b.flatten_all().unwrap().to_vec1::<f32>().unwrap();
    av.iter()
        .zip(&bv)
        .map(|(x, y)| (x - y).abs())
        .fold(0f32, f32::max)
}

/// Tolerance for "numerically identical" checks on adopted-weight paths.
pub(crate) const TOL: f32 = 1e-4;
