//! Box decoding arithmetic.

use candle_core::Tensor;

use trace_graph_core::error::GraphError;
use trace_graph_core::GraphResult;

/// Decode per-side distances into boxes around anchor points.
///
/// `distance` holds (left, top, right, bottom) stacked on `dim`;
/// `anchor_points` broadcasts against it. With `xywh` the result is
/// center/size, otherwise corner coordinates.
pub fn dist2bbox(
    distance: &Tensor,
    anchor_points: &Tensor,
    xywh: bool,
    dim: usize,
) -> GraphResult<Tensor> {
    let parts = distance.chunk(2, dim)?;
    let (lt, rb) = (&parts[0], &parts[1]);
    let x1y1 = anchor_points.broadcast_sub(lt)?;
    let x2y2 = anchor_points.broadcast_add(rb)?;
    if xywh {
        let c_xy = (((&x1y1 + &x2y2)?) * 0.5)?;
        let wh = (&x2y2 - &x1y1)?;
        Ok(Tensor::cat(&[&c_xy, &wh], dim)?)
    } else {
        Ok(Tensor::cat(&[&x1y1, &x2y2], dim)?)
    }
}

/// Split a tensor into consecutive channel groups of the given sizes.
pub fn split_channels(tensor: &Tensor, sizes: &[usize], dim: usize) -> GraphResult<Vec<Tensor>> {
    let dim_len = tensor.dim(dim)?;
    let total: usize = sizes.iter().sum();
    if total != dim_len {
        return Err(GraphError::ShapeMismatch {
            context: "channel split".to_string(),
            expected: sizes.to_vec(),
            actual: vec![dim_len],
        });
    }
    let mut parts = Vec::with_capacity(sizes.len());
    let mut start = 0;
    for &len in sizes {
        parts.push(tensor.narrow(dim, start, len)?);
        start += len;
    }
    Ok(parts)
}
