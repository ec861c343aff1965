//! Recursive host/device conversion and model placement.

use candle_core::{DType, Tensor};

use crate::device::working_device;
use crate::error::{GraphError, GraphResult};
use crate::graph::{ModuleGraph, RunMode};

use super::{HostArray, HostValue, TensorValue};

/// Convert a host value to tensors on the working device.
///
/// Arrays become f32 tensors; lists and tuples convert element-wise,
/// preserving the nesting structure.
pub fn to_device_value(value: &HostValue) -> GraphResult<TensorValue> {
    match value {
        HostValue::Array(a) => {
            let tensor = Tensor::from_vec(a.data().to_vec(), a.shape(), working_device())?;
            Ok(TensorValue::Tensor(tensor))
        }
        HostValue::List(vs) => Ok(TensorValue::List(
            vs.iter().map(to_device_value).collect::<GraphResult<_>>()?,
        )),
        HostValue::Tuple(vs) => Ok(TensorValue::Tuple(
            vs.iter().map(to_device_value).collect::<GraphResult<_>>()?,
        )),
    }
}

/// Convert a device value back to host arrays.
///
/// F32 round-trips exactly; F64/F16/BF16 downcast to f32. Integer and
/// quantized dtypes are not host-array representable and raise
/// [`GraphError::UnsupportedConversion`] naming the dtype.
pub fn to_host_value(value: &TensorValue) -> GraphResult<HostValue> {
    match value {
        TensorValue::Tensor(t) => Ok(HostValue::Array(tensor_to_host(t)?)),
        TensorValue::List(vs) => Ok(HostValue::List(
            vs.iter().map(to_host_value).collect::<GraphResult<_>>()?,
        )),
        TensorValue::Tuple(vs) => Ok(HostValue::Tuple(
            vs.iter().map(to_host_value).collect::<GraphResult<_>>()?,
        )),
    }
}

fn tensor_to_host(tensor: &Tensor) -> GraphResult<HostArray> {
    let tensor = match tensor.dtype() {
        DType::F32 => tensor.clone(),
        DType::F64 | DType::F16 | DType::BF16 => tensor.to_dtype(DType::F32)?,
        other => {
            return Err(GraphError::UnsupportedConversion {
                type_name: format!("{other:?}"),
            })
        }
    };
    let shape = tensor.dims().to_vec();
    let data = tensor.flatten_all()?.to_vec1::<f32>()?;
    HostArray::new(data, shape)
}

/// Put a graph in train or eval mode and place it on the working device.
pub fn set_model(graph: &mut ModuleGraph, train_mode: bool) -> GraphResult<()> {
    graph.set_mode(if train_mode {
        RunMode::Train
    } else {
        RunMode::Export
    });
    graph.relocate(working_device())
}
