//! Host-side value representations.

use candle_core::Tensor;

use crate::error::{GraphError, GraphResult};

/// A host numeric array: flat f32 data plus a shape.
#[derive(Debug, Clone, PartialEq)]
pub struct HostArray {
    data: Vec<f32>,
    shape: Vec<usize>,
}

impl HostArray {
    /// Build an array, validating that the data fills the shape exactly.
    pub fn new(data: Vec<f32>, shape: Vec<usize>) -> GraphResult<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(GraphError::ShapeMismatch {
                context: "host array".to_string(),
                expected: shape,
                actual: vec![data.len()],
            });
        }
        Ok(Self { data, shape })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn into_parts(self) -> (Vec<f32>, Vec<usize>) {
        (self.data, self.shape)
    }
}

/// A host value: an array or a nested sequence of host values.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Array(HostArray),
    List(Vec<HostValue>),
    Tuple(Vec<HostValue>),
}

/// A device value: a tensor or a nested sequence of device values.
///
/// Mirrors [`HostValue`] shape-for-shape so conversions are structural.
#[derive(Debug, Clone)]
pub enum TensorValue {
    Tensor(Tensor),
    List(Vec<TensorValue>),
    Tuple(Vec<TensorValue>),
}

impl TensorValue {
    /// The single tensor, or a routing error for nested values.
    pub fn as_tensor(&self) -> GraphResult<&Tensor> {
        match self {
            TensorValue::Tensor(t) => Ok(t),
            other => Err(GraphError::Routing {
                context: "tensor value".to_string(),
                message: format!("expected a bare tensor, got {}", other.kind()),
            }),
        }
    }

    /// Flatten one nesting level into tensors, in order.
    pub fn as_tensor_list(&self) -> GraphResult<Vec<Tensor>> {
        match self {
            TensorValue::Tensor(t) => Ok(vec![t.clone()]),
            TensorValue::List(vs) | TensorValue::Tuple(vs) => {
                vs.iter().map(|v| v.as_tensor().cloned()).collect()
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TensorValue::Tensor(_) => "tensor",
            TensorValue::List(_) => "list",
            TensorValue::Tuple(_) => "tuple",
        }
    }
}

impl From<Tensor> for TensorValue {
    fn from(t: Tensor) -> Self {
        TensorValue::Tensor(t)
    }
}
