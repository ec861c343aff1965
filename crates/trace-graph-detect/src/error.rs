//! Error type for model assembly and validation entry points.

use thiserror::Error;
use trace_graph_core::GraphError;

/// Failures specific to detection-model assembly and validation.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Propagated graph-surgery or execution failure.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Propagated tensor-backend failure.
    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    /// A model spec could not be materialized.
    #[error("model build failed: {message}")]
    ModelBuild { message: String },
}

/// Result type alias for detection-model operations.
pub type DetectResult<T> = Result<T, DetectError>;
