//! Core error type for graph preparation.

use thiserror::Error;

/// Error type for all graph-surgery failures.
///
/// # Error Categories
///
/// | Category | Variants | Behavior |
/// |----------|----------|----------|
/// | Conversion | UnsupportedConversion | surfaced immediately, names the type |
/// | Replacement | ConfigExtraction | aborts the whole `replace` call |
/// | Execution | MissingSource, Routing | graph wiring does not match metadata |
/// | Validation | ShapeMismatch, Config | invalid structure or arguments |
/// | Framework | Tensor | propagated tensor-backend failures |
///
/// # Design Principles
///
/// All operations here are pure and deterministic, so every error is
/// unrecoverable locally: there is no retry path, and errors propagate to
/// the caller unmodified. A failed replacement aborts model preparation
/// before any export work begins rather than leaving a partially-converted
/// tree in use.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The tensor bridge was asked to convert a value it does not support.
    #[error("unsupported conversion: {type_name} is not convertible")]
    UnsupportedConversion { type_name: String },

    /// A submodule's internal structure did not match the shape its config
    /// extractor assumes.
    #[error("config extraction failed for {module_type} at node {node_index}: {reason}")]
    ConfigExtraction {
        module_type: String,
        node_index: usize,
        reason: String,
    },

    /// A node's sources reference an output that was never produced or saved.
    #[error("node {node_index} references missing output: {source_ref}")]
    MissingSource { node_index: usize, source_ref: String },

    /// Graph wiring is inconsistent with what a block expects.
    #[error("routing error in {context}: {message}")]
    Routing { context: String, message: String },

    /// A tensor's shape does not match the structural contract.
    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Invalid configuration or arguments.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Propagated tensor-backend failure.
    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl GraphError {
    /// Build a [`GraphError::ConfigExtraction`] for module type `T`.
    ///
    /// The node index is filled in by the replacement engine once the
    /// failing node's position is known; extractors only know the type.
    pub fn config_extraction<T>(reason: impl Into<String>) -> Self {
        let module_type = short_type_name::<T>().to_string();
        GraphError::ConfigExtraction {
            module_type,
            node_index: 0,
            reason: reason.into(),
        }
    }

    /// Attach a node position to a [`GraphError::ConfigExtraction`].
    pub fn at_node(self, node_index: usize) -> Self {
        match self {
            GraphError::ConfigExtraction {
                module_type,
                reason,
                ..
            } => GraphError::ConfigExtraction {
                module_type,
                node_index,
                reason,
            },
            other => other,
        }
    }
}

/// Last path segment of a type name, for diagnostics.
pub fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Result type alias for graph-surgery operations.
pub type GraphResult<T> = Result<T, GraphError>;
