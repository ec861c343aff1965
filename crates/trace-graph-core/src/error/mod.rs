//! Error types for graph surgery and execution.

mod types;


pub use types::{GraphError, GraphResult};
