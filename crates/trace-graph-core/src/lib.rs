//! Core mechanism for preparing module graphs for static-graph export.
//!
//! This crate holds everything that is independent of a concrete model
//! family:
//!
//! - Domain types (`ModuleGraph`, `GraphNode`, `GraphMeta`, `Sources`)
//! - The metadata-routed executor that runs a graph without inspecting
//!   node types
//! - The generic two-level [`replace::ModuleReplacer`] engine
//! - The host/device tensor bridge and the process-wide working device
//! - Capability traits (`Validator`, `ModelInfo`) and the task routing
//!   registry
//! - Validation-argument resolution with documented precedence
//!
//! # Architecture
//!
//! A model is a two-level tree: named groups of named nodes. Each node
//! carries graph metadata (`node_index`, `sources`, `type_name`) that the
//! executor routes by; the metadata is preserved byte-for-byte across any
//! node replacement, so swapping a node's implementation never changes how
//! the graph is wired.
//!
//! Concrete blocks, replacers and validators live in downstream crates
//! (see `trace-graph-detect`).

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod graph;
pub mod registry;
pub mod replace;
pub mod traits;

// Re-exports for convenience
pub use error::{GraphError, GraphResult};
pub use graph::{Block, BlockOutput, GraphMeta, GraphNode, ModuleGraph, NamedGroup, RunMode};
pub use replace::ModuleReplacer;
pub use traits::{ModelInfo, Task, Validator};
