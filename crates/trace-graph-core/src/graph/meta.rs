//! Graph-routing metadata.

use serde::{Deserialize, Serialize};

/// A reference to a prior node's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRef {
    /// The immediately preceding node's output.
    Previous,
    /// The saved output of the node at this execution index.
    Node(usize),
}

/// Where a node takes its input from: a single predecessor or an ordered
/// list of predecessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sources {
    Single(SourceRef),
    Many(Vec<SourceRef>),
}

impl Sources {
    /// Input from the previous node.
    pub fn previous() -> Self {
        Sources::Single(SourceRef::Previous)
    }

    /// Input from the saved output of node `index`.
    pub fn node(index: usize) -> Self {
        Sources::Single(SourceRef::Node(index))
    }

    /// Input from an ordered list of prior outputs.
    pub fn many(refs: Vec<SourceRef>) -> Self {
        Sources::Many(refs)
    }

    /// Execution indices this source list pins (excluding `Previous`).
    pub fn referenced_nodes(&self) -> Vec<usize> {
        let refs: &[SourceRef] = match self {
            Sources::Single(r) => std::slice::from_ref(r),
            Sources::Many(rs) => rs,
        };
        refs.iter()
            .filter_map(|r| match r {
                SourceRef::Node(i) => Some(*i),
                SourceRef::Previous => None,
            })
            .collect()
    }
}

/// Per-node routing metadata.
///
/// The execution engine routes purely by this record. It must be copied
/// verbatim onto any replacement node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMeta {
    /// Position in execution order.
    pub node_index: usize,
    /// Prior outputs this node consumes.
    pub sources: Sources,
    /// Diagnostic type tag.
    pub type_name: String,
}

impl GraphMeta {
    pub fn new(node_index: usize, sources: Sources, type_name: impl Into<String>) -> Self {
        Self {
            node_index,
            sources,
            type_name: type_name.into(),
        }
    }
}

/// Which forward path the graph runs.
///
/// Selected once at preparation time; blocks expose the two paths as two
/// explicit methods rather than branching on a flag per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Batch-statistics normalization, per-scale head outputs.
    Train,
    /// The statically-shaped inference path handed to the tracer.
    #[default]
    Export,
}
