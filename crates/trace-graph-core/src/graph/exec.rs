//! Metadata-routed execution.
//!
//! Runs a group's nodes in execution order, gathering each node's inputs
//! from its [`Sources`] and saving only the outputs that later nodes
//! reference. This is the single-scale inference path; there is no
//! augmentation or profiling branch.

use std::collections::HashSet;

use candle_core::Tensor;

use crate::error::{GraphError, GraphResult};

use super::{BlockOutput, GraphNode, NamedGroup, RunMode, SourceRef, Sources};

impl NamedGroup {
    /// Execution indices whose outputs must be kept for later nodes.
    pub fn save_set(&self) -> HashSet<usize> {
        self.nodes()
            .iter()
            .flat_map(|n| n.meta().sources.referenced_nodes())
            .collect()
    }

    /// Run the group on `input`, routing purely by node metadata.
    ///
    /// Returns the last node's output. Outputs of nodes no later node
    /// references are dropped as soon as the next node has consumed them.
    pub fn run(&self, input: &Tensor, mode: RunMode) -> GraphResult<BlockOutput> {
        let save = self.save_set();
        let max_index = self
            .nodes()
            .iter()
            .map(|n| n.meta().node_index)
            .max()
            .unwrap_or(0);
        let mut saved: Vec<Option<BlockOutput>> = vec![None; max_index + 1];
        let mut prev = BlockOutput::One(input.clone());

        for node in self.nodes() {
            let xs = gather_inputs(node, &prev, &saved)?;
            let out = match mode {
                RunMode::Train => node.block().forward_train(&xs)?,
                RunMode::Export => node.block().forward(&xs)?,
            };
            let index = node.meta().node_index;
            if save.contains(&index) {
                saved[index] = Some(out.clone());
            }
            prev = out;
        }
        Ok(prev)
    }
}

fn gather_inputs(
    node: &GraphNode,
    prev: &BlockOutput,
    saved: &[Option<BlockOutput>],
) -> GraphResult<Vec<Tensor>> {
    let node_index = node.meta().node_index;
    let resolve = |source: &SourceRef| -> GraphResult<Tensor> {
        let out = match source {
            SourceRef::Previous => prev,
            SourceRef::Node(i) => saved
                .get(*i)
                .and_then(|o| o.as_ref())
                .ok_or_else(|| GraphError::MissingSource {
                    node_index,
                    source_ref: format!("node {i}"),
                })?,
        };
        Ok(out.as_single(&node.meta().type_name)?.clone())
    };

    match &node.meta().sources {
        Sources::Single(r) => Ok(vec![resolve(r)?]),
        Sources::Many(rs) => rs.iter().map(resolve).collect(),
    }
}
