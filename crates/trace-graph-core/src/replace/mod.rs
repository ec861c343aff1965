//! Generic, type-driven module replacement.
//!
//! [`replace_second_level`] walks a graph's top-level groups, then their
//! direct nodes (fixed two-level depth by design), and splices a
//! replacement block into every node whose implementation matches the
//! replacer's target type. Routing metadata is left untouched.
//!
//! # Error policy
//!
//! A failed config extraction aborts the whole pass with a
//! [`GraphError::ConfigExtraction`] naming the offending node's type and
//! position. Matches are never silently skipped: a partially-replaced tree
//! must not reach the exporter.
//!
//! # Idempotence
//!
//! Replacement blocks are distinct types from their targets, so a second
//! pass finds no matches and returns zero.


use crate::error::GraphResult;
use crate::graph::{Block, ModuleGraph};

/// A replacement descriptor for one target block type.
///
/// `build(extract_config(n), n)` must be functionally equivalent to `n`
/// for all retained computation: identical parameter tensors (adopted from
/// the donor, never reinitialized), identical shapes, identical arithmetic
/// on the non-excluded path.
pub trait ModuleReplacer {
    /// The block type this replacer displaces.
    type Target: 'static;
    /// Typed architecture record, recoverable from a built `Target` alone.
    type Config;

    /// Recover the config by introspecting the node's built structure.
    fn extract_config(&self, node: &Self::Target) -> GraphResult<Self::Config>;

    /// Construct the replacement, adopting the donor's parameters.
    fn build(&self, config: &Self::Config, donor: &Self::Target) -> GraphResult<Box<dyn Block>>;

    /// Replace every matching second-level node in `graph`.
    ///
    /// Mutates the graph in place and returns the number of replaced
    /// nodes; zero means the graph was already fully converted.
    fn replace(&self, graph: &mut ModuleGraph) -> GraphResult<usize>
    where
        Self: Sized,
    {
        replace_second_level(graph, self)
    }
}

/// The two-level replacement engine.
pub fn replace_second_level<R: ModuleReplacer>(
    graph: &mut ModuleGraph,
    replacer: &R,
) -> GraphResult<usize> {
    let mut replaced = 0;
    for group in graph.groups_mut() {
        let group_name = group.name().to_string();
        for node in group.nodes_mut() {
            let node_index = node.meta().node_index;
            let built = {
                let Some(target) = node.block().as_any().downcast_ref::<R::Target>() else {
                    continue;
                };
                let config = replacer
                    .extract_config(target)
                    .map_err(|e| e.at_node(node_index))?;
                replacer.build(&config, target)?
            };
            node.swap_block(built);
            tracing::debug!(
                group = %group_name,
                node_index,
                type_name = %node.meta().type_name,
                "replaced module"
            );
            replaced += 1;
        }
    }
    if replaced > 0 {
        tracing::info!(replaced, "module replacement pass complete");
    }
    Ok(replaced)
}
