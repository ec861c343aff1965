//! Graph nodes, groups and the two-level tree root.

use candle_core::Device;

use crate::error::GraphResult;

use super::{Block, GraphMeta, RunMode};

/// A node: a named block plus its routing metadata.
pub struct GraphNode {
    name: String,
    meta: GraphMeta,
    block: Box<dyn Block>,
}

impl GraphNode {
    pub fn new(name: impl Into<String>, meta: GraphMeta, block: Box<dyn Block>) -> Self {
        Self {
            name: name.into(),
            meta,
            block,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &GraphMeta {
        &self.meta
    }

    pub fn block(&self) -> &dyn Block {
        self.block.as_ref()
    }

    pub fn block_mut(&mut self) -> &mut dyn Block {
        self.block.as_mut()
    }

    /// Swap the block implementation, returning the displaced one.
    ///
    /// The metadata stays untouched: replacement changes what a node
    /// computes, never how it is wired.
    pub fn swap_block(&mut self, block: Box<dyn Block>) -> Box<dyn Block> {
        std::mem::replace(&mut self.block, block)
    }
}

impl std::fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphNode")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .field("type_tag", &self.block.type_tag())
            .finish()
    }
}

/// A named, insertion-ordered collection of nodes.
#[derive(Debug)]
pub struct NamedGroup {
    name: String,
    nodes: Vec<GraphNode>,
}

impl NamedGroup {
    pub fn new(name: impl Into<String>, nodes: Vec<GraphNode>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [GraphNode] {
        &mut self.nodes
    }
}

/// The two-level module tree.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    groups: Vec<NamedGroup>,
    mode: RunMode,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_group(&mut self, group: NamedGroup) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[NamedGroup] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut [NamedGroup] {
        &mut self.groups
    }

    /// Named-children enumeration over the first level.
    pub fn named_children(&self) -> impl Iterator<Item = (&str, &NamedGroup)> {
        self.groups.iter().map(|g| (g.name(), g))
    }

    pub fn group(&self, name: &str) -> Option<&NamedGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
    }

    /// All parameters, prefixed `group.node.`.
    pub fn named_parameters(&self) -> Vec<(String, candle_core::Tensor)> {
        let mut params = Vec::new();
        for group in &self.groups {
            for node in group.nodes() {
                for (name, tensor) in node.block().named_parameters() {
                    params.push((format!("{}.{}.{}", group.name(), node.name(), name), tensor));
                }
            }
        }
        params
    }

    /// Move every block's parameters to `device`.
    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        for group in &mut self.groups {
            for node in group.nodes_mut() {
                node.block_mut().relocate(device)?;
            }
        }
        Ok(())
    }
}
