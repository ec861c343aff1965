//! Tests for the graph data model and routed execution.

use std::any::Any;

use candle_core::{Device, Tensor};

use crate::error::{GraphError, GraphResult};

use super::{
    expect_single, Block, BlockOutput, GraphMeta, GraphNode, ModuleGraph, NamedGroup, RunMode,
    SourceRef, Sources,
};

/// Multiplies its single input by a constant.
struct Scale {
    factor: f64,
}

impl Block for Scale {
    fn type_tag(&self) -> &'static str {
        "Scale"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let x = expect_single(xs, self.type_tag())?;
        Ok(BlockOutput::One(x.affine(self.factor, 0.0)?))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Adds all of its inputs.
struct Sum;

impl Block for Sum {
    fn type_tag(&self) -> &'static str {
        "Sum"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let mut acc = xs[0].clone();
        for x in &xs[1..] {
            acc = (&acc + x)?;
        }
        Ok(BlockOutput::One(acc))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn node(index: usize, sources: Sources, block: Box<dyn Block>) -> GraphNode {
    let tag = block.type_tag().to_string();
    GraphNode::new(format!("{index}"), GraphMeta::new(index, sources, tag), block)
}

fn diamond_group() -> NamedGroup {
    // 0: x * 2
    // 1: (node 0) * 3
    // 2: node 0 + previous  -> 2x + 6x = 8x
    NamedGroup::new(
        "model",
        vec![
            node(0, Sources::previous(), Box::new(Scale { factor: 2.0 })),
            node(1, Sources::previous(), Box::new(Scale { factor: 3.0 })),
            node(
                2,
                Sources::many(vec![SourceRef::Node(0), SourceRef::Previous]),
                Box::new(Sum),
            ),
        ],
    )
}

#[test]
fn test_run_routes_by_metadata() {
    let device = Device::Cpu;
    let group = diamond_group();
    let x = Tensor::from_vec(vec![1f32, 2.0, 3.0], (3,), &device).unwrap();
    let out = group.run(&x, RunMode::Export).unwrap();
    let values = out.as_single("test").unwrap().to_vec1::<f32>().unwrap();
    assert_eq!(values, vec![8.0, 16.0, 24.0]);
}

#[test]
fn test_save_set_only_keeps_referenced_outputs() {
    let group = diamond_group();
    let save = group.save_set();
    assert!(save.contains(&0));
    assert!(!save.contains(&1));
    assert!(!save.contains(&2));
}

#[test]
fn test_missing_source_is_reported_with_positions() {
    let device = Device::Cpu;
    let group = NamedGroup::new(
        "model",
        vec![node(
            0,
            Sources::node(9),
            Box::new(Scale { factor: 1.0 }),
        )],
    );
    let x = Tensor::zeros((2,), candle_core::DType::F32, &device).unwrap();
    let err = group.run(&x, RunMode::Export).unwrap_err();
    match err {
        GraphError::MissingSource { node_index, source_ref: source } => {
            assert_eq!(node_index, 0);
            assert!(source.contains("9"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_swap_block_preserves_metadata() {
    let mut n = node(
        4,
        Sources::many(vec![SourceRef::Node(1), SourceRef::Node(2)]),
        Box::new(Scale { factor: 2.0 }),
    );
    let before = n.meta().clone();
    let displaced = n.swap_block(Box::new(Sum));
    assert_eq!(displaced.type_tag(), "Scale");
    assert_eq!(n.block().type_tag(), "Sum");
    assert_eq!(n.meta(), &before);
}

#[test]
fn test_named_children_enumeration() {
    let mut graph = ModuleGraph::new();
    graph.push_group(diamond_group());
    let names: Vec<&str> = graph.named_children().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["model"]);
    assert_eq!(graph.group("model").unwrap().nodes().len(), 3);
    assert!(graph.group("missing").is_none());
}

#[test]
fn test_mode_defaults_to_export() {
    let graph = ModuleGraph::new();
    assert_eq!(graph.mode(), RunMode::Export);
}

#[test]
fn test_bundle_output_rejected_as_single() {
    let device = Device::Cpu;
    let t = Tensor::zeros((1,), candle_core::DType::F32, &device).unwrap();
    let out = BlockOutput::Many(vec![t.clone(), t]);
    let err = out.as_single("head").unwrap_err();
    assert!(format!("{err}").contains("bundle of 2"));
}

#[test]
fn test_sources_referenced_nodes() {
    let s = Sources::many(vec![SourceRef::Previous, SourceRef::Node(6)]);
    assert_eq!(s.referenced_nodes(), vec![6]);
    assert!(Sources::previous().referenced_nodes().is_empty());
}
