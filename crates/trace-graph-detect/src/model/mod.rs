//! Spec-built detection models over the core module graph.

mod spec;

pub use spec::{BlockSpec, ModelSpec, NodeSpec};

use candle_core::{Device, Tensor};

use trace_graph_core::config::ValArgs;
use trace_graph_core::error::GraphError;
use trace_graph_core::graph::{BlockOutput, GraphMeta, GraphNode, ModuleGraph, NamedGroup};
use trace_graph_core::traits::ModelInfo;
use trace_graph_core::GraphResult;

use crate::error::{DetectError, DetectResult};

/// Name of the group holding the execution-ordered node list.
const MODEL_GROUP: &str = "model";

/// A detection/segmentation model: a module graph plus the spec it was
/// built from.
pub struct DetectionModel {
    graph: ModuleGraph,
    spec: ModelSpec,
}

impl DetectionModel {
    /// Materialize a spec on `device`.
    pub fn from_spec(spec: ModelSpec, device: &Device) -> DetectResult<Self> {
        let mut nodes = Vec::with_capacity(spec.nodes.len());
        for (index, node_spec) in spec.nodes.iter().enumerate() {
            let block = node_spec
                .block
                .build(&spec.strides, device)
                .map_err(|e| DetectError::ModelBuild {
                    message: format!("node {index}: {e}"),
                })?;
            let meta = GraphMeta::new(index, node_spec.sources.clone(), block.type_tag());
            nodes.push(GraphNode::new(index.to_string(), meta, block));
        }
        let mut graph = ModuleGraph::new();
        graph.push_group(NamedGroup::new(MODEL_GROUP, nodes));
        tracing::debug!(
            nodes = spec.nodes.len(),
            strides = ?spec.strides,
            "detection model materialized"
        );
        Ok(Self { graph, spec })
    }

    /// Run the routed single-scale forward in the graph's current mode.
    pub fn forward(&self, x: &Tensor) -> GraphResult<BlockOutput> {
        let group = self
            .graph
            .group(MODEL_GROUP)
            .ok_or_else(|| GraphError::Routing {
                context: MODEL_GROUP.to_string(),
                message: "model group is missing".to_string(),
            })?;
        group.run(x, self.graph.mode())
    }

    pub fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut ModuleGraph {
        &mut self.graph
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Arguments stored at training time.
    pub fn stored_args(&self) -> &ValArgs {
        &self.spec.args
    }

    pub fn max_stride(&self) -> usize {
        self.spec.strides.iter().copied().max().unwrap_or(1)
    }

    /// A detached descriptor for a specific target resolution.
    pub fn descriptor(&self, image_size: usize) -> ModelDescriptor {
        ModelDescriptor::new(
            self.spec.strides.clone(),
            self.spec.class_count(),
            self.spec.class_names.clone(),
            image_size,
        )
    }
}

impl ModelInfo for DetectionModel {
    fn strides(&self) -> &[usize] {
        &self.spec.strides
    }

    fn class_count(&self) -> usize {
        self.spec.class_count()
    }

    fn class_names(&self) -> &[String] {
        &self.spec.class_names
    }

    fn image_size(&self) -> usize {
        self.spec.image_size
    }
}

/// Static model facts, detached from the graph.
///
/// This is everything post-processing needs; it deliberately carries no
/// tensors, so it can cross into the validation stage after the graph has
/// been handed to the exporter.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    strides: Vec<usize>,
    class_count: usize,
    class_names: Vec<String>,
    image_size: usize,
}

impl ModelDescriptor {
    pub fn new(
        strides: Vec<usize>,
        class_count: usize,
        class_names: Vec<String>,
        image_size: usize,
    ) -> Self {
        Self {
            strides,
            class_count,
            class_names,
            image_size,
        }
    }
}

impl ModelInfo for ModelDescriptor {
    fn strides(&self) -> &[usize] {
        &self.strides
    }

    fn class_count(&self) -> usize {
        self.class_count
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn image_size(&self) -> usize {
        self.image_size
    }
}

#[cfg(test)]
mod tests {
    use trace_graph_core::graph::RunMode;

    use super::*;

    #[test]
    fn test_tiny_detect_forward_shapes() {
        let device = Device::Cpu;
        let model = DetectionModel::from_spec(ModelSpec::tiny_detect(2), &device).unwrap();
        let x = Tensor::randn(0f32, 1.0, (1, 3, 64, 64), &device).unwrap();

        // Export mode runs the original head's dynamic tail.
        let out = model.forward(&x).unwrap();
        let merged = out.as_single("model").unwrap();
        assert_eq!(merged.dims(), &[1, 6, 8 * 8 + 4 * 4]);
    }

    #[test]
    fn test_tiny_detect_training_outputs() {
        let device = Device::Cpu;
        let mut model = DetectionModel::from_spec(ModelSpec::tiny_detect(2), &device).unwrap();
        model.graph_mut().set_mode(RunMode::Train);
        let x = Tensor::randn(0f32, 1.0, (1, 3, 64, 64), &device).unwrap();
        match model.forward(&x).unwrap() {
            BlockOutput::Many(feats) => assert_eq!(feats.len(), 2),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn test_model_info_surface() {
        let device = Device::Cpu;
        let model = DetectionModel::from_spec(ModelSpec::tiny_detect(4), &device).unwrap();
        assert_eq!(model.strides(), &[8, 16]);
        assert_eq!(model.class_count(), 4);
        assert_eq!(model.class_names().len(), 4);
        assert_eq!(model.image_size(), 64);
        assert_eq!(model.max_stride(), 16);

        let descriptor = model.descriptor(128);
        assert_eq!(descriptor.image_size(), 128);
        assert_eq!(descriptor.class_count(), 4);
    }
}
