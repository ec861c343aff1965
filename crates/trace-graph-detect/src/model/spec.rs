//! In-memory architecture descriptions.

use candle_core::Device;
use serde::{Deserialize, Serialize};

use trace_graph_core::config::ValArgs;
use trace_graph_core::graph::{Block, Sources};
use trace_graph_core::GraphResult;

use crate::blocks::{Concat, ConvNorm, CspBlock, DetectHead, SegmentHead, Upsample};

/// One node of an architecture description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub sources: Sources,
    pub block: BlockSpec,
}

/// Block constructors available to a model spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSpec {
    Conv {
        c_in: usize,
        c_out: usize,
        kernel: usize,
        stride: usize,
    },
    Csp {
        c_in: usize,
        c_out: usize,
        repeats: usize,
        shortcut: bool,
        groups: usize,
        expansion: f64,
    },
    Upsample {
        scale: usize,
    },
    Concat {
        dim: usize,
    },
    Detect {
        classes: usize,
        ch: Vec<usize>,
    },
    Segment {
        classes: usize,
        masks: usize,
        protos: usize,
        ch: Vec<usize>,
    },
}

impl BlockSpec {
    /// Materialize the block on `device`. Head blocks receive the model's
    /// stride pattern.
    pub fn build(&self, strides: &[usize], device: &Device) -> GraphResult<Box<dyn Block>> {
        Ok(match self {
            BlockSpec::Conv {
                c_in,
                c_out,
                kernel,
                stride,
            } => Box::new(ConvNorm::init(*c_in, *c_out, *kernel, *stride, 1, device)?),
            BlockSpec::Csp {
                c_in,
                c_out,
                repeats,
                shortcut,
                groups,
                expansion,
            } => Box::new(CspBlock::init(
                *c_in, *c_out, *repeats, *shortcut, *groups, *expansion, device,
            )?),
            BlockSpec::Upsample { scale } => Box::new(Upsample::new(*scale)),
            BlockSpec::Concat { dim } => Box::new(Concat::new(*dim)),
            BlockSpec::Detect { classes, ch } => {
                Box::new(DetectHead::init(*classes, ch, strides, device)?)
            }
            BlockSpec::Segment {
                classes,
                masks,
                protos,
                ch,
            } => Box::new(SegmentHead::init(
                *classes, *masks, *protos, ch, strides, device,
            )?),
        })
    }

    /// Class count, for head specs.
    pub fn class_count(&self) -> Option<usize> {
        match self {
            BlockSpec::Detect { classes, .. } | BlockSpec::Segment { classes, .. } => {
                Some(*classes)
            }
            _ => None,
        }
    }
}

/// A complete model description: the node list plus the static facts the
/// post-processing stage reconstructs the excluded tail from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    pub nodes: Vec<NodeSpec>,
    /// Downsampling stride of each head scale.
    pub strides: Vec<usize>,
    pub class_names: Vec<String>,
    /// Trained input resolution.
    pub image_size: usize,
    /// Arguments stored at training time; the validation entry point
    /// resolves against these.
    #[serde(default)]
    pub args: ValArgs,
}

impl ModelSpec {
    /// Class count, read off the head spec.
    pub fn class_count(&self) -> usize {
        self.nodes
            .iter()
            .rev()
            .find_map(|n| n.block.class_count())
            .unwrap_or(self.class_names.len())
    }

    fn tiny_names(nc: usize) -> Vec<String> {
        (0..nc).map(|i| format!("class_{i}")).collect()
    }

    fn tiny_backbone(nc: usize) -> Vec<NodeSpec> {
        use trace_graph_core::graph::SourceRef;
        vec![
            // Backbone: stride 2, 4, 8, 16.
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Conv {
                    c_in: 3,
                    c_out: 16,
                    kernel: 3,
                    stride: 2,
                },
            },
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Conv {
                    c_in: 16,
                    c_out: 32,
                    kernel: 3,
                    stride: 2,
                },
            },
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Csp {
                    c_in: 32,
                    c_out: 32,
                    repeats: 1,
                    shortcut: true,
                    groups: 1,
                    expansion: 0.5,
                },
            },
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Conv {
                    c_in: 32,
                    c_out: 64,
                    kernel: 3,
                    stride: 2,
                },
            },
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Conv {
                    c_in: 64,
                    c_out: 128,
                    kernel: 3,
                    stride: 2,
                },
            },
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Csp {
                    c_in: 128,
                    c_out: 128,
                    repeats: 1,
                    shortcut: true,
                    groups: 1,
                    expansion: 0.5,
                },
            },
            // Neck: upsample the deep scale and fuse with the stride-8 map.
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Upsample { scale: 2 },
            },
            NodeSpec {
                sources: Sources::many(vec![SourceRef::Previous, SourceRef::Node(3)]),
                block: BlockSpec::Concat { dim: 1 },
            },
            NodeSpec {
                sources: Sources::previous(),
                block: BlockSpec::Csp {
                    c_in: 192,
                    c_out: 64,
                    repeats: 1,
                    shortcut: false,
                    groups: 1,
                    expansion: 0.5,
                },
            },
            // Head over the fused stride-8 map and the raw stride-16 map.
            NodeSpec {
                sources: Sources::many(vec![SourceRef::Previous, SourceRef::Node(5)]),
                block: BlockSpec::Detect {
                    classes: nc,
                    ch: vec![64, 128],
                },
            },
        ]
    }

    /// A small two-scale detection model for tests and walkthroughs.
    pub fn tiny_detect(nc: usize) -> Self {
        Self {
            nodes: Self::tiny_backbone(nc),
            strides: vec![8, 16],
            class_names: Self::tiny_names(nc),
            image_size: 64,
            args: ValArgs {
                image_size: 64,
                ..ValArgs::default()
            },
        }
    }

    /// The segmentation twin of [`ModelSpec::tiny_detect`].
    pub fn tiny_segment(nc: usize, nm: usize, npr: usize) -> Self {
        let mut spec = Self::tiny_detect(nc);
        if let Some(last) = spec.nodes.last_mut() {
            last.block = BlockSpec::Segment {
                classes: nc,
                masks: nm,
                protos: npr,
                ch: vec![64, 128],
            };
        }
        spec.args.task = trace_graph_core::Task::Segment;
        spec
    }
}
