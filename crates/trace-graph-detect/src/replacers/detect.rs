//! Replacer for the detection head.

use serde::{Deserialize, Serialize};

use trace_graph_core::error::GraphError;
use trace_graph_core::graph::Block;
use trace_graph_core::replace::ModuleReplacer;
use trace_graph_core::GraphResult;

use crate::blocks::DetectHead;
use crate::variants::{SplitLayout, TraceableDetect};

/// Architecture record for a [`DetectHead`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectConfig {
    /// Class count.
    pub nc: usize,
    /// Per-scale input channel counts, in scale order.
    pub ch: Vec<usize>,
    /// Bins per box side in the distance distribution.
    pub reg_max: usize,
}

/// Swaps [`DetectHead`]s for [`TraceableDetect`]s.
#[derive(Debug, Default)]
pub struct DetectReplacer {
    layout: SplitLayout,
}

impl DetectReplacer {
    /// Use a specific merge layout for the built variants.
    pub fn with_layout(layout: SplitLayout) -> Self {
        Self { layout }
    }
}

impl ModuleReplacer for DetectReplacer {
    type Target = DetectHead;
    type Config = DetectConfig;

    /// Shape contract: paired box/class branches per scale, box branches
    /// projecting to `4 * reg_max` channels, class branches to `nc`.
    fn extract_config(&self, node: &DetectHead) -> GraphResult<DetectConfig> {
        let ch: Vec<usize> = node
            .box_branches()
            .iter()
            .map(|b| b.in_channels())
            .collect();
        if ch.is_empty() {
            return Err(GraphError::config_extraction::<DetectHead>(
                "head has no detection scales",
            ));
        }
        if node.cls_branches().len() != ch.len() {
            return Err(GraphError::config_extraction::<DetectHead>(format!(
                "{} box branches but {} class branches",
                ch.len(),
                node.cls_branches().len()
            )));
        }

        let reg_out = node.box_branches()[0].out_channels();
        if reg_out % 4 != 0 {
            return Err(GraphError::config_extraction::<DetectHead>(format!(
                "box projection width {reg_out} is not divisible across four sides"
            )));
        }

        Ok(DetectConfig {
            nc: node.cls_branches()[0].out_channels(),
            ch,
            reg_max: reg_out / 4,
        })
    }

    fn build(&self, config: &DetectConfig, donor: &DetectHead) -> GraphResult<Box<dyn Block>> {
        Ok(Box::new(TraceableDetect::from_config(
            config,
            donor,
            self.layout,
        )?))
    }
}
