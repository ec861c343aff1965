//! Replacer for the segmentation head.

use serde::{Deserialize, Serialize};

use trace_graph_core::error::GraphError;
use trace_graph_core::graph::Block;
use trace_graph_core::replace::ModuleReplacer;
use trace_graph_core::GraphResult;

use crate::blocks::SegmentHead;
use crate::variants::{SplitLayout, TraceableSegment};

use super::{DetectConfig, DetectReplacer};

/// Architecture record for a [`SegmentHead`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// The inner detection head's record.
    pub detect: DetectConfig,
    /// Mask channels.
    pub nm: usize,
    /// Prototype channel width.
    pub npr: usize,
}

/// Swaps [`SegmentHead`]s for [`TraceableSegment`]s.
#[derive(Debug, Default)]
pub struct SegmentReplacer {
    layout: SplitLayout,
}

impl SegmentReplacer {
    pub fn with_layout(layout: SplitLayout) -> Self {
        Self { layout }
    }
}

impl ModuleReplacer for SegmentReplacer {
    type Target = SegmentHead;
    type Config = SegmentConfig;

    /// Shape contract: the inner detection head's contract, plus one mask
    /// branch per scale projecting to `nm` channels and a prototype stem.
    fn extract_config(&self, node: &SegmentHead) -> GraphResult<SegmentConfig> {
        let detect = DetectReplacer::default()
            .extract_config(node.detect())
            .map_err(|e| match e {
                GraphError::ConfigExtraction { reason, .. } => {
                    GraphError::config_extraction::<SegmentHead>(reason)
                }
                other => other,
            })?;

        if node.mask_branches().len() != detect.ch.len() {
            return Err(GraphError::config_extraction::<SegmentHead>(format!(
                "{} mask branches for {} detection scales",
                node.mask_branches().len(),
                detect.ch.len()
            )));
        }
        let nm = node.mask_branches()[0].out_channels();
        if node.proto().mask_channels() != nm {
            return Err(GraphError::config_extraction::<SegmentHead>(format!(
                "prototype head projects {} channels but mask branches predict {nm}",
                node.proto().mask_channels()
            )));
        }

        Ok(SegmentConfig {
            detect,
            nm,
            npr: node.proto().stem_channels(),
        })
    }

    fn build(&self, config: &SegmentConfig, donor: &SegmentHead) -> GraphResult<Box<dyn Block>> {
        Ok(Box::new(TraceableSegment::from_config(
            config,
            donor,
            self.layout,
        )?))
    }
}
