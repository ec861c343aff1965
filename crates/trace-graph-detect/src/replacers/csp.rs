//! Replacer for the feature-aggregation block.

use serde::{Deserialize, Serialize};

use trace_graph_core::error::GraphError;
use trace_graph_core::graph::Block;
use trace_graph_core::replace::ModuleReplacer;
use trace_graph_core::GraphResult;

use crate::blocks::CspBlock;
use crate::variants::TraceableCsp;

/// Architecture record for a [`CspBlock`].
///
/// Field order mirrors the block's construction order: input width,
/// output width, repeat count, shortcut flag, group count, hidden-width
/// expansion ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CspConfig {
    pub c1: usize,
    pub c2: usize,
    pub n: usize,
    pub shortcut: bool,
    pub groups: usize,
    pub expansion: f64,
}

/// Swaps [`CspBlock`]s for [`TraceableCsp`]s.
#[derive(Debug, Default)]
pub struct CspReplacer;

impl ModuleReplacer for CspReplacer {
    type Target = CspBlock;
    type Config = CspConfig;

    /// Shape contract: the stem projects to `2 * hidden` channels, the
    /// fuse conv takes `(2 + n) * hidden` in and `c2` out, and at least
    /// one bottleneck repeat exists to read the shortcut flag and group
    /// count from.
    fn extract_config(&self, node: &CspBlock) -> GraphResult<CspConfig> {
        let stem_out = node.cv1().out_channels();
        if stem_out % 2 != 0 {
            return Err(GraphError::config_extraction::<CspBlock>(format!(
                "stem width {stem_out} cannot split into two halves"
            )));
        }
        let hidden = stem_out / 2;

        let fuse_in = node.cv2().in_channels();
        if fuse_in % hidden != 0 || fuse_in / hidden < 2 {
            return Err(GraphError::config_extraction::<CspBlock>(format!(
                "fuse input {fuse_in} is not a multiple of the hidden width {hidden}"
            )));
        }
        let n = fuse_in / hidden - 2;
        if n != node.bottlenecks().len() {
            return Err(GraphError::config_extraction::<CspBlock>(format!(
                "fuse input implies {n} repeats but {} are present",
                node.bottlenecks().len()
            )));
        }

        let first = node.bottlenecks().first().ok_or_else(|| {
            GraphError::config_extraction::<CspBlock>(
                "no bottleneck repeats to read the shortcut flag and group count from",
            )
        })?;

        let c2 = node.cv2().out_channels();
        Ok(CspConfig {
            c1: node.cv1().in_channels(),
            c2,
            n,
            shortcut: first.add(),
            groups: first.groups(),
            expansion: hidden as f64 / c2 as f64,
        })
    }

    fn build(&self, config: &CspConfig, donor: &CspBlock) -> GraphResult<Box<dyn Block>> {
        Ok(Box::new(TraceableCsp::from_config(config, donor)?))
    }
}
