//! Export preparation pipeline.

use trace_graph_core::bridge::set_model;
use trace_graph_core::replace::ModuleReplacer;

use crate::error::DetectResult;
use crate::model::DetectionModel;
use crate::replacers::{CspReplacer, DetectReplacer, SegmentReplacer};

/// Convert a model's graph into its traceable form and place it on the
/// working device in eval mode.
///
/// Runs all replacers; a single extraction failure aborts preparation
/// before any export work can start on a half-converted graph. Returns
/// the number of replaced nodes; running again on an already-converted
/// model is a no-op returning zero.
///
/// Replacement must be serialized per model instance; callers own that
/// discipline, there is no internal lock.
pub fn prepare_for_export(model: &mut DetectionModel) -> DetectResult<usize> {
    let graph = model.graph_mut();
    let mut replaced = 0;
    replaced += SegmentReplacer::default().replace(graph)?;
    replaced += DetectReplacer::default().replace(graph)?;
    replaced += CspReplacer::default().replace(graph)?;
    set_model(graph, false)?;
    tracing::info!(replaced, "model prepared for static-graph export");
    Ok(replaced)
}
