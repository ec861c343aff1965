//! Validation arguments and their resolution.
//!
//! Precedence is fixed and documented: explicit call-time overrides beat
//! the model's own stored training arguments, which beat the global
//! defaults. Resolution happens once per validation entry; nothing
//! re-merges mid-run.

use serde::{Deserialize, Serialize};

use crate::traits::Task;

// ============================================================================
// DEFAULT FUNCTIONS
// ============================================================================

fn default_image_size() -> usize {
    640
}

fn default_conf_threshold() -> f32 {
    0.001
}

fn default_iou_threshold() -> f32 {
    0.7
}

fn default_task() -> Task {
    Task::Detect
}

fn default_phase() -> ValPhase {
    ValPhase::Val
}

/// Which pipeline stage the arguments drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValPhase {
    Train,
    Val,
    Predict,
}

// ============================================================================
// VAL ARGS
// ============================================================================

/// Resolved validation arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValArgs {
    /// Target square input resolution.
    #[serde(default = "default_image_size")]
    pub image_size: usize,

    /// Confidence threshold applied by the downstream filter.
    #[serde(default = "default_conf_threshold")]
    pub conf_threshold: f32,

    /// IoU threshold for the downstream overlap filter.
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    /// Rectangular batching. Forced off for validation runs.
    #[serde(default)]
    pub rect: bool,

    /// The task being validated.
    #[serde(default = "default_task")]
    pub task: Task,

    /// Pipeline phase. Forced to `Val` by the validation entry point.
    #[serde(default = "default_phase")]
    pub phase: ValPhase,
}

impl Default for ValArgs {
    fn default() -> Self {
        Self {
            image_size: default_image_size(),
            conf_threshold: default_conf_threshold(),
            iou_threshold: default_iou_threshold(),
            rect: false,
            task: default_task(),
            phase: default_phase(),
        }
    }
}

impl ValArgs {
    /// Resolve a final argument set.
    ///
    /// Precedence: explicit `overrides` > the model's `stored` training
    /// arguments > defaults. `rect` is forced off and `phase` forced to
    /// `Val` regardless of the sources.
    pub fn resolve(stored: Option<&ValArgs>, overrides: &ValOverrides) -> ValArgs {
        let mut args = stored.cloned().unwrap_or_default();
        if let Some(v) = overrides.image_size {
            args.image_size = v;
        }
        if let Some(v) = overrides.conf_threshold {
            args.conf_threshold = v;
        }
        if let Some(v) = overrides.iou_threshold {
            args.iou_threshold = v;
        }
        if let Some(v) = overrides.task {
            args.task = v;
        }
        args.rect = false;
        args.phase = ValPhase::Val;
        args
    }
}

// ============================================================================
// OVERRIDES
// ============================================================================

/// Call-time overrides: every field optional, absent fields defer to the
/// stored arguments and defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValOverrides {
    pub image_size: Option<usize>,
    pub conf_threshold: Option<f32>,
    pub iou_threshold: Option<f32>,
    pub task: Option<Task>,
}

impl ValOverrides {
    pub fn with_image_size(mut self, image_size: usize) -> Self {
        self.image_size = Some(image_size);
        self
    }

    pub fn with_conf_threshold(mut self, conf_threshold: f32) -> Self {
        self.conf_threshold = Some(conf_threshold);
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.task = Some(task);
        self
    }
}

/// Snap an image size to the model's stride grid.
///
/// Returns the nearest multiple of `max_stride` at or above the request,
/// warning when the value had to move. Zero sizes are rejected upstream by
/// [`ValArgs`] consumers; here the minimum result is one stride.
pub fn checked_image_size(requested: usize, max_stride: usize) -> usize {
    debug_assert!(max_stride > 0);
    let snapped = requested.div_ceil(max_stride).max(1) * max_stride;
    if snapped != requested {
        tracing::warn!(
            requested,
            snapped,
            max_stride,
            "image size is not a multiple of the maximum stride, snapping up"
        );
    }
    snapped
}
