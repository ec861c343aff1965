//! Detection head with the original dynamic inference tail.

use std::any::Any;

use candle_core::{Device, Tensor};

use trace_graph_core::error::GraphError;
use trace_graph_core::graph::{Block, BlockOutput};
use trace_graph_core::GraphResult;

use crate::postprocess::{dist2bbox, make_anchors};

use super::{forward_scales, Dfl, HeadBranch};

/// Anchor-free detection head over several feature scales.
///
/// Training returns the per-scale prediction maps. Inference runs the
/// dynamic tail: it derives the anchor grid from the runtime feature
/// shapes, decodes side distances into boxes, scales by stride, and merges
/// everything into a single `(b, 4 + nc, N)` tensor. That tail is what the
/// traceable variant stops short of.
#[derive(Clone)]
pub struct DetectHead {
    nc: usize,
    reg_max: usize,
    cv2: Vec<HeadBranch>,
    cv3: Vec<HeadBranch>,
    dfl: Dfl,
    strides: Vec<usize>,
}

impl DetectHead {
    pub fn init(
        nc: usize,
        ch: &[usize],
        strides: &[usize],
        device: &Device,
    ) -> GraphResult<Self> {
        if ch.is_empty() || ch.len() != strides.len() {
            return Err(GraphError::Config {
                message: format!(
                    "detection head needs one input channel count per stride, got {} for {}",
                    ch.len(),
                    strides.len()
                ),
            });
        }
        let reg_max = 16;
        let c2 = (ch[0] / 4).max(16).max(4 * reg_max);
        let c3 = ch[0].max(nc.min(100));
        let cv2 = ch
            .iter()
            .map(|&c| HeadBranch::init(c, c2, 4 * reg_max, device))
            .collect::<GraphResult<Vec<_>>>()?;
        let cv3 = ch
            .iter()
            .map(|&c| HeadBranch::init(c, c3, nc, device))
            .collect::<GraphResult<Vec<_>>>()?;
        Ok(Self {
            nc,
            reg_max,
            cv2,
            cv3,
            dfl: Dfl::new(reg_max, device)?,
            strides: strides.to_vec(),
        })
    }

    pub fn nc(&self) -> usize {
        self.nc
    }

    pub fn reg_max(&self) -> usize {
        self.reg_max
    }

    /// Prediction channels per anchor.
    pub fn no(&self) -> usize {
        self.nc + 4 * self.reg_max
    }

    pub fn box_branches(&self) -> &[HeadBranch] {
        &self.cv2
    }

    pub fn cls_branches(&self) -> &[HeadBranch] {
        &self.cv3
    }

    pub fn dfl(&self) -> &Dfl {
        &self.dfl
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Per-scale prediction maps (the training output).
    pub fn scale_features(&self, xs: &[Tensor], train: bool) -> GraphResult<Vec<Tensor>> {
        forward_scales(&self.cv2, &self.cv3, xs, train)
    }

    /// The merged inference output, dynamic tail included.
    pub fn predict(&self, xs: &[Tensor]) -> GraphResult<Tensor> {
        let feats = self.scale_features(xs, false)?;

        // Anchor grid from the runtime feature shapes.
        let shapes = feats
            .iter()
            .map(|f| f.dims4().map(|(_, _, h, w)| (h, w)))
            .collect::<Result<Vec<_>, _>>()?;
        let (anchors, strides) = make_anchors(&shapes, &self.strides, 0.5, feats[0].device())?;

        let b = feats[0].dims4()?.0;
        let views = feats
            .iter()
            .map(|f| f.reshape((b, self.no(), ())))
            .collect::<Result<Vec<_>, _>>()?;
        let x_cat = Tensor::cat(&views, 2)?;
        let boxes = x_cat.narrow(1, 0, 4 * self.reg_max)?;
        let classes = x_cat.narrow(1, 4 * self.reg_max, self.nc)?;

        let decoded = dist2bbox(&self.dfl.forward(&boxes)?, &anchors.unsqueeze(0)?, true, 1)?;
        let decoded = decoded.broadcast_mul(&strides)?;
        Ok(Tensor::cat(&[&decoded, &candle_nn::ops::sigmoid(&classes)?], 1)?)
    }

    pub fn named_parameters(&self) -> Vec<(String, Tensor)> {
        let mut params = Vec::new();
        for (i, branch) in self.cv2.iter().enumerate() {
            for (name, t) in branch.named_parameters() {
                params.push((format!("cv2.{i}.{name}"), t));
            }
        }
        for (i, branch) in self.cv3.iter().enumerate() {
            for (name, t) in branch.named_parameters() {
                params.push((format!("cv3.{i}.{name}"), t));
            }
        }
        params
    }

    pub fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        for branch in self.cv2.iter_mut().chain(self.cv3.iter_mut()) {
            branch.relocate(device)?;
        }
        self.dfl.relocate(device)
    }
}

impl Block for DetectHead {
    fn type_tag(&self) -> &'static str {
        "Detect"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        Ok(BlockOutput::One(self.predict(xs)?))
    }

    fn forward_train(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        Ok(BlockOutput::Many(self.scale_features(xs, true)?))
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        DetectHead::named_parameters(self)
    }

    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        DetectHead::relocate(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
