//! Traceable detection head emitting the intermediate output bundle.

use std::any::Any;

use candle_core::{Device, Tensor};

use trace_graph_core::graph::{Block, BlockOutput};
use trace_graph_core::GraphResult;

use crate::blocks::{forward_scales, DetectHead, Dfl, HeadBranch};
use crate::postprocess::split_channels;
use crate::replacers::DetectConfig;

/// How the merged per-anchor channels are separated into box and class
/// groups.
///
/// Both layouts produce identical tensors; `Flat` is the form some export
/// targets require (a plain concat followed by channel slices instead of a
/// grouped split). The layout is fixed at build time, so no runtime format
/// branch is left in the forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitLayout {
    /// Grouped split by `(4 * reg_max, nc)` sizes.
    #[default]
    Grouped,
    /// Plain concat, then channel-range slices.
    Flat,
}

/// Detection head that stops short of the dynamic tail.
///
/// Inference returns `[box_preimage (b, 4, N), class_scores (b, nc, N)]`,
/// exactly what the excluded decode consumed, instead of the merged
/// tensor. Training behavior is identical to [`DetectHead`].
#[derive(Clone)]
pub struct TraceableDetect {
    nc: usize,
    reg_max: usize,
    cv2: Vec<HeadBranch>,
    cv3: Vec<HeadBranch>,
    dfl: Dfl,
    strides: Vec<usize>,
    layout: SplitLayout,
}

impl TraceableDetect {
    /// Build from a config record, adopting the donor's parameters.
    pub fn from_config(
        config: &DetectConfig,
        donor: &DetectHead,
        layout: SplitLayout,
    ) -> GraphResult<Self> {
        Ok(Self {
            nc: config.nc,
            reg_max: config.reg_max,
            cv2: donor.box_branches().to_vec(),
            cv3: donor.cls_branches().to_vec(),
            dfl: donor.dfl().clone(),
            strides: donor.strides().to_vec(),
            layout,
        })
    }

    /// Fresh build from a config record alone.
    pub fn init(
        config: &DetectConfig,
        strides: &[usize],
        layout: SplitLayout,
        device: &Device,
    ) -> GraphResult<Self> {
        let donor = DetectHead::init(config.nc, &config.ch, strides, device)?;
        Self::from_config(config, &donor, layout)
    }

    pub fn nc(&self) -> usize {
        self.nc
    }

    pub fn no(&self) -> usize {
        self.nc + 4 * self.reg_max
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn layout(&self) -> SplitLayout {
        self.layout
    }

    pub(crate) fn scale_features(&self, xs: &[Tensor], train: bool) -> GraphResult<Vec<Tensor>> {
        forward_scales(&self.cv2, &self.cv3, xs, train)
    }

    /// The intermediate output bundle.
    pub fn bundle(&self, xs: &[Tensor]) -> GraphResult<(Tensor, Tensor)> {
        let feats = self.scale_features(xs, false)?;
        let b = feats[0].dims4()?.0;
        let views = feats
            .iter()
            .map(|f| f.reshape((b, self.no(), ())))
            .collect::<Result<Vec<_>, _>>()?;
        let x_cat = Tensor::cat(&views, 2)?;

        let (boxes, classes) = match self.layout {
            SplitLayout::Grouped => {
                let parts = split_channels(&x_cat, &[4 * self.reg_max, self.nc], 1)?;
                (parts[0].clone(), parts[1].clone())
            }
            SplitLayout::Flat => {
                let boxes = x_cat.narrow(1, 0, 4 * self.reg_max)?;
                let classes = x_cat.narrow(1, 4 * self.reg_max, self.nc)?;
                (boxes, classes)
            }
        };

        Ok((
            self.dfl.forward(&boxes)?,
            candle_nn::ops::sigmoid(&classes)?,
        ))
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

impl Block for TraceableDetect {
    fn type_tag(&self) -> &'static str {
        "TraceableDetect"
    }

    fn forward(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        let (boxes_pre, class_scores) = self.bundle(xs)?;
        Ok(BlockOutput::Many(vec![boxes_pre, class_scores]))
    }

    fn forward_train(&self, xs: &[Tensor]) -> GraphResult<BlockOutput> {
        Ok(BlockOutput::Many(self.scale_features(xs, true)?))
    }

    fn named_parameters(&self) -> Vec<(String, Tensor)> {
        TraceableDetect::named_parameters(self)
    }

    fn relocate(&mut self, device: &Device) -> GraphResult<()> {
        TraceableDetect::relocate(self, device)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
