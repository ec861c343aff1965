//! The validator capability.

use crate::bridge::TensorValue;
use crate::error::GraphResult;
use crate::traits::Task;

/// Post-inference validation step.
///
/// Patched implementations accept a model's intermediate output bundle and
/// return output in the layout the unpatched validation path expects, so
/// downstream consumers are unaffected by the surgery.
pub trait Validator: Send + Sync {
    /// The task this validator serves.
    fn task(&self) -> Task;

    /// Transform raw predictions into the final task output.
    fn postprocess(&self, preds: TensorValue) -> GraphResult<TensorValue>;
}

impl std::fmt::Debug for dyn Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator")
            .field("task", &self.task())
            .finish()
    }
}
