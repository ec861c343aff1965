//! One-time registration of the patched validators.

use std::sync::{Arc, OnceLock};

use trace_graph_core::registry::{self, ValidatorFactory};
use trace_graph_core::traits::Task;

use super::{
    BaseDetectionValidator, BaseSegmentationValidator, PatchedDetectionValidator,
    PatchedSegmentationValidator,
};

static REGISTERED: OnceLock<()> = OnceLock::new();

/// Point the task routing table at the patched validators.
///
/// Idempotent: repeated calls leave the table untouched. Existing
/// task-dispatch code resolves validators through the registry, so no
/// call site changes.
pub fn register_patched_validators() {
    REGISTERED.get_or_init(|| {
        let detect: ValidatorFactory = Arc::new(|_args, model| {
            let base = Box::new(BaseDetectionValidator::new(4 + model.class_count()));
            Ok(Box::new(PatchedDetectionValidator::new(base, model)))
        });
        registry::register_validator(Task::Detect, detect);

        let segment: ValidatorFactory = Arc::new(|_args, model| {
            let base = Box::new(BaseSegmentationValidator::new(4 + model.class_count()));
            Ok(Box::new(PatchedSegmentationValidator::new(base, model)))
        });
        registry::register_validator(Task::Segment, segment);

        tracing::debug!("patched validators registered");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_idempotent() {
        register_patched_validators();
        register_patched_validators();
        let tasks = registry::registered_tasks();
        assert!(tasks.contains(&Task::Detect));
        assert!(tasks.contains(&Task::Segment));
    }
}
