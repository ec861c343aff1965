//! Task → validator routing table.
//!
//! Existing dispatch code resolves a validator by task name; patching the
//! validation path means swapping the entry for a task. The table is a
//! process-wide registry written at setup time and read-only afterwards,
//! the same single-writer discipline as the working device.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::config::ValArgs;
use crate::error::{GraphError, GraphResult};
use crate::traits::{ModelInfo, Task, Validator};

/// Builds a validator for a resolved argument set and model descriptor.
pub type ValidatorFactory =
    Arc<dyn Fn(ValArgs, Arc<dyn ModelInfo>) -> GraphResult<Box<dyn Validator>> + Send + Sync>;

static TASK_ROUTES: OnceLock<RwLock<HashMap<Task, ValidatorFactory>>> = OnceLock::new();

fn routes() -> &'static RwLock<HashMap<Task, ValidatorFactory>> {
    TASK_ROUTES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register (or re-register) the validator factory for a task.
///
/// Setup-time only: last writer wins, and repeated registration of the
/// same factory is a no-op in effect. Callers that need call-once
/// semantics guard with their own `OnceLock` (see the detect crate's
/// registration routine).
pub fn register_validator(task: Task, factory: ValidatorFactory) {
    routes().write().insert(task, factory);
    tracing::debug!(%task, "validator registered");
}

/// Resolve the validator for `task`.
pub fn validator_for(
    task: Task,
    args: ValArgs,
    model: Arc<dyn ModelInfo>,
) -> GraphResult<Box<dyn Validator>> {
    let factory = routes()
        .read()
        .get(&task)
        .cloned()
        .ok_or_else(|| GraphError::Config {
            message: format!("no validator registered for task '{task}'"),
        })?;
    factory(args, model)
}

/// Tasks that currently have a registered validator.
pub fn registered_tasks() -> Vec<Task> {
    routes().read().keys().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::TensorValue;

    struct Echo(Task);

    impl Validator for Echo {
        fn task(&self) -> Task {
            self.0
        }

        fn postprocess(&self, preds: TensorValue) -> GraphResult<TensorValue> {
            Ok(preds)
        }
    }

    struct NoInfo;

    impl ModelInfo for NoInfo {
        fn strides(&self) -> &[usize] {
            &[]
        }

        fn class_count(&self) -> usize {
            0
        }

        fn class_names(&self) -> &[String] {
            &[]
        }

        fn image_size(&self) -> usize {
            0
        }
    }

    fn echo_factory() -> ValidatorFactory {
        Arc::new(|_args, _model| Ok(Box::new(Echo(Task::Classify))))
    }

    #[test]
    fn test_register_and_resolve() {
        register_validator(Task::Classify, echo_factory());
        let validator = validator_for(
            Task::Classify,
            ValArgs::default(),
            Arc::new(NoInfo),
        )
        .unwrap();
        assert_eq!(validator.task(), Task::Classify);
        assert!(registered_tasks().contains(&Task::Classify));
    }

    #[test]
    fn test_unregistered_task_is_a_config_error() {
        // Segment is never registered by this crate's tests.
        let err = validator_for(Task::Segment, ValArgs::default(), Arc::new(NoInfo)).unwrap_err();
        assert!(format!("{err}").contains("segment"));
    }

    #[test]
    fn test_reregistration_replaces_entry() {
        register_validator(Task::Classify, echo_factory());
        register_validator(Task::Classify, echo_factory());
        assert_eq!(
            registered_tasks()
                .iter()
                .filter(|t| **t == Task::Classify)
                .count(),
            1
        );
    }
}
