//! Task identifiers for routing.

use serde::{Deserialize, Serialize};

/// The task a model was trained for. Keys the validator routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    #[default]
    Detect,
    Segment,
    Classify,
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Task::Detect => "detect",
            Task::Segment => "segment",
            Task::Classify => "classify",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(serde_json::to_string(&Task::Segment).unwrap(), "\"segment\"");
        let task: Task = serde_json::from_str("\"detect\"").unwrap();
        assert_eq!(task, Task::Detect);
    }

    #[test]
    fn test_display() {
        assert_eq!(Task::Classify.to_string(), "classify");
    }
}
