//! Per-commit behaviour switches.

use serde::{Deserialize, Serialize};

/// Options applied to every entity written by one commit or transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitOptions {
    /// Commit loaded related entities before their owner.
    pub commit_child_objects: bool,
    /// Publish insert/update/delete events after the commit.
    pub trigger_events: bool,
    /// Entity names that are skipped entirely when reached as children or staged.
    pub ignore_entities: Vec<String>,
    /// When false, storage failures are logged and the commit reports success
    /// after rolling back.
    pub raise_errors: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            commit_child_objects: true,
            trigger_events: true,
            ignore_entities: Vec::new(),
            raise_errors: true,
        }
    }
}

impl CommitOptions {
    pub fn ignores(&self, entity: &str) -> bool {
        self.ignore_entities.iter().any(|e| e == entity)
    }

    #[must_use]
    pub fn ignoring(mut self, entity: &str) -> Self {
        self.ignore_entities.push(entity.to_string());
        self
    }

    #[must_use]
    pub fn without_events(mut self) -> Self {
        self.trigger_events = false;
        self
    }

    #[must_use]
    pub fn without_children(mut self) -> Self {
        self.commit_child_objects = false;
        self
    }

    #[must_use]
    pub fn swallow_errors(mut self) -> Self {
        self.raise_errors = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CommitOptions::default();
        assert!(options.commit_child_objects);
        assert!(options.trigger_events);
        assert!(options.raise_errors);
        assert!(options.ignore_entities.is_empty());
    }

    #[test]
    fn test_builders() {
        let options = CommitOptions::default()
            .ignoring("Department")
            .without_events()
            .swallow_errors();
        assert!(options.ignores("Department"));
        assert!(!options.ignores("Person"));
        assert!(!options.trigger_events);
        assert!(!options.raise_errors);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let options: CommitOptions =
            serde_json::from_str(r#"{"trigger_events": false}"#).unwrap();
        assert!(!options.trigger_events);
        assert!(options.commit_child_objects);
    }
}
