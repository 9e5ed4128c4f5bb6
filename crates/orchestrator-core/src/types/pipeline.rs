use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One operation in a pipeline: an action dispatched on a plugin, with
/// parameter expressions resolved against the `PipelineContext` and outputs
/// written back into it under this step's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Step {
    pub name: String,
    #[serde(default = "default_plugin")]
    pub plugin: String,
    pub action: String,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default)]
    pub output: HashMap<String, String>,
}

fn default_plugin() -> String {
    "default/builtin".to_string()
}

/// A declarative, ordered program executed by the `PipelineEngine`.
///
/// Invariant: step names are unique within a pipeline; this is checked by
/// `Pipeline::validate` rather than at construction, since pipelines are
/// commonly built incrementally before being persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// Checks the step-name-uniqueness invariant. Called before a pipeline
    /// is persisted and before an execution begins.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(format!("duplicate step name: {}", step.name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str) -> Step {
        Step {
            name: name.to_string(),
            plugin: default_plugin(),
            action: "run".to_string(),
            parameters: HashMap::new(),
            output: HashMap::new(),
        }
    }

    #[test]
    fn rejects_duplicate_step_names() {
        let pipeline = Pipeline {
            id: "p1".into(),
            name: "demo".into(),
            steps: vec![step("a"), step("a")],
        };
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn step_index_finds_by_name() {
        let pipeline = Pipeline {
            id: "p1".into(),
            name: "demo".into(),
            steps: vec![step("a"), step("b"), step("c")],
        };
        assert_eq!(pipeline.step_index("b"), Some(1));
        assert_eq!(pipeline.step_index("z"), None);
    }
}
