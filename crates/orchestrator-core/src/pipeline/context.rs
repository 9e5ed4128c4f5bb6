//! PipelineContext: the per-execution mutable store consulted by template
//! resolution and subsequent steps.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::OrchestratorError;

const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Execution-scoped mutable store, exclusively owned by one worker and
/// destroyed when it exits. Enforces a cumulative serialized-size cap;
/// writes beyond the cap fail the step that attempted them.
pub struct PipelineContext {
    values: HashMap<String, HashMap<String, Value>>,
    max_bytes: usize,
    current_bytes: usize,
}

const PARAMETERS_KEY: &str = "_parameters";

impl PipelineContext {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            values: HashMap::new(),
            max_bytes,
            current_bytes: 0,
        }
    }

    pub fn with_default_cap() -> Self {
        Self::new(DEFAULT_MAX_BYTES)
    }

    /// Seeds `_parameters` from the task's parameters, per §4.5 step 2.
    pub fn seed_parameters(&mut self, parameters: HashMap<String, Value>) -> Result<(), OrchestratorError> {
        for (key, value) in parameters {
            self.set(PARAMETERS_KEY, &key, value)?;
        }
        Ok(())
    }

    /// Writes `scope.key = value`, rejecting the write if it would push the
    /// context's cumulative serialized size past the cap.
    pub fn set(&mut self, scope: &str, key: &str, value: Value) -> Result<(), OrchestratorError> {
        let added = estimate_size(key, &value);
        if self.current_bytes + added > self.max_bytes {
            return Err(OrchestratorError::ContextOverflow {
                limit: self.max_bytes,
            });
        }
        let bucket = self.values.entry(scope.to_string()).or_default();
        if let Some(old) = bucket.get(key) {
            self.current_bytes = self.current_bytes.saturating_sub(estimate_size(key, old));
        }
        bucket.insert(key.to_string(), value);
        self.current_bytes += added;
        Ok(())
    }

    pub fn get(&self, scope: &str, key: &str) -> Option<&Value> {
        self.values.get(scope)?.get(key)
    }

    pub fn scope(&self, scope: &str) -> Option<&HashMap<String, Value>> {
        self.values.get(scope)
    }
}

fn estimate_size(key: &str, value: &Value) -> usize {
    key.len() + serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}
