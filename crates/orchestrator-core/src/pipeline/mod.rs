//! PipelineEngine: the step interpreter that runs inside a worker process.

mod context;
mod template;

pub use context::PipelineContext;

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::error::OrchestratorError;
use crate::plugin::PluginRegistry;
use crate::store::MetadataStore;
use crate::types::{Pipeline, TaskSpec, WorkTask};

/// Key a plugin's result map may use to redirect the interpreter. Per
/// §4.5.4.f, an absent key means fall through to `index + 1`.
const GOTO_KEY: &str = "goto";

#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub pipeline_id: String,
    pub executed_step_count: usize,
    pub executed_steps: Vec<String>,
    pub duration: std::time::Duration,
}

pub struct PipelineEngine {
    store: Arc<dyn MetadataStore>,
    registry: PluginRegistry,
    context_max_bytes: usize,
}

impl PipelineEngine {
    pub fn new(store: Arc<dyn MetadataStore>, registry: PluginRegistry, context_max_bytes: usize) -> Self {
        Self {
            store,
            registry,
            context_max_bytes,
        }
    }

    #[instrument(skip(self, task))]
    pub async fn execute(&self, task: &WorkTask) -> Result<PipelineResult, OrchestratorError> {
        let TaskSpec::PipelineExecution {
            pipeline_id,
            parameters,
        } = &task.task_spec
        else {
            return Err(OrchestratorError::ValidationFailure(
                "pipeline engine invoked on a non-pipeline-execution task".to_string(),
            ));
        };

        let pipeline = self
            .store
            .get_pipeline(pipeline_id)
            .await
            .map_err(|e| OrchestratorError::NotFound(e.to_string()))?;
        pipeline
            .validate()
            .map_err(OrchestratorError::ValidationFailure)?;

        let mut ctx = PipelineContext::new(self.context_max_bytes);
        ctx.seed_parameters(parameters.clone())?;

        self.prefetch_plugins(&pipeline);

        let started = Instant::now();
        let executed_steps = self.run_steps(&pipeline, &mut ctx).await?;

        Ok(PipelineResult {
            pipeline_id: pipeline.id,
            executed_step_count: executed_steps.len(),
            executed_steps,
            duration: started.elapsed(),
        })
    }

    /// Resolves every distinct non-builtin plugin a pipeline references
    /// before execution begins, logging (but not failing on) any that
    /// can't be resolved — a step that actually dispatches to one of them
    /// fails at that point instead, per §4.5 step 3.
    fn prefetch_plugins(&self, pipeline: &Pipeline) {
        let mut seen = std::collections::HashSet::new();
        for step in &pipeline.steps {
            if step.plugin == "default/builtin" || !seen.insert(step.plugin.clone()) {
                continue;
            }
            if self.registry.resolve(&step.plugin).is_err() {
                warn!(plugin = %step.plugin, "plugin could not be resolved ahead of execution");
            }
        }
    }

    async fn run_steps(
        &self,
        pipeline: &Pipeline,
        ctx: &mut PipelineContext,
    ) -> Result<Vec<String>, OrchestratorError> {
        let mut executed = Vec::new();
        let mut index = 0usize;
        while index < pipeline.steps.len() {
            let step = &pipeline.steps[index];

            let plugin = self
                .registry
                .resolve(&step.plugin)
                .map_err(|e| OrchestratorError::PluginResolutionFailure(e.to_string()))?;

            let resolved_parameters = resolve_parameters(&step.parameters, ctx);

            let result = plugin
                .execute(&step.action, &resolved_parameters, ctx)
                .await
                .map_err(|e| OrchestratorError::PluginExecutionFailure(e.to_string()))?;

            for (key, value) in &result {
                ctx.set(&step.name, key, value.clone())?;
            }

            for (output_key, output_template) in &step.output {
                let resolved = template::resolve(output_template, ctx);
                ctx.set(&step.name, output_key, serde_json::Value::String(resolved))?;
            }

            executed.push(step.name.clone());

            match result.get(GOTO_KEY).and_then(|v| v.as_str()) {
                Some(target) => {
                    index = pipeline.step_index(target).ok_or_else(|| {
                        OrchestratorError::ValidationFailure(format!("goto target not found: {target}"))
                    })?;
                }
                None => index += 1,
            }
        }
        info!(step_count = executed.len(), "pipeline execution complete");
        Ok(executed)
    }
}

fn resolve_parameters(
    parameters: &std::collections::HashMap<String, serde_json::Value>,
    ctx: &PipelineContext,
) -> std::collections::HashMap<String, serde_json::Value> {
    parameters
        .iter()
        .map(|(k, v)| {
            let resolved = match v {
                serde_json::Value::String(s) => serde_json::Value::String(template::resolve(s, ctx)),
                other => other.clone(),
            };
            (k.clone(), resolved)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{Plugin, PluginError};
    use crate::store::InMemoryMetadataStore;
    use crate::types::{Step, TaskSpec};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct RecordingPlugin;

    #[async_trait]
    impl Plugin for RecordingPlugin {
        fn plugin_name(&self) -> &str {
            "recording"
        }
        fn plugin_type(&self) -> &str {
            "builtin"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        fn validate_config(&self, _config: &serde_json::Value) -> Result<(), PluginError> {
            Ok(())
        }
        async fn execute(
            &self,
            action: &str,
            parameters: &HashMap<String, serde_json::Value>,
            _context: &PipelineContext,
        ) -> Result<HashMap<String, serde_json::Value>, PluginError> {
            let mut result = parameters.clone();
            result.insert("action".to_string(), serde_json::json!(action));
            Ok(result)
        }
    }

    struct GotoPlugin;

    #[async_trait]
    impl Plugin for GotoPlugin {
        fn plugin_name(&self) -> &str {
            "goto"
        }
        fn plugin_type(&self) -> &str {
            "builtin"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({})
        }
        fn validate_config(&self, _config: &serde_json::Value) -> Result<(), PluginError> {
            Ok(())
        }
        async fn execute(
            &self,
            _action: &str,
            parameters: &HashMap<String, serde_json::Value>,
            _context: &PipelineContext,
        ) -> Result<HashMap<String, serde_json::Value>, PluginError> {
            Ok(parameters.clone())
        }
    }

    fn step(name: &str, plugin: &str) -> Step {
        Step {
            name: name.to_string(),
            plugin: plugin.to_string(),
            action: "run".to_string(),
            parameters: HashMap::new(),
            output: HashMap::new(),
        }
    }

    async fn setup(pipeline: Pipeline, registry: PluginRegistry) -> (PipelineEngine, WorkTask) {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        store.save_pipeline(&pipeline).await.unwrap();
        let engine = PipelineEngine::new(store.clone(), registry, 10 * 1024 * 1024);
        let task = WorkTask::new(
            "wt-1",
            "proj",
            TaskSpec::PipelineExecution {
                pipeline_id: pipeline.id.clone(),
                parameters: HashMap::new(),
            },
        );
        (engine, task)
    }

    #[tokio::test]
    async fn executes_steps_in_declared_order() {
        let registry = PluginRegistry::new();
        registry.register_static("recorder", || Arc::new(RecordingPlugin));
        let pipeline = Pipeline {
            id: "p1".into(),
            name: "demo".into(),
            steps: vec![step("a", "recorder"), step("b", "recorder"), step("c", "recorder")],
        };
        let (engine, task) = setup(pipeline, registry).await;
        let result = engine.execute(&task).await.unwrap();
        assert_eq!(result.executed_steps, vec!["a", "b", "c"]);
        assert_eq!(result.executed_step_count, 3);
    }

    #[tokio::test]
    async fn goto_skips_intermediate_steps() {
        let registry = PluginRegistry::new();
        registry.register_static("goto", || Arc::new(GotoPlugin));

        let mut a = step("a", "goto");
        a.parameters.insert("goto".to_string(), serde_json::json!("c"));
        let pipeline = Pipeline {
            id: "p1".into(),
            name: "demo".into(),
            steps: vec![a, step("b", "goto"), step("c", "goto")],
        };
        let (engine, task) = setup(pipeline, registry).await;
        let result = engine.execute(&task).await.unwrap();
        assert_eq!(result.executed_steps, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn unknown_plugin_fails_the_step() {
        let registry = PluginRegistry::new();
        let pipeline = Pipeline {
            id: "p1".into(),
            name: "demo".into(),
            steps: vec![step("a", "nonexistent")],
        };
        let (engine, task) = setup(pipeline, registry).await;
        let err = engine.execute(&task).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::PluginResolutionFailure(_)));
    }

    #[tokio::test]
    async fn goto_to_missing_step_fails() {
        let registry = PluginRegistry::new();
        registry.register_static("goto", || Arc::new(GotoPlugin));
        let mut a = step("a", "goto");
        a.parameters.insert("goto".to_string(), serde_json::json!("nowhere"));
        let pipeline = Pipeline {
            id: "p1".into(),
            name: "demo".into(),
            steps: vec![a],
        };
        let (engine, task) = setup(pipeline, registry).await;
        let err = engine.execute(&task).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ValidationFailure(_)));
    }
}
