//! Environment contract for the one-shot worker process, per §4.6: fatal if
//! any of the three variables is unset.

use orchestrator_core::TaskType;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub work_task_id: String,
    pub task_type: TaskType,
    pub orchestrator_url: String,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let work_task_id = require_env("WORKTASK_ID")?;
        let task_type_raw = require_env("WORKTASK_TYPE")?;
        let orchestrator_url = require_env("ORCHESTRATOR_URL")?;

        let task_type = parse_task_type(&task_type_raw)
            .ok_or_else(|| anyhow::anyhow!("unrecognized WORKTASK_TYPE: {task_type_raw}"))?;

        Ok(Self {
            work_task_id,
            task_type,
            orchestrator_url,
        })
    }
}

fn require_env(key: &str) -> anyhow::Result<String> {
    std::env::var(key).map_err(|_| anyhow::anyhow!("{key} environment variable required"))
}

fn parse_task_type(raw: &str) -> Option<TaskType> {
    match raw {
        "pipeline-execution" => Some(TaskType::PipelineExecution),
        "ml-training" => Some(TaskType::MlTraining),
        "ml-inference" => Some(TaskType::MlInference),
        "digital-twin-update" => Some(TaskType::DigitalTwinUpdate),
        _ => None,
    }
}
