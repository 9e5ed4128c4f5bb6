use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The four kinds of asynchronous work the orchestrator dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    PipelineExecution,
    MlTraining,
    MlInference,
    DigitalTwinUpdate,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineExecution => "pipeline-execution",
            Self::MlTraining => "ml-training",
            Self::MlInference => "ml-inference",
            Self::DigitalTwinUpdate => "digital-twin-update",
        }
    }
}

/// Status transitions follow the monotonic order
/// `Queued -> Scheduled -> Spawned -> Executing -> {Completed | Failed}`.
/// Only `Executing -> Queued` (explicit requeue) moves backward; `Completed`
/// and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Scheduled,
    Spawned,
    Executing,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Scheduled => "scheduled",
            Self::Spawned => "spawned",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Scheduled => 1,
            Self::Spawned => 2,
            Self::Executing => 3,
            Self::Completed => 4,
            Self::Failed => 4,
        }
    }

    /// Whether `self -> next` is a legal transition under the invariant in
    /// `WorkTask`'s doc comment: monotonic, except the explicit requeue from
    /// `Executing` back to `Queued`, and no transition out of a terminal
    /// state.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        if matches!(self, Self::Completed | Self::Failed) {
            return false;
        }
        if self == Self::Executing && next == Self::Queued {
            return true;
        }
        next.rank() >= self.rank()
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The type-specific payload of a `WorkTask`, modeled as a tagged union per
/// the task's `type`. Workers fail fast on startup if a task arrives with a
/// variant they don't recognize (deserialization itself enforces that).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskSpec {
    PipelineExecution {
        pipeline_id: String,
        parameters: std::collections::HashMap<String, Value>,
    },
    MlTraining {
        model_id: String,
        storage_ids: Vec<String>,
    },
    MlInference {
        model_id: String,
        storage_ids: Vec<String>,
    },
    DigitalTwinUpdate {
        twin_id: String,
        deltas: Vec<Value>,
    },
}

impl TaskSpec {
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::PipelineExecution { .. } => TaskType::PipelineExecution,
            Self::MlTraining { .. } => TaskType::MlTraining,
            Self::MlInference { .. } => TaskType::MlInference,
            Self::DigitalTwinUpdate { .. } => TaskType::DigitalTwinUpdate,
        }
    }
}

/// A unit of asynchronous work tracked end to end by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WorkTask {
    pub id: String,
    pub project_id: String,
    pub task_spec: TaskSpec,
    pub status: TaskStatus,
    pub worker_job_name: Option<String>,
    pub error_message: Option<String>,
    pub output_location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub attempt_count: u32,
}

impl WorkTask {
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, task_spec: TaskSpec) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            project_id: project_id.into(),
            task_spec,
            status: TaskStatus::Queued,
            worker_job_name: None,
            error_message: None,
            output_location: None,
            created_at: now,
            updated_at: now,
            attempt_count: 0,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_spec.task_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_monotonic() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Scheduled));
        assert!(TaskStatus::Scheduled.can_transition_to(TaskStatus::Spawned));
        assert!(!TaskStatus::Spawned.can_transition_to(TaskStatus::Queued));
        assert!(TaskStatus::Executing.can_transition_to(TaskStatus::Queued));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Executing));
    }

    #[test]
    fn new_task_starts_queued_with_no_attempts() {
        let task = WorkTask::new(
            "wt-1",
            "proj-1",
            TaskSpec::PipelineExecution {
                pipeline_id: "pipe-1".into(),
                parameters: Default::default(),
            },
        );
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.attempt_count, 0);
        assert_eq!(task.task_type(), TaskType::PipelineExecution);
    }
}
