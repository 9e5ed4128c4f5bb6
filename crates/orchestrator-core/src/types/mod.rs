//! Core data model: the entities persisted by the MetadataStore and passed
//! between the Queue, Scheduler, WorkerSpawner, and PipelineEngine.

mod digital_twin;
mod ml_model;
mod pipeline;
mod plugin;
mod schedule;
mod work_task;

pub use digital_twin::{DigitalTwin, TwinEntity};
pub use ml_model::{MlModel, ModelStatus, TrainingCurvePoint, TrainingMetrics};
pub use pipeline::{Pipeline, Step};
pub use plugin::{PluginRecord, PluginStatus};
pub use schedule::Schedule;
pub use work_task::{TaskSpec, TaskStatus, TaskType, WorkTask};
