//! MetadataStore: the single-writer durable record of pipelines, schedules,
//! work tasks, plugins, ML models, and digital twins.

mod memory;
mod retry;
mod sqlite;

pub use memory::InMemoryMetadataStore;
pub use retry::{retry_on_busy, BusyRetryPolicy, IsBusy};
pub use sqlite::SqliteMetadataStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{DigitalTwin, MlModel, Pipeline, PluginRecord, PluginStatus, Schedule, WorkTask};

/// Accepted journal modes for a file-backed store. The constructor of any
/// file-backed `MetadataStore` implementation checks the reported mode
/// against this set and refuses to start otherwise.
pub const ACCEPTED_JOURNAL_MODES: &[&str] = &["wal", "memory"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store busy")]
    Busy,

    #[error("unacceptable journal mode: {0}")]
    UnacceptableJournalMode(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl retry::IsBusy for StoreError {
    fn is_busy(&self) -> bool {
        matches!(self, StoreError::Busy)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // SQLite reports busy/locked conditions through these codes.
            if matches!(db_err.code().as_deref(), Some("5") | Some("6")) {
                return StoreError::Busy;
            }
        }
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Optional filter applied to `List` operations.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub project_id: Option<String>,
}

/// Durable record of every entity in §3 of the specification.
///
/// Implementations must be thread-safe (`Send + Sync`) since the Scheduler,
/// WorkerSpawner, and ReconciliationAPI all hold a shared `Arc<dyn
/// MetadataStore>`. All mutations are atomic at single-entity granularity;
/// plugin saves are a multi-statement transaction (metadata + binary).
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    // WorkTask
    async fn save_work_task(&self, task: &WorkTask) -> Result<(), StoreError>;
    async fn get_work_task(&self, id: &str) -> Result<WorkTask, StoreError>;
    async fn list_work_tasks(&self, filter: ListFilter) -> Result<Vec<WorkTask>, StoreError>;
    async fn delete_work_task(&self, id: &str) -> Result<(), StoreError>;

    // Pipeline
    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<(), StoreError>;
    async fn get_pipeline(&self, id: &str) -> Result<Pipeline, StoreError>;
    async fn list_pipelines(&self, filter: ListFilter) -> Result<Vec<Pipeline>, StoreError>;
    async fn delete_pipeline(&self, id: &str) -> Result<(), StoreError>;

    // Schedule
    async fn save_schedule(&self, schedule: &Schedule) -> Result<(), StoreError>;
    async fn get_schedule(&self, id: &str) -> Result<Schedule, StoreError>;
    async fn list_schedules(&self, filter: ListFilter) -> Result<Vec<Schedule>, StoreError>;
    async fn delete_schedule(&self, id: &str) -> Result<(), StoreError>;
    /// Schedules due to fire at or before `now`. Writers to this table use
    /// the busy-retry path: scheduled-tick saves contend with operator
    /// updates to the same rows.
    async fn list_due_schedules(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Schedule>, StoreError>;

    // Plugins
    async fn save_plugin(&self, meta: &PluginRecord, binary: Option<&[u8]>) -> Result<(), StoreError>;
    async fn get_plugin_binary(&self, name: &str) -> Result<Vec<u8>, StoreError>;
    async fn get_plugin(&self, name: &str) -> Result<PluginRecord, StoreError>;
    async fn update_plugin_status(&self, name: &str, status: PluginStatus) -> Result<(), StoreError>;

    // MLModel
    async fn save_ml_model(&self, model: &MlModel) -> Result<(), StoreError>;
    async fn get_ml_model(&self, id: &str) -> Result<MlModel, StoreError>;
    async fn list_ml_models(&self, filter: ListFilter) -> Result<Vec<MlModel>, StoreError>;
    async fn delete_ml_model(&self, id: &str) -> Result<(), StoreError>;

    // DigitalTwin
    async fn save_digital_twin(&self, twin: &DigitalTwin) -> Result<(), StoreError>;
    async fn get_digital_twin(&self, id: &str) -> Result<DigitalTwin, StoreError>;
    async fn list_digital_twins(&self, filter: ListFilter) -> Result<Vec<DigitalTwin>, StoreError>;
    async fn delete_digital_twin(&self, id: &str) -> Result<(), StoreError>;
}
