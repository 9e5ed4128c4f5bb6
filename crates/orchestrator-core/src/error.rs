//! Error taxonomy shared across the orchestration core.

use thiserror::Error;

/// The error kinds enumerated for the orchestration core.
///
/// Each subsystem returns this type (or a type that converts into it at the
/// boundary) rather than inventing its own ad-hoc error enum, so that the
/// server and worker binaries have a single mapping to HTTP status codes
/// and exit codes.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal status transition: {from} -> {to}")]
    Conflict { from: String, to: String },

    #[error("validation failed: {0}")]
    ValidationFailure(String),

    #[error("plugin resolution failed: {0}")]
    PluginResolutionFailure(String),

    #[error("plugin execution failed: {0}")]
    PluginExecutionFailure(String),

    #[error("template resolution failed: {0}")]
    TemplateResolutionFailure(String),

    #[error("pipeline context exceeded {limit} bytes")]
    ContextOverflow { limit: usize },

    #[error("store busy, retries exhausted: {0}")]
    StoreBusy(String),

    #[error("store failure: {0}")]
    StoreFailure(String),

    #[error("cluster refused to create worker job: {0}")]
    ClusterCapacity(String),

    #[error("transient cluster error: {0}")]
    ClusterTransient(String),

    #[error("worker communication failure: {0}")]
    WorkerCommunication(String),

    #[error("unsupported model type: {0}")]
    UnsupportedModelType(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::StoreBusy(_))
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
