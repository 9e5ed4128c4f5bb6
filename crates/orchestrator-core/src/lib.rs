//! Orchestration core for a distributed AI/ML pipeline platform.
//!
//! ```text
//! Scheduler ──Enqueue──▶ Queue ──Dequeue──▶ WorkerSpawner ──create job──▶ Cluster
//!    ▲                                            │
//!    │                                            ▼
//! MetadataStore ◀────────── Worker (PipelineEngine / TrainerFactory) ──── reconciliation
//! ```
//!
//! `MetadataStore` is the single shared, durable source of truth; the
//! Queue and PipelineContext are in-process and transient. A worker is a
//! separate OS process that fetches its WorkTask, runs a `PipelineEngine`
//! or `Trainer`, and reconciles its outcome back over HTTP.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use orchestrator_core::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
//! let queue = Arc::new(Queue::new(store.clone()));
//! let cluster: Arc<dyn ClusterClient> = Arc::new(StaticClusterClient::default());
//! let spawner = WorkerSpawner::new(store, queue, cluster, SpawnerConfig::default());
//! spawner.tick().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod pipeline;
pub mod plugin;
pub mod queue;
pub mod scheduler;
pub mod spawner;
pub mod store;
pub mod trainer;
pub mod types;

pub use error::{OrchestratorError, Result};
pub use pipeline::{PipelineContext, PipelineEngine, PipelineResult};
pub use plugin::{Plugin, PluginError, PluginRegistry, RegistryError};
pub use queue::Queue;
pub use scheduler::{Scheduler, SchedulerConfig};
pub use spawner::{ClusterClient, SpawnerConfig, StaticClusterClient, WorkerSpawner};
pub use store::{InMemoryMetadataStore, ListFilter, MetadataStore, SqliteMetadataStore, StoreError};
pub use trainer::{Trainer, TrainerError, TrainerFactory, TrainingResult, UnimplementedTrainer};
pub use types::*;

pub mod prelude {
    pub use crate::error::{OrchestratorError, Result};
    pub use crate::pipeline::{PipelineContext, PipelineEngine, PipelineResult};
    pub use crate::plugin::{Plugin, PluginRegistry};
    pub use crate::queue::Queue;
    pub use crate::scheduler::{Scheduler, SchedulerConfig};
    pub use crate::spawner::{ClusterClient, SpawnerConfig, StaticClusterClient, WorkerSpawner};
    pub use crate::store::{InMemoryMetadataStore, MetadataStore, SqliteMetadataStore};
    pub use crate::trainer::{Trainer, TrainerFactory};
    pub use crate::types::*;
}
