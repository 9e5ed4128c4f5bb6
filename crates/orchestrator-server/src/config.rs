//! Environment-driven configuration for the orchestrator server binary.
//!
//! Every field has a default so the server runs out of the box in a
//! single-process dev setup; production deployments override via env vars.

use std::time::Duration;

use orchestrator_core::{SchedulerConfig, SpawnerConfig};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub bind_addr: String,
    pub storage_dir: String,
    pub context_max_bytes: usize,
    pub spawner: SpawnerConfig,
    pub scheduler: SchedulerConfig,
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let storage_dir = std::env::var("ORCH_STORAGE_DIR").unwrap_or_else(|_| "./data".to_string());
        let context_max_bytes = env_usize("ORCH_CONTEXT_MAX_BYTES", 10 * 1024 * 1024);

        let spawner = SpawnerConfig {
            min_workers: env_u32("ORCH_MIN_WORKERS", 0),
            max_workers: env_u32("ORCH_MAX_WORKERS", 10),
            queue_threshold: env_u32("ORCH_QUEUE_THRESHOLD", 5),
            tick_interval: Duration::from_secs(env_u64("ORCH_SPAWNER_TICK_SECS", 5)),
            worker_image: std::env::var("ORCH_WORKER_IMAGE")
                .unwrap_or_else(|_| "orchestrator/worker:latest".to_string()),
            orchestrator_url: std::env::var("ORCH_SELF_URL")
                .unwrap_or_else(|_| format!("http://{bind_addr}")),
        };

        let scheduler = SchedulerConfig {
            tick_interval: Duration::from_secs(env_u64("ORCH_SCHEDULER_TICK_SECS", 1)),
        };

        Self {
            bind_addr,
            storage_dir,
            context_max_bytes,
            spawner,
            scheduler,
        }
    }

    pub fn sqlite_path(&self) -> String {
        format!("{}/orchestrator.db", self.storage_dir)
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
