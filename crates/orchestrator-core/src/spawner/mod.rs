//! WorkerSpawner: the autoscaling control loop. Turns queued WorkTasks
//! into running worker jobs on an external container cluster.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::queue::Queue;
use crate::store::MetadataStore;
use crate::types::{TaskStatus, TaskType, WorkTask};

#[derive(Debug, Clone)]
pub struct SpawnerConfig {
    pub min_workers: u32,
    pub max_workers: u32,
    pub queue_threshold: u32,
    pub tick_interval: Duration,
    pub worker_image: String,
    pub orchestrator_url: String,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            min_workers: 0,
            max_workers: 10,
            queue_threshold: 5,
            tick_interval: Duration::from_secs(5),
            worker_image: "orchestrator/worker:latest".to_string(),
            orchestrator_url: "http://localhost:8080".to_string(),
        }
    }
}

/// External capability that creates and counts worker jobs on a container
/// cluster. Treated entirely as a collaborator: this crate never assumes
/// anything about the cluster technology behind it.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn create_worker_job(
        &self,
        task_id: &str,
        task_type: TaskType,
        image: &str,
        orchestrator_url: &str,
    ) -> Result<String, String>;

    async fn get_active_worker_count(&self) -> Result<u32, String>;
}

/// The admission predicate from §4.4: floor, then ceiling, then demand.
pub fn should_spawn(queue_length: u32, active_workers: u32, config: &SpawnerConfig) -> bool {
    if active_workers < config.min_workers && queue_length > 0 {
        return true;
    }
    if active_workers >= config.max_workers {
        return false;
    }
    queue_length > config.queue_threshold
}

pub struct WorkerSpawner {
    store: Arc<dyn MetadataStore>,
    queue: Arc<Queue>,
    cluster: Arc<dyn ClusterClient>,
    config: SpawnerConfig,
}

impl WorkerSpawner {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        queue: Arc<Queue>,
        cluster: Arc<dyn ClusterClient>,
        config: SpawnerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            cluster,
            config,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    // Tick errors are logged and elided; the loop continues
                    // next interval regardless.
                    self.tick().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("spawner shutting down");
                        return;
                    }
                }
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let queue_length = self.queue.queue_length() as u32;
        if queue_length == 0 {
            return;
        }

        let active_workers = match self.cluster.get_active_worker_count().await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "failed to read active worker count");
                return;
            }
        };

        if !should_spawn(queue_length, active_workers, &self.config) {
            debug!(queue_length, active_workers, "admission predicate declined to spawn");
            return;
        }

        let Some(task_id) = self.queue.dequeue() else {
            return;
        };

        if let Err(e) = self
            .queue
            .update_work_task_status(&task_id, TaskStatus::Scheduled, None)
            .await
        {
            error!(error = %e, task_id = %task_id, "failed to mark task scheduled");
            return;
        }

        if let Err(e) = self.spawn_worker_for(&task_id).await {
            error!(error = %e, task_id = %task_id, "failed to spawn worker");
        }
    }

    async fn spawn_worker_for(&self, task_id: &str) -> Result<(), String> {
        let task = self
            .store
            .get_work_task(task_id)
            .await
            .map_err(|e| e.to_string())?;

        match self
            .cluster
            .create_worker_job(
                task_id,
                task.task_type(),
                &self.config.worker_image,
                &self.config.orchestrator_url,
            )
            .await
        {
            Ok(job_name) => {
                self.mark_spawned(&task, job_name).await;
                Ok(())
            }
            Err(e) => {
                warn!(task_id, error = %e, "cluster refused to create worker job");
                self.mark_failed(&task, &e).await;
                Err(e)
            }
        }
    }

    async fn mark_spawned(&self, task: &WorkTask, job_name: String) {
        let mut updated = task.clone();
        updated.status = TaskStatus::Spawned;
        updated.worker_job_name = Some(job_name);
        updated.updated_at = chrono::Utc::now();
        if let Err(e) = self.store.save_work_task(&updated).await {
            error!(error = %e, task_id = %task.id, "failed to persist spawned status");
        }
    }

    async fn mark_failed(&self, task: &WorkTask, error: &str) {
        let mut updated = task.clone();
        updated.status = TaskStatus::Failed;
        updated.error_message = Some(error.to_string());
        updated.updated_at = chrono::Utc::now();
        if let Err(e) = self.store.save_work_task(&updated).await {
            error!(error = %e, task_id = %task.id, "failed to persist failed status");
        }
    }
}

/// In-memory `ClusterClient` test double, also useful as a starting point
/// for a local/dev deployment that has no real cluster behind it.
pub struct StaticClusterClient {
    active: std::sync::atomic::AtomicU32,
    created: parking_lot::Mutex<Vec<String>>,
    fail_create: std::sync::atomic::AtomicBool,
}

impl Default for StaticClusterClient {
    fn default() -> Self {
        Self {
            active: std::sync::atomic::AtomicU32::new(0),
            created: parking_lot::Mutex::new(Vec::new()),
            fail_create: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl StaticClusterClient {
    pub fn with_active_workers(n: u32) -> Self {
        let client = Self::default();
        client.active.store(n, std::sync::atomic::Ordering::SeqCst);
        client
    }

    pub fn set_active(&self, n: u32) {
        self.active.store(n, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn created_job_names(&self) -> Vec<String> {
        self.created.lock().clone()
    }
}

#[async_trait]
impl ClusterClient for StaticClusterClient {
    async fn create_worker_job(
        &self,
        task_id: &str,
        _task_type: TaskType,
        _image: &str,
        _orchestrator_url: &str,
    ) -> Result<String, String> {
        if self.fail_create.load(std::sync::atomic::Ordering::SeqCst) {
            return Err("cluster refused capacity".to_string());
        }
        let job_name = format!("worker-job-{}-{}", task_id, Uuid::now_v7());
        self.created.lock().push(job_name.clone());
        info!(job_name = %job_name, "created worker job");
        Ok(job_name)
    }

    async fn get_active_worker_count(&self) -> Result<u32, String> {
        Ok(self.active.load(std::sync::atomic::Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryMetadataStore;
    use crate::types::TaskSpec;

    fn config(min: u32, max: u32, threshold: u32) -> SpawnerConfig {
        SpawnerConfig {
            min_workers: min,
            max_workers: max,
            queue_threshold: threshold,
            ..SpawnerConfig::default()
        }
    }

    fn task(id: &str) -> WorkTask {
        WorkTask::new(
            id,
            "proj",
            TaskSpec::PipelineExecution {
                pipeline_id: "p1".into(),
                parameters: Default::default(),
            },
        )
    }

    #[test]
    fn floor_enforcement() {
        let cfg = config(2, 10, 5);
        assert!(should_spawn(1, 0, &cfg));
    }

    #[test]
    fn threshold_gating() {
        let cfg = config(0, 10, 5);
        assert!(!should_spawn(3, 0, &cfg));
        assert!(should_spawn(6, 0, &cfg));
    }

    #[test]
    fn ceiling_caps_spawning() {
        let cfg = config(0, 2, 0);
        assert!(should_spawn(10, 0, &cfg));
        assert!(should_spawn(10, 1, &cfg));
        assert!(!should_spawn(10, 2, &cfg));
    }

    #[tokio::test]
    async fn floor_scenario_spawns_then_stops_on_empty_queue() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let queue = Arc::new(Queue::new(store.clone()));
        let cluster: Arc<dyn ClusterClient> = Arc::new(StaticClusterClient::with_active_workers(0));
        let spawner = WorkerSpawner::new(store.clone(), queue.clone(), cluster, config(2, 10, 5));

        queue.enqueue(task("wt-1")).await.unwrap();
        spawner.tick().await;

        let updated = store.get_work_task("wt-1").await.unwrap();
        assert_eq!(updated.status, TaskStatus::Spawned);
        assert!(updated.worker_job_name.is_some());

        // Second tick, empty queue: no spawn, no panic.
        spawner.tick().await;
        assert_eq!(queue.queue_length(), 0);
    }

    #[tokio::test]
    async fn ceiling_scenario_stops_spawning_at_max() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let queue = Arc::new(Queue::new(store.clone()));
        let cluster = Arc::new(StaticClusterClient::default());
        let cluster_dyn: Arc<dyn ClusterClient> = cluster.clone();
        let spawner = WorkerSpawner::new(store.clone(), queue.clone(), cluster_dyn, config(0, 2, 0));

        for i in 0..3 {
            queue.enqueue(task(&format!("wt-{i}"))).await.unwrap();
        }

        cluster.set_active(0);
        spawner.tick().await;
        cluster.set_active(1);
        spawner.tick().await;
        cluster.set_active(2);
        spawner.tick().await;

        assert_eq!(cluster.created_job_names().len(), 2);
        assert_eq!(queue.queue_length(), 1);
    }

    #[tokio::test]
    async fn cluster_create_failure_marks_task_failed_without_retry() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let queue = Arc::new(Queue::new(store.clone()));
        let cluster = Arc::new(StaticClusterClient::default());
        cluster.set_fail_create(true);
        let cluster_dyn: Arc<dyn ClusterClient> = cluster;
        let spawner = WorkerSpawner::new(store.clone(), queue.clone(), cluster_dyn, config(1, 10, 0));

        queue.enqueue(task("wt-1")).await.unwrap();
        spawner.tick().await;

        let updated = store.get_work_task("wt-1").await.unwrap();
        assert_eq!(updated.status, TaskStatus::Failed);
        assert!(updated.error_message.is_some());
    }
}
