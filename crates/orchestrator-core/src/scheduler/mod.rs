//! Cron-driven Scheduler: evaluates every enabled Schedule and materializes
//! a pipeline-execution WorkTask when it comes due.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use tokio::sync::watch;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::queue::Queue;
use crate::store::{MetadataStore, StoreError};
use crate::types::{Schedule, TaskSpec, WorkTask};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Tick interval; the spec requires at least once per second.
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Computes the smallest cron instant strictly greater than `after`.
///
/// Open question (see DESIGN.md): a tick where `next_run == now` is treated
/// as due — `list_due_schedules` uses `<=`, and this function always
/// advances strictly past `after`, so a schedule can never fire twice for
/// the same instant.
pub fn next_occurrence(cron_expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let schedule = CronSchedule::from_str(cron_expression).map_err(|e| e.to_string())?;
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| "cron expression has no future occurrences".to_string())
}

pub struct Scheduler {
    store: Arc<dyn MetadataStore>,
    queue: Arc<Queue>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(store: Arc<dyn MetadataStore>, queue: Arc<Queue>, config: SchedulerConfig) -> Self {
        Self { store, queue, config }
    }

    /// Runs the tick loop until `shutdown` reports `true`. Spawned as a
    /// background task by the server binary, following the same
    /// `tokio::sync::watch`-gated loop shape used elsewhere in this stack.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("scheduler shutting down");
                        return;
                    }
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn tick(&self) -> Result<(), StoreError> {
        let now = Utc::now();
        let due = self.store.list_due_schedules(now).await?;
        for schedule in due {
            if let Err(e) = self.fire(schedule, now).await {
                error!(error = %e, "failed to fire schedule");
            }
        }
        Ok(())
    }

    async fn fire(&self, mut schedule: Schedule, now: DateTime<Utc>) -> Result<(), StoreError> {
        let next_run = match next_occurrence(&schedule.cron_expression, now) {
            Ok(next) => next,
            Err(e) => {
                warn!(schedule_id = %schedule.id, error = %e, "invalid cron expression");
                return Ok(());
            }
        };

        let mut parameters = std::collections::HashMap::new();
        parameters.insert("trigger_type".to_string(), serde_json::json!("scheduled"));
        parameters.insert(
            "triggered_by".to_string(),
            serde_json::json!(schedule.id.clone()),
        );

        let task = WorkTask::new(
            Uuid::now_v7().to_string(),
            schedule.project_id.clone(),
            TaskSpec::PipelineExecution {
                pipeline_id: schedule.pipeline_id.clone(),
                parameters,
            },
        );
        self.queue.enqueue(task).await?;

        schedule.last_run = Some(now);
        schedule.next_run = next_run;
        self.store.save_schedule(&schedule).await
    }
}
