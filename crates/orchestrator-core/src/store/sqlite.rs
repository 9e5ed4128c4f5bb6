//! SQLite-backed MetadataStore: the "one embedded relational file" store
//! with a write-ahead journal described in §6 of the specification.

use async_trait::async_trait;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tracing::{error, instrument};

use super::{retry_on_busy, BusyRetryPolicy, ListFilter, MetadataStore, StoreError, ACCEPTED_JOURNAL_MODES};
use crate::types::{DigitalTwin, MlModel, Pipeline, PluginRecord, PluginStatus, Schedule, WorkTask};

#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
    retry_policy: BusyRetryPolicy,
}

impl SqliteMetadataStore {
    /// Opens (creating if absent) the embedded database file at `path`,
    /// verifies its journal mode, and runs migrations.
    ///
    /// `path` may be `:memory:` for tests, in which case the journal mode
    /// reported by SQLite is `memory` rather than `wal` — both are in
    /// `ACCEPTED_JOURNAL_MODES`.
    pub async fn connect(path: &str) -> Result<Self, StoreError> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{path}?mode=rwc")
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(1) // single-writer store
            .connect(&url)
            .await?;

        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await.ok();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await?;
        if !ACCEPTED_JOURNAL_MODES.contains(&mode.to_lowercase().as_str()) {
            return Err(StoreError::UnacceptableJournalMode(mode));
        }

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            error!(error = %e, "failed to run migrations");
            StoreError::Database(e.to_string())
        })?;

        Ok(Self {
            pool,
            retry_policy: BusyRetryPolicy::default(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    #[instrument(skip(self, task))]
    async fn save_work_task(&self, task: &WorkTask) -> Result<(), StoreError> {
        retry_on_busy(&self.retry_policy, || async {
            let spec = serde_json::to_value(&task.task_spec)?;
            sqlx::query(
                r#"
                INSERT INTO worktasks (id, project_id, task_type, task_spec, status, worker_job_name,
                    error_message, output_location, created_at, updated_at, attempt_count)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(id) DO UPDATE SET
                    project_id = excluded.project_id,
                    task_type = excluded.task_type,
                    task_spec = excluded.task_spec,
                    status = excluded.status,
                    worker_job_name = excluded.worker_job_name,
                    error_message = excluded.error_message,
                    output_location = excluded.output_location,
                    updated_at = excluded.updated_at,
                    attempt_count = excluded.attempt_count
                "#,
            )
            .bind(&task.id)
            .bind(&task.project_id)
            .bind(task.task_type().as_str())
            .bind(spec)
            .bind(serde_json::to_string(&task.status)?)
            .bind(&task.worker_job_name)
            .bind(&task.error_message)
            .bind(&task.output_location)
            .bind(task.created_at)
            .bind(task.updated_at)
            .bind(task.attempt_count as i64)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    #[instrument(skip(self))]
    async fn get_work_task(&self, id: &str) -> Result<WorkTask, StoreError> {
        let row = sqlx::query("SELECT * FROM worktasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row_to_work_task(&row)
    }

    async fn list_work_tasks(&self, filter: ListFilter) -> Result<Vec<WorkTask>, StoreError> {
        let rows = match filter.project_id {
            Some(project_id) => {
                sqlx::query("SELECT * FROM worktasks WHERE project_id = ?1")
                    .bind(project_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query("SELECT * FROM worktasks").fetch_all(&self.pool).await?,
        };
        rows.iter().map(row_to_work_task).collect()
    }

    async fn delete_work_task(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM worktasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_pipeline(&self, pipeline: &Pipeline) -> Result<(), StoreError> {
        retry_on_busy(&self.retry_policy, || async {
            sqlx::query(
                r#"
                INSERT INTO pipelines (id, name, steps) VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET name = excluded.name, steps = excluded.steps
                "#,
            )
            .bind(&pipeline.id)
            .bind(&pipeline.name)
            .bind(serde_json::to_value(&pipeline.steps)?)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_pipeline(&self, id: &str) -> Result<Pipeline, StoreError> {
        let row = sqlx::query("SELECT * FROM pipelines WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let steps_json: serde_json::Value = row.get("steps");
        Ok(Pipeline {
            id: row.get("id"),
            name: row.get("name"),
            steps: serde_json::from_value(steps_json)?,
        })
    }

    async fn list_pipelines(&self, _filter: ListFilter) -> Result<Vec<Pipeline>, StoreError> {
        let rows = sqlx::query("SELECT * FROM pipelines").fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let steps_json: serde_json::Value = row.get("steps");
                Ok(Pipeline {
                    id: row.get("id"),
                    name: row.get("name"),
                    steps: serde_json::from_value(steps_json)?,
                })
            })
            .collect()
    }

    async fn delete_pipeline(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM pipelines WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, schedule))]
    async fn save_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        // Scheduled-tick saves contend with operator updates to the same
        // rows, so schedule writes always go through the busy-retry path.
        retry_on_busy(&self.retry_policy, || async {
            sqlx::query(
                r#"
                INSERT INTO schedules (id, project_id, pipeline_id, cron_expression, enabled, last_run, next_run)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    project_id = excluded.project_id,
                    pipeline_id = excluded.pipeline_id,
                    cron_expression = excluded.cron_expression,
                    enabled = excluded.enabled,
                    last_run = excluded.last_run,
                    next_run = excluded.next_run
                "#,
            )
            .bind(&schedule.id)
            .bind(&schedule.project_id)
            .bind(&schedule.pipeline_id)
            .bind(&schedule.cron_expression)
            .bind(schedule.enabled)
            .bind(schedule.last_run)
            .bind(schedule.next_run)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_schedule(&self, id: &str) -> Result<Schedule, StoreError> {
        let row = sqlx::query("SELECT * FROM schedules WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(row_to_schedule(&row))
    }

    async fn list_schedules(&self, filter: ListFilter) -> Result<Vec<Schedule>, StoreError> {
        let rows = match filter.project_id {
            Some(project_id) => {
                sqlx::query("SELECT * FROM schedules WHERE project_id = ?1")
                    .bind(project_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query("SELECT * FROM schedules").fetch_all(&self.pool).await?,
        };
        Ok(rows.iter().map(row_to_schedule).collect())
    }

    async fn delete_schedule(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM schedules WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_due_schedules(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Schedule>, StoreError> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE enabled = 1 AND next_run <= ?1")
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_schedule).collect())
    }

    /// Plugin metadata and binary are written in one transaction: either
    /// both land or neither does.
    #[instrument(skip(self, meta, binary))]
    async fn save_plugin(&self, meta: &PluginRecord, binary: Option<&[u8]>) -> Result<(), StoreError> {
        retry_on_busy(&self.retry_policy, || async {
            let mut tx = self.pool.begin().await?;
            sqlx::query(
                r#"
                INSERT INTO plugins (name, version, source_reference, artifact_path, declared_actions,
                    input_schema, status, binary)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(name) DO UPDATE SET
                    version = excluded.version,
                    source_reference = excluded.source_reference,
                    artifact_path = excluded.artifact_path,
                    declared_actions = excluded.declared_actions,
                    input_schema = excluded.input_schema,
                    status = excluded.status,
                    binary = COALESCE(excluded.binary, plugins.binary)
                "#,
            )
            .bind(&meta.name)
            .bind(&meta.version)
            .bind(&meta.source_reference)
            .bind(&meta.artifact_path)
            .bind(serde_json::to_value(&meta.declared_actions)?)
            .bind(&meta.input_schema)
            .bind(serde_json::to_string(&meta.status)?)
            .bind(binary)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
            tx.commit().await.map_err(StoreError::from)?;
            Ok(())
        })
        .await
    }

    async fn get_plugin_binary(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let row = sqlx::query("SELECT binary FROM plugins WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        row.try_get::<Option<Vec<u8>>, _>("binary")?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn get_plugin(&self, name: &str) -> Result<PluginRecord, StoreError> {
        let row = sqlx::query(
            "SELECT name, version, source_reference, artifact_path, declared_actions, input_schema, status \
             FROM plugins WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        row_to_plugin(&row)
    }

    async fn update_plugin_status(&self, name: &str, status: PluginStatus) -> Result<(), StoreError> {
        retry_on_busy(&self.retry_policy, || async {
            let result = sqlx::query("UPDATE plugins SET status = ?1 WHERE name = ?2")
                .bind(serde_json::to_string(&status)?)
                .bind(name)
                .execute(&self.pool)
                .await
                .map_err(StoreError::from)?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Ok(())
        })
        .await
    }

    async fn save_ml_model(&self, model: &MlModel) -> Result<(), StoreError> {
        retry_on_busy(&self.retry_policy, || async {
            sqlx::query(
                r#"
                INSERT INTO ml_models (id, ontology_id, model_type, training_config, status,
                    artifact_location, metrics)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    ontology_id = excluded.ontology_id,
                    model_type = excluded.model_type,
                    training_config = excluded.training_config,
                    status = excluded.status,
                    artifact_location = excluded.artifact_location,
                    metrics = excluded.metrics
                "#,
            )
            .bind(&model.id)
            .bind(&model.ontology_id)
            .bind(&model.model_type)
            .bind(&model.training_config)
            .bind(serde_json::to_string(&model.status)?)
            .bind(&model.artifact_location)
            .bind(serde_json::to_value(&model.metrics)?)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_ml_model(&self, id: &str) -> Result<MlModel, StoreError> {
        let row = sqlx::query("SELECT * FROM ml_models WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row_to_ml_model(&row)
    }

    async fn list_ml_models(&self, _filter: ListFilter) -> Result<Vec<MlModel>, StoreError> {
        let rows = sqlx::query("SELECT * FROM ml_models").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_ml_model).collect()
    }

    async fn delete_ml_model(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM ml_models WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn save_digital_twin(&self, twin: &DigitalTwin) -> Result<(), StoreError> {
        retry_on_busy(&self.retry_policy, || async {
            sqlx::query(
                r#"
                INSERT INTO digital_twins (id, ontology_id, entities, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    ontology_id = excluded.ontology_id,
                    entities = excluded.entities,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&twin.id)
            .bind(&twin.ontology_id)
            .bind(serde_json::to_value(&twin.entities)?)
            .bind(twin.updated_at)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_digital_twin(&self, id: &str) -> Result<DigitalTwin, StoreError> {
        let row = sqlx::query("SELECT * FROM digital_twins WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        row_to_digital_twin(&row)
    }

    async fn list_digital_twins(&self, _filter: ListFilter) -> Result<Vec<DigitalTwin>, StoreError> {
        let rows = sqlx::query("SELECT * FROM digital_twins").fetch_all(&self.pool).await?;
        rows.iter().map(row_to_digital_twin).collect()
    }

    async fn delete_digital_twin(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM digital_twins WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_work_task(row: &sqlx::sqlite::SqliteRow) -> Result<WorkTask, StoreError> {
    let spec_json: serde_json::Value = row.get("task_spec");
    let status_json: String = row.get("status");
    Ok(WorkTask {
        id: row.get("id"),
        project_id: row.get("project_id"),
        task_spec: serde_json::from_value(spec_json)?,
        status: serde_json::from_str(&status_json)?,
        worker_job_name: row.get("worker_job_name"),
        error_message: row.get("error_message"),
        output_location: row.get("output_location"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        attempt_count: row.get::<i64, _>("attempt_count") as u32,
    })
}

fn row_to_schedule(row: &sqlx::sqlite::SqliteRow) -> Schedule {
    Schedule {
        id: row.get("id"),
        project_id: row.get("project_id"),
        pipeline_id: row.get("pipeline_id"),
        cron_expression: row.get("cron_expression"),
        enabled: row.get("enabled"),
        last_run: row.get("last_run"),
        next_run: row.get("next_run"),
    }
}

fn row_to_plugin(row: &sqlx::sqlite::SqliteRow) -> Result<PluginRecord, StoreError> {
    let actions_json: serde_json::Value = row.get("declared_actions");
    let status_json: String = row.get("status");
    Ok(PluginRecord {
        name: row.get("name"),
        version: row.get("version"),
        source_reference: row.get("source_reference"),
        artifact_path: row.get("artifact_path"),
        declared_actions: serde_json::from_value(actions_json)?,
        input_schema: row.get("input_schema"),
        status: serde_json::from_str(&status_json)?,
    })
}

fn row_to_ml_model(row: &sqlx::sqlite::SqliteRow) -> Result<MlModel, StoreError> {
    let status_json: String = row.get("status");
    let metrics_json: Option<serde_json::Value> = row.get("metrics");
    Ok(MlModel {
        id: row.get("id"),
        ontology_id: row.get("ontology_id"),
        model_type: row.get("model_type"),
        training_config: row.get("training_config"),
        status: serde_json::from_str(&status_json)?,
        artifact_location: row.get("artifact_location"),
        metrics: metrics_json.map(serde_json::from_value).transpose()?,
    })
}

fn row_to_digital_twin(row: &sqlx::sqlite::SqliteRow) -> Result<DigitalTwin, StoreError> {
    let entities_json: serde_json::Value = row.get("entities");
    Ok(DigitalTwin {
        id: row.get("id"),
        ontology_id: row.get("ontology_id"),
        entities: serde_json::from_value(entities_json)?,
        updated_at: row.get("updated_at"),
    })
}
