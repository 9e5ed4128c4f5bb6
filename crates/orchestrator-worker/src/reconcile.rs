//! HTTP client wrapper for the reconciliation calls a worker makes back to
//! the orchestrator. All failures here are logged, never retried: per §7,
//! worker-to-orchestrator reconciliation failures don't change the
//! already-computed outcome.

use orchestrator_core::{DigitalTwin, MlModel, Pipeline, TaskStatus, TrainingMetrics, WorkTask};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("orchestrator returned {0}")]
    Status(reqwest::StatusCode),
}

pub struct ReconcileClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct WorkTaskStatusUpdate<'a> {
    #[serde(rename = "workTaskId")]
    work_task_id: &'a str,
    status: TaskStatus,
    #[serde(rename = "outputLocation", skip_serializing_if = "Option::is_none")]
    output_location: Option<String>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

#[derive(Debug, Serialize)]
struct TrainingComplete {
    model_artifact_path: String,
    performance_metrics: TrainingMetrics,
}

#[derive(Debug, Serialize)]
struct TrainingFail<'a> {
    reason: &'a str,
}

impl ReconcileClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub async fn fetch_work_task(&self, id: &str) -> Result<WorkTask, ReconcileError> {
        let response = self
            .http
            .get(format!("{}/worktasks/{id}", self.base_url))
            .send()
            .await?;
        self.into_json(response).await
    }

    pub async fn fetch_pipeline(&self, id: &str) -> Result<Pipeline, ReconcileError> {
        let response = self
            .http
            .get(format!("{}/pipelines/{id}", self.base_url))
            .send()
            .await?;
        self.into_json(response).await
    }

    pub async fn fetch_ml_model(&self, id: &str) -> Result<MlModel, ReconcileError> {
        let response = self
            .http
            .get(format!("{}/mlmodels/{id}", self.base_url))
            .send()
            .await?;
        self.into_json(response).await
    }

    pub async fn fetch_digital_twin(&self, id: &str) -> Result<DigitalTwin, ReconcileError> {
        let response = self
            .http
            .get(format!("{}/digitaltwins/{id}", self.base_url))
            .send()
            .await?;
        self.into_json(response).await
    }

    pub async fn report_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        output_location: Option<String>,
        error_message: Option<String>,
    ) -> Result<(), ReconcileError> {
        let body = WorkTaskStatusUpdate {
            work_task_id: task_id,
            status,
            output_location,
            error_message,
        };
        let response = self
            .http
            .post(format!("{}/worktasks/{task_id}", self.base_url))
            .json(&body)
            .send()
            .await?;
        self.expect_ok(response).await
    }

    pub async fn report_training_complete(
        &self,
        model_id: &str,
        model_artifact_path: String,
        performance_metrics: TrainingMetrics,
    ) -> Result<(), ReconcileError> {
        let body = TrainingComplete {
            model_artifact_path,
            performance_metrics,
        };
        let response = self
            .http
            .post(format!("{}/mlmodels/{model_id}/training/complete", self.base_url))
            .json(&body)
            .send()
            .await?;
        self.expect_ok(response).await
    }

    pub async fn report_training_fail(&self, model_id: &str, reason: &str) -> Result<(), ReconcileError> {
        let body = TrainingFail { reason };
        let response = self
            .http
            .post(format!("{}/mlmodels/{model_id}/training/fail", self.base_url))
            .json(&body)
            .send()
            .await?;
        self.expect_ok(response).await
    }

    async fn into_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ReconcileError> {
        let response = self.ensure_success(response)?;
        Ok(response.json().await?)
    }

    async fn expect_ok(&self, response: reqwest::Response) -> Result<(), ReconcileError> {
        self.ensure_success(response)?;
        Ok(())
    }

    fn ensure_success(&self, response: reqwest::Response) -> Result<reqwest::Response, ReconcileError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ReconcileError::Status(response.status()))
        }
    }
}
