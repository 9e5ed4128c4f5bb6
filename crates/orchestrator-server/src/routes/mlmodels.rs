//! GET /mlmodels/{id} and the training-outcome reconciliation endpoints.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use orchestrator_core::{MlModel, ModelStatus, TrainingMetrics};
use serde::Deserialize;

use crate::routes::error::HttpError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/mlmodels/:id", get(get_ml_model))
        .route("/mlmodels/:id/training/complete", post(training_complete))
        .route("/mlmodels/:id/training/fail", post(training_fail))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/mlmodels/{id}",
    params(("id" = String, Path, description = "MLModel id")),
    responses(
        (status = 200, description = "MLModel found", body = MlModel),
        (status = 404, description = "No such model"),
    ),
    tag = "mlmodels"
)]
pub async fn get_ml_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MlModel>, HttpError> {
    let model = state.store.get_ml_model(&id).await?;
    Ok(Json(model))
}

#[derive(Debug, Deserialize)]
pub struct TrainingComplete {
    pub model_artifact_path: String,
    pub performance_metrics: TrainingMetrics,
}

#[utoipa::path(
    post,
    path = "/mlmodels/{id}/training/complete",
    params(("id" = String, Path, description = "MLModel id")),
    request_body = TrainingComplete,
    responses((status = 200, description = "Recorded", body = MlModel)),
    tag = "mlmodels"
)]
pub async fn training_complete(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TrainingComplete>,
) -> Result<Json<MlModel>, HttpError> {
    let mut model = state.store.get_ml_model(&id).await?;
    model.status = ModelStatus::Trained;
    model.artifact_location = Some(body.model_artifact_path);
    model.metrics = Some(body.performance_metrics);
    state.store.save_ml_model(&model).await?;
    Ok(Json(model))
}

#[derive(Debug, Deserialize)]
pub struct TrainingFail {
    pub reason: String,
}

#[utoipa::path(
    post,
    path = "/mlmodels/{id}/training/fail",
    params(("id" = String, Path, description = "MLModel id")),
    request_body = TrainingFail,
    responses((status = 200, description = "Recorded", body = MlModel)),
    tag = "mlmodels"
)]
pub async fn training_fail(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TrainingFail>,
) -> Result<Json<MlModel>, HttpError> {
    let mut model = state.store.get_ml_model(&id).await?;
    model.status = ModelStatus::Failed;
    tracing::warn!(model_id = %id, reason = %body.reason, "training failed");
    state.store.save_ml_model(&model).await?;
    Ok(Json(model))
}
