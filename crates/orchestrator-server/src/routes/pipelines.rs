//! GET /pipelines/{id} — read-only; workers resolve the pipeline they were
//! dispatched to run.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use orchestrator_core::Pipeline;

use crate::routes::error::HttpError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new().route("/pipelines/:id", get(get_pipeline)).with_state(state)
}

#[utoipa::path(
    get,
    path = "/pipelines/{id}",
    params(("id" = String, Path, description = "Pipeline id")),
    responses(
        (status = 200, description = "Pipeline found", body = Pipeline),
        (status = 404, description = "No such pipeline"),
    ),
    tag = "pipelines"
)]
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Pipeline>, HttpError> {
    let pipeline = state.store.get_pipeline(&id).await?;
    Ok(Json(pipeline))
}
