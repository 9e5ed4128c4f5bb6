//! GET/POST /worktasks/{id} — the worker reconciliation surface for WorkTask.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use orchestrator_core::{OrchestratorError, TaskStatus, WorkTask};
use serde::Deserialize;

use crate::routes::error::HttpError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/worktasks/:id", get(get_work_task).post(post_work_task_status))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/worktasks/{id}",
    params(("id" = String, Path, description = "WorkTask id")),
    responses(
        (status = 200, description = "WorkTask found", body = WorkTask),
        (status = 404, description = "No such WorkTask"),
    ),
    tag = "worktasks"
)]
pub async fn get_work_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkTask>, HttpError> {
    let task = state.store.get_work_task(&id).await?;
    Ok(Json(task))
}

#[derive(Debug, Deserialize)]
pub struct WorkTaskStatusUpdate {
    #[serde(rename = "workTaskId")]
    pub work_task_id: String,
    pub status: TaskStatus,
    #[serde(rename = "outputLocation")]
    pub output_location: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// Reconciliation is at-least-once: a duplicate post of an already-applied
/// terminal status is accepted as a no-op rather than rejected.
#[utoipa::path(
    post,
    path = "/worktasks/{id}",
    params(("id" = String, Path, description = "WorkTask id")),
    request_body = WorkTaskStatusUpdate,
    responses(
        (status = 200, description = "Status recorded"),
        (status = 404, description = "No such WorkTask"),
    ),
    tag = "worktasks"
)]
pub async fn post_work_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<WorkTaskStatusUpdate>,
) -> Result<Json<WorkTask>, HttpError> {
    let mut task = state.store.get_work_task(&id).await?;

    if task.status.is_terminal() && task.status == update.status {
        return Ok(Json(task));
    }

    if !task.status.can_transition_to(update.status) {
        return Err(OrchestratorError::Conflict {
            from: task.status.to_string(),
            to: update.status.to_string(),
        }
        .into());
    }

    task.status = update.status;
    task.error_message = update.error_message;
    task.output_location = update.output_location;
    task.updated_at = chrono::Utc::now();
    state.store.save_work_task(&task).await?;
    Ok(Json(task))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use orchestrator_core::{InMemoryMetadataStore, MetadataStore, PluginRegistry, Queue, TaskSpec};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;

    async fn state_with_task(task: &WorkTask) -> AppState {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        store.save_work_task(task).await.unwrap();
        let queue = Arc::new(Queue::new(store.clone()));
        AppState::new(store, queue, PluginRegistry::new())
    }

    fn task() -> WorkTask {
        WorkTask::new(
            "wt-1",
            "proj-1",
            TaskSpec::PipelineExecution {
                pipeline_id: "pipe-1".into(),
                parameters: Default::default(),
            },
        )
    }

    #[tokio::test]
    async fn get_missing_work_task_is_404() {
        let state = state_with_task(&task()).await;
        let app = routes(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/worktasks/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_status_transitions_to_completed() {
        let state = state_with_task(&task()).await;
        let app = routes(state.clone());

        let body = json!({
            "workTaskId": "wt-1",
            "status": "completed",
            "outputLocation": "s3://bucket/out",
            "errorMessage": null,
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/worktasks/wt-1")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let updated: WorkTask = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.output_location.as_deref(), Some("s3://bucket/out"));
    }

    #[tokio::test]
    async fn duplicate_terminal_post_is_accepted_as_a_no_op() {
        let mut completed = task();
        completed.status = TaskStatus::Completed;
        completed.output_location = Some("s3://bucket/first".into());
        let state = state_with_task(&completed).await;
        let app = routes(state.clone());

        let body = json!({
            "workTaskId": "wt-1",
            "status": "completed",
            "outputLocation": "s3://bucket/second",
            "errorMessage": null,
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/worktasks/wt-1")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let returned: WorkTask = serde_json::from_slice(&bytes).unwrap();
        // Stored value is untouched: the no-op short-circuits before saving.
        assert_eq!(returned.output_location.as_deref(), Some("s3://bucket/first"));
    }

    #[tokio::test]
    async fn illegal_backward_transition_is_rejected() {
        let mut executing = task();
        executing.status = TaskStatus::Executing;
        let state = state_with_task(&executing).await;
        let app = routes(state.clone());

        let body = json!({
            "workTaskId": "wt-1",
            "status": "scheduled",
            "outputLocation": null,
            "errorMessage": null,
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/worktasks/wt-1")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn overwriting_a_terminal_task_with_a_different_status_is_rejected() {
        let mut completed = task();
        completed.status = TaskStatus::Completed;
        let state = state_with_task(&completed).await;
        let app = routes(state.clone());

        let body = json!({
            "workTaskId": "wt-1",
            "status": "failed",
            "outputLocation": null,
            "errorMessage": "retried after completion",
        });

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/worktasks/wt-1")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
