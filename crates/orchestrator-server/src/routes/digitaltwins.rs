//! GET /digitaltwins/{id} — read-only; workers resolve the twin they were
//! dispatched to update.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use orchestrator_core::DigitalTwin;

use crate::routes::error::HttpError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new().route("/digitaltwins/:id", get(get_digital_twin)).with_state(state)
}

#[utoipa::path(
    get,
    path = "/digitaltwins/{id}",
    params(("id" = String, Path, description = "DigitalTwin id")),
    responses(
        (status = 200, description = "Digital twin found", body = DigitalTwin),
        (status = 404, description = "No such digital twin"),
    ),
    tag = "digitaltwins"
)]
pub async fn get_digital_twin(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DigitalTwin>, HttpError> {
    let twin = state.store.get_digital_twin(&id).await?;
    Ok(Json(twin))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use orchestrator_core::{InMemoryMetadataStore, MetadataStore, PluginRegistry, Queue};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn fetches_saved_digital_twin() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let twin = DigitalTwin {
            id: "t-1".into(),
            ontology_id: "ont-1".into(),
            entities: Vec::new(),
            updated_at: Utc::now(),
        };
        store.save_digital_twin(&twin).await.unwrap();
        let queue = Arc::new(Queue::new(store.clone()));
        let app = routes(AppState::new(store, queue, PluginRegistry::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/digitaltwins/t-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let fetched: DigitalTwin = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(fetched.id, "t-1");
    }

    #[tokio::test]
    async fn missing_digital_twin_is_404() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let queue = Arc::new(Queue::new(store.clone()));
        let app = routes(AppState::new(store, queue, PluginRegistry::new()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/digitaltwins/missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
