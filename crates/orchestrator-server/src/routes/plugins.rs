//! Plugin fetch endpoint: returns the compiled artifact bytes for a named
//! plugin, the way a worker resolves a step's declared plugin before
//! binding it through the in-process `PluginRegistry`.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::routes::error::HttpError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/plugins/:name/artifact", get(get_plugin_artifact))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/plugins/{name}/artifact",
    params(("name" = String, Path, description = "Plugin name")),
    responses(
        (status = 200, description = "Compiled plugin artifact bytes"),
        (status = 404, description = "No such plugin"),
    ),
    tag = "plugins"
)]
pub async fn get_plugin_artifact(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, HttpError> {
    let bytes = state.store.get_plugin_binary(&name).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}
