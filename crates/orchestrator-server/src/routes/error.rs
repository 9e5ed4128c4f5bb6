use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator_core::OrchestratorError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

/// Maps the core error taxonomy onto HTTP status codes, per the propagation
/// policy's ambient addition: 404 for NotFound, 409 for Conflict, 422 for
/// ValidationFailure, 500 otherwise.
pub struct HttpError(pub OrchestratorError, pub StatusCode);

impl From<OrchestratorError> for HttpError {
    fn from(err: OrchestratorError) -> Self {
        let status = match &err {
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::Conflict { .. } => StatusCode::CONFLICT,
            OrchestratorError::ValidationFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpError(err, status)
    }
}

impl From<orchestrator_core::store::StoreError> for HttpError {
    fn from(err: orchestrator_core::store::StoreError) -> Self {
        use orchestrator_core::store::StoreError;
        let status = match &err {
            StoreError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        HttpError(
            OrchestratorError::StoreFailure(err.to_string()),
            status,
        )
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.1, Json(ApiError { error: self.0.to_string() })).into_response()
    }
}
