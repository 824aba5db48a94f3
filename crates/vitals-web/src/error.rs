use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use vitals_registry::RegistryError;
use vitals_store::StoreError;

pub type Result<T> = std::result::Result<T, WebError>;

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("service not found")]
    ServiceNotFound,

    #[error("worker not found")]
    WorkerNotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("startup failed: {0}")]
    Startup(String),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RegistryError> for WebError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnnamedWorker => WebError::InvalidRequest(err.to_string()),
            RegistryError::Store(err) => WebError::Store(err),
        }
    }
}

impl WebError {
    fn status(&self) -> StatusCode {
        match self {
            WebError::ServiceNotFound | WebError::WorkerNotFound => StatusCode::NOT_FOUND,
            WebError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Startup(_)
            | WebError::Store(_)
            | WebError::Io(_)
            | WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
