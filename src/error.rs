use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::db::DbError;
use crate::llm::LlmError;

/// Failures surfaced by the chat pipeline and the HTTP handlers
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Configuration(String),

    #[error("Failed to generate SQL: {0}")]
    Generation(#[from] LlmError),

    #[error("SQL execution failed: {0}")]
    Execution(#[from] DbError),

    #[error("{0}")]
    Validation(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Generation(_) | ServiceError::Execution(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
