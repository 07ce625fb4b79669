//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto the `{ ok: false, error, code }` response body.

use crate::config::ConfigError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;
use warehouse_core::{DocumentError, PortError};

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A failure of the primary document operation.
    #[error("{0}")]
    Document(#[from] DocumentError),

    /// The request body or path could not be understood.
    #[error("{0}")]
    BadRequest(String),

    #[error("The x-actor header is required")]
    MissingActor,

    #[error("No document is linked to slug '{0}'")]
    SlugNotFound(String),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Port errors outside a document operation (e.g. building the Sheets client)
/// use the same taxonomy as document failures.
impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        ApiError::Document(DocumentError::from(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// The body of every failed response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    ok: bool,
    error: String,
    code: String,
}

impl ApiError {
    /// HTTP status and stable machine code for the error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Document(e) => (document_status(e), e.code()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            ApiError::MissingActor => (StatusCode::UNAUTHORIZED, "ACTOR_REQUIRED"),
            ApiError::SlugNotFound(_) => (StatusCode::NOT_FOUND, "SLUG_NOT_FOUND"),
            ApiError::Config(_) | ApiError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
            }
        }
    }
}

fn document_status(err: &DocumentError) -> StatusCode {
    match err {
        DocumentError::Validation(_) => StatusCode::BAD_REQUEST,
        DocumentError::CodeNotFound(_) => StatusCode::NOT_FOUND,
        DocumentError::TabNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DocumentError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(code, "Request failed: {}", self);
        }
        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
