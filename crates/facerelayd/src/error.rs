use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use facerelay_core::{DetectorError, StoreError};
use thiserror::Error;

/// Errors surfaced by HTTP handlers.
///
/// Client errors carry their message to the caller. Collaborator failures are
/// logged here and answered with a generic body.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing image")]
    MissingImage,
    #[error("image is not valid base64: {0}")]
    InvalidImage(#[from] base64::DecodeError),
    #[error("unknown object name: {0:?}")]
    UnknownName(String),
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error(transparent)]
    Detector(#[from] DetectorError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("object not found: {0}")]
    NotFound(&'static str),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingImage | ApiError::InvalidImage(_) | ApiError::UnknownName(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Rejected { status, .. } => *status,
            ApiError::Detector(_) | ApiError::Store(_) | ApiError::NotFound(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Detector(e) => {
                tracing::error!(error = %e, "face detection failed");
                "face detection failed".to_string()
            }
            ApiError::Store(e) => {
                tracing::error!(error = %e, "storage operation failed");
                "storage operation failed".to_string()
            }
            ApiError::NotFound(key) => {
                tracing::error!(key = %key, "storage operation failed: blob not found");
                "storage operation failed".to_string()
            }
            client => {
                tracing::warn!(error = %client, "request rejected");
                client.to_string()
            }
        };

        (self.status(), Json(serde_json::json!({ "error": message }))).into_response()
    }
}
