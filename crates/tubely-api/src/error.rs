//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tubely_ingest::IngestError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] tubely_firestore::FirestoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] tubely_storage::StorageError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidId(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Ingest(_)
            | ApiError::Internal(_)
            | ApiError::Firestore(_)
            | ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::InvalidId(_) => "invalid_id",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
            ApiError::Ingest(e) => e.kind(),
            ApiError::Firestore(_) => "record_store",
            ApiError::Storage(_) => "object_store",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status.is_server_error()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubely_media::MediaError;
    use tubely_models::VideoId;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::unauthorized("missing token").status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(IngestError::UnsupportedMedia("image/gif".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(IngestError::NotFound(VideoId::new())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(IngestError::Probe(MediaError::invalid_video("x"))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_codes_follow_ingest_kind() {
        let err = ApiError::from(IngestError::PayloadTooLarge { limit: 1 });
        assert_eq!(err.code(), "payload_too_large");
        assert_eq!(ApiError::InvalidId("x".into()).code(), "invalid_id");
    }
}
