//! Custom error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::PersistenceError;
use common::presentation::Notice;
use media::{MediaError, PipelineError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unauthorized access
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(e) => match e {
                PipelineError::Media(MediaError::UnsupportedMediaKind(_)) => {
                    StatusCode::UNSUPPORTED_MEDIA_TYPE
                }
                PipelineError::Media(MediaError::MediaDecode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::Busy(_) => StatusCode::CONFLICT,
                PipelineError::Classification(_) | PipelineError::Archive(_) => {
                    StatusCode::BAD_GATEWAY
                }
                PipelineError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            // Storage details stay in the logs
            ApiError::Persistence(e) | ApiError::Pipeline(PipelineError::Persistence(e)) => {
                error!("Diary storage failed: {}", e);
                "Diary storage is unavailable, please try again".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
            "notice": Notice::error(error_message.clone()),
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::diary::DiaryScope;
    use media::ClassificationError;

    #[test]
    fn test_pipeline_errors_map_to_statuses() {
        let cases = [
            (
                PipelineError::Media(MediaError::UnsupportedMediaKind("text/plain".into())),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                PipelineError::Media(MediaError::MediaDecode("truncated".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (PipelineError::Busy(DiaryScope::Anonymous), StatusCode::CONFLICT),
            (
                PipelineError::Classification(ClassificationError::EmptyLabelSet),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::Persistence(PersistenceError::Corrupt("bad row".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn test_plain_errors() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::NotFound("Diary entry".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("missing file".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
