//! Translation of store and request failures into HTTP responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::models::ErrorResponse;
use crate::store::StoreError;

/// Errors returned by request handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(StoreError::NotFound { .. } | StoreError::NoMatch) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Store(StoreError::Conflict { .. }) => StatusCode::CONFLICT,
            ApiError::Store(StoreError::Invalid(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Store(StoreError::NoMatch) => {
                "No configurations found for the specified criteria".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request format: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("store task failed: {}", e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(ErrorResponse { error: self.message() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_status_mapping() {
        let not_found = ApiError::from(StoreError::NotFound {
            kind: "config",
            id: "x".to_string(),
        });
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(StoreError::NoMatch).status(), StatusCode::NOT_FOUND);

        let conflict = ApiError::from(StoreError::Conflict {
            kind: "config",
            id: "x".to_string(),
        });
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let invalid = ApiError::from(StoreError::Invalid("bad".to_string()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let io = ApiError::from(StoreError::Io {
            path: "x.yaml".into(),
            source: io::Error::other("disk full"),
        });
        assert_eq!(io.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_no_match_message() {
        assert_eq!(
            ApiError::from(StoreError::NoMatch).message(),
            "No configurations found for the specified criteria"
        );
    }
}
