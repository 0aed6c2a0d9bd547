use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::services::{catalog::CatalogError, session_store::StoreError};

/// Body returned by every endpoint on failure.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> ErrorBody {
        match self {
            ApiError::InvalidArgument(message) => ErrorBody {
                code: "INVALID_ARGUMENT",
                message,
            },
            ApiError::NotFound(message) => ErrorBody {
                code: "NOT_FOUND",
                message,
            },
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                ErrorBody {
                    code: "INTERNAL_ERROR",
                    message: "Internal server error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self.body())).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => ApiError::NotFound(format!("Session {} not found", id)),
            StoreError::Rejected(msg) => ApiError::InvalidArgument(msg),
            StoreError::Conflict(_) | StoreError::Backend(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::InvalidDifficulty(_) => ApiError::InvalidArgument(err.to_string()),
            CatalogError::Empty(_) => ApiError::NotFound(err.to_string()),
            CatalogError::Invalid(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::InvalidArgument(format!("Validation error: {}", err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    #[test]
    fn test_store_errors_map_to_status() {
        assert_eq!(
            ApiError::from(StoreError::NotFound("abc".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Rejected("no hints".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StoreError::Conflict("abc".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_catalog_errors_map_to_status() {
        assert_eq!(
            ApiError::from(CatalogError::InvalidDifficulty("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(CatalogError::Empty(Difficulty::Hard)).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_internal_error_hides_detail() {
        let body = ApiError::Internal("redis exploded at 10.0.0.3".into()).body();
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(!body.message.contains("redis"));
    }
}
