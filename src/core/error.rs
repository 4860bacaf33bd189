//! Error types and handling for the request normalizer.
//!
//! This module provides the engine-level error [`NormalizeError`] and the
//! crate-wide [`AppError`] that wraps it alongside other error sources and
//! implements HTTP response conversion for embedding handlers.

use crate::core::error_types::{ErrorCategoryCode, ERROR_TYPE_API, ERROR_TYPE_INVALID_REQUEST};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures raised while walking or rewriting a payload tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The target requires call/result grouping but the payload has no conversation.
    #[error("no conversation to group: `{path}` not found")]
    MissingConversation { path: String },

    /// The conversation exists but is not an array of turns.
    #[error("conversation at `{path}` is not an array")]
    MalformedConversation { path: String },

    /// A tree path was empty or contained an empty segment.
    #[error("invalid payload path: `{0}`")]
    InvalidPath(String),

    /// A path segment tried to descend into a scalar or past the end of an array.
    #[error("cannot address `{segment}` in `{path}`: parent is not a container")]
    NotAContainer { path: String, segment: String },
}

impl NormalizeError {
    pub fn category(&self) -> ErrorCategoryCode {
        match self {
            NormalizeError::MissingConversation { .. } => ErrorCategoryCode::MissingConversation,
            NormalizeError::MalformedConversation { .. } => {
                ErrorCategoryCode::MalformedConversation
            }
            NormalizeError::InvalidPath(_) | NormalizeError::NotAContainer { .. } => {
                ErrorCategoryCode::InvalidPath
            }
        }
    }
}

/// Main error type for the application.
///
/// All errors in the application should be converted to this type for consistent handling.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request could not be normalized for the upstream protocol
    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration-related errors (file not found, parse errors, etc.)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl AppError {
    pub fn category(&self) -> ErrorCategoryCode {
        match self {
            AppError::Normalize(e) => e.category(),
            AppError::Serialization(_) => ErrorCategoryCode::InvalidJson,
            AppError::Config(_) => ErrorCategoryCode::ConfigError,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let category = self.category();
        let (status, error_type) = if category.is_client_error() {
            (StatusCode::BAD_REQUEST, ERROR_TYPE_INVALID_REQUEST)
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, ERROR_TYPE_API)
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type,
                "code": category.as_str()
            }
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::Normalize(NormalizeError::MissingConversation {
            path: "request.contents".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Normalization error: no conversation to group: `request.contents` not found"
        );

        let err = AppError::Config(anyhow::anyhow!("missing file"));
        assert_eq!(err.to_string(), "Configuration error: missing file");
    }

    #[test]
    fn test_missing_conversation_is_bad_request() {
        let err: AppError = NormalizeError::MissingConversation {
            path: "request.contents".to_string(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_a_container_is_bad_request() {
        let err: AppError = NormalizeError::NotAContainer {
            path: "a.b".to_string(),
            segment: "b".to_string(),
        }
        .into();
        assert_eq!(err.category(), ErrorCategoryCode::InvalidPath);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_serialization_error_is_bad_request() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err = AppError::Serialization(json_err);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_config_error_response() {
        let err = AppError::Config(anyhow::anyhow!("config error"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("test error");
        let app_err: AppError = anyhow_err.into();
        assert!(matches!(app_err, AppError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let app_err: AppError = json_err.into();
        assert!(matches!(app_err, AppError::Serialization(_)));
    }

    #[test]
    fn test_normalize_error_category() {
        assert_eq!(
            NormalizeError::MalformedConversation {
                path: "contents".to_string()
            }
            .category(),
            ErrorCategoryCode::MalformedConversation
        );
        assert_eq!(
            NormalizeError::InvalidPath(String::new()).category(),
            ErrorCategoryCode::InvalidPath
        );
    }
}
