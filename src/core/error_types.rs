//! Shared constants for structured API errors surfaced by the normalizer.

use std::fmt;

pub const ERROR_TYPE_API: &str = "api_error";
pub const ERROR_TYPE_INVALID_REQUEST: &str = "invalid_request_error";

pub const ERROR_CATEGORY_MISSING_CONVERSATION: &str = "missing_conversation";
pub const ERROR_CATEGORY_MALFORMED_CONVERSATION: &str = "malformed_conversation";
pub const ERROR_CATEGORY_INVALID_PATH: &str = "invalid_path";
pub const ERROR_CATEGORY_INVALID_JSON: &str = "invalid_json";
pub const ERROR_CATEGORY_CONFIG_ERROR: &str = "config_error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategoryCode {
    MissingConversation,
    MalformedConversation,
    InvalidPath,
    InvalidJson,
    ConfigError,
}

impl ErrorCategoryCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingConversation => ERROR_CATEGORY_MISSING_CONVERSATION,
            Self::MalformedConversation => ERROR_CATEGORY_MALFORMED_CONVERSATION,
            Self::InvalidPath => ERROR_CATEGORY_INVALID_PATH,
            Self::InvalidJson => ERROR_CATEGORY_INVALID_JSON,
            Self::ConfigError => ERROR_CATEGORY_CONFIG_ERROR,
        }
    }

    /// Whether the failure is the client's fault (bad-request class).
    pub const fn is_client_error(self) -> bool {
        matches!(
            self,
            Self::MissingConversation
                | Self::MalformedConversation
                | Self::InvalidPath
                | Self::InvalidJson
        )
    }
}

impl fmt::Display for ErrorCategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
