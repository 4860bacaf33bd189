//! Core functionality for the request normalizer.
//!
//! This module contains fundamental components used throughout the crate:
//! - Configuration management
//! - Error handling
//! - Request-scoped logging context

pub mod config;
pub mod error;
pub mod error_types;
pub mod logging;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, NormalizeError, Result};
pub use logging::{generate_request_id, get_request_id, init_tracing, REQUEST_ID};
