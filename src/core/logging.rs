//! Logging utilities with request context support.
//!
//! The normalizer itself is synchronous, but callers usually run it inside a
//! tokio task. Task-local storage carries the request ID into the normalizer
//! without threading it through each caller.

use chrono::Local;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

tokio::task_local! {
    /// Task-local storage for the current request ID.
    pub static REQUEST_ID: String;
}

/// Get the current request ID from context, if set.
///
/// Returns an empty string if no request ID is set.
pub fn get_request_id() -> String {
    REQUEST_ID.try_with(|id| id.clone()).unwrap_or_default()
}

/// Generate a new unique request ID using UUID v4.
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Request ID from task-local context, or a fresh one when running outside a scope.
pub fn current_or_new_request_id() -> String {
    let id = get_request_id();
    if id.is_empty() {
        generate_request_id()
    } else {
        id
    }
}

/// Execute an async block with a request ID in scope.
///
/// ```ignore
/// with_request_context!(request_id, async {
///     normalizer.normalize(&model, payload, false)
/// })
/// ```
#[macro_export]
macro_rules! with_request_context {
    ($request_id:expr, $body:expr) => {
        $crate::core::logging::REQUEST_ID.scope($request_id, $body).await
    };
}

/// Custom time formatter that uses local timezone (respects TZ environment variable)
struct LocalTime;

impl tracing_subscriber::fmt::time::FormatTime for LocalTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%d %H:%M:%S"))
    }
}

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG` (default `info,llm_normalizer_rust=debug`).
/// ANSI colors are disabled when `NO_COLOR` is set. Logs go to stderr so the
/// CLI can keep stdout for the rewritten payload.
pub fn init_tracing() {
    let no_color = std::env::var("NO_COLOR").is_ok();
    let filter_str = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,llm_normalizer_rust=debug".to_string());
    let filter = tracing_subscriber::EnvFilter::new(filter_str);

    let layer = tracing_subscriber::fmt::layer()
        .with_timer(LocalTime)
        .with_writer(std::io::stderr)
        .with_ansi(!no_color);

    // Tests may install a subscriber more than once
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init();
}
