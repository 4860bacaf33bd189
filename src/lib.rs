//! LLM Request Normalizer - rewrites Gemini-style chat requests for stricter upstreams
//!
//! This library takes a `generateContent` request body as a client sent it and
//! rewrites it into the shape a specific upstream endpoint accepts:
//!
//! - **Role fill**: turns without a usable role get one, alternating from `user`
//! - **Tool-call ids**: calls without an id get one; responses are linked by position
//! - **Grouping**: tool results are bundled right after the turn that issued the calls
//! - **Thought signatures**: unverifiable signatures are replaced with a skip sentinel
//! - **Prefill**: a trailing partial model turn becomes a user instruction (Claude)
//! - **Field renames**: client spellings of schema fields are mapped to upstream ones
//!
//! # Architecture
//!
//! - [`core`]: Configuration, errors and request-scoped logging
//! - [`normalizer`]: The stage pipeline and the payload tree accessor
//!
//! # Configuration
//!
//! Optional environment variables:
//! - `NORMALIZER_TARGET`: `gemini` or `antigravity` (default: antigravity)
//! - `NORMALIZER_PROJECT`: Project id written into the envelope (default: empty)
//! - `NORMALIZER_SAFETY_THRESHOLD`: Threshold for default safety settings (default: OFF)

pub mod core;
pub mod normalizer;

// Re-export commonly used types for convenience
pub use crate::core::{AppConfig, AppError, NormalizeError, Result};
pub use normalizer::{
    NormalizeContext, NormalizeStage, RequestNormalizer, SafetyThreshold, StageChain,
    ToolIdGenerator, UpstreamTarget,
};
