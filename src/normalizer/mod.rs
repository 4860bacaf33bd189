//! Request normalization engine.
//!
//! Rewrites a Gemini-style `generateContent` body into the exact shape an
//! upstream endpoint accepts. The work is split into stages that each rewrite
//! the shared payload tree in place:
//!
//! ```text
//! Client body
//!     ↓
//! [envelope]          (enveloped targets only)
//!     ↓
//! [schema renames]
//!     ↓
//! [role fill]
//!     ↓
//! [prefill]           (Claude family only)
//!     ↓
//! [tool-call ids]
//!     ↓
//! [thought signatures] (non-Claude families only)
//!     ↓
//! [grouping]          (targets requiring strict call/result grouping)
//!     ↓
//! [safety defaults]
//!     ↓
//! Upstream body
//! ```
//!
//! All per-request state (call registry, pending groups, response buffer) is
//! created inside the stage that needs it and dropped when the stage returns,
//! so a single [`RequestNormalizer`] can be shared across concurrent requests.

pub mod grouping;
pub mod model;
pub mod prefill;
pub mod roles;
pub mod safety;
pub mod schema;
pub mod signatures;
pub mod tool_ids;
pub mod tree;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::core::config::AppConfig;
use crate::core::error::Result;
use crate::core::logging::current_or_new_request_id;

pub use grouping::{ConversationGrouper, GroupingStage};
pub use model::{ModelFamily, PartKind, RoleTag};
pub use prefill::PrefillStage;
pub use roles::RoleNormalizeStage;
pub use safety::{SafetyDefaultsStage, SafetyThreshold};
pub use schema::{EnvelopeStage, SchemaRenameStage};
pub use signatures::{ThoughtSignatureStage, SKIP_SIGNATURE_SENTINEL};
pub use tool_ids::{CallRegistry, RandomToolIds, ToolCallLinkStage, ToolIdGenerator};

/// Key holding the turn list inside the request body.
pub const CONTENTS_KEY: &str = "contents";

// ============================================================================
// Upstream Target
// ============================================================================

/// A string did not name any known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Request shape expected by the upstream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamTarget {
    /// Plain v1beta `generateContent` body
    Gemini,
    /// Body wrapped in a `{project, request, model}` envelope
    #[default]
    Antigravity,
}

impl UpstreamTarget {
    /// Key under which the client body is nested, if the target wraps it.
    pub fn envelope_key(self) -> Option<&'static str> {
        match self {
            UpstreamTarget::Gemini => None,
            UpstreamTarget::Antigravity => Some("request"),
        }
    }

    /// Whether tool results must be bundled right after the turn that issued the calls.
    pub fn requires_grouping(self) -> bool {
        matches!(self, UpstreamTarget::Antigravity)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UpstreamTarget::Gemini => "gemini",
            UpstreamTarget::Antigravity => "antigravity",
        }
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpstreamTarget {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(UpstreamTarget::Gemini),
            "antigravity" => Ok(UpstreamTarget::Antigravity),
            _ => Err(UnknownVariant::new("upstream target", s)),
        }
    }
}

// ============================================================================
// Normalize Context
// ============================================================================

/// Read-only facts about the request being normalized.
///
/// Built once per call; the model family is classified here and never
/// re-derived by individual stages.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub request_id: String,
    pub model: String,
    pub family: ModelFamily,
    pub target: UpstreamTarget,
    /// Carried for callers; no stage depends on it.
    pub stream: bool,
    pub project: String,
    pub safety_threshold: SafetyThreshold,
}

impl NormalizeContext {
    pub fn new(target: UpstreamTarget, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            request_id: current_or_new_request_id(),
            family: ModelFamily::classify(&model),
            model,
            target,
            stream: false,
            project: String::new(),
            safety_threshold: SafetyThreshold::default(),
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn with_safety_threshold(mut self, threshold: SafetyThreshold) -> Self {
        self.safety_threshold = threshold;
        self
    }

    /// Resolve a body-relative path against the target's envelope.
    pub fn path(&self, suffix: &str) -> String {
        match self.target.envelope_key() {
            Some(key) => format!("{}.{}", key, suffix),
            None => suffix.to_string(),
        }
    }

    pub fn conversation_path(&self) -> String {
        self.path(CONTENTS_KEY)
    }
}

/// Mutable turn list of the payload, if present and an array.
pub(crate) fn conversation_mut<'a>(
    payload: &'a mut Value,
    ctx: &NormalizeContext,
) -> Option<&'a mut Vec<Value>> {
    tree::get_mut(payload, &ctx.conversation_path()).and_then(Value::as_array_mut)
}

// ============================================================================
// Normalize Stage Trait
// ============================================================================

/// One rewrite pass over the payload tree.
///
/// Stages hold no per-request state; anything they need to track during a
/// walk lives on the stack of [`NormalizeStage::apply`].
pub trait NormalizeStage: Send + Sync {
    /// Stage name for logging/debugging.
    fn name(&self) -> &'static str;

    /// Whether the stage runs for this request. Defaults to always.
    fn applies_to(&self, _ctx: &NormalizeContext) -> bool {
        true
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()>;
}

/// Ordered list of stages applied one after another.
#[derive(Default)]
pub struct StageChain {
    stages: Vec<Box<dyn NormalizeStage>>,
}

impl StageChain {
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a stage to the end of the chain.
    pub fn add_stage<S: NormalizeStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl NormalizeStage for StageChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        for stage in &self.stages {
            if !stage.applies_to(ctx) {
                tracing::trace!(request_id = %ctx.request_id, stage = stage.name(), "Stage skipped");
                continue;
            }
            stage.apply(payload, ctx)?;
        }
        Ok(())
    }
}

// ============================================================================
// Request Normalizer
// ============================================================================

/// Entry point: owns the stage chain for one upstream target.
///
/// # Example
///
/// ```
/// use llm_normalizer_rust::normalizer::{RequestNormalizer, UpstreamTarget};
/// use serde_json::json;
///
/// let normalizer = RequestNormalizer::new(UpstreamTarget::Gemini);
/// let body = json!({"contents": [{"parts": [{"text": "hi"}]}]});
/// let out = normalizer.normalize("gemini-2.5-pro", body, false).unwrap();
/// assert_eq!(out["contents"][0]["role"], "user");
/// ```
pub struct RequestNormalizer {
    target: UpstreamTarget,
    project: String,
    safety_threshold: SafetyThreshold,
    chain: StageChain,
}

impl RequestNormalizer {
    pub fn new(target: UpstreamTarget) -> Self {
        Self {
            target,
            project: String::new(),
            safety_threshold: SafetyThreshold::default(),
            chain: build_chain(target, Arc::new(RandomToolIds)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut normalizer = Self::new(config.target);
        normalizer.project = config.project.clone();
        normalizer.safety_threshold = config.safety_threshold;
        normalizer
    }

    /// Replace the identifier source used for synthesized tool-call ids.
    pub fn with_id_generator(mut self, ids: Arc<dyn ToolIdGenerator>) -> Self {
        self.chain = build_chain(self.target, ids);
        self
    }

    pub fn target(&self) -> UpstreamTarget {
        self.target
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.chain.names()
    }

    /// Context for one request against this normalizer's target.
    pub fn context(&self, model: &str, stream: bool) -> NormalizeContext {
        NormalizeContext::new(self.target, model)
            .with_stream(stream)
            .with_project(self.project.clone())
            .with_safety_threshold(self.safety_threshold)
    }

    pub fn normalize(&self, model: &str, payload: Value, stream: bool) -> Result<Value> {
        let ctx = self.context(model, stream);
        self.normalize_with_context(payload, &ctx)
    }

    pub fn normalize_with_context(&self, mut payload: Value, ctx: &NormalizeContext) -> Result<Value> {
        tracing::debug!(
            request_id = %ctx.request_id,
            model = %ctx.model,
            target = %ctx.target,
            family = ?ctx.family,
            "Normalizing request"
        );

        if ctx.target.envelope_key().is_none() && !tree::exists(&payload, CONTENTS_KEY) {
            tracing::debug!(request_id = %ctx.request_id, "No conversation, applying safety defaults only");
            SafetyDefaultsStage.apply(&mut payload, ctx)?;
            return Ok(payload);
        }

        self.chain.apply(&mut payload, ctx)?;
        Ok(payload)
    }

    /// Parse, normalize and re-serialize a raw request body.
    pub fn normalize_bytes(&self, model: &str, body: &[u8], stream: bool) -> Result<Vec<u8>> {
        let payload: Value = serde_json::from_slice(body)?;
        let normalized = self.normalize(model, payload, stream)?;
        Ok(serde_json::to_vec(&normalized)?)
    }
}

fn build_chain(target: UpstreamTarget, ids: Arc<dyn ToolIdGenerator>) -> StageChain {
    let chain = if target.envelope_key().is_some() {
        StageChain::new().add_stage(EnvelopeStage)
    } else {
        StageChain::new()
    };

    let chain = chain
        .add_stage(SchemaRenameStage)
        .add_stage(RoleNormalizeStage)
        .add_stage(PrefillStage)
        .add_stage(ToolCallLinkStage::new(ids))
        .add_stage(ThoughtSignatureStage);

    let chain = if target.requires_grouping() {
        chain.add_stage(GroupingStage)
    } else {
        chain
    };

    chain.add_stage(SafetyDefaultsStage)
}
