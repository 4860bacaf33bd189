//! Thought-signature handling for non-Claude backends.
//!
//! Gemini validates the `thoughtSignature` attached to reasoning parts and
//! function calls. Signatures minted by another provider, or missing
//! entirely, fail that check, so they are replaced by a sentinel that tells
//! upstream to skip validation. Claude-family requests pass through as-is.

use serde_json::Value;

use super::model::{self, PartKind, RoleTag};
use super::{conversation_mut, NormalizeContext, NormalizeStage};
use crate::core::error::Result;

pub const SKIP_SIGNATURE_SENTINEL: &str = "skip_thought_signature_validator";
pub const THOUGHT_SIGNATURE_KEY: &str = "thoughtSignature";

/// Signatures shorter than this cannot be genuine and are replaced.
pub const MIN_SIGNATURE_LEN: usize = 50;

fn has_usable_signature(part: &Value) -> bool {
    part.get(THOUGHT_SIGNATURE_KEY)
        .and_then(Value::as_str)
        .is_some_and(|sig| sig.len() >= MIN_SIGNATURE_LEN)
}

/// Whether a part's signature should be overwritten with the sentinel.
pub fn needs_sentinel(part: &Value) -> bool {
    if model::is_thought(part) {
        return true;
    }
    PartKind::of(part) == PartKind::FunctionCall && !has_usable_signature(part)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ThoughtSignatureStage;

impl NormalizeStage for ThoughtSignatureStage {
    fn name(&self) -> &'static str {
        "thought_signatures"
    }

    fn applies_to(&self, ctx: &NormalizeContext) -> bool {
        !ctx.family.is_claude()
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let Some(turns) = conversation_mut(payload, ctx) else {
            return Ok(());
        };

        let mut marked = 0usize;
        for turn in turns.iter_mut().filter(|t| RoleTag::of(t) == RoleTag::Model) {
            let Some(parts) = model::parts_mut(turn) else {
                continue;
            };
            for part in parts.iter_mut().filter(|p| needs_sentinel(p)) {
                if let Some(obj) = part.as_object_mut() {
                    obj.insert(
                        THOUGHT_SIGNATURE_KEY.to_string(),
                        Value::String(SKIP_SIGNATURE_SENTINEL.to_string()),
                    );
                    marked += 1;
                }
            }
        }

        if marked > 0 {
            tracing::debug!(request_id = %ctx.request_id, marked, "Marked thought signatures for skip");
        }
        Ok(())
    }
}
