//! Trailing assistant prefill rewrite for Claude-family models.
//!
//! Some clients end the conversation with a partial `model` turn to steer the
//! continuation. The Claude backend rejects a conversation that ends on the
//! model, so the turn is replaced by a user instruction carrying its text.

use serde_json::{json, Value};

use super::model::{self, PartKind, RoleTag, ROLE_USER};
use super::{conversation_mut, NormalizeContext, NormalizeStage};
use crate::core::error::Result;

pub const PREFILL_PREFIX: &str = "Continue from: ";

/// Concatenated text of a trailing prefill turn, or `None` if the last turn is
/// not a prefill (wrong role, or it issues tool calls).
fn prefill_text(turn: &Value) -> Option<String> {
    if RoleTag::of(turn) != RoleTag::Model || model::has_part(turn, PartKind::FunctionCall) {
        return None;
    }
    Some(
        model::parts(turn)
            .iter()
            .filter(|p| PartKind::of(p) == PartKind::Text)
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrefillStage;

impl NormalizeStage for PrefillStage {
    fn name(&self) -> &'static str {
        "prefill"
    }

    fn applies_to(&self, ctx: &NormalizeContext) -> bool {
        ctx.family.is_claude()
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let Some(turns) = conversation_mut(payload, ctx) else {
            return Ok(());
        };
        let Some(text) = turns.last().and_then(prefill_text) else {
            return Ok(());
        };

        turns.pop();
        if !text.is_empty() {
            turns.push(json!({
                "role": ROLE_USER,
                "parts": [{"text": format!("{}{}", PREFILL_PREFIX, text)}]
            }));
        }

        tracing::debug!(
            request_id = %ctx.request_id,
            chars = text.len(),
            "Rewrote trailing prefill turn"
        );
        Ok(())
    }
}
