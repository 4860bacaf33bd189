//! Role fill for turns with a missing or unsupported role.

use serde_json::Value;

use super::model::{RoleTag, ROLE_MODEL, ROLE_USER};
use super::{conversation_mut, NormalizeContext, NormalizeStage};
use crate::core::error::Result;

/// Role to assign to a turn whose own role is unusable, given the role of the
/// turn before it.
///
/// Alternates starting from `user`. Turns that already carry a legal role
/// are never rewritten, so two client-supplied `model` turns in a row stay
/// as they are.
pub fn infer_role(previous: Option<RoleTag>) -> RoleTag {
    match previous {
        Some(RoleTag::User) => RoleTag::Model,
        _ => RoleTag::User,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RoleNormalizeStage;

impl NormalizeStage for RoleNormalizeStage {
    fn name(&self) -> &'static str {
        "role_fill"
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let Some(turns) = conversation_mut(payload, ctx) else {
            return Ok(());
        };

        let mut previous: Option<RoleTag> = None;
        let mut filled = 0usize;

        for turn in turns.iter_mut() {
            let current = RoleTag::of(turn);
            if current.is_wire_legal() {
                previous = Some(current);
                continue;
            }
            let Some(obj) = turn.as_object_mut() else {
                continue;
            };

            let inferred = infer_role(previous);
            let role = if inferred == RoleTag::User {
                ROLE_USER
            } else {
                ROLE_MODEL
            };
            obj.insert("role".to_string(), Value::String(role.to_string()));
            previous = Some(inferred);
            filled += 1;
        }

        if filled > 0 {
            tracing::debug!(request_id = %ctx.request_id, filled, "Filled missing turn roles");
        }
        Ok(())
    }
}
