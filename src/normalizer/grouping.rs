//! Call/result grouping.
//!
//! The enveloped endpoint requires that a model turn issuing N function calls
//! is immediately followed by one turn holding all N results. Clients often
//! send results one per turn, or interleave them with other content. The
//! grouper walks the turns once, buffering results and emitting a grouping
//! turn as soon as an open call turn can be satisfied.
//!
//! During the walk the most recently opened group is tried first; the final
//! flush goes oldest first.

use serde_json::{json, Map, Value};
use std::collections::VecDeque;

use super::model::{self, PartKind, RoleTag, ROLE_FUNCTION};
use super::{tree, NormalizeContext, NormalizeStage};
use crate::core::error::Result;
use crate::core::NormalizeError;

/// A model turn still waiting for its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingGroup {
    required_responses: usize,
}

/// Text form of a value for the fallback `result` field.
fn render_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Return a well-formed response part, rebuilding it when the payload under
/// `functionResponse` cannot be forwarded as-is.
pub fn recover_response_part(part: Value) -> Value {
    let Some(response) = part.get("functionResponse") else {
        return part;
    };

    match response {
        Value::Object(fr) => {
            let well_formed = fr.get("response").map_or(true, Value::is_object);
            if well_formed {
                return part;
            }

            tracing::warn!("Malformed function response, using fallback");
            let mut rebuilt = Map::new();
            rebuilt.insert(
                "name".to_string(),
                Value::String(fr.get("name").map(render_text).unwrap_or_default()),
            );
            rebuilt.insert(
                "response".to_string(),
                json!({"result": fr.get("response").map(render_text).unwrap_or_default()}),
            );
            match fr.get("id") {
                None | Some(Value::Null) => {}
                Some(Value::String(id)) if id.is_empty() => {}
                Some(id) => {
                    rebuilt.insert("id".to_string(), id.clone());
                }
            }
            json!({"functionResponse": rebuilt})
        }
        other => {
            tracing::warn!("Function response is not an object, using fallback");
            json!({"functionResponse": {"name": "unknown", "response": {"result": render_text(other)}}})
        }
    }
}

/// Streaming state for one grouping pass.
#[derive(Debug, Default)]
pub struct ConversationGrouper {
    output: Vec<Value>,
    pending: Vec<PendingGroup>,
    buffer: VecDeque<Value>,
    groups_emitted: usize,
}

impl ConversationGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_turn(&mut self, turn: Value) {
        if !turn.is_object() {
            tracing::warn!("Dropping conversation turn that is not an object");
            return;
        }

        if !model::has_part(&turn, PartKind::FunctionResponse) {
            self.push_plain(turn);
            return;
        }

        let mut turn = turn;
        let (responses, residual): (Vec<Value>, Vec<Value>) = model::parts_mut(&mut turn)
            .map(std::mem::take)
            .unwrap_or_default()
            .into_iter()
            .partition(|p| PartKind::of(p) == PartKind::FunctionResponse);

        self.buffer.extend(responses);
        self.resolve_newest_first();

        // Other content that travelled with the results stays, in its own turn.
        if !residual.is_empty() {
            if let Some(parts) = model::parts_mut(&mut turn) {
                *parts = residual;
            }
            self.push_plain(turn);
        }
    }

    fn push_plain(&mut self, turn: Value) {
        let calls = if RoleTag::of(&turn) == RoleTag::Model {
            model::count_parts(&turn, PartKind::FunctionCall)
        } else {
            0
        };
        self.output.push(turn);
        if calls > 0 {
            self.pending.push(PendingGroup {
                required_responses: calls,
            });
        }
    }

    /// Resolve at most one group, newest first.
    fn resolve_newest_first(&mut self) {
        let available = self.buffer.len();
        if let Some(idx) = self
            .pending
            .iter()
            .rposition(|g| g.required_responses <= available)
        {
            let group = self.pending.remove(idx);
            self.emit(group);
        }
    }

    fn emit(&mut self, group: PendingGroup) {
        let parts: Vec<Value> = self
            .buffer
            .drain(..group.required_responses)
            .map(recover_response_part)
            .collect();
        if parts.is_empty() {
            return;
        }
        self.output.push(json!({"parts": parts, "role": ROLE_FUNCTION}));
        self.groups_emitted += 1;
    }

    pub fn groups_emitted(&self) -> usize {
        self.groups_emitted
    }

    /// Emit remaining groups oldest first, as far as the buffer allows.
    pub fn flush(&mut self) {
        for group in std::mem::take(&mut self.pending) {
            if self.buffer.len() >= group.required_responses {
                self.emit(group);
            }
        }
    }

    /// Flush and return the regrouped turns.
    pub fn finish(mut self) -> Vec<Value> {
        self.flush();
        if !self.buffer.is_empty() {
            tracing::warn!(
                dropped = self.buffer.len(),
                "Dropping function responses with no open call turn"
            );
        }
        self.output
    }
}

/// Regroup a full turn list in one pass.
pub fn group_turns(turns: Vec<Value>) -> Vec<Value> {
    let mut grouper = ConversationGrouper::new();
    for turn in turns {
        grouper.push_turn(turn);
    }
    grouper.finish()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupingStage;

impl NormalizeStage for GroupingStage {
    fn name(&self) -> &'static str {
        "grouping"
    }

    fn applies_to(&self, ctx: &NormalizeContext) -> bool {
        ctx.target.requires_grouping()
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let path = ctx.conversation_path();
        let turns = match tree::get_mut(payload, &path) {
            None => return Err(NormalizeError::MissingConversation { path }.into()),
            Some(Value::Array(turns)) => turns,
            Some(_) => return Err(NormalizeError::MalformedConversation { path }.into()),
        };

        let before = turns.len();
        let mut grouper = ConversationGrouper::new();
        for turn in std::mem::take(turns) {
            grouper.push_turn(turn);
        }
        grouper.flush();
        let groups = grouper.groups_emitted();
        *turns = grouper.finish();

        tracing::debug!(
            request_id = %ctx.request_id,
            turns_in = before,
            turns_out = turns.len(),
            groups,
            "Grouped function responses"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::UpstreamTarget;
    use pretty_assertions::assert_eq;

    fn call(name: &str) -> Value {
        json!({"functionCall": {"name": name, "args": {}}})
    }

    fn resp(name: &str) -> Value {
        json!({"functionResponse": {"name": name, "response": {"result": name}}})
    }

    fn response_count(turns: &[Value]) -> usize {
        turns
            .iter()
            .map(|t| model::count_parts(t, PartKind::FunctionResponse))
            .sum()
    }

    #[test]
    fn test_two_calls_two_single_response_turns() {
        let turns = vec![
            json!({"role": "user", "parts": [{"text": "go"}]}),
            json!({"role": "model", "parts": [call("a"), call("b")]}),
            json!({"role": "user", "parts": [resp("a")]}),
            json!({"role": "user", "parts": [resp("b")]}),
        ];
        let out = group_turns(turns);

        assert_eq!(out.len(), 3);
        assert_eq!(out[2], json!({"parts": [resp("a"), resp("b")], "role": "function"}));
        assert_eq!(response_count(&out), 2);
    }

    #[test]
    fn test_newest_group_resolved_first_during_walk() {
        let turns = vec![
            json!({"role": "model", "parts": [call("a"), call("b")]}),
            json!({"role": "model", "parts": [call("c")]}),
            json!({"role": "user", "parts": [resp("a")]}),
            json!({"role": "user", "parts": [resp("b")]}),
        ];
        let out = group_turns(turns);

        // The first result closes the newer single-call group; the older
        // two-call group never sees enough results and the leftover is dropped.
        assert_eq!(out.len(), 3);
        assert_eq!(out[2]["parts"], json!([resp("a")]));
        assert_eq!(response_count(&out), 1);
    }

    #[test]
    fn test_newest_group_wins_when_both_fit() {
        let turns = vec![
            json!({"role": "model", "parts": [call("a"), call("b"), call("c")]}),
            json!({"role": "model", "parts": [call("d"), call("e"), call("f"), call("g")]}),
            json!({"role": "user", "parts": [resp("a"), resp("b")]}),
            json!({"role": "user", "parts": [resp("c"), resp("d")]}),
        ];
        let out = group_turns(turns);

        // Two results satisfy neither group; at four both fit and the newest
        // takes them.
        assert_eq!(out.len(), 3);
        assert_eq!(out[2]["parts"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_flush_emits_remaining_groups_in_creation_order() {
        let mut grouper = ConversationGrouper::new();
        grouper.pending.push(PendingGroup { required_responses: 1 });
        grouper.pending.push(PendingGroup { required_responses: 2 });
        grouper.buffer.extend([resp("x"), resp("y"), resp("z")]);
        let out = grouper.finish();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["parts"], json!([resp("x")]));
        assert_eq!(out[1]["parts"], json!([resp("y"), resp("z")]));
    }

    #[test]
    fn test_at_most_one_group_per_turn() {
        let turns = vec![
            json!({"role": "model", "parts": [call("a")]}),
            json!({"role": "model", "parts": [call("b")]}),
            json!({"role": "user", "parts": [resp("a"), resp("b")]}),
        ];
        let out = group_turns(turns);
        // One resolved during the walk, the other at flush.
        assert_eq!(out.len(), 4);
        assert_eq!(out[2]["parts"], json!([resp("a")]));
        assert_eq!(out[3]["parts"], json!([resp("b")]));
    }

    #[test]
    fn test_residual_parts_kept_after_grouping_turn() {
        let turns = vec![
            json!({"role": "model", "parts": [call("a")]}),
            json!({"role": "user", "parts": [resp("a"), {"text": "and also this"}]}),
        ];
        let out = group_turns(turns);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1]["role"], "function");
        assert_eq!(out[2], json!({"role": "user", "parts": [{"text": "and also this"}]}));
    }

    #[test]
    fn test_unmatched_responses_are_dropped() {
        let turns = vec![
            json!({"role": "user", "parts": [{"text": "hi"}]}),
            json!({"role": "user", "parts": [resp("orphan")]}),
        ];
        let out = group_turns(turns);
        assert_eq!(out, vec![json!({"role": "user", "parts": [{"text": "hi"}]})]);
    }

    #[test]
    fn test_non_object_call_opens_no_slot() {
        let turns = vec![
            json!({"role": "model", "parts": [{"functionCall": "bad"}, call("a")]}),
            json!({"role": "user", "parts": [resp("a")]}),
            json!({"role": "model", "parts": [call("b")]}),
            json!({"role": "user", "parts": [resp("b")]}),
        ];
        let out = group_turns(turns);

        assert_eq!(out.len(), 4);
        assert_eq!(out[1]["parts"], json!([resp("a")]));
        assert_eq!(out[3]["parts"], json!([resp("b")]));
    }

    #[test]
    fn test_non_object_turns_dropped() {
        let out = group_turns(vec![json!("junk"), json!({"role": "user", "parts": []})]);
        assert_eq!(out, vec![json!({"role": "user", "parts": []})]);
    }

    #[test]
    fn test_recover_response_part() {
        let good = resp("a");
        assert_eq!(recover_response_part(good.clone()), good);

        let scalar_result = json!({"functionResponse": {"name": "a", "id": "t1", "response": "done"}});
        assert_eq!(
            recover_response_part(scalar_result),
            json!({"functionResponse": {"name": "a", "response": {"result": "done"}, "id": "t1"}})
        );

        let not_object = json!({"functionResponse": 42});
        assert_eq!(
            recover_response_part(not_object),
            json!({"functionResponse": {"name": "unknown", "response": {"result": "42"}}})
        );
    }

    #[test]
    fn test_stage_errors() {
        let ctx = NormalizeContext::new(UpstreamTarget::Antigravity, "gemini-2.5-pro");

        let mut missing = json!({"request": {}});
        let err = GroupingStage.apply(&mut missing, &ctx).unwrap_err();
        assert!(matches!(
            err,
            crate::core::AppError::Normalize(NormalizeError::MissingConversation { .. })
        ));

        let mut malformed = json!({"request": {"contents": {"role": "user"}}});
        let err = GroupingStage.apply(&mut malformed, &ctx).unwrap_err();
        assert!(matches!(
            err,
            crate::core::AppError::Normalize(NormalizeError::MalformedConversation { .. })
        ));
    }

    #[test]
    fn test_stage_rewrites_contents_in_place() {
        let ctx = NormalizeContext::new(UpstreamTarget::Antigravity, "gemini-2.5-pro");
        let mut payload = json!({"request": {"contents": [
            {"role": "model", "parts": [call("a")]},
            {"role": "user", "parts": [resp("a")]}
        ], "generationConfig": {}}});
        GroupingStage.apply(&mut payload, &ctx).unwrap();
        assert_eq!(payload["request"]["contents"][1]["role"], "function");
        assert!(payload["request"].get("generationConfig").is_some());
    }
}
