//! Tool-call identifier synthesis and response linking.
//!
//! Calls and responses are paired per function name by position: the n-th
//! response to `foo` answers the n-th call to `foo`. Argument content is
//! never inspected.

use rand::{rngs::OsRng, RngCore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::model::RoleTag;
use super::{conversation_mut, NormalizeContext, NormalizeStage};
use crate::core::error::Result;

pub const TOOL_ID_PREFIX: &str = "toolu_";
const TOOL_ID_RANDOM_BYTES: usize = 12;

/// Fresh `toolu_` identifier with a random hex suffix from the OS CSPRNG.
pub fn generate_tool_id() -> String {
    let mut bytes = [0u8; TOOL_ID_RANDOM_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", TOOL_ID_PREFIX, hex::encode(bytes))
}

/// Source of identifiers for tool calls that arrive without one.
///
/// Shared by every request a normalizer handles, so implementations must be
/// safe to call concurrently.
pub trait ToolIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// Default generator backed by [`generate_tool_id`]. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomToolIds;

impl ToolIdGenerator for RandomToolIds {
    fn next_id(&self) -> String {
        generate_tool_id()
    }
}

/// Per-request map of `(function name, ordinal)` to call id.
#[derive(Debug, Default)]
pub struct CallRegistry {
    ids: HashMap<(String, usize), Value>,
    calls_issued: HashMap<String, usize>,
    responses_consumed: HashMap<String, usize>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the next call to `name` under `id`.
    pub fn record_call(&mut self, name: &str, id: Value) {
        let issued = self.calls_issued.entry(name.to_string()).or_insert(0);
        self.ids.insert((name.to_string(), *issued), id);
        *issued += 1;
    }

    /// Id of the oldest call to `name` not yet answered.
    ///
    /// The consumed counter only advances on a match, so an unmatched
    /// response does not shift the pairing of later ones.
    pub fn claim_response(&mut self, name: &str) -> Option<Value> {
        let consumed = self.responses_consumed.entry(name.to_string()).or_insert(0);
        let id = self.ids.get(&(name.to_string(), *consumed))?.clone();
        *consumed += 1;
        Some(id)
    }

    pub fn calls_issued(&self, name: &str) -> usize {
        self.calls_issued.get(name).copied().unwrap_or(0)
    }

    pub fn responses_consumed(&self, name: &str) -> usize {
        self.responses_consumed.get(name).copied().unwrap_or(0)
    }
}

/// Existing id on a call or response object, if it is non-empty.
fn existing_id(obj: &serde_json::Map<String, Value>) -> Option<&Value> {
    match obj.get("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(id) => Some(id),
    }
}

fn function_name(obj: &serde_json::Map<String, Value>) -> String {
    match obj.get("name") {
        Some(Value::String(name)) => name.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Gives every function call an id and copies it onto the matching response.
pub struct ToolCallLinkStage {
    ids: Arc<dyn ToolIdGenerator>,
}

impl ToolCallLinkStage {
    pub fn new(ids: Arc<dyn ToolIdGenerator>) -> Self {
        Self { ids }
    }
}

impl Default for ToolCallLinkStage {
    fn default() -> Self {
        Self::new(Arc::new(RandomToolIds))
    }
}

impl NormalizeStage for ToolCallLinkStage {
    fn name(&self) -> &'static str {
        "tool_call_ids"
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let Some(turns) = conversation_mut(payload, ctx) else {
            return Ok(());
        };

        let mut registry = CallRegistry::new();
        let mut generated = 0usize;
        let mut linked = 0usize;
        let mut unmatched = 0usize;
        let mut malformed = 0usize;

        for turn in turns.iter_mut() {
            let role = RoleTag::of(turn);
            let Some(parts) = turn.get_mut("parts").and_then(Value::as_array_mut) else {
                continue;
            };

            match role {
                RoleTag::Model => {
                    for call in parts.iter_mut().filter_map(|p| p.get_mut("functionCall")) {
                        let Some(call) = call.as_object_mut() else {
                            malformed += 1;
                            continue;
                        };
                        let name = function_name(call);
                        let id = match existing_id(call) {
                            Some(id) => id.clone(),
                            None => {
                                let id = Value::String(self.ids.next_id());
                                call.insert("id".to_string(), id.clone());
                                generated += 1;
                                id
                            }
                        };
                        registry.record_call(&name, id);
                    }
                }
                RoleTag::User | RoleTag::Function => {
                    for response in parts
                        .iter_mut()
                        .filter_map(|p| p.get_mut("functionResponse"))
                        .filter_map(Value::as_object_mut)
                    {
                        if existing_id(response).is_some() {
                            continue;
                        }
                        let name = function_name(response);
                        match registry.claim_response(&name) {
                            Some(id) => {
                                response.insert("id".to_string(), id);
                                linked += 1;
                            }
                            None => unmatched += 1,
                        }
                    }
                }
                RoleTag::Unset | RoleTag::Invalid => {}
            }
        }

        if malformed > 0 {
            tracing::warn!(
                request_id = %ctx.request_id,
                malformed,
                "Skipped functionCall parts that are not objects"
            );
        }

        tracing::debug!(
            request_id = %ctx.request_id,
            generated,
            linked,
            unmatched,
            "Linked tool call ids"
        );
        Ok(())
    }
}
