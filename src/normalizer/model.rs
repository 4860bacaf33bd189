//! Typed views over conversation turns and parts.
//!
//! Turns and parts stay as JSON nodes so that fields the engine does not
//! understand are carried through untouched. These helpers classify them.

use serde_json::Value;

pub const ROLE_USER: &str = "user";
pub const ROLE_MODEL: &str = "model";
pub const ROLE_FUNCTION: &str = "function";

/// Structural role of a turn as sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleTag {
    User,
    Model,
    /// Only produced transiently by the grouper for bundled tool results
    Function,
    /// Missing, null or empty role
    Unset,
    /// Any other value, including non-string roles
    Invalid,
}

impl RoleTag {
    pub fn of(turn: &Value) -> Self {
        match turn.get("role") {
            None | Some(Value::Null) => RoleTag::Unset,
            Some(Value::String(role)) => match role.as_str() {
                "" => RoleTag::Unset,
                ROLE_USER => RoleTag::User,
                ROLE_MODEL => RoleTag::Model,
                ROLE_FUNCTION => RoleTag::Function,
                _ => RoleTag::Invalid,
            },
            Some(_) => RoleTag::Invalid,
        }
    }

    /// The two roles upstream accepts on the wire.
    pub fn is_wire_legal(self) -> bool {
        matches!(self, RoleTag::User | RoleTag::Model)
    }

    pub fn as_str(self) -> Option<&'static str> {
        match self {
            RoleTag::User => Some(ROLE_USER),
            RoleTag::Model => Some(ROLE_MODEL),
            RoleTag::Function => Some(ROLE_FUNCTION),
            RoleTag::Unset | RoleTag::Invalid => None,
        }
    }
}

/// Kind of a single content part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    Text,
    FunctionCall,
    FunctionResponse,
    Thought,
    /// Inline data, file references and anything else passed through as-is
    Other,
}

impl PartKind {
    /// A `functionCall` that is not an object is not a call.
    pub fn of(part: &Value) -> Self {
        if part.get("functionCall").is_some_and(Value::is_object) {
            PartKind::FunctionCall
        } else if part.get("functionResponse").is_some() {
            PartKind::FunctionResponse
        } else if is_thought(part) {
            PartKind::Thought
        } else if part.get("text").is_some_and(Value::is_string) {
            PartKind::Text
        } else {
            PartKind::Other
        }
    }
}

/// Whether a part is flagged as reasoning content (`"thought": true`).
pub fn is_thought(part: &Value) -> bool {
    part.get("thought").and_then(Value::as_bool) == Some(true)
}

pub fn parts(turn: &Value) -> &[Value] {
    turn.get("parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn parts_mut(turn: &mut Value) -> Option<&mut Vec<Value>> {
    turn.get_mut("parts").and_then(Value::as_array_mut)
}

pub fn count_parts(turn: &Value, kind: PartKind) -> usize {
    parts(turn).iter().filter(|p| PartKind::of(p) == kind).count()
}

pub fn has_part(turn: &Value, kind: PartKind) -> bool {
    parts(turn).iter().any(|p| PartKind::of(p) == kind)
}

/// Coarse family of the backend model, computed once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFamily {
    Claude,
    Other,
}

impl ModelFamily {
    pub fn classify(model: &str) -> Self {
        if model.to_ascii_lowercase().contains("claude") {
            ModelFamily::Claude
        } else {
            ModelFamily::Other
        }
    }

    pub fn is_claude(self) -> bool {
        self == ModelFamily::Claude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_tag_classification() {
        assert_eq!(RoleTag::of(&json!({"role": "user"})), RoleTag::User);
        assert_eq!(RoleTag::of(&json!({"role": "model"})), RoleTag::Model);
        assert_eq!(RoleTag::of(&json!({"role": "function"})), RoleTag::Function);
        assert_eq!(RoleTag::of(&json!({"role": ""})), RoleTag::Unset);
        assert_eq!(RoleTag::of(&json!({"parts": []})), RoleTag::Unset);
        assert_eq!(RoleTag::of(&json!({"role": null})), RoleTag::Unset);
        assert_eq!(RoleTag::of(&json!({"role": "assistant"})), RoleTag::Invalid);
        assert_eq!(RoleTag::of(&json!({"role": 7})), RoleTag::Invalid);
    }

    #[test]
    fn test_only_user_and_model_are_wire_legal() {
        assert!(RoleTag::User.is_wire_legal());
        assert!(RoleTag::Model.is_wire_legal());
        assert!(!RoleTag::Function.is_wire_legal());
        assert!(!RoleTag::Unset.is_wire_legal());
        assert!(!RoleTag::Invalid.is_wire_legal());
    }

    #[test]
    fn test_part_kind_classification() {
        assert_eq!(PartKind::of(&json!({"text": "hi"})), PartKind::Text);
        assert_eq!(
            PartKind::of(&json!({"functionCall": {"name": "f"}})),
            PartKind::FunctionCall
        );
        assert_eq!(
            PartKind::of(&json!({"functionResponse": {"name": "f"}})),
            PartKind::FunctionResponse
        );
        assert_eq!(
            PartKind::of(&json!({"text": "hmm", "thought": true})),
            PartKind::Thought
        );
        assert_eq!(
            PartKind::of(&json!({"text": "plain", "thought": false})),
            PartKind::Text
        );
        assert_eq!(
            PartKind::of(&json!({"inlineData": {"mimeType": "image/png"}})),
            PartKind::Other
        );
    }

    #[test]
    fn test_non_object_function_call_is_other() {
        assert_eq!(PartKind::of(&json!({"functionCall": "bad"})), PartKind::Other);
        assert_eq!(PartKind::of(&json!({"functionCall": null})), PartKind::Other);
        let turn = json!({"role": "model", "parts": [
            {"functionCall": ["a"]},
            {"functionCall": {"name": "b"}}
        ]});
        assert_eq!(count_parts(&turn, PartKind::FunctionCall), 1);
    }

    #[test]
    fn test_part_counting() {
        let turn = json!({"role": "model", "parts": [
            {"text": "calling"},
            {"functionCall": {"name": "a"}},
            {"functionCall": {"name": "b"}}
        ]});
        assert_eq!(count_parts(&turn, PartKind::FunctionCall), 2);
        assert!(has_part(&turn, PartKind::Text));
        assert!(!has_part(&turn, PartKind::FunctionResponse));
        assert!(parts(&json!({"role": "user"})).is_empty());
    }

    #[test]
    fn test_model_family_classification() {
        assert_eq!(ModelFamily::classify("claude-sonnet-4-5"), ModelFamily::Claude);
        assert_eq!(
            ModelFamily::classify("Claude-Opus-4-Thinking"),
            ModelFamily::Claude
        );
        assert_eq!(ModelFamily::classify("gemini-2.5-pro"), ModelFamily::Other);
        assert_eq!(ModelFamily::classify(""), ModelFamily::Other);
        assert!(ModelFamily::Claude.is_claude());
    }
}
