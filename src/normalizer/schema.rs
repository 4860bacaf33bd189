//! Envelope wrapping and field renames.
//!
//! Renames move values verbatim: nothing below a renamed key is parsed or
//! rewritten. A missing source key is never an error.

use serde_json::{Map, Value};

use super::{tree, NormalizeContext, NormalizeStage};
use crate::core::error::Result;

const TOOLS_KEY: &str = "tools";
const DECLARATIONS_CLIENT: &str = "functionDeclarations";
const DECLARATIONS_UPSTREAM: &str = "function_declarations";
const PARAMETERS_CLIENT: &str = "parameters";
const PARAMETERS_UPSTREAM: &str = "parametersJsonSchema";
const RESPONSE_SCHEMA_CLIENT: &str = "generationConfig.responseSchema";
const RESPONSE_SCHEMA_UPSTREAM: &str = "generationConfig.responseJsonSchema";
const SYSTEM_INSTRUCTION_CLIENT: &str = "system_instruction";
const SYSTEM_INSTRUCTION_UPSTREAM: &str = "systemInstruction";

/// Wraps the client body as `{"project", "request", "model"}`.
///
/// Any `model` field the client put in the body is dropped; the envelope's
/// `model` is the one the caller routed to.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeStage;

impl NormalizeStage for EnvelopeStage {
    fn name(&self) -> &'static str {
        "envelope"
    }

    fn applies_to(&self, ctx: &NormalizeContext) -> bool {
        ctx.target.envelope_key().is_some()
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let Some(key) = ctx.target.envelope_key() else {
            return Ok(());
        };

        let mut body = std::mem::take(payload);
        if let Some(map) = body.as_object_mut() {
            map.shift_remove("model");
        }

        let mut envelope = Map::new();
        envelope.insert("project".to_string(), Value::String(ctx.project.clone()));
        envelope.insert(key.to_string(), body);
        envelope.insert("model".to_string(), Value::String(ctx.model.clone()));
        *payload = Value::Object(envelope);
        Ok(())
    }
}

/// Renames client field spellings to the ones upstream expects.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaRenameStage;

impl NormalizeStage for SchemaRenameStage {
    fn name(&self) -> &'static str {
        "schema_renames"
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let mut renamed = 0usize;

        let tools = ctx.path(TOOLS_KEY);
        for i in 0..tree::array_len(payload, &tools) {
            let tool = format!("{}.{}", tools, i);
            if tree::rename(
                payload,
                &format!("{}.{}", tool, DECLARATIONS_CLIENT),
                &format!("{}.{}", tool, DECLARATIONS_UPSTREAM),
            )? {
                renamed += 1;
            }

            let declarations = format!("{}.{}", tool, DECLARATIONS_UPSTREAM);
            for j in 0..tree::array_len(payload, &declarations) {
                let declaration = format!("{}.{}", declarations, j);
                if tree::rename(
                    payload,
                    &format!("{}.{}", declaration, PARAMETERS_CLIENT),
                    &format!("{}.{}", declaration, PARAMETERS_UPSTREAM),
                )? {
                    renamed += 1;
                }
            }
        }

        if tree::rename(
            payload,
            &ctx.path(RESPONSE_SCHEMA_CLIENT),
            &ctx.path(RESPONSE_SCHEMA_UPSTREAM),
        )? {
            renamed += 1;
        }

        if ctx.target.envelope_key().is_some()
            && tree::rename(
                payload,
                &ctx.path(SYSTEM_INSTRUCTION_CLIENT),
                &ctx.path(SYSTEM_INSTRUCTION_UPSTREAM),
            )?
        {
            renamed += 1;
        }

        if renamed > 0 {
            tracing::debug!(request_id = %ctx.request_id, renamed, "Renamed schema fields");
        }
        Ok(())
    }
}
