//! Safety-settings defaulting.
//!
//! When the client sends no safety settings, upstream falls back to its own
//! (stricter) defaults. The engine fills in all harm categories with the
//! configured threshold instead. Client-supplied settings are left alone.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use super::{tree, NormalizeContext, NormalizeStage, UnknownVariant};
use crate::core::error::Result;

pub const SAFETY_SETTINGS_KEY: &str = "safetySettings";

pub const HARM_CATEGORIES: [&str; 5] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_CIVIC_INTEGRITY",
];

/// Safety threshold levels for Gemini-family APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyThreshold {
    /// Disable all safety filters
    #[default]
    Off,
    BlockLowAndAbove,
    BlockMediumAndAbove,
    BlockOnlyHigh,
    BlockNone,
}

impl SafetyThreshold {
    pub fn as_str(self) -> &'static str {
        match self {
            SafetyThreshold::Off => "OFF",
            SafetyThreshold::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
            SafetyThreshold::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            SafetyThreshold::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            SafetyThreshold::BlockNone => "BLOCK_NONE",
        }
    }
}

impl fmt::Display for SafetyThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyThreshold {
    type Err = UnknownVariant;

    /// Accepts the wire names and the short forms `off`, `low`, `medium`, `high`, `none`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OFF" => Ok(SafetyThreshold::Off),
            "LOW" | "BLOCK_LOW_AND_ABOVE" => Ok(SafetyThreshold::BlockLowAndAbove),
            "MEDIUM" | "BLOCK_MEDIUM_AND_ABOVE" => Ok(SafetyThreshold::BlockMediumAndAbove),
            "HIGH" | "BLOCK_ONLY_HIGH" => Ok(SafetyThreshold::BlockOnlyHigh),
            "NONE" | "BLOCK_NONE" => Ok(SafetyThreshold::BlockNone),
            _ => Err(UnknownVariant::new("safety threshold", s)),
        }
    }
}

/// One entry per harm category, all at `threshold`.
pub fn default_safety_settings(threshold: SafetyThreshold) -> Value {
    Value::Array(
        HARM_CATEGORIES
            .iter()
            .map(|category| json!({"category": category, "threshold": threshold.as_str()}))
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyDefaultsStage;

impl NormalizeStage for SafetyDefaultsStage {
    fn name(&self) -> &'static str {
        "safety_defaults"
    }

    fn apply(&self, payload: &mut Value, ctx: &NormalizeContext) -> Result<()> {
        let path = ctx.path(SAFETY_SETTINGS_KEY);
        if tree::exists(payload, &path) {
            return Ok(());
        }
        tree::set(payload, &path, default_safety_settings(ctx.safety_threshold))?;
        tracing::debug!(
            request_id = %ctx.request_id,
            threshold = %ctx.safety_threshold,
            "Attached default safety settings"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::UpstreamTarget;

    #[test]
    fn test_threshold_parsing() {
        assert_eq!("OFF".parse::<SafetyThreshold>().unwrap(), SafetyThreshold::Off);
        assert_eq!("off".parse::<SafetyThreshold>().unwrap(), SafetyThreshold::Off);
        assert_eq!(
            "medium".parse::<SafetyThreshold>().unwrap(),
            SafetyThreshold::BlockMediumAndAbove
        );
        assert_eq!(
            "BLOCK_ONLY_HIGH".parse::<SafetyThreshold>().unwrap(),
            SafetyThreshold::BlockOnlyHigh
        );
        assert!("strict".parse::<SafetyThreshold>().is_err());
    }

    #[test]
    fn test_default_settings_cover_all_categories() {
        let settings = default_safety_settings(SafetyThreshold::BlockNone);
        let settings = settings.as_array().unwrap();
        assert_eq!(settings.len(), HARM_CATEGORIES.len());
        for (entry, category) in settings.iter().zip(HARM_CATEGORIES) {
            assert_eq!(entry["category"], category);
            assert_eq!(entry["threshold"], "BLOCK_NONE");
        }
    }

    #[test]
    fn test_stage_adds_settings_when_absent() {
        let ctx = NormalizeContext::new(UpstreamTarget::Gemini, "gemini-2.5-pro");
        let mut payload = json!({"contents": []});
        SafetyDefaultsStage.apply(&mut payload, &ctx).unwrap();
        assert_eq!(payload["safetySettings"][0]["threshold"], "OFF");
    }

    #[test]
    fn test_stage_keeps_client_settings() {
        let ctx = NormalizeContext::new(UpstreamTarget::Antigravity, "gemini-2.5-pro");
        let client = json!([{"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_ONLY_HIGH"}]);
        let mut payload = json!({"request": {"safetySettings": client.clone()}});
        SafetyDefaultsStage.apply(&mut payload, &ctx).unwrap();
        assert_eq!(payload["request"]["safetySettings"], client);
    }

    #[test]
    fn test_stage_uses_configured_threshold() {
        let ctx = NormalizeContext::new(UpstreamTarget::Antigravity, "gemini-2.5-pro")
            .with_safety_threshold(SafetyThreshold::BlockLowAndAbove);
        let mut payload = json!({"request": {}});
        SafetyDefaultsStage.apply(&mut payload, &ctx).unwrap();
        assert_eq!(
            payload["request"]["safetySettings"][4],
            json!({"category": "HARM_CATEGORY_CIVIC_INTEGRITY", "threshold": "BLOCK_LOW_AND_ABOVE"})
        );
    }
}
