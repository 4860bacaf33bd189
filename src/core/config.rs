//! Configuration management for the request normalizer.
//!
//! Configuration can be loaded from a YAML file (with environment variable
//! expansion) or built from defaults plus environment overrides.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;

use crate::normalizer::{SafetyThreshold, UpstreamTarget};

static ENV_VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["']?\$\{([^}:]+)(?::?-?([^}]*))?\}["']?"#).expect("valid env var pattern")
});

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream request shape produced by the normalizer
    #[serde(default)]
    pub target: UpstreamTarget,

    /// Project identifier written into the envelope for enveloped targets
    #[serde(default)]
    pub project: String,

    /// Threshold used when the client sent no safety settings
    #[serde(default)]
    pub safety_threshold: SafetyThreshold,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use llm_normalizer_rust::core::config::AppConfig;
    ///
    /// let config = AppConfig::load("normalizer.yaml").expect("Failed to load config");
    /// ```
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let expanded = expand_env_vars(&content);

        let mut config: AppConfig = if expanded.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(&expanded)
                .with_context(|| format!("Failed to parse config file: {}", path))?
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Build configuration from defaults and environment variables only.
    pub fn from_env() -> Result<Self> {
        let mut config = AppConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Environment variables take precedence over file values.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(target) = std::env::var("NORMALIZER_TARGET") {
            self.target = target
                .parse()
                .with_context(|| format!("Invalid NORMALIZER_TARGET: {}", target))?;
        }

        if let Ok(project) = std::env::var("NORMALIZER_PROJECT") {
            self.project = project;
        }

        if let Ok(threshold) = std::env::var("NORMALIZER_SAFETY_THRESHOLD") {
            self.safety_threshold = threshold
                .parse()
                .with_context(|| format!("Invalid NORMALIZER_SAFETY_THRESHOLD: {}", threshold))?;
        }

        Ok(())
    }
}

/// Expand environment variables in configuration content.
///
/// Supports patterns: ${VAR}, ${VAR:-default}, ${VAR:default}
fn expand_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            std::env::var(var_name).unwrap_or_else(|_| default_value.to_string())
        })
        .to_string()
}
