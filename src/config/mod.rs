//! Typed configuration from environment variables or a TOML file.
//!
//! Loads once at startup, fails fast if a value is malformed. Every field
//! has a default, so an empty environment yields a usable config.

use crate::error::{Error, Result};
use crate::stream::context::RequestDefaults;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub application_name: String,
    pub environment: String,
    pub capture_content: bool,
    pub disable_metrics: bool,
    pub pricing_json: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            otel_endpoint: None,
            log_level: "info".to_string(),
            application_name: "default".to_string(),
            environment: "default".to_string(),
            capture_content: true,
            disable_metrics: false,
            pricing_json: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            application_name: std::env::var("STREAMTRACE_APPLICATION_NAME")
                .unwrap_or(defaults.application_name),
            environment: std::env::var("STREAMTRACE_ENVIRONMENT").unwrap_or(defaults.environment),
            capture_content: bool_var("STREAMTRACE_CAPTURE_CONTENT", defaults.capture_content)?,
            disable_metrics: bool_var("STREAMTRACE_DISABLE_METRICS", defaults.disable_metrics)?,
            pricing_json: std::env::var("STREAMTRACE_PRICING_JSON")
                .ok()
                .map(PathBuf::from),
        })
    }

    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))
    }

    /// Per-call defaults used to seed a [`RequestContext`](crate::stream::RequestContext).
    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            application_name: self.application_name.clone(),
            environment: self.environment.clone(),
            capture_content: self.capture_content,
            disable_metrics: self.disable_metrics,
        }
    }
}

fn bool_var(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(raw) => parse_bool(&raw)
            .ok_or_else(|| Error::Config(format!("{name} must be a boolean, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
