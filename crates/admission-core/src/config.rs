//! # Admission Configuration
//!
//! Static webhook declarations loaded once at startup.
//!
//! Declarations are kept close to what an operator writes: kinds, policies and
//! operations are plain strings here and only become typed values when a
//! [`WebhookRegistry`](crate::registry::WebhookRegistry) is built from them.
//! That step is where malformed configuration is rejected, all problems at
//! once, before any request is served.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding a JSON configuration document
pub const CONFIGURATION_ENV_VAR: &str = "ADMISSION_CONFIGURATION";

// ============================================================================
// Declarations
// ============================================================================

/// Complete admission configuration
///
/// Webhook order is significant: earlier declarations run first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionConfig {
    #[serde(default)]
    pub webhooks: Vec<WebhookDeclaration>,
}

/// One webhook as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDeclaration {
    /// Unique name used in logs and errors, generated when omitted
    #[serde(default)]
    pub name: Option<String>,

    /// `mutating` or `validating`
    pub kind: String,

    /// `Fail` or `Ignore`, defaults to `Fail`
    #[serde(default = "default_failure_policy")]
    pub failure_policy: String,

    /// Per-call timeout (e.g. `5s`, `250ms`)
    #[serde(default, with = "humantime_duration")]
    pub timeout: Duration,

    /// Rules selecting which requests reach this webhook
    #[serde(default)]
    pub rules: Vec<RuleDeclaration>,

    /// How to reach the webhook server
    #[serde(default)]
    pub client_config: ClientConfigDeclaration,
}

fn default_failure_policy() -> String {
    "Fail".to_string()
}

/// Rule as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDeclaration {
    #[serde(default)]
    pub resources: Vec<String>,

    #[serde(default)]
    pub operations: Vec<String>,

    #[serde(default)]
    pub versions: Vec<String>,
}

/// Webhook endpoint as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigDeclaration {
    #[serde(default)]
    pub url: Option<String>,

    /// Static headers sent with every call (e.g. authorization)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Loading
// ============================================================================

impl AdmissionConfig {
    /// Load configuration from file path
    ///
    /// The format is chosen from the extension (`yaml`, `yml`, `json`); other
    /// extensions are tried as JSON and then YAML.
    ///
    /// # Errors
    /// - `ConfigError::FileNotFound` - Configuration file missing
    /// - `ConfigError::ParseError` - Unreadable file or invalid YAML/JSON
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ParseError {
            message: format!("Failed to read file: {}", e),
        })?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        match extension.to_lowercase().as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&contents),
            "json" => Self::from_json_str(&contents),
            _ => serde_json::from_str(&contents)
                .or_else(|_| serde_yaml::from_str(&contents))
                .map_err(|e| ConfigError::ParseError {
                    message: format!("Failed to parse as JSON or YAML: {}", e),
                }),
        }
    }

    /// Load configuration from the `ADMISSION_CONFIGURATION` environment variable
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let config_str = std::env::var(CONFIGURATION_ENV_VAR).map_err(|_| {
            ConfigError::SourceUnavailable(format!(
                "{} environment variable not set",
                CONFIGURATION_ENV_VAR
            ))
        })?;

        serde_json::from_str(&config_str).map_err(|e| ConfigError::ParseError {
            message: format!("Invalid JSON in {}: {}", CONFIGURATION_ENV_VAR, e),
        })
    }

    /// Parse a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: format!("Invalid YAML: {}", e),
        })
    }

    /// Parse a JSON document
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: format!("Invalid JSON: {}", e),
        })
    }

    /// Number of declared webhooks
    pub fn len(&self) -> usize {
        self.webhooks.len()
    }

    /// Check if no webhooks are declared
    pub fn is_empty(&self) -> bool {
        self.webhooks.is_empty()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
