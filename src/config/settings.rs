//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::store::Limits;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Path to the notes snapshot file.
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Field limits for notes.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("max_title_chars", self.limits.max_title_chars),
            ("max_content_chars", self.limits.max_content_chars),
            ("max_tag_chars", self.limits.max_tag_chars),
            ("max_tags", self.limits.max_tags),
        ];
        if let Some((name, _)) = limits.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ValidationError {
                message: format!("limits.{name} must be greater than zero"),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            });
        }
        Ok(())
    }
}

/// Note field limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum title length in characters.
    #[serde(default = "default_max_title_chars")]
    pub max_title_chars: usize,

    /// Maximum content length in characters.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,

    /// Maximum length of one tag in characters.
    #[serde(default = "default_max_tag_chars")]
    pub max_tag_chars: usize,

    /// Maximum number of tags per note.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_title_chars: default_max_title_chars(),
            max_content_chars: default_max_content_chars(),
            max_tag_chars: default_max_tag_chars(),
            max_tags: default_max_tags(),
        }
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            max_title_chars: config.max_title_chars,
            max_content_chars: config.max_content_chars,
            max_tag_chars: config.max_tag_chars,
            max_tags: config.max_tags,
        }
    }
}

fn default_max_title_chars() -> usize {
    Limits::default().max_title_chars
}

fn default_max_content_chars() -> usize {
    Limits::default().max_content_chars
}

fn default_max_tag_chars() -> usize {
    Limits::default().max_tag_chars
}

fn default_max_tags() -> usize {
    Limits::default().max_tags
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
