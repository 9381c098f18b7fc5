//! Configuration file loading and parsing.
//!
//! This module handles loading the configuration file from disk and parsing
//! it into validated, type-safe structures.
//!
//! # Configuration File Locations
//!
//! The configuration file is searched in the following order:
//!
//! 1. Path given on the command line (must exist)
//! 2. Default location (built-in defaults are used if it is absent):
//!    - **Linux/macOS:** `~/.notes-mcp/config.json`
//!    - **Windows:** `%USERPROFILE%\.notes-mcp\config.json`
//!
//! # Example Configuration
//!
//! ```json
//! {
//!     "store_path": "/home/me/notes/notes.json",
//!     "limits": { "max_title_chars": 200, "max_content_chars": 50000 },
//!     "logging": { "level": "info" }
//! }
//! ```

mod settings;

pub use settings::{Config, LimitsConfig, LoggingConfig};

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Returns the default configuration directory.
///
/// - **Linux/macOS:** `~/.notes-mcp/`
/// - **Windows:** `%USERPROFILE%\.notes-mcp\`
#[must_use]
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|p| p.join(".notes-mcp"))
}

/// Returns the platform-specific default configuration file path.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("config.json"))
}

/// Returns the default notes snapshot path.
#[must_use]
pub fn default_store_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join("notes.json"))
}

/// Picks the snapshot path: the command-line override, then the config
/// file's `store_path`, then [`default_store_path`].
///
/// # Errors
///
/// Returns [`ConfigError::NoStorePath`] if none of these is available.
pub fn resolve_store_path(
    cli_override: Option<&Path>,
    config: &Config,
) -> Result<PathBuf, ConfigError> {
    cli_override
        .map(Path::to_path_buf)
        .or_else(|| config.store_path.clone())
        .or_else(default_store_path)
        .ok_or(ConfigError::NoStorePath)
}

/// Loads and parses the configuration file.
///
/// If `path` is `None`, uses the platform-specific default location, falling
/// back to built-in defaults when no file exists there.
///
/// # Errors
///
/// Returns an error if:
/// - An explicitly given configuration file cannot be found
/// - The file cannot be read
/// - The JSON is malformed
/// - Required fields are missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound {
                    path: p.to_path_buf(),
                });
            }
            p.to_path_buf()
        }
        None => match default_config_path() {
            Some(p) if p.exists() => p,
            _ => {
                tracing::debug!("No configuration file found, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
        path: config_path.clone(),
        source: e,
    })?;

    let config: Config = serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: config_path.clone(),
        source: e,
    })?;

    // Validate the configuration
    config.validate()?;

    Ok(config)
}
