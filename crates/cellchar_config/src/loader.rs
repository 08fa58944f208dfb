//! Configuration file loading.

use crate::error::ConfigError;
use crate::resolve::resolve;
use crate::settings::CharConfig;
use crate::types::RawConfig;
use std::path::Path;

/// The configuration file name looked for in a project directory.
pub const CONFIG_FILE: &str = "cellchar.toml";

/// Loads and validates a configuration file.
///
/// Relative paths inside the file are resolved against the file's directory.
pub fn load_config(path: &Path) -> Result<CharConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    tracing::info!(path = %path.display(), "loading configuration");
    load_config_from_str(&content, base_dir)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str, base_dir: &Path) -> Result<CharConfig, ConfigError> {
    let raw: RawConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    resolve(raw, base_dir)
}
