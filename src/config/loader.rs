//! Configuration loading from disk.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::config::schema::{BalancerConfig, EndPoints};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// On-disk file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Toml,
}

impl Format {
    /// `.json` files are JSON, everything else is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Either the compact endpoints shape or the full schema.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    EndPoints(EndPoints),
    Full(BalancerConfig),
}

impl From<ConfigFile> for BalancerConfig {
    fn from(file: ConfigFile) -> Self {
        match file {
            ConfigFile::EndPoints(endpoints) => endpoints.into(),
            ConfigFile::Full(config) => config,
        }
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str, format: Format) -> Result<BalancerConfig, ConfigError> {
    let file: ConfigFile = match format {
        Format::Json => serde_json::from_str(content)?,
        Format::Toml => toml::from_str(content)?,
    };
    let config = BalancerConfig::from(file);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a JSON or TOML file.
pub fn load_config(path: &Path) -> Result<BalancerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content, Format::from_path(path))
}
