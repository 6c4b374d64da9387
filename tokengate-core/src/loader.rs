// Configuration file and environment loading

use crate::config::{GuardConfig, RotationStrictness, TokenScope};
use crate::error::{GuardError, Result};
use std::env;
use std::fs;
use std::path::Path;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

impl GuardConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: GuardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document. Missing keys keep their defaults.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: GuardConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| GuardError::Config("No file extension found".to_string()))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| GuardError::Config(format!("Unsupported format: {}", ext)))?;

        let content = fs::read_to_string(path)?;
        match format {
            FileFormat::Json => Self::from_json_str(&content),
            FileFormat::Toml => Self::from_toml_str(&content),
        }
    }

    /// Override settings from `PREFIX_*` environment variables.
    pub fn apply_env(self, prefix: &str) -> Result<Self> {
        self.apply_vars(prefix, env::vars())
    }

    /// Override settings from `PREFIX_*` pairs.
    ///
    /// Recognised keys: `ENABLED`, `VALIDATE_WHEN_NO_SESSION_EXISTS`,
    /// `USE_NEW_TOKEN_LANDING_PAGE`, `ROTATE_ON_REJECT`, `MASKING`,
    /// `TOKEN_SCOPE`, `ROTATION_STRICTNESS`, `TOKEN_NAME`, `HEADER_NAME`,
    /// `TOKEN_LENGTH`, `TRUSTED_REDIRECT_ORIGINS` (comma separated).
    pub fn apply_vars<I, K, V>(mut self, prefix: &str, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = format!("{}_", prefix.trim_end_matches('_').to_uppercase());

        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(&prefix) else {
                continue;
            };
            let value = value.as_ref().trim();

            match name {
                "ENABLED" => self.enabled = parse_bool(name, value)?,
                "VALIDATE_WHEN_NO_SESSION_EXISTS" => {
                    self.validate_when_no_session_exists = parse_bool(name, value)?
                }
                "USE_NEW_TOKEN_LANDING_PAGE" => {
                    self.use_new_token_landing_page = parse_bool(name, value)?
                }
                "ROTATE_ON_REJECT" => self.rotate_on_reject = parse_bool(name, value)?,
                "MASKING" => self.masking = parse_bool(name, value)?,
                "TOKEN_SCOPE" => {
                    self.token_scope = match value.to_lowercase().as_str() {
                        "global" => TokenScope::Global,
                        "per_page" | "per-page" | "page" => TokenScope::PerPage,
                        _ => return Err(invalid(name, value)),
                    }
                }
                "ROTATION_STRICTNESS" => {
                    self.rotation_strictness = match value.to_lowercase().as_str() {
                        "always" => RotationStrictness::Always,
                        "if_absent" | "if-absent" => RotationStrictness::IfAbsent,
                        _ => return Err(invalid(name, value)),
                    }
                }
                "TOKEN_NAME" => self.token_name = value.to_string(),
                "HEADER_NAME" => self.header_name = value.to_string(),
                "TOKEN_LENGTH" => {
                    self.token_length = value.parse().map_err(|_| invalid(name, value))?
                }
                "TRUSTED_REDIRECT_ORIGINS" => {
                    self.trusted_redirect_origins = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                }
                _ => {}
            }
        }

        self.validate()?;
        Ok(self)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(name, value)),
    }
}

fn invalid(name: &str, value: &str) -> GuardError {
    GuardError::Config(format!("invalid value for {}: {}", name, value))
}
