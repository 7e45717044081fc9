//! Effective configuration with provenance
//!
//! Records the merged settings plus where each layer came from, so a run
//! can be traced back to the exact file bytes that configured it.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::ConvergeConfig;
use super::merge::merge_layers;

/// Schema identifier for the serialized form
pub const SCHEMA_ID: &str = "elastic-converge/effective_config@1";

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged, validated configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_id: String,
    pub created_at: DateTime<Utc>,

    /// Typed settings after all layers
    pub settings: ConvergeConfig,

    /// Layers in precedence order (lowest first)
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Merge builtin defaults, an optional TOML file and optional CLI
    /// overrides, then validate the result.
    ///
    /// A named file that does not exist is an error.
    pub fn build(file: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![ConvergeConfig::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = file {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.display().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let settings: ConvergeConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::Parse(format!("invalid settings: {}", e)))?;
        settings.validate()?;

        Ok(Self {
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            settings,
            sources,
        })
    }

    /// Digest of the file layer, if one was loaded
    pub fn file_digest(&self) -> Option<&str> {
        self.sources
            .iter()
            .find(|s| s.origin == ConfigOrigin::File)
            .and_then(|s| s.digest.as_deref())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parse a TOML file into JSON, returning it with the SHA-256 of its bytes
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = std::str::from_utf8(&bytes)
        .map_err(|e| ConfigError::Parse(format!("{}: invalid UTF-8: {}", path.display(), e)))?;
    let value: toml::Value = toml::from_str(contents)
        .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

    Ok((toml_to_json(value), digest))
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_only() {
        let config = EffectiveConfig::build(None, None).unwrap();
        assert_eq!(config.settings, ConvergeConfig::default());
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
        assert!(config.file_digest().is_none());
    }

    #[test]
    fn test_file_then_cli_precedence() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = 500").unwrap();
        writeln!(file, "default_timeout_seconds = 60").unwrap();
        writeln!(file, "log_format = \"json\"").unwrap();

        let cli = serde_json::json!({ "poll_interval_ms": 100 });
        let config = EffectiveConfig::build(Some(file.path()), Some(cli)).unwrap();

        assert_eq!(config.settings.poll_interval_ms, 100);
        assert_eq!(config.settings.default_timeout_seconds, 60);
        assert_eq!(config.settings.log_format, LogFormat::Json);
        assert_eq!(config.settings.max_timeout_seconds, 86400);

        let origins: Vec<_> = config.sources.iter().map(|s| s.origin).collect();
        assert_eq!(origins, vec![ConfigOrigin::Builtin, ConfigOrigin::File, ConfigOrigin::Cli]);
    }

    #[test]
    fn test_file_digest_is_sha256_of_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = 250").unwrap();

        let config = EffectiveConfig::build(Some(file.path()), None).unwrap();
        let expected = hex::encode(Sha256::digest(b"poll_interval_ms = 250\n"));
        assert_eq!(config.file_digest(), Some(expected.as_str()));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let cli = serde_json::json!({ "poll_interval": 100 });
        let err = EffectiveConfig::build(None, Some(cli)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_applies_after_merge() {
        let cli = serde_json::json!({ "poll_interval_ms": 0 });
        let err = EffectiveConfig::build(None, Some(cli)).unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("converge.toml");
        let err = EffectiveConfig::build(Some(&missing), None).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = ").unwrap();
        let err = EffectiveConfig::build(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
