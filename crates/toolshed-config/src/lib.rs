#![deny(unsafe_code)]

//! Configuration loading and validation for Toolshed.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`AppConfig`] type as the central configuration structure, the [`tools`]
//! module describing the tool catalogue, and the [`settings`] module with the
//! runtime settings store.

/// Runtime settings store (feature toggles, version bookkeeping).
pub mod settings;
/// Tool catalogue entries.
pub mod tools;

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use settings::{FileSettings, MemorySettings, SettingsError, SettingsStore, keys};
pub use tools::{DetectorKind, Placement, ToolConfig};

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Smart detection toggles.
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tool catalogue. Empty means "use the built-in catalogue".
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

/// Smart detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Recommend tools based on clipboard content.
    #[serde(default = "default_true")]
    pub smart_detection: bool,

    /// Paste the clipboard into the first recommended tool that gets selected.
    #[serde(default = "default_true")]
    pub paste_on_recommend: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            smart_detection: true,
            paste_on_recommend: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
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
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// The tools to register: the configured list, or the built-in catalogue.
    pub fn catalogue(&self) -> Vec<ToolConfig> {
        if self.tools.is_empty() {
            tools::default_tools()
        } else {
            self.tools.clone()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        let mut names = HashSet::new();
        let mut protocols = HashSet::new();
        for (i, tool) in self.tools.iter().enumerate() {
            if tool.name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tools[{i}].name must not be empty"
                )));
            }
            if tool.protocol.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "tools[{i}].protocol must not be empty"
                )));
            }
            if !names.insert(tool.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "tools[{i}].name {:?} is defined more than once",
                    tool.name
                )));
            }
            // Deep links match protocols case-insensitively
            if !protocols.insert(tool.protocol.to_lowercase()) {
                return Err(ConfigError::Validation(format!(
                    "tools[{i}].protocol {:?} is defined more than once",
                    tool.protocol
                )));
            }
            if tool.compact_width == 0 || tool.compact_height == 0 {
                return Err(ConfigError::Validation(format!(
                    "tools[{i}] compact size must be non-zero"
                )));
            }
        }

        for (i, tool) in self.tools.iter().enumerate() {
            if let Some(parent) = &tool.parent {
                if parent == &tool.name {
                    return Err(ConfigError::Validation(format!(
                        "tools[{i}].parent must not reference itself"
                    )));
                }
                if !names.contains(parent.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "tools[{i}].parent {parent:?} does not name a tool"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_settings_keys_at_crate_root() {
        let config = AppConfig::parse("[detection]\nsmart_detection = false\n").unwrap();
        let settings = MemorySettings::from_config(&config);
        assert!(!settings.flag(keys::SMART_DETECTION).unwrap());
        assert!(settings.flag(keys::SMART_DETECTION_PASTE).unwrap());
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.detection.smart_detection);
        assert!(config.detection.paste_on_recommend);
        assert_eq!(config.logging.level, "info");
        assert!(config.tools.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.detection.smart_detection);
        assert_eq!(config.catalogue(), tools::default_tools());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [detection]
            smart_detection = false
            paste_on_recommend = false

            [logging]
            level = "debug"

            [[tools]]
            name = "encoders"
            protocol = "encoders"
            display_name = "Encoders"

            [[tools]]
            name = "base64"
            protocol = "Base64"
            display_name = "Base64 Text"
            parent = "encoders"
            keywords = ["b64"]
            detect = "base64"
            compact_width = 300

            [[tools]]
            name = "settings"
            protocol = "settings"
            display_name = "Settings"
            placement = "footer"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert!(!config.detection.smart_detection);
        assert!(!config.detection.paste_on_recommend);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.tools.len(), 3);

        let base64 = &config.tools[1];
        assert_eq!(base64.parent.as_deref(), Some("encoders"));
        assert_eq!(base64.keywords, vec!["b64".to_string()]);
        assert_eq!(base64.detect, DetectorKind::Base64);
        assert_eq!(base64.compact_width, 300);
        assert_eq!(base64.compact_height, 400);
        assert_eq!(config.tools[2].placement, Placement::Footer);
        assert_eq!(config.catalogue().len(), 3);
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_duplicate_names() {
        let toml = r#"
            [[tools]]
            name = "a"
            protocol = "a"
            display_name = "A"

            [[tools]]
            name = "a"
            protocol = "b"
            display_name = "B"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_protocols_differing_by_case() {
        let toml = r#"
            [[tools]]
            name = "a"
            protocol = "json"
            display_name = "A"

            [[tools]]
            name = "b"
            protocol = "JSON"
            display_name = "B"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_parent() {
        let toml = r#"
            [[tools]]
            name = "a"
            protocol = "a"
            display_name = "A"
            parent = "missing"
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_validation_rejects_empty_protocol() {
        let toml = r#"
            [[tools]]
            name = "a"
            protocol = " "
            display_name = "A"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_compact_size() {
        let toml = r#"
            [[tools]]
            name = "a"
            protocol = "a"
            display_name = "A"
            compact_height = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_parse_rejects_unknown_detector() {
        let toml = r#"
            [[tools]]
            name = "a"
            protocol = "a"
            display_name = "A"
            detect = "telepathy"
        "#;
        assert!(matches!(AppConfig::parse(toml), Err(ConfigError::Parse(_))));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("toolshed.toml");
        tokio::fs::write(&path, b"[detection]\nsmart_detection = false\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert!(!config.detection.smart_detection);
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = AppConfig::load(&path).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
