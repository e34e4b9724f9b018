//! Settings store: runtime feature toggles and bookkeeping values.
//!
//! The engine reads feature flags through the [`SettingsStore`] trait at the
//! moment it needs them, never caching the answer. Two stores are provided:
//! [`MemorySettings`] (seeded from [`AppConfig`](crate::AppConfig)) and
//! [`FileSettings`], which persists its table to a TOML file on
//! [`FileSettings::flush`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::AppConfig;

/// Well-known setting keys.
pub mod keys {
    /// Whether clipboard content is used to recommend tools.
    pub const SMART_DETECTION: &str = "smart_detection";
    /// Whether the clipboard is pasted into the first recommended tool selected.
    pub const SMART_DETECTION_PASTE: &str = "smart_detection_paste";
    /// True until the first activation has completed.
    pub const FIRST_TIME_START: &str = "first_time_start";
    /// Version string of the last build that ran.
    pub const LAST_VERSION_RAN: &str = "last_version_ran";
}

/// Errors raised by a settings store.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("settings store unavailable: {0}")]
    Unavailable(String),

    #[error("setting {key:?} has non-boolean value {value:?}")]
    InvalidFlag { key: String, value: String },

    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Key/value configuration store consumed by the engine.
pub trait SettingsStore: Send + Sync {
    /// Read a string value. `Ok(None)` when the key was never set.
    fn value(&self, key: &str) -> Result<Option<String>, SettingsError>;

    /// Write a string value.
    fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsError>;

    /// Read a boolean flag, falling back to [`default_flag`] for unset keys.
    fn flag(&self, key: &str) -> Result<bool, SettingsError> {
        match self.value(key)? {
            Some(value) => parse_flag(key, &value),
            None => Ok(default_flag(key)),
        }
    }

    /// Write a boolean flag.
    fn set_flag(&self, key: &str, value: bool) -> Result<(), SettingsError> {
        self.set_value(key, if value { "true" } else { "false" })
    }
}

/// Default for flags that have never been written.
pub fn default_flag(key: &str) -> bool {
    matches!(
        key,
        keys::SMART_DETECTION | keys::SMART_DETECTION_PASTE | keys::FIRST_TIME_START
    )
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.trim() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(SettingsError::InvalidFlag {
            key: key.to_string(),
            value: other.to_string(),
        }),
    }
}

fn seed_from_config(config: &AppConfig) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    values.insert(
        keys::SMART_DETECTION.to_string(),
        config.detection.smart_detection.to_string(),
    );
    values.insert(
        keys::SMART_DETECTION_PASTE.to_string(),
        config.detection.paste_on_recommend.to_string(),
    );
    values
}

fn lock(values: &Mutex<BTreeMap<String, String>>) -> Result<MutexGuard<'_, BTreeMap<String, String>>, SettingsError> {
    values
        .lock()
        .map_err(|_| SettingsError::Unavailable("settings lock poisoned".to_string()))
}

/// In-memory settings store.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettings {
    /// Create an empty store (every flag resolves to its default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with the detection toggles from `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            values: Mutex::new(seed_from_config(config)),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn value(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(lock(&self.values)?.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        lock(&self.values)?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings persisted as a flat TOML table.
///
/// Writes are applied in memory immediately and reach disk on [`flush`](Self::flush).
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettings {
    /// Open the settings file at `path`. A missing file yields a store seeded
    /// from `config`; values present in the file win over the seed.
    pub async fn open(path: &Path, config: &AppConfig) -> Result<Self, SettingsError> {
        let mut values = seed_from_config(config);
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let stored: BTreeMap<String, String> = toml::from_str(&content)?;
                values.extend(stored);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Settings file not found, starting fresh");
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    /// Write the current table to disk.
    pub async fn flush(&self) -> Result<(), SettingsError> {
        let content = {
            let values = lock(&self.values)?;
            toml::to_string(&*values)?
        };
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettings {
    fn value(&self, key: &str) -> Result<Option<String>, SettingsError> {
        Ok(lock(&self.values)?.get(key).cloned())
    }

    fn set_value(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        lock(&self.values)?.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
