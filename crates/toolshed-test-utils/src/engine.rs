//! Engine test harness.
//!
//! [`TestEngine`] wires a [`ToolEngine`] to recording fakes, a running
//! affinity thread, and file-backed settings in a temporary directory.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use toolshed_config::{AppConfig, FileSettings};
use toolshed_core::affinity::AffinityThread;
use toolshed_core::catalog::ToolCatalog;
use toolshed_core::engine::{Collaborators, ToolEngine};
use toolshed_core::menu::MenuSource;
use toolshed_core::registry::ProviderRegistry;

use crate::fakes::{FakeClipboard, RecordingNavigation, RecordingNotifications, RecordingTelemetry};

/// The recording collaborators behind a [`TestEngine`].
#[derive(Clone)]
pub struct Fakes {
    pub clipboard: Arc<FakeClipboard>,
    pub navigation: Arc<RecordingNavigation>,
    pub notifications: Arc<RecordingNotifications>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub settings: Arc<FileSettings>,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            clipboard: self.clipboard.clone(),
            settings: self.settings.clone(),
            navigation: self.navigation.clone(),
            notifications: self.notifications.clone(),
            telemetry: self.telemetry.clone(),
            dispatcher: Arc::new(AffinityThread::spawn()),
        }
    }
}

/// A test-scoped engine with an owned temp directory for config and settings.
///
/// The temp directory is deleted when this value is dropped, even on panic.
pub struct TestEngine {
    pub engine: ToolEngine,
    pub fakes: Fakes,
    pub config_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestEngine {
    /// Build an engine from a config file containing `toml_content`.
    pub async fn with_toml(toml_content: &str) -> Self {
        let (temp_dir, config_path, config) = load_config(toml_content).await;
        let fakes = fakes_in(&temp_dir, &config).await;
        let registry = ProviderRegistry::from_tools(&config.catalogue()).expect("invalid test catalogue");
        let engine = ToolEngine::from_registry(&registry, fakes.collaborators());

        Self {
            engine,
            fakes,
            config_path,
            _temp_dir: temp_dir,
        }
    }

    /// Build an engine from a programmatic config, written out as TOML first
    /// so the normal load path runs.
    pub async fn with_config(config: &AppConfig) -> Self {
        let content = toml::to_string(config).expect("failed to serialise test config");
        Self::with_toml(&content).await
    }

    /// Build an engine with the built-in catalogue.
    pub async fn default_config() -> Self {
        Self::with_toml("").await
    }

    /// Build an engine over a programmatic registry, composing the menu from
    /// `source` (or the catalog itself when `None`).
    pub async fn with_registry(
        registry: &ProviderRegistry,
        source: impl FnOnce(Arc<ToolCatalog>) -> Option<Arc<dyn MenuSource>>,
    ) -> Self {
        let (temp_dir, config_path, config) = load_config("").await;
        let fakes = fakes_in(&temp_dir, &config).await;
        let catalog = Arc::new(ToolCatalog::materialize(registry));
        let source = source(Arc::clone(&catalog)).unwrap_or_else(|| catalog.clone() as Arc<dyn MenuSource>);
        let engine = ToolEngine::start(catalog, source, fakes.collaborators());

        Self {
            engine,
            fakes,
            config_path,
            _temp_dir: temp_dir,
        }
    }
}

async fn load_config(toml_content: &str) -> (TempDir, PathBuf, AppConfig) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let config_path = temp_dir.path().join("toolshed.toml");
    tokio::fs::write(&config_path, toml_content)
        .await
        .expect("failed to write test config");
    let config = AppConfig::load(&config_path)
        .await
        .expect("failed to parse test config");
    (temp_dir, config_path, config)
}

async fn fakes_in(temp_dir: &TempDir, config: &AppConfig) -> Fakes {
    let settings = FileSettings::open(&temp_dir.path().join("settings.toml"), config)
        .await
        .expect("failed to open test settings");
    Fakes {
        clipboard: Arc::new(FakeClipboard::new(None)),
        navigation: Arc::new(RecordingNavigation::new()),
        notifications: Arc::new(RecordingNotifications::new()),
        telemetry: Arc::new(RecordingTelemetry::new()),
        settings: Arc::new(settings),
    }
}
