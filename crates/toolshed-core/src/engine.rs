//! The tool-picker engine.
//!
//! [`ToolEngine`] ties the pieces together: it owns the materialized catalog,
//! starts menu assembly, runs recommendation passes, and exposes the
//! operations the presentation layer calls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use toolshed_config::{SettingsStore, keys};
use tracing::{debug, info, warn};

use crate::affinity::{DispatchError, Priority, UiDispatcher, run_on_affinity};
use crate::build_info;
use crate::catalog::{MatchedProvider, ToolCatalog};
use crate::collab::{
    ActivationParser, ClipboardSource, CollaboratorError, NavigationSink, Notification, NotificationSink,
    TelemetryEvent, TelemetrySink,
};
use crate::detached::{log_failure, spawn_detached};
use crate::display::{DisplayMode, DisplayState};
use crate::matcher::{SearchItem, SearchResultSet, match_query};
use crate::menu::{Menu, MenuAssembler, MenuError, MenuHandle, MenuItem, MenuSource};
use crate::reconciler::{ClipboardSnapshot, PassOutcome, Reconciler, ReconcilerParts};
use crate::registry::{CompactSize, ProviderDescriptor, ProviderRegistry};
use crate::selection::{SelectOutcome, SelectionContext, SelectionStateMachine};

/// Name shown in window titles.
pub const APP_NAME: &str = "Toolshed";

/// Name of the transient entry that shows a query's results.
pub const SEARCH_RESULTS: &str = "search-results";

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Menu(#[from] MenuError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("engine already activated")]
    AlreadyActivated,
}

/// External collaborators supplied by the host.
#[derive(Clone)]
pub struct Collaborators {
    pub clipboard: Arc<dyn ClipboardSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub navigation: Arc<dyn NavigationSink>,
    pub notifications: Arc<dyn NotificationSink>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub dispatcher: Arc<dyn UiDispatcher>,
}

pub struct ToolEngine {
    catalog: Arc<ToolCatalog>,
    menu: MenuHandle,
    selection: Arc<SelectionStateMachine>,
    reconciler: Reconciler,
    display: Arc<DisplayState>,
    collab: Collaborators,
    activated: AtomicBool,
    startup_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ToolEngine {
    /// Materialize `registry` and start the engine with the catalog itself as
    /// menu source.
    pub fn from_registry(registry: &ProviderRegistry, collab: Collaborators) -> Self {
        let catalog = Arc::new(ToolCatalog::materialize(registry));
        let source: Arc<dyn MenuSource> = Arc::clone(&catalog) as Arc<dyn MenuSource>;
        Self::start(catalog, source, collab)
    }

    /// Start the engine. Menu assembly begins in the background; operations
    /// that depend on the menu wait for it.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(catalog: Arc<ToolCatalog>, source: Arc<dyn MenuSource>, collab: Collaborators) -> Self {
        let (assembler, menu) = MenuAssembler::new();
        let dispatcher = Arc::clone(&collab.dispatcher);
        tokio::spawn(async move {
            // Failures are published through the menu handle
            let _ = assembler.assemble(source.as_ref(), dispatcher.as_ref()).await;
        });

        let display = Arc::new(DisplayState::new());
        let selection = Arc::new(SelectionStateMachine::new(
            Arc::new(SelectionContext::new()),
            Arc::clone(&collab.settings),
            Arc::clone(&collab.navigation),
        ));
        let reconciler = Reconciler::new(ReconcilerParts {
            catalog: Arc::clone(&catalog),
            menu: menu.clone(),
            clipboard: Arc::clone(&collab.clipboard),
            settings: Arc::clone(&collab.settings),
            telemetry: Arc::clone(&collab.telemetry),
            dispatcher: Arc::clone(&collab.dispatcher),
            display: Arc::clone(&display),
            selection: Arc::clone(&selection),
        });

        info!(tools = catalog.all().len(), "Tool engine started");
        Self {
            catalog,
            menu,
            selection,
            reconciler,
            display,
            collab,
            activated: AtomicBool::new(false),
            startup_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn selection_context(&self) -> &Arc<SelectionContext> {
        self.selection.context()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    // ── Menu ──────────────────────────────────────────────────────

    /// Wait for the composed menu.
    pub async fn menu(&self) -> Result<Arc<Menu>, MenuError> {
        self.menu.ready().await
    }

    pub async fn top_menu(&self) -> Result<Vec<MenuItem>, MenuError> {
        Ok(self.menu().await?.top().to_vec())
    }

    pub async fn footer_menu(&self) -> Result<Vec<Arc<MatchedProvider>>, MenuError> {
        Ok(self.menu().await?.footer().to_vec())
    }

    /// The menu if it has been composed, without waiting.
    pub fn try_menu(&self) -> Option<Arc<Menu>> {
        self.menu.try_get()
    }

    // ── Search ────────────────────────────────────────────────────

    /// Rank the catalog against `query`. Never touches the menu.
    pub fn search(&self, query: &str) -> SearchResultSet {
        SearchResultSet::from_matches(query, match_query(&self.catalog, query))
    }

    /// Act on a submitted query.
    ///
    /// A chosen tool is selected directly. Otherwise a transient entry holding
    /// the results is selected, so navigation can show them as a page.
    pub async fn submit_query(&self, query: &str, chosen: Option<&SearchItem>) -> Result<SelectOutcome, EngineError> {
        if let Some(SearchItem::Tool(tool)) = chosen {
            return self.select(Some(Arc::clone(tool)), None).await;
        }

        let results = self.search(query);
        let page = MatchedProvider::transient(
            ProviderDescriptor::new(SEARCH_RESULTS, SEARCH_RESULTS, &format!("Search results for \"{}\"", query.trim())),
            results.tools(),
        );
        self.select(Some(page), None).await
    }

    // ── Selection ─────────────────────────────────────────────────

    /// Select `tool` on the affinity context.
    pub async fn select(
        &self,
        tool: Option<Arc<MatchedProvider>>,
        payload: Option<String>,
    ) -> Result<SelectOutcome, EngineError> {
        self.select_with_priority(Priority::High, tool, payload).await
    }

    /// Select a tool picked by the user from the menu, offering the clipboard
    /// text last evaluated as payload.
    pub async fn select_from_menu(&self, tool: Arc<MatchedProvider>) -> Result<SelectOutcome, EngineError> {
        let payload = match self.reconciler.clipboard_snapshot() {
            ClipboardSnapshot::Text(text) => Some(text),
            ClipboardSnapshot::Unobserved | ClipboardSnapshot::Empty => None,
        };
        self.select(Some(tool), payload).await
    }

    /// Select a tool by its unique name, as requested by another component.
    pub async fn select_by_name(&self, name: &str) -> Result<SelectOutcome, EngineError> {
        let tool = self.catalog.find_by_name(name);
        if tool.is_none() {
            warn!(tool = name, "Unknown tool requested");
        }
        self.select(tool, None).await
    }

    pub fn current_selection(&self) -> Option<Arc<MatchedProvider>> {
        self.selection.current_selection()
    }

    pub fn recommended(&self) -> Vec<Arc<MatchedProvider>> {
        self.catalog.recommended()
    }

    async fn select_with_priority(
        &self,
        priority: Priority,
        tool: Option<Arc<MatchedProvider>>,
        payload: Option<String>,
    ) -> Result<SelectOutcome, EngineError> {
        let selection = Arc::clone(&self.selection);
        let outcome = run_on_affinity(self.collab.dispatcher.as_ref(), priority, move || {
            selection.select(tool, payload)
        })
        .await?;
        Ok(outcome)
    }

    // ── Triggers ──────────────────────────────────────────────────

    /// Clipboard content changed, or the window was activated.
    pub async fn on_clipboard_changed(&self) -> PassOutcome {
        self.reconciler.evaluate().await
    }

    /// First activation: resolve the startup tool and select the initial
    /// entry.
    ///
    /// A resolved deep link permanently disables automatic selection of
    /// recommended tools. Without one, the first top-menu tool is selected,
    /// then the first footer tool. Fails if the menu could not be composed,
    /// and with [`EngineError::AlreadyActivated`] on any later call.
    pub async fn on_activated(&self, activation: &dyn ActivationParser) -> Result<SelectOutcome, EngineError> {
        if self.activated.swap(true, Ordering::SeqCst) {
            debug!("Ignoring repeated activation");
            return Err(EngineError::AlreadyActivated);
        }
        let menu = self.menu().await?;

        let requested = activation.startup_protocol().and_then(|protocol| {
            let found = self.catalog.find_by_protocol(&protocol);
            match &found {
                Some(tool) => {
                    info!(tool = %tool.name(), protocol = %protocol, "Startup tool requested");
                    self.selection.context().disable_auto_select();
                }
                None => warn!(protocol = %protocol, "Startup protocol matches no tool"),
            }
            found
        });

        let telemetry = Arc::clone(&self.collab.telemetry);
        let started = spawn_detached(
            "app-started telemetry",
            async move { telemetry.record(TelemetryEvent::AppStarted).await },
            log_failure("app-started telemetry"),
        );
        let release_notes = spawn_detached(
            "release notes",
            show_release_note(
                Arc::clone(&self.collab.settings),
                Arc::clone(&self.collab.notifications),
                Arc::clone(&self.collab.telemetry),
                build_info::VERSION,
            ),
            log_failure("release notes"),
        );
        self.startup_tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([started, release_notes]);

        let initial = requested
            .or_else(|| menu.first_tool().cloned())
            .or_else(|| menu.footer().first().cloned());
        debug!(tool = ?initial.as_ref().map(|t| t.name().to_string()), "Initial selection");
        self.select_with_priority(Priority::Low, initial, None).await
    }

    /// Wait for the detached startup work (telemetry and release-note
    /// bookkeeping) spawned by [`on_activated`](Self::on_activated).
    ///
    /// Hosts call this before persisting settings at exit.
    pub async fn wait_for_startup_tasks(&self) {
        let tasks = std::mem::take(&mut *self.startup_tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            // Failures were already reported by the task's handler
            let _ = task.await;
        }
    }

    // ── Display ───────────────────────────────────────────────────

    pub fn display_mode(&self) -> DisplayMode {
        self.display.mode()
    }

    pub fn set_display_mode(&self, mode: DisplayMode) {
        info!(?mode, "Display mode changed");
        self.display.set_mode(mode);
    }

    /// Preferred compact overlay size for the selected tool.
    pub fn compact_overlay_size(&self) -> Option<CompactSize> {
        self.current_selection().map(|tool| tool.descriptor().compact_size)
    }

    /// Page header: the selected tool's display name, hidden in compact
    /// overlay.
    pub fn header_text(&self) -> Option<String> {
        if self.display.is_suppressed() {
            return None;
        }
        self.current_selection()
            .map(|tool| tool.descriptor().display_name.clone())
    }

    /// Window title. Only the compact overlay, which has no page header,
    /// names the selected tool.
    pub fn window_title(&self) -> String {
        match self.current_selection() {
            Some(tool) if self.display.is_suppressed() => {
                format!("{} - {APP_NAME}", tool.descriptor().display_name)
            }
            _ => APP_NAME.to_string(),
        }
    }
}

/// Show the release note after an update and record the running version.
pub async fn show_release_note(
    settings: Arc<dyn SettingsStore>,
    notifications: Arc<dyn NotificationSink>,
    telemetry: Arc<dyn TelemetrySink>,
    version: &str,
) -> Result<(), ReleaseNoteError> {
    let first_start = settings.flag(keys::FIRST_TIME_START)?;
    let last_version = settings.value(keys::LAST_VERSION_RAN)?;

    if !first_start && last_version.as_deref() != Some(version) {
        info!(version, previous = ?last_version, "Application updated");
        notifications.show(Notification::release_note(version)).await?;
        telemetry.record(TelemetryEvent::AppJustUpdated).await?;
    }

    settings.set_flag(keys::FIRST_TIME_START, false)?;
    settings.set_value(keys::LAST_VERSION_RAN, version)?;
    Ok(())
}

/// Errors from release-note bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseNoteError {
    #[error(transparent)]
    Settings(#[from] toolshed_config::SettingsError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}
