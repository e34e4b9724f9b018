//! Recommendation reconciler.
//!
//! Each pass reads the clipboard, asks every provider whether it can handle
//! the text, and compares the resulting recommended set with the previous
//! one. When the set changes, the next selection may receive the clipboard
//! payload, and a single new recommendation visible in the menu is selected
//! automatically.
//!
//! Passes may overlap. Each one captures its own old set and snapshot; only
//! the auto-selection step is serialized.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use toolshed_config::{SettingsStore, keys};
use tracing::{debug, info, warn};

use crate::affinity::{Priority, UiDispatcher, run_on_affinity};
use crate::catalog::{MatchedProvider, ProviderId, ToolCatalog};
use crate::collab::{ClipboardSource, TelemetryEvent, TelemetrySink};
use crate::detached::{log_failure, spawn_detached};
use crate::display::DisplayState;
use crate::matcher::match_content;
use crate::menu::MenuHandle;
use crate::selection::{SelectOutcome, SelectionStateMachine};

/// Where the reconciler currently is. With overlapping passes, the most
/// advanced active pass wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Evaluating,
    Reconciling,
}

/// Last clipboard content a pass completed against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClipboardSnapshot {
    /// No pass has completed yet.
    #[default]
    Unobserved,
    /// The clipboard held no text.
    Empty,
    Text(String),
}

impl ClipboardSnapshot {
    fn observe(text: Option<&str>) -> Self {
        match text {
            Some(text) => ClipboardSnapshot::Text(text.to_string()),
            None => ClipboardSnapshot::Empty,
        }
    }
}

/// Why a pass ended without evaluating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SmartDetectionDisabled,
    DisplaySuppressed,
    ClipboardUnavailable,
    ClipboardUnchanged,
}

/// Result of one pass.
#[derive(Debug, Clone)]
pub enum PassOutcome {
    Skipped(SkipReason),
    /// Providers were evaluated; the recommended set is the same as before.
    Unchanged,
    Changed {
        recommended: Vec<Arc<MatchedProvider>>,
        auto_selected: bool,
    },
}

/// Whether two recommended sets differ, ignoring order.
pub fn sets_differ(old: &[Arc<MatchedProvider>], new: &[Arc<MatchedProvider>]) -> bool {
    let ids = |tools: &[Arc<MatchedProvider>]| tools.iter().map(|t| t.id()).collect::<BTreeSet<ProviderId>>();
    ids(old) != ids(new)
}

/// Collaborators a [`Reconciler`] works with.
pub struct ReconcilerParts {
    pub catalog: Arc<ToolCatalog>,
    pub menu: MenuHandle,
    pub clipboard: Arc<dyn ClipboardSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub dispatcher: Arc<dyn UiDispatcher>,
    pub display: Arc<DisplayState>,
    pub selection: Arc<SelectionStateMachine>,
}

pub struct Reconciler {
    parts: ReconcilerParts,
    snapshot: Mutex<ClipboardSnapshot>,
    auto_select: tokio::sync::Mutex<()>,
    evaluating: AtomicUsize,
    reconciling: AtomicUsize,
}

impl Reconciler {
    pub fn new(parts: ReconcilerParts) -> Self {
        Self {
            parts,
            snapshot: Mutex::new(ClipboardSnapshot::Unobserved),
            auto_select: tokio::sync::Mutex::new(()),
            evaluating: AtomicUsize::new(0),
            reconciling: AtomicUsize::new(0),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.reconciling.load(Ordering::Acquire) > 0 {
            Phase::Reconciling
        } else if self.evaluating.load(Ordering::Acquire) > 0 {
            Phase::Evaluating
        } else {
            Phase::Idle
        }
    }

    pub fn clipboard_snapshot(&self) -> ClipboardSnapshot {
        lock(&self.snapshot).clone()
    }

    /// Run one recommendation pass.
    pub async fn evaluate(&self) -> PassOutcome {
        if !self.smart_detection_enabled() {
            return PassOutcome::Skipped(SkipReason::SmartDetectionDisabled);
        }
        if self.parts.display.is_suppressed() {
            return PassOutcome::Skipped(SkipReason::DisplaySuppressed);
        }

        let evaluating = PhaseGuard::enter(&self.evaluating);

        let text = match self.parts.clipboard.read_text().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "SmartDetection - Unable to read clipboard");
                return PassOutcome::Skipped(SkipReason::ClipboardUnavailable);
            }
        };
        let observed = ClipboardSnapshot::observe(text.as_deref());
        if *lock(&self.snapshot) == observed {
            debug!("Clipboard unchanged, skipping evaluation");
            return PassOutcome::Skipped(SkipReason::ClipboardUnchanged);
        }

        let old = self.parts.catalog.recommended();
        self.evaluate_providers(text.as_deref()).await;
        drop(evaluating);

        let _reconciling = PhaseGuard::enter(&self.reconciling);
        let new = self.parts.catalog.recommended();
        *lock(&self.snapshot) = observed;

        let context = self.parts.selection.context();
        if !sets_differ(&old, &new) {
            context.clear_paste();
            return PassOutcome::Unchanged;
        }

        context.allow_paste_once();
        info!(recommended = new.len(), "Recommended tools changed");

        if !new.is_empty() {
            let telemetry = Arc::clone(&self.parts.telemetry);
            spawn_detached(
                "smart-detection telemetry",
                async move { telemetry.record(TelemetryEvent::SmartDetectionWorked).await },
                log_failure("smart-detection telemetry"),
            );
        }

        let auto_selected = {
            let _auto_select = self.auto_select.lock().await;
            self.auto_select(&new, text).await
        };

        PassOutcome::Changed {
            recommended: new,
            auto_selected,
        }
    }

    /// Evaluate every provider concurrently and wait for all of them.
    async fn evaluate_providers(&self, text: Option<&str>) {
        let Some(text) = text else {
            for tool in self.parts.catalog.all() {
                tool.set_recommended(false);
            }
            return;
        };

        let tasks: Vec<_> = self
            .parts
            .catalog
            .all()
            .iter()
            .map(|tool| {
                let task_tool = Arc::clone(tool);
                let content = text.to_string();
                let task = tokio::spawn(async move {
                    let recommended = match_content(&task_tool, &content).await;
                    task_tool.set_recommended(recommended);
                });
                (Arc::clone(tool), task)
            })
            .collect();

        for (tool, task) in tasks {
            if let Err(e) = task.await {
                warn!(tool = %tool.name(), error = %e, "SmartDetection - Check if tool is recommended");
                tool.set_recommended(false);
            }
        }
    }

    async fn auto_select(&self, recommended: &[Arc<MatchedProvider>], payload: Option<String>) -> bool {
        let [tool] = recommended else {
            return false;
        };

        let menu = match self.parts.menu.ready().await {
            Ok(menu) => menu,
            Err(e) => {
                warn!(error = %e, "SmartDetection - Menu unavailable");
                return false;
            }
        };
        if !menu.contains(tool) {
            return false;
        }

        let tool = Arc::clone(tool);
        let display = Arc::clone(&self.parts.display);
        let selection = Arc::clone(&self.parts.selection);
        let decided = run_on_affinity(self.parts.dispatcher.as_ref(), Priority::High, move || {
            if display.is_suppressed() || !selection.context().auto_select_allowed() {
                return false;
            }
            selection.select(Some(tool), payload) == SelectOutcome::Applied
        })
        .await;

        decided.unwrap_or_else(|e| {
            warn!(error = %e, "SmartDetection - Unable to select recommended tool");
            false
        })
    }

    fn smart_detection_enabled(&self) -> bool {
        self.parts
            .settings
            .flag(keys::SMART_DETECTION)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Unable to read smart detection setting");
                false
            })
    }
}

struct PhaseGuard<'a>(&'a AtomicUsize);

impl<'a> PhaseGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use toolshed_config::MemorySettings;
    use toolshed_config::tools::default_tools;

    use crate::affinity::InlineDispatcher;
    use crate::collab::{CollaboratorError, NavigationEvent, NavigationSink, StaticClipboard, TracingTelemetry};
    use crate::menu::MenuAssembler;
    use crate::registry::ProviderRegistry;
    use crate::selection::SelectionContext;

    struct Discard;

    impl NavigationSink for Discard {
        fn navigate(&self, _event: NavigationEvent) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    async fn reconciler(clipboard: Option<&str>, settings: Arc<MemorySettings>) -> (Arc<ToolCatalog>, Reconciler) {
        let catalog = Arc::new(ToolCatalog::materialize(
            &ProviderRegistry::from_tools(&default_tools()).unwrap(),
        ));
        let (assembler, menu) = MenuAssembler::new();
        assembler.assemble(catalog.as_ref(), &InlineDispatcher).await.unwrap();
        let selection = Arc::new(SelectionStateMachine::new(
            Arc::new(SelectionContext::new()),
            settings.clone(),
            Arc::new(Discard),
        ));
        let reconciler = Reconciler::new(ReconcilerParts {
            catalog: Arc::clone(&catalog),
            menu,
            clipboard: Arc::new(StaticClipboard::new(clipboard)),
            settings,
            telemetry: Arc::new(TracingTelemetry),
            dispatcher: Arc::new(InlineDispatcher),
            display: Arc::new(DisplayState::new()),
            selection,
        });
        (catalog, reconciler)
    }

    fn names(tools: &[Arc<MatchedProvider>]) -> Vec<&str> {
        tools.iter().map(|t| t.name()).collect()
    }

    #[tokio::test]
    async fn test_sets_differ_ignores_order() {
        let (catalog, _) = reconciler(None, Arc::new(MemorySettings::new())).await;
        let a = catalog.find_by_name("jwt").unwrap();
        let b = catalog.find_by_name("url").unwrap();
        assert!(!sets_differ(&[a.clone(), b.clone()], &[b.clone(), a.clone()]));
        assert!(sets_differ(&[a.clone()], &[a.clone(), b.clone()]));
        assert!(sets_differ(&[], &[b]));
        assert!(!sets_differ(&[], &[]));
    }

    #[tokio::test]
    async fn test_single_recommendation_is_selected() {
        let (_catalog, reconciler) = reconciler(Some("42"), Arc::new(MemorySettings::new())).await;
        match reconciler.evaluate().await {
            PassOutcome::Changed {
                recommended,
                auto_selected,
            } => {
                assert_eq!(names(&recommended), vec!["number-base"]);
                assert!(auto_selected);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(reconciler.clipboard_snapshot(), ClipboardSnapshot::Text("42".to_string()));
        assert_eq!(reconciler.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_repeat_pass_is_skipped() {
        let (_catalog, reconciler) = reconciler(Some("{}"), Arc::new(MemorySettings::new())).await;
        assert!(matches!(reconciler.evaluate().await, PassOutcome::Changed { .. }));
        assert!(matches!(
            reconciler.evaluate().await,
            PassOutcome::Skipped(SkipReason::ClipboardUnchanged)
        ));
    }

    #[tokio::test]
    async fn test_multiple_recommendations_not_selected() {
        let (_catalog, reconciler) = reconciler(Some("{\"a\":1}"), Arc::new(MemorySettings::new())).await;
        match reconciler.evaluate().await {
            PassOutcome::Changed {
                recommended,
                auto_selected,
            } => {
                assert_eq!(names(&recommended), vec!["json-yaml", "json-formatter"]);
                assert!(!auto_selected);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disabled_smart_detection() {
        let settings = Arc::new(MemorySettings::new());
        settings.set_flag(keys::SMART_DETECTION, false).unwrap();
        let (catalog, reconciler) = reconciler(Some("42"), settings).await;
        assert!(matches!(
            reconciler.evaluate().await,
            PassOutcome::Skipped(SkipReason::SmartDetectionDisabled)
        ));
        assert!(catalog.recommended().is_empty());
        assert_eq!(reconciler.clipboard_snapshot(), ClipboardSnapshot::Unobserved);
    }

    #[tokio::test]
    async fn test_empty_clipboard_clears_recommendations() {
        let (catalog, reconciler) = reconciler(None, Arc::new(MemorySettings::new())).await;
        catalog.find_by_name("jwt").unwrap().set_recommended(true);
        match reconciler.evaluate().await {
            PassOutcome::Changed { recommended, .. } => assert!(recommended.is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(reconciler.clipboard_snapshot(), ClipboardSnapshot::Empty);
    }
}
