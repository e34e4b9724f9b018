//! Selection state machine.
//!
//! Holds the currently selected tool and applies new selections one at a
//! time. A request arriving while another is being applied is dropped, not
//! queued. Transitions are expected to run on the affinity context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use toolshed_config::{SettingsStore, keys};
use tracing::{debug, info, warn};

use crate::catalog::MatchedProvider;
use crate::collab::{CollaboratorError, NavigationEvent, NavigationSink};
use crate::provider::ProviderError;

/// Flags shared between the reconciler, startup resolution, and selection.
#[derive(Debug)]
pub struct SelectionContext {
    /// One-shot: the next selection may receive the clipboard payload.
    paste_allowed: AtomicBool,
    /// Cleared for good once a deep link has chosen a tool.
    allow_auto_select: AtomicBool,
}

impl Default for SelectionContext {
    fn default() -> Self {
        Self {
            paste_allowed: AtomicBool::new(false),
            allow_auto_select: AtomicBool::new(true),
        }
    }
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_paste_once(&self) {
        self.paste_allowed.store(true, Ordering::Release);
    }

    pub fn clear_paste(&self) {
        self.paste_allowed.store(false, Ordering::Release);
    }

    pub fn paste_allowed(&self) -> bool {
        self.paste_allowed.load(Ordering::Acquire)
    }

    /// Read and clear the paste flag.
    pub fn take_paste_allowed(&self) -> bool {
        self.paste_allowed.swap(false, Ordering::AcqRel)
    }

    pub fn auto_select_allowed(&self) -> bool {
        self.allow_auto_select.load(Ordering::Acquire)
    }

    /// Permanently disable automatic selection of recommended tools.
    pub fn disable_auto_select(&self) {
        self.allow_auto_select.store(false, Ordering::Release);
    }
}

/// Errors from applying a selection.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error(transparent)]
    Open(#[from] ProviderError),

    #[error(transparent)]
    Navigation(#[from] CollaboratorError),
}

/// Result of a selection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Applied,
    /// Another selection was in flight; the request was dropped.
    Busy,
    /// No candidate was given.
    NoCandidate,
    /// Resolving or navigating failed; the previous selection stands.
    Failed,
}

pub struct SelectionStateMachine {
    current: Mutex<Option<Arc<MatchedProvider>>>,
    in_flight: Mutex<()>,
    context: Arc<SelectionContext>,
    settings: Arc<dyn SettingsStore>,
    navigation: Arc<dyn NavigationSink>,
}

impl SelectionStateMachine {
    pub fn new(
        context: Arc<SelectionContext>,
        settings: Arc<dyn SettingsStore>,
        navigation: Arc<dyn NavigationSink>,
    ) -> Self {
        Self {
            current: Mutex::new(None),
            in_flight: Mutex::new(()),
            context,
            settings,
            navigation,
        }
    }

    pub fn context(&self) -> &Arc<SelectionContext> {
        &self.context
    }

    /// The selected tool, or `None` before the first successful selection.
    pub fn current_selection(&self) -> Option<Arc<MatchedProvider>> {
        recover(&self.current).clone()
    }

    /// Select `candidate`, forwarding `payload` to navigation when pasting is
    /// allowed.
    ///
    /// The payload reaches navigation only for the first selection since the
    /// recommended set last changed, and only if the tool is recommended and
    /// pasting is enabled in settings. The one-shot paste flag is consumed by
    /// every attempt, whatever its outcome.
    pub fn select(&self, candidate: Option<Arc<MatchedProvider>>, payload: Option<String>) -> SelectOutcome {
        let Some(candidate) = candidate else {
            return SelectOutcome::NoCandidate;
        };

        let _in_flight = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                debug!(tool = %candidate.name(), "Selection in progress, request dropped");
                return SelectOutcome::Busy;
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        match self.apply(&candidate, payload) {
            Ok(()) => SelectOutcome::Applied,
            Err(e) => {
                warn!(tool = %candidate.name(), error = %e, "Unable to select a tool");
                SelectOutcome::Failed
            }
        }
    }

    fn apply(&self, candidate: &Arc<MatchedProvider>, payload: Option<String>) -> Result<(), SelectionError> {
        let paste_allowed = self.context.take_paste_allowed();
        let handle = candidate.provider().open(candidate.descriptor())?;

        let payload = payload.filter(|_| paste_allowed && candidate.is_recommended() && self.paste_enabled());

        self.navigation.navigate(NavigationEvent {
            tool: Arc::clone(candidate),
            handle,
            payload,
        })?;

        *recover(&self.current) = Some(Arc::clone(candidate));
        info!(tool = %candidate.name(), "Tool selected");
        Ok(())
    }

    fn paste_enabled(&self) -> bool {
        self.settings
            .flag(keys::SMART_DETECTION_PASTE)
            .unwrap_or_else(|e| {
                warn!(error = %e, "Unable to read paste setting");
                false
            })
    }
}

fn recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
