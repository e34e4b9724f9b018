//! Interfaces to the engine's external collaborators.
//!
//! The host supplies the clipboard, navigation, notification, and telemetry
//! implementations. Notification and telemetry calls are fire-and-forget from
//! the engine's point of view (see [`crate::detached`]).

use std::sync::Arc;

use tracing::{debug, info};

use crate::BoxFuture;
use crate::catalog::MatchedProvider;
use crate::provider::ToolHandle;

/// Errors reported by collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),

    #[error("navigation rejected: {0}")]
    Navigation(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("telemetry failed: {0}")]
    Telemetry(String),
}

/// Source of the current clipboard text.
pub trait ClipboardSource: Send + Sync {
    /// Read the clipboard as text; `Ok(None)` when it holds no text.
    fn read_text(&self) -> BoxFuture<'_, Result<Option<String>, CollaboratorError>>;
}

/// A finalized selection, delivered to the navigation sink.
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    /// The selected entry (its children are the results for a search page).
    pub tool: Arc<MatchedProvider>,
    /// The resolved tool handle.
    pub handle: ToolHandle,
    /// Clipboard text to paste into the tool, if pasting is allowed.
    pub payload: Option<String>,
}

/// Receives finalized selections. Called on the affinity context.
pub trait NavigationSink: Send + Sync {
    fn navigate(&self, event: NavigationEvent) -> Result<(), CollaboratorError>;
}

/// An in-app notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub action_label: Option<String>,
    pub body: Option<String>,
}

impl Notification {
    pub fn release_note(version: &str) -> Self {
        Self {
            title: format!("Toolshed has been updated to {version}"),
            action_label: Some("See what's new".to_string()),
            body: None,
        }
    }
}

/// Shows in-app notifications.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// Usage events reported to telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
    AppStarted,
    AppJustUpdated,
    SmartDetectionWorked,
}

/// Records usage events.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent) -> BoxFuture<'_, Result<(), CollaboratorError>>;
}

/// Supplies the protocol identifier requested at startup, if any.
pub trait ActivationParser: Send + Sync {
    fn startup_protocol(&self) -> Option<String>;
}

/// Query argument naming the tool to open (`?tool=<protocol>`).
pub const TOOL_ARGUMENT: &str = "tool";

/// [`ActivationParser`] over an activation query string such as
/// `"?tool=base64&other=1"`. Keys and values are percent-decoded (`+` is a
/// space) and matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct QueryActivation {
    query: Option<String>,
}

impl QueryActivation {
    pub fn new(query: Option<&str>) -> Self {
        Self {
            query: query.map(str::to_string),
        }
    }
}

impl ActivationParser for QueryActivation {
    fn startup_protocol(&self) -> Option<String> {
        let query = self.query.as_deref()?.trim();
        let query = query.strip_prefix('?').unwrap_or(query);
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| decode_component(key).is_some_and(|key| key.trim() == TOOL_ARGUMENT))
            .and_then(|(_, value)| decode_component(value))
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Decode one form-encoded query component and lowercase it. `None` when the
/// escapes do not decode to UTF-8.
fn decode_component(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => Some(decoded.to_lowercase()),
        Err(e) => {
            debug!(component = raw, error = %e, "Undecodable activation argument");
            None
        }
    }
}

/// Telemetry sink that only traces events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, event: TelemetryEvent) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async move {
            debug!(?event, "Telemetry event");
            Ok(())
        })
    }
}

/// Notification sink that logs notifications at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifications;

impl NotificationSink for TracingNotifications {
    fn show(&self, notification: Notification) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        Box::pin(async move {
            info!(title = %notification.title, "Notification");
            Ok(())
        })
    }
}

/// Clipboard that always holds the same text.
#[derive(Debug, Clone, Default)]
pub struct StaticClipboard {
    text: Option<String>,
}

impl StaticClipboard {
    pub fn new(text: Option<&str>) -> Self {
        Self {
            text: text.map(str::to_string),
        }
    }
}

impl ClipboardSource for StaticClipboard {
    fn read_text(&self) -> BoxFuture<'_, Result<Option<String>, CollaboratorError>> {
        let text = self.text.clone();
        Box::pin(async move { Ok(text) })
    }
}
