//! Collaborator fakes.
//!
//! Every fake records what the engine did to it and can be told to fail, so
//! tests can assert on side effects without a real clipboard or UI.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use toolshed_core::catalog::{MatchedProvider, ToolCatalog};
use toolshed_core::collab::{
    ClipboardSource, CollaboratorError, NavigationEvent, NavigationSink, Notification, NotificationSink,
    TelemetryEvent, TelemetrySink,
};
use toolshed_core::menu::{MenuError, MenuSection, MenuSource};
use toolshed_core::provider::{ProviderError, ToolProvider};
use toolshed_core::BoxFuture;

/// Clipboard whose content tests set directly.
#[derive(Debug, Default)]
pub struct FakeClipboard {
    text: Mutex<Option<String>>,
    unavailable: AtomicBool,
    reads: AtomicUsize,
}

impl FakeClipboard {
    pub fn new(text: Option<&str>) -> Self {
        Self {
            text: Mutex::new(text.map(str::to_string)),
            ..Self::default()
        }
    }

    pub fn set(&self, text: Option<&str>) {
        *self.text.lock().unwrap() = text.map(str::to_string);
    }

    /// Make every read fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ClipboardSource for FakeClipboard {
    fn read_text(&self) -> BoxFuture<'_, Result<Option<String>, CollaboratorError>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let result = if self.unavailable.load(Ordering::SeqCst) {
            Err(CollaboratorError::Clipboard("locked by another process".to_string()))
        } else {
            Ok(self.text.lock().unwrap().clone())
        };
        Box::pin(async move { result })
    }
}

/// Rendezvous points for holding a navigation call open.
struct NavigationGate {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

/// Handle a test uses to step through a held navigation call.
#[derive(Clone)]
pub struct GateControl {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl GateControl {
    /// Block until the held navigation call has started.
    pub fn wait_entered(&self) {
        self.entered.wait();
    }

    /// Let the held navigation call finish.
    pub fn release(&self) {
        self.release.wait();
    }
}

/// Navigation sink that records every event.
#[derive(Default)]
pub struct RecordingNavigation {
    events: Mutex<Vec<NavigationEvent>>,
    reject: AtomicBool,
    gate: Mutex<Option<NavigationGate>>,
}

impl RecordingNavigation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the next navigation call until [`GateControl::release`].
    pub fn hold_next(&self) -> GateControl {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        *self.gate.lock().unwrap() = Some(NavigationGate {
            entered: Arc::clone(&entered),
            release: Arc::clone(&release),
        });
        GateControl { entered, release }
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<NavigationEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of the navigated tools, in order.
    pub fn names(&self) -> Vec<String> {
        self.events().iter().map(|e| e.tool.name().to_string()).collect()
    }

    pub fn payloads(&self) -> Vec<Option<String>> {
        self.events().into_iter().map(|e| e.payload).collect()
    }
}

impl NavigationSink for RecordingNavigation {
    fn navigate(&self, event: NavigationEvent) -> Result<(), CollaboratorError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.wait();
            gate.release.wait();
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Navigation("page failed to load".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Telemetry sink that records events.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
    fail: AtomicBool,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: TelemetryEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn record(&self, event: TelemetryEvent) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        self.events.lock().unwrap().push(event);
        let fail = self.fail.load(Ordering::SeqCst);
        Box::pin(async move {
            if fail {
                Err(CollaboratorError::Telemetry("endpoint unreachable".to_string()))
            } else {
                Ok(())
            }
        })
    }
}

/// Notification sink that records notifications.
#[derive(Debug, Default)]
pub struct RecordingNotifications {
    shown: Mutex<Vec<Notification>>,
}

impl RecordingNotifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifications {
    fn show(&self, notification: Notification) -> BoxFuture<'_, Result<(), CollaboratorError>> {
        self.shown.lock().unwrap().push(notification);
        Box::pin(async { Ok(()) })
    }
}

/// Provider with a settable content answer that counts its evaluations.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    answer: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ToolProvider for ScriptedProvider {
    fn can_handle<'a>(&'a self, _content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let answer = self.answer.load(Ordering::SeqCst);
        Box::pin(async move {
            tokio::task::yield_now().await;
            Ok(answer)
        })
    }
}

/// Provider whose content check always errors.
#[derive(Debug, Default)]
pub struct FailingProvider;

impl ToolProvider for FailingProvider {
    fn can_handle<'a>(&'a self, _content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(async { Err(ProviderError::Evaluation("detector crashed".to_string())) })
    }
}

/// Provider whose content check panics.
#[derive(Debug, Default)]
pub struct PanickingProvider;

impl ToolProvider for PanickingProvider {
    fn can_handle<'a>(&'a self, _content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(async { explode() })
    }
}

fn explode() -> Result<bool, ProviderError> {
    panic!("detector panicked")
}

/// Provider that cannot be opened.
#[derive(Debug, Default)]
pub struct UnopenableProvider;

impl ToolProvider for UnopenableProvider {
    fn can_handle<'a>(&'a self, _content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(async { Ok(true) })
    }

    fn open(
        &self,
        descriptor: &toolshed_core::registry::ProviderDescriptor,
    ) -> Result<toolshed_core::provider::ToolHandle, ProviderError> {
        Err(ProviderError::Open(format!("{} is not installed", descriptor.name)))
    }
}

/// Menu source whose body fetch waits for [`GatedMenuSource::release`].
pub struct GatedMenuSource {
    catalog: Arc<ToolCatalog>,
    gate: Arc<Notify>,
}

impl GatedMenuSource {
    pub fn new(catalog: Arc<ToolCatalog>) -> Self {
        Self {
            catalog,
            gate: Arc::new(Notify::new()),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

impl MenuSource for GatedMenuSource {
    fn header_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        self.catalog.header_tools()
    }

    fn body_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        Box::pin(async move {
            self.gate.notified().await;
            self.catalog.body_tools().await
        })
    }

    fn footer_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        self.catalog.footer_tools()
    }
}

/// Menu source whose footer fetch fails.
pub struct FailingMenuSource {
    catalog: Arc<ToolCatalog>,
}

impl FailingMenuSource {
    pub fn new(catalog: Arc<ToolCatalog>) -> Self {
        Self { catalog }
    }
}

impl MenuSource for FailingMenuSource {
    fn header_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        self.catalog.header_tools()
    }

    fn body_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        self.catalog.body_tools()
    }

    fn footer_tools(&self) -> BoxFuture<'_, Result<Vec<Arc<MatchedProvider>>, MenuError>> {
        Box::pin(async {
            Err(MenuError::Source {
                section: MenuSection::Footer,
                reason: "footer provider unavailable".to_string(),
            })
        })
    }
}

/// Poll `check` until it returns true, panicking after two seconds.
///
/// For effects of detached tasks, which the engine never awaits.
pub async fn eventually<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `future` with a two-second timeout, panicking if it does not finish.
pub async fn within<T>(what: &str, future: impl Future<Output = T>) -> T {
    match tokio::time::timeout(Duration::from_secs(2), future).await {
        Ok(value) => value,
        Err(_) => panic!("timed out waiting for {what}"),
    }
}
