#![deny(unsafe_code)]

//! Toolshed engine.
//!
//! Given a registry of pluggable tool providers, the engine ranks tools
//! against typed queries, recommends tools for the current clipboard
//! content, assembles the menu, and drives a single-selection state machine.
//! Rendering, clipboard access, settings persistence, notifications, and
//! telemetry are supplied by the host through the traits in [`collab`] and
//! [`affinity`].

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future: the return type for async trait
/// methods that need dynamic dispatch (`dyn Trait`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Affinity context for presentation-visible state changes.
pub mod affinity;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Materialized providers and their recommended flags.
pub mod catalog;
/// Traits for host-supplied collaborators.
pub mod collab;
/// Fire-and-forget tasks with mandatory failure handling.
pub mod detached;
/// Built-in clipboard content detectors.
pub mod detect;
/// Window display mode.
pub mod display;
/// The engine facade.
pub mod engine;
/// `tracing` layer collecting warnings and errors.
pub mod logging;
/// Query ranking and content matching.
pub mod matcher;
/// Menu composition and the menu-ready barrier.
pub mod menu;
/// The tool provider trait.
pub mod provider;
/// Clipboard-driven recommendation passes.
pub mod reconciler;
/// Descriptor registry.
pub mod registry;
/// Selection state machine.
pub mod selection;

pub use affinity::{AffinityHandle, AffinityThread, DispatchError, InlineDispatcher, Priority, UiDispatcher};
pub use catalog::{MatchedProvider, ProviderId, ToolCatalog};
pub use collab::{
    ActivationParser, ClipboardSource, CollaboratorError, NavigationEvent, NavigationSink, Notification,
    NotificationSink, QueryActivation, TelemetryEvent, TelemetrySink,
};
pub use display::DisplayMode;
pub use engine::{Collaborators, EngineError, ToolEngine};
pub use logging::{Fault, FaultLog, FaultReader};
pub use matcher::{QueryMatch, SearchItem, SearchResultSet};
pub use menu::{Menu, MenuError, MenuItem, MenuSource};
pub use provider::{DetectorProvider, ProviderError, ToolHandle, ToolProvider};
pub use reconciler::{PassOutcome, SkipReason};
pub use registry::{ProviderDescriptor, ProviderRegistry, RegistryError};
pub use selection::{SelectOutcome, SelectionContext};
