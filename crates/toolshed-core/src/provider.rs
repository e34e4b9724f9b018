//! Tool provider trait: the pluggable behaviour behind each descriptor.
//!
//! A provider answers two questions about itself: how well it matches a
//! typed query, and whether it can handle a piece of clipboard content. Both
//! are evaluated independently per provider and share no state, so any worker
//! task may call them without synchronization.

use toolshed_config::DetectorKind;

use crate::BoxFuture;
use crate::detect;
use crate::matcher;
use crate::registry::ProviderDescriptor;

/// Errors raised by a provider while evaluating or opening.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("tool evaluation failed: {0}")]
    Evaluation(String),

    #[error("tool could not be opened: {0}")]
    Open(String),
}

/// The resolved handle passed to navigation when a tool is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolHandle {
    pub name: String,
    pub protocol: String,
    pub display_name: String,
}

impl ToolHandle {
    pub fn for_descriptor(descriptor: &ProviderDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            protocol: descriptor.protocol.clone(),
            display_name: descriptor.display_name.clone(),
        }
    }
}

/// Behaviour attached to a registered tool.
pub trait ToolProvider: Send + Sync {
    /// Whether this tool can handle `content` (clipboard text).
    fn can_handle<'a>(&'a self, content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>>;

    /// How well `query` matches this tool; `0` means no match.
    ///
    /// `query` is already trimmed and lowercased.
    fn query_score(&self, descriptor: &ProviderDescriptor, query: &str) -> Result<u32, ProviderError> {
        Ok(matcher::descriptor_score(descriptor, query))
    }

    /// Resolve the handle navigation receives when this tool is selected.
    fn open(&self, descriptor: &ProviderDescriptor) -> Result<ToolHandle, ProviderError> {
        Ok(ToolHandle::for_descriptor(descriptor))
    }
}

/// Provider backed by one of the built-in [`detect`] functions.
#[derive(Debug, Clone, Copy)]
pub struct DetectorProvider {
    kind: DetectorKind,
}

impl DetectorProvider {
    pub fn new(kind: DetectorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> DetectorKind {
        self.kind
    }
}

impl ToolProvider for DetectorProvider {
    fn can_handle<'a>(&'a self, content: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
        let kind = self.kind;
        Box::pin(async move { Ok(detect::matches(kind, content)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detector_provider_delegates() {
        let json = DetectorProvider::new(DetectorKind::Json);
        assert!(json.can_handle("{\"a\": 1}").await.unwrap());
        assert!(!json.can_handle("plain text").await.unwrap());

        let none = DetectorProvider::new(DetectorKind::None);
        assert!(!none.can_handle("{}").await.unwrap());
    }

    #[test]
    fn test_default_open_uses_descriptor() {
        let descriptor = ProviderDescriptor::new("base64", "Base64", "Base64 Text");
        let handle = DetectorProvider::new(DetectorKind::Base64)
            .open(&descriptor)
            .unwrap();
        assert_eq!(handle.name, "base64");
        assert_eq!(handle.protocol, "Base64");
        assert_eq!(handle.display_name, "Base64 Text");
    }

    #[test]
    fn test_default_query_score() {
        let descriptor =
            ProviderDescriptor::new("base64", "base64", "Base64 Text").with_keywords(&["encode"]);
        let provider = DetectorProvider::new(DetectorKind::Base64);
        assert!(provider.query_score(&descriptor, "base").unwrap() > 0);
        assert!(provider.query_score(&descriptor, "encode").unwrap() > 0);
        assert_eq!(provider.query_score(&descriptor, "yaml").unwrap(), 0);
    }
}
