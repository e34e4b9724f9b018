//! Materialized tool catalog.
//!
//! [`ToolCatalog::materialize`] builds one [`MatchedProvider`] per registered
//! descriptor, once. The same instances are reused across every search and
//! recommendation pass; only the recommended flag changes.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use toolshed_config::{DetectorKind, Placement};

use crate::provider::{DetectorProvider, ToolProvider};
use crate::registry::{ProviderDescriptor, ProviderNode, ProviderRegistry};

/// Position of a provider in depth-first registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProviderId(usize);

impl ProviderId {
    /// Id used for entries that are not part of the catalog (search results).
    pub const TRANSIENT: ProviderId = ProviderId(usize::MAX);

    pub fn index(self) -> usize {
        self.0
    }
}

/// One descriptor's evaluation state.
///
/// Equality is identity: two values are equal only if they are the same
/// instance.
pub struct MatchedProvider {
    id: ProviderId,
    descriptor: Arc<ProviderDescriptor>,
    provider: Arc<dyn ToolProvider>,
    children: Vec<Arc<MatchedProvider>>,
    recommended: AtomicBool,
}

impl MatchedProvider {
    /// Build an entry outside the catalog, e.g. the "search results" page
    /// whose children are the matched tools.
    pub fn transient(descriptor: ProviderDescriptor, children: Vec<Arc<MatchedProvider>>) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::TRANSIENT,
            descriptor: Arc::new(descriptor),
            provider: Arc::new(DetectorProvider::new(DetectorKind::None)),
            children,
            recommended: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    pub fn provider(&self) -> &dyn ToolProvider {
        self.provider.as_ref()
    }

    pub fn children(&self) -> &[Arc<MatchedProvider>] {
        &self.children
    }

    pub fn is_recommended(&self) -> bool {
        self.recommended.load(Ordering::Acquire)
    }

    /// Only the evaluation task owning this provider writes the flag.
    pub(crate) fn set_recommended(&self, recommended: bool) {
        self.recommended.store(recommended, Ordering::Release);
    }

    /// Whether `other` is this entry or one of its descendants.
    pub fn contains(&self, other: &MatchedProvider) -> bool {
        self == other || self.children.iter().any(|child| child.contains(other))
    }
}

impl PartialEq for MatchedProvider {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for MatchedProvider {}

impl fmt::Debug for MatchedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchedProvider")
            .field("name", &self.descriptor.name)
            .field("recommended", &self.is_recommended())
            .field("children", &self.children.len())
            .finish()
    }
}

/// Every materialized provider, as a tree and as a flat list.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    roots: Vec<Arc<MatchedProvider>>,
    all: Vec<Arc<MatchedProvider>>,
}

impl ToolCatalog {
    pub fn materialize(registry: &ProviderRegistry) -> Self {
        let mut next_id = 0;
        let roots: Vec<_> = registry
            .roots()
            .iter()
            .map(|node| materialize_node(node, &mut next_id))
            .collect();
        let mut all = Vec::with_capacity(registry.len());
        for root in &roots {
            flatten(root, &mut all);
        }
        Self { roots, all }
    }

    pub fn roots(&self) -> &[Arc<MatchedProvider>] {
        &self.roots
    }

    /// Every provider, leaf or group, in registration order.
    pub fn all(&self) -> &[Arc<MatchedProvider>] {
        &self.all
    }

    /// Top-level providers in the given menu region.
    pub fn placed(&self, placement: Placement) -> Vec<Arc<MatchedProvider>> {
        self.roots
            .iter()
            .filter(|p| p.descriptor().placement == placement)
            .cloned()
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<MatchedProvider>> {
        self.all.iter().find(|p| p.name() == name).cloned()
    }

    /// Case-insensitive lookup by deep-link protocol.
    pub fn find_by_protocol(&self, protocol: &str) -> Option<Arc<MatchedProvider>> {
        self.all
            .iter()
            .find(|p| p.descriptor().protocol.eq_ignore_ascii_case(protocol))
            .cloned()
    }

    /// Providers currently flagged recommended, in registration order.
    pub fn recommended(&self) -> Vec<Arc<MatchedProvider>> {
        self.all.iter().filter(|p| p.is_recommended()).cloned().collect()
    }
}

fn materialize_node(node: &ProviderNode, next_id: &mut usize) -> Arc<MatchedProvider> {
    let id = ProviderId(*next_id);
    *next_id += 1;
    let children = node
        .children()
        .iter()
        .map(|child| materialize_node(child, next_id))
        .collect();
    let entry = node.entry();
    Arc::new(MatchedProvider {
        id,
        descriptor: Arc::clone(&entry.descriptor),
        provider: Arc::clone(&entry.provider),
        children,
        recommended: AtomicBool::new(false),
    })
}

fn flatten(provider: &Arc<MatchedProvider>, all: &mut Vec<Arc<MatchedProvider>>) {
    all.push(Arc::clone(provider));
    for child in provider.children() {
        flatten(child, all);
    }
}
