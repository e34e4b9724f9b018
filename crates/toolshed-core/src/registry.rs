//! Provider registry: the immutable tree of tool descriptors.
//!
//! Descriptors are registered in a flat list (from config or
//! programmatically) and assembled into a tree of [`ProviderNode`]s.
//! Registration order is preserved among siblings and is the tie-breaker for
//! search ranking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use toolshed_config::{Placement, ToolConfig};

use crate::provider::{DetectorProvider, ToolProvider};

/// Errors raised while assembling the registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool name {0:?} is registered more than once")]
    DuplicateName(String),

    #[error("tool protocol {0:?} is registered more than once")]
    DuplicateProtocol(String),

    #[error("tool {tool:?} names unknown parent {parent:?}")]
    UnknownParent { tool: String, parent: String },

    #[error("tools {0:?} form a parent cycle")]
    Cycle(Vec<String>),
}

/// Preferred window size in compact overlay mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactSize {
    pub width: u32,
    pub height: u32,
}

/// Immutable description of one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderDescriptor {
    /// Unique name.
    pub name: String,
    /// Deep-link protocol identifier.
    pub protocol: String,
    /// Name shown in menus.
    pub display_name: String,
    /// Menu region for top-level tools.
    pub placement: Placement,
    /// Name of the owning group, if any.
    pub parent: Option<String>,
    /// Search aliases.
    pub keywords: Vec<String>,
    pub compact_size: CompactSize,
}

impl ProviderDescriptor {
    pub fn new(name: &str, protocol: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            protocol: protocol.to_string(),
            display_name: display_name.to_string(),
            placement: Placement::Body,
            parent: None,
            keywords: Vec::new(),
            compact_size: CompactSize {
                width: 400,
                height: 400,
            },
        }
    }

    pub fn from_config(tool: &ToolConfig) -> Self {
        Self {
            name: tool.name.clone(),
            protocol: tool.protocol.clone(),
            display_name: tool.display_name.clone(),
            placement: tool.placement,
            parent: tool.parent.clone(),
            keywords: tool.keywords.clone(),
            compact_size: CompactSize {
                width: tool.compact_width,
                height: tool.compact_height,
            },
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_compact_size(mut self, width: u32, height: u32) -> Self {
        self.compact_size = CompactSize { width, height };
        self
    }
}

/// A descriptor paired with its behaviour.
#[derive(Clone)]
pub struct ProviderEntry {
    pub descriptor: Arc<ProviderDescriptor>,
    pub provider: Arc<dyn ToolProvider>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.descriptor.name)
            .finish_non_exhaustive()
    }
}

/// A node in the descriptor tree.
#[derive(Debug, Clone)]
pub enum ProviderNode {
    Leaf(ProviderEntry),
    Group(ProviderEntry, Vec<ProviderNode>),
}

impl ProviderNode {
    pub fn entry(&self) -> &ProviderEntry {
        match self {
            ProviderNode::Leaf(entry) | ProviderNode::Group(entry, _) => entry,
        }
    }

    pub fn descriptor(&self) -> &ProviderDescriptor {
        &self.entry().descriptor
    }

    pub fn children(&self) -> &[ProviderNode] {
        match self {
            ProviderNode::Leaf(_) => &[],
            ProviderNode::Group(_, children) => children,
        }
    }
}

/// The assembled descriptor tree.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    roots: Vec<ProviderNode>,
    len: usize,
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build a registry from config entries, attaching a [`DetectorProvider`]
    /// to each.
    pub fn from_tools(tools: &[ToolConfig]) -> Result<Self, RegistryError> {
        tools
            .iter()
            .fold(Self::builder(), |builder, tool| {
                builder.register(
                    ProviderDescriptor::from_config(tool),
                    Arc::new(DetectorProvider::new(tool.detect)),
                )
            })
            .build()
    }

    /// Top-level nodes in registration order.
    pub fn roots(&self) -> &[ProviderNode] {
        &self.roots
    }

    /// Top-level nodes in the given menu region.
    pub fn placed(&self, placement: Placement) -> impl Iterator<Item = &ProviderNode> {
        self.roots
            .iter()
            .filter(move |node| node.descriptor().placement == placement)
    }

    /// Every node, depth-first in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderNode> {
        let mut stack: Vec<&ProviderNode> = self.roots.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children().iter().rev());
            Some(node)
        })
    }

    /// Total number of registered descriptors.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Collects registrations and validates them into a [`ProviderRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<ProviderEntry>,
}

impl RegistryBuilder {
    pub fn register(mut self, descriptor: ProviderDescriptor, provider: Arc<dyn ToolProvider>) -> Self {
        self.entries.push(ProviderEntry {
            descriptor: Arc::new(descriptor),
            provider,
        });
        self
    }

    pub fn build(self) -> Result<ProviderRegistry, RegistryError> {
        let mut names = HashSet::new();
        let mut protocols = HashSet::new();
        for entry in &self.entries {
            let d = &entry.descriptor;
            if !names.insert(d.name.as_str()) {
                return Err(RegistryError::DuplicateName(d.name.clone()));
            }
            if !protocols.insert(d.protocol.to_lowercase()) {
                return Err(RegistryError::DuplicateProtocol(d.protocol.clone()));
            }
        }

        let mut children_of: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut root_indices = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            match &entry.descriptor.parent {
                Some(parent) if !names.contains(parent.as_str()) => {
                    return Err(RegistryError::UnknownParent {
                        tool: entry.descriptor.name.clone(),
                        parent: parent.clone(),
                    });
                }
                Some(parent) => children_of.entry(parent.as_str()).or_default().push(i),
                None => root_indices.push(i),
            }
        }

        let mut placed = vec![false; self.entries.len()];
        let roots = root_indices
            .iter()
            .map(|&i| build_node(&self.entries, &children_of, i, &mut placed))
            .collect();

        // Anything never reached from a root sits on a parent cycle
        let orphans: Vec<String> = self
            .entries
            .iter()
            .zip(&placed)
            .filter(|(_, placed)| !**placed)
            .map(|(entry, _)| entry.descriptor.name.clone())
            .collect();
        if !orphans.is_empty() {
            return Err(RegistryError::Cycle(orphans));
        }

        Ok(ProviderRegistry {
            roots,
            len: self.entries.len(),
        })
    }
}

fn build_node(
    entries: &[ProviderEntry],
    children_of: &HashMap<&str, Vec<usize>>,
    index: usize,
    placed: &mut [bool],
) -> ProviderNode {
    placed[index] = true;
    let entry = entries[index].clone();
    match children_of.get(entry.descriptor.name.as_str()) {
        Some(children) if !children.is_empty() => {
            let nodes = children
                .iter()
                .map(|&child| build_node(entries, children_of, child, placed))
                .collect();
            ProviderNode::Group(entry, nodes)
        }
        _ => ProviderNode::Leaf(entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use toolshed_config::DetectorKind;

    fn noop() -> Arc<dyn ToolProvider> {
        Arc::new(DetectorProvider::new(DetectorKind::None))
    }

    fn names<'a>(nodes: impl Iterator<Item = &'a ProviderNode>) -> Vec<&'a str> {
        nodes.map(|n| n.descriptor().name.as_str()).collect()
    }

    #[test]
    fn test_tree_assembly_preserves_order() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("home", "home", "Home").with_placement(Placement::Header), noop())
            .register(ProviderDescriptor::new("enc", "enc", "Encoders"), noop())
            .register(ProviderDescriptor::new("b64", "b64", "Base64").with_parent("enc"), noop())
            .register(ProviderDescriptor::new("url", "url", "URL").with_parent("enc"), noop())
            .register(ProviderDescriptor::new("cfg", "cfg", "Settings").with_placement(Placement::Footer), noop())
            .build()
            .unwrap();

        assert_eq!(registry.len(), 5);
        assert_eq!(names(registry.roots().iter()), vec!["home", "enc", "cfg"]);
        assert_eq!(names(registry.iter()), vec!["home", "enc", "b64", "url", "cfg"]);
        assert_eq!(names(registry.placed(Placement::Header)), vec!["home"]);
        assert_eq!(names(registry.placed(Placement::Body)), vec!["enc"]);
        assert_eq!(names(registry.placed(Placement::Footer)), vec!["cfg"]);

        let enc = &registry.roots()[1];
        assert!(matches!(enc, ProviderNode::Group(_, _)));
        assert_eq!(names(enc.children().iter()), vec!["b64", "url"]);
    }

    #[test]
    fn test_child_may_precede_parent() {
        let registry = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("b64", "b64", "Base64").with_parent("enc"), noop())
            .register(ProviderDescriptor::new("enc", "enc", "Encoders"), noop())
            .build()
            .unwrap();
        assert_eq!(names(registry.iter()), vec!["enc", "b64"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let result = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("a", "a", "A"), noop())
            .register(ProviderDescriptor::new("a", "b", "B"), noop())
            .build();
        assert!(matches!(result, Err(RegistryError::DuplicateName(_))));
    }

    #[test]
    fn test_duplicate_protocol_rejected_case_insensitively() {
        let result = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("a", "Json", "A"), noop())
            .register(ProviderDescriptor::new("b", "json", "B"), noop())
            .build();
        assert!(matches!(result, Err(RegistryError::DuplicateProtocol(_))));
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let result = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("a", "a", "A").with_parent("ghost"), noop())
            .build();
        assert!(matches!(result, Err(RegistryError::UnknownParent { .. })));
    }

    #[test]
    fn test_cycle_rejected() {
        let result = ProviderRegistry::builder()
            .register(ProviderDescriptor::new("a", "a", "A").with_parent("b"), noop())
            .register(ProviderDescriptor::new("b", "b", "B").with_parent("a"), noop())
            .register(ProviderDescriptor::new("c", "c", "C"), noop())
            .build();
        match result {
            Err(RegistryError::Cycle(names)) => assert_eq!(names, vec!["a", "b"]),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_default_catalogue() {
        let registry = ProviderRegistry::from_tools(&toolshed_config::tools::default_tools()).unwrap();
        assert_eq!(registry.len(), toolshed_config::tools::default_tools().len());
        assert_eq!(names(registry.placed(Placement::Header)), vec!["all-tools"]);
        assert_eq!(names(registry.placed(Placement::Footer)), vec!["settings"]);
    }
}
