//! Tool catalogue definitions as expressed in TOML.
//!
//! Each `[[tools]]` entry describes one tool descriptor. Groups are ordinary
//! entries that other entries name as their `parent`; the registry in
//! `toolshed-core` turns the flat list into a tree, preserving file order.
//!
//! ## TOML Example
//!
//! ```toml
//! [[tools]]
//! name = "encoders"
//! protocol = "encoders"
//! display_name = "Encoders / Decoders"
//!
//! [[tools]]
//! name = "base64"
//! protocol = "base64"
//! display_name = "Base64 Text"
//! parent = "encoders"
//! keywords = ["base64", "encode", "decode"]
//! detect = "base64"
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which region of the menu a top-level tool is shown in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Above the separator, before the tool tree.
    Header,
    /// The main tool tree.
    #[default]
    Body,
    /// The footer menu.
    Footer,
}

/// Built-in clipboard content detector attached to a config-defined tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Never recommended from clipboard content.
    #[default]
    None,
    Json,
    Base64,
    Url,
    Jwt,
    Guid,
    Number,
}

impl DetectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorKind::None => "none",
            DetectorKind::Json => "json",
            DetectorKind::Base64 => "base64",
            DetectorKind::Url => "url",
            DetectorKind::Jwt => "jwt",
            DetectorKind::Guid => "guid",
            DetectorKind::Number => "number",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tool entry in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Unique name (lookup key for messages and parent references).
    pub name: String,

    /// Protocol identifier used by deep links (`?tool=<protocol>`).
    pub protocol: String,

    /// Name shown in menus and search results.
    pub display_name: String,

    /// Menu region. Ignored for tools that have a parent.
    #[serde(default)]
    pub placement: Placement,

    /// Name of the group this tool belongs to.
    #[serde(default)]
    pub parent: Option<String>,

    /// Extra search terms matched against queries.
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Clipboard detector used for recommendations.
    #[serde(default)]
    pub detect: DetectorKind,

    /// Preferred width in compact overlay mode.
    #[serde(default = "default_compact_size")]
    pub compact_width: u32,

    /// Preferred height in compact overlay mode.
    #[serde(default = "default_compact_size")]
    pub compact_height: u32,
}

fn default_compact_size() -> u32 {
    400
}

impl ToolConfig {
    /// Create a body-placed tool with no parent, keywords, or detector.
    pub fn new(name: &str, protocol: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            protocol: protocol.to_string(),
            display_name: display_name.to_string(),
            placement: Placement::Body,
            parent: None,
            keywords: Vec::new(),
            detect: DetectorKind::None,
            compact_width: default_compact_size(),
            compact_height: default_compact_size(),
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

    pub fn with_detector(mut self, detect: DetectorKind) -> Self {
        self.detect = detect;
        self
    }

    pub fn with_compact_size(mut self, width: u32, height: u32) -> Self {
        self.compact_width = width;
        self.compact_height = height;
        self
    }
}

/// The catalogue used when the configuration defines no `[[tools]]`.
pub fn default_tools() -> Vec<ToolConfig> {
    vec![
        ToolConfig::new("all-tools", "alltools", "All tools").with_placement(Placement::Header),
        ToolConfig::new("converters", "converters", "Converters"),
        ToolConfig::new("json-yaml", "jsonyaml", "JSON <> YAML")
            .with_parent("converters")
            .with_keywords(&["json", "yaml", "convert"])
            .with_detector(DetectorKind::Json),
        ToolConfig::new("number-base", "numberbase", "Number Base")
            .with_parent("converters")
            .with_keywords(&["hex", "binary", "decimal", "octal"])
            .with_detector(DetectorKind::Number)
            .with_compact_size(400, 300),
        ToolConfig::new("encoders", "encoders", "Encoders / Decoders"),
        ToolConfig::new("base64", "base64", "Base64 Text")
            .with_parent("encoders")
            .with_keywords(&["base64", "encode", "decode"])
            .with_detector(DetectorKind::Base64),
        ToolConfig::new("url", "url", "URL Encoder / Decoder")
            .with_parent("encoders")
            .with_keywords(&["url", "uri", "percent", "encode", "decode"])
            .with_detector(DetectorKind::Url),
        ToolConfig::new("jwt", "jwt", "JWT Decoder")
            .with_parent("encoders")
            .with_keywords(&["jwt", "token", "decode"])
            .with_detector(DetectorKind::Jwt),
        ToolConfig::new("formatters", "formatters", "Formatters"),
        ToolConfig::new("json-formatter", "jsonformat", "JSON Formatter")
            .with_parent("formatters")
            .with_keywords(&["json", "format", "indent"])
            .with_detector(DetectorKind::Json),
        ToolConfig::new("generators", "generators", "Generators"),
        ToolConfig::new("uuid", "guid", "UUID Generator")
            .with_parent("generators")
            .with_keywords(&["uuid", "guid"])
            .with_compact_size(320, 240),
        ToolConfig::new("settings", "settings", "Settings").with_placement(Placement::Footer),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detector_kind_round_trips_through_toml_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            detect: DetectorKind,
        }
        let wrapped: Wrapper = toml::from_str("detect = \"jwt\"").unwrap();
        assert_eq!(wrapped.detect, DetectorKind::Jwt);
        assert_eq!(wrapped.detect.to_string(), "jwt");
    }

    #[test]
    fn test_default_tools_have_unique_names() {
        let tools = default_tools();
        let mut names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), tools.len());
    }

    #[test]
    fn test_default_tools_parents_come_first() {
        let tools = default_tools();
        for (i, tool) in tools.iter().enumerate() {
            if let Some(parent) = &tool.parent {
                let parent_index = tools.iter().position(|t| &t.name == parent).unwrap();
                assert!(parent_index < i, "{} listed before its parent", tool.name);
            }
        }
    }

    #[test]
    fn test_builder_defaults() {
        let tool = ToolConfig::new("x", "x-proto", "X");
        assert_eq!(tool.placement, Placement::Body);
        assert_eq!(tool.detect, DetectorKind::None);
        assert_eq!(tool.compact_width, 400);
        assert!(tool.parent.is_none());
    }
}
