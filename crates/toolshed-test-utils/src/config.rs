//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use toolshed_config::{AppConfig, DetectorKind, Placement, ToolConfig};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .smart_detection(false)
///     .tool(ToolConfig::new("b", "b", "Formatter"))
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn smart_detection(mut self, enabled: bool) -> Self {
        self.config.detection.smart_detection = enabled;
        self
    }

    pub fn paste_on_recommend(mut self, enabled: bool) -> Self {
        self.config.detection.paste_on_recommend = enabled;
        self
    }

    pub fn tool(mut self, tool: ToolConfig) -> Self {
        self.config.tools.push(tool);
        self
    }

    /// The three-tool catalogue used throughout the engine tests: `a` in the
    /// header, `b` (json) and `c` (base64) in the body.
    pub fn abc_tools(self) -> Self {
        self.tool(ToolConfig::new("a", "a", "All tools").with_placement(Placement::Header))
            .tool(
                ToolConfig::new("b", "b", "Formatter")
                    .with_keywords(&["json"])
                    .with_detector(DetectorKind::Json),
            )
            .tool(
                ToolConfig::new("c", "c", "Encoder")
                    .with_keywords(&["base64"])
                    .with_detector(DetectorKind::Base64),
            )
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
