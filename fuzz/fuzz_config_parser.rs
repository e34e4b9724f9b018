//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary text to `AppConfig::parse()`, which also validates the
//! tool catalogue (duplicate names, dangling parents, parent cycles).

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(config) = toolshed_config::AppConfig::parse(s) {
            // A config that validates must also build a registry
            let _ = toolshed_core::ProviderRegistry::from_tools(&config.catalogue());
        }
    }
});
