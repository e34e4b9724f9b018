//! Fuzz target for clipboard detectors and query ranking.
//!
//! Run with: cargo +nightly fuzz run fuzz_content_detect
//!
//! Every detector and the query matcher must accept any text without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use toolshed_config::DetectorKind;
use toolshed_config::tools::default_tools;
use toolshed_core::catalog::ToolCatalog;
use toolshed_core::detect;
use toolshed_core::matcher::match_query;
use toolshed_core::registry::ProviderRegistry;

const KINDS: [DetectorKind; 7] = [
    DetectorKind::None,
    DetectorKind::Json,
    DetectorKind::Base64,
    DetectorKind::Url,
    DetectorKind::Jwt,
    DetectorKind::Guid,
    DetectorKind::Number,
];

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    for kind in KINDS {
        let _ = detect::matches(kind, text);
    }

    if let Ok(registry) = ProviderRegistry::from_tools(&default_tools()) {
        let catalog = ToolCatalog::materialize(&registry);
        let _ = match_query(&catalog, text);
    }
});
