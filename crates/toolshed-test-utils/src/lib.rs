#![deny(unsafe_code)]

//! Shared test utilities for the Toolshed workspace.
//!
//! Provides collaborator fakes, config builders, an engine harness, and
//! tracing helpers so that individual crate tests stay concise and
//! consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! toolshed-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod engine;
pub mod fakes;
pub mod tracing_setup;
