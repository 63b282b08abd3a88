//! Verdict Testing Infrastructure
//!
//! A scripted in-memory engine plus fixtures for the canonical `Jans`
//! scenario, so client and gateway tests run without a native engine.
//!
//! ```rust,no_run
//! use verdict_testkit::*;
//!
//! let factory = ScriptedEngineFactory::new(jans_script());
//! let config = bootstrap_config();
//! // InstanceRegistry::new(factory.clone()).create(&config) ...
//! # let _ = (factory, config);
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod engine;
pub mod fixtures;
pub mod logic;
pub mod script;

pub use engine::{decode_claims, ScriptedEngine, ScriptedEngineFactory};
pub use fixtures::*;
pub use script::{AttrKind, Script};

use tracing_subscriber::EnvFilter;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
