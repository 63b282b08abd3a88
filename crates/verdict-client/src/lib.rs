//! # Verdict Client
//!
//! Talks to an opaque policy engine through numeric instance handles:
//! - `registry` - instance creation, handle bookkeeping and release
//! - `protocol` - the signed, unsigned and multi-issuer authorize calls
//! - `logs` - the diagnostic log index
//! - `data_context` - the per-instance data store
//!
//! Every call is synchronous and blocks until the engine returns.
//!
//! ```no_run
//! use verdict_client::{action_uid, BootstrapConfig, EntityData, InstanceRegistry, SignedRequest};
//! # fn run(registry: InstanceRegistry) -> verdict_client::Result<()> {
//! let instance = registry.create(&BootstrapConfig::new("TestApp"))?;
//! let request = SignedRequest::new(
//!     action_uid("Jans", "Update"),
//!     EntityData::new("Jans::Issue", "random_id").with_attr("org_id", "some_long_id"),
//! )
//! .with_token("access_token", "eyJ...");
//! let result = instance.authorize(&request)?;
//! println!("allowed: {}", result.decision());
//! instance.destroy();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod data_context;
pub mod logs;
pub mod protocol;
pub mod registry;

pub use data_context::DataContext;
pub use logs::LogIndex;
pub use registry::{Instance, InstanceId, InstanceRegistry};

// Re-export core types
pub use verdict_core::{
    action_uid, AggregateResult, BootstrapConfig, DataEntry, DataStoreStats, Decision,
    DecisionEngine, EngineFactory, EntityData, EntityUid, EntityVerdict, LogRecord,
    MultiIssuerRequest, Result, SignedRequest, TokenInput, UnsignedRequest, VerdictError,
};
