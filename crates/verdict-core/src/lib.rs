//! # Verdict Core
//!
//! Wire-independent types for the decision protocol:
//! - `entity` - principals and resources as type, id and an attribute bag
//! - `request` - the signed, unsigned and multi-issuer request variants
//! - `verdict` - decoded per-entity verdicts and the aggregate result
//! - `config` - typed bootstrap record with passthrough keys
//! - `engine` - the foreign-call surface of the opaque policy engine
//! - `log_record`, `data` - decoded log entries and data context records
//!
//! Nothing in this crate talks to an engine; see `verdict-client` for that.

#![forbid(unsafe_code)]

pub mod config;
pub mod data;
pub mod engine;
pub mod entity;
pub mod errors;
pub mod log_record;
pub mod request;
pub mod verdict;

pub use config::{
    is_recognized_key, BootstrapConfig, FeatureToggle, IdTokenTrustMode, LogLevel, LogType,
    RECOGNIZED_KEYS,
};
pub use data::{DataEntry, DataStoreStats};
pub use engine::{DecisionEngine, EngineFactory, EngineResult};
pub use entity::{EntityData, EntityUid, Payload};
pub use errors::{Result, VerdictError};
pub use log_record::LogRecord;
pub use request::{
    action_uid, context_from_value, Context, DecisionRequest, MultiIssuerRequest, SignedRequest,
    TokenInput, UnsignedRequest,
};
pub use verdict::{AggregateResult, Decision, EntityVerdict};
