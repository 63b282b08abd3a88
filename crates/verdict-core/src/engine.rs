//! Engine boundary
//!
//! The policy engine is a black box reached through foreign calls: JSON text
//! goes in, JSON text or an error string comes out. [`DecisionEngine`] is that
//! call surface and nothing more; typing, validation and error mapping live on
//! the client side.

use std::time::Duration;

/// Raw outcome of a foreign call. `Err` carries the engine's message verbatim.
pub type EngineResult<T> = std::result::Result<T, String>;

/// A live engine instance.
///
/// Implementations must be safe to call from several threads at once; the
/// client adds no locking around these calls.
pub trait DecisionEngine: Send + Sync {
    /// Evaluate a signed-token request
    fn authorize(&self, request: &str) -> EngineResult<String>;

    /// Evaluate a request with explicit principals
    fn authorize_unsigned(&self, request: &str) -> EngineResult<String>;

    /// Evaluate a request with tokens from several issuers
    fn authorize_multi_issuer(&self, request: &str) -> EngineResult<String>;

    /// Drain the log buffer
    fn pop_logs(&self) -> Vec<String>;

    /// Retained entry by id, empty when unknown or expired
    fn get_log_by_id(&self, id: &str) -> String;

    /// Ids of every retained entry
    fn get_log_ids(&self) -> Vec<String>;

    /// Retained entries carrying `tag`
    fn get_logs_by_tag(&self, tag: &str) -> Vec<String>;

    /// Retained entries produced while serving `request_id`
    fn get_logs_by_request_id(&self, request_id: &str) -> Vec<String>;

    /// Entries of `request_id` that also carry `tag`
    fn get_logs_by_request_id_and_tag(&self, request_id: &str, tag: &str) -> Vec<String>;

    /// Store a JSON value in the data context
    fn push_data(&self, key: &str, value: &str, ttl: Option<Duration>) -> EngineResult<()>;

    /// JSON value stored under `key`
    fn get_data(&self, key: &str) -> EngineResult<Option<String>>;

    /// JSON-encoded entry with metadata
    fn get_data_entry(&self, key: &str) -> EngineResult<Option<String>>;

    /// Remove `key`; true when something was removed
    fn remove_data(&self, key: &str) -> EngineResult<bool>;

    /// Remove every entry
    fn clear_data(&self) -> EngineResult<()>;

    /// JSON array of every live entry
    fn list_data(&self) -> EngineResult<String>;

    /// JSON-encoded store statistics
    fn data_stats(&self) -> EngineResult<String>;

    /// Release engine-side resources. Called exactly once per instance.
    fn shut_down(&self);
}

/// Builds engine instances from a rendered bootstrap configuration.
pub trait EngineFactory: Send + Sync {
    /// `config` is the JSON object produced by
    /// [`BootstrapConfig::to_json`](crate::config::BootstrapConfig::to_json).
    fn create(&self, config: &str) -> EngineResult<Box<dyn DecisionEngine>>;
}

impl<F> EngineFactory for F
where
    F: Fn(&str) -> EngineResult<Box<dyn DecisionEngine>> + Send + Sync,
{
    fn create(&self, config: &str) -> EngineResult<Box<dyn DecisionEngine>> {
        self(config)
    }
}
