//! Unified error type for the decision protocol
//!
//! Every operation that crosses the engine boundary reports failures through
//! [`VerdictError`]. Lookup misses (logs, data entries) are not errors and are
//! reported as empty values by the callers instead.

use serde::{Deserialize, Serialize};

/// Error type for all Verdict operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VerdictError {
    /// Bootstrap configuration is malformed or missing a required key
    #[error("Invalid configuration: {message}")]
    ConfigInvalid {
        /// Which key was rejected and why
        message: String,
    },

    /// The engine refused to start with the given configuration
    #[error("Engine initialization failed: {message}")]
    EngineInitFailed {
        /// Engine-reported reason, verbatim
        message: String,
    },

    /// A request could not be encoded for the engine
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the encoding failure
        message: String,
    },

    /// The engine processed the request but reported a business-level error
    #[error("{message}")]
    EngineRejected {
        /// Engine-reported diagnostic, verbatim
        message: String,
    },

    /// The engine response did not match the expected wire shape
    #[error("Decode error: {message}")]
    Decode {
        /// Error message describing the malformed response
        message: String,
    },

    /// The handle was used after it had been destroyed
    #[error("Instance handle {handle} has been released")]
    HandleReleased {
        /// The released handle
        handle: u64,
    },

    /// The handle was never issued by this registry
    #[error("Unknown instance handle {handle}")]
    UnknownHandle {
        /// The unrecognized handle
        handle: u64,
    },
}

impl VerdictError {
    /// Create a configuration error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Create an engine initialization error
    pub fn engine_init_failed(message: impl Into<String>) -> Self {
        Self::EngineInitFailed {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an engine rejection carrying the engine's message verbatim
    pub fn engine_rejected(message: impl Into<String>) -> Self {
        Self::EngineRejected {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            VerdictError::ConfigInvalid { .. } => "config_invalid",
            VerdictError::EngineInitFailed { .. } => "engine_init_failed",
            VerdictError::Serialization { .. } => "serialization",
            VerdictError::EngineRejected { .. } => "engine_rejected",
            VerdictError::Decode { .. } => "decode",
            VerdictError::HandleReleased { .. } => "handle_released",
            VerdictError::UnknownHandle { .. } => "unknown_handle",
        }
    }

    /// True when the engine itself produced this error as a business outcome.
    pub fn is_engine_rejection(&self) -> bool {
        matches!(self, VerdictError::EngineRejected { .. })
    }

    /// True for failures that indicate a protocol bug rather than a caller or
    /// policy problem.
    pub fn is_protocol_fault(&self) -> bool {
        matches!(self, VerdictError::Decode { .. })
    }
}

/// Standard Result type for Verdict operations
pub type Result<T> = std::result::Result<T, VerdictError>;
