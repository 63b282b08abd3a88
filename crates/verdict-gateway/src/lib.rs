//! # Verdict Gateway
//!
//! The decision-serving side of a gateway integration: the evaluation wire
//! shape (`wire`) and the forward/reject gate built on an engine instance
//! (`gatekeeper`). Loading into a particular proxy is left to the host.

#![forbid(unsafe_code)]

pub mod gatekeeper;
pub mod wire;

pub use gatekeeper::{GateOutcome, Gatekeeper, STATUS_FORWARD, STATUS_REJECT};
pub use wire::{EvaluationRequest, EvaluationResponse, WireAction, WireEntity};
