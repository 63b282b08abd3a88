//! Request gating
//!
//! [`Gatekeeper`] answers evaluation calls with an owned engine instance and
//! turns the answer into a forward/reject outcome for the intercepted call.
//! Any failure to reach a decision rejects.

use verdict_client::Instance;
use verdict_core::Result;

use crate::wire::{EvaluationRequest, EvaluationResponse};

/// HTTP status for a forwarded call
pub const STATUS_FORWARD: u16 = 200;
/// HTTP status for a rejected call
pub const STATUS_REJECT: u16 = 403;

/// What to do with an intercepted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Pass the call on to the upstream service.
    Forward,
    /// Answer the call with 403.
    Reject {
        /// Why the call was rejected
        reason: String,
    },
}

impl GateOutcome {
    /// Rejection with `reason`
    pub fn reject(reason: impl Into<String>) -> Self {
        Self::Reject {
            reason: reason.into(),
        }
    }

    /// True for [`GateOutcome::Forward`]
    pub fn is_forward(&self) -> bool {
        matches!(self, Self::Forward)
    }

    /// HTTP status to answer the intercepted call with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Forward => STATUS_FORWARD,
            Self::Reject { .. } => STATUS_REJECT,
        }
    }

    /// Rejection reason, if rejected
    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            Self::Forward => None,
            Self::Reject { reason } => Some(reason),
        }
    }
}

impl From<EvaluationResponse> for GateOutcome {
    fn from(response: EvaluationResponse) -> Self {
        if response.decision {
            Self::Forward
        } else {
            Self::reject("access denied")
        }
    }
}

/// Evaluates gateway calls against one engine instance.
#[derive(Debug)]
pub struct Gatekeeper {
    instance: Instance,
}

impl Gatekeeper {
    /// Gate calls with `instance`
    pub fn new(instance: Instance) -> Self {
        Self { instance }
    }

    /// The engine instance answering evaluations
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Answer one evaluation call.
    pub fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResponse> {
        let unsigned = request.into_unsigned();
        let result = self.instance.authorize_unsigned(&unsigned)?;
        tracing::debug!(
            handle = %self.instance.id(),
            request_id = result.request_id(),
            decision = result.decision(),
            "evaluation answered"
        );
        Ok(EvaluationResponse::from_result(&result))
    }

    /// Decide whether an intercepted call may proceed.
    pub fn gate(&self, request: EvaluationRequest) -> GateOutcome {
        match self.evaluate(request) {
            Ok(response) => response.into(),
            Err(err) => {
                tracing::warn!(
                    handle = %self.instance.id(),
                    code = err.code(),
                    error = %err,
                    "evaluation failed; rejecting call"
                );
                GateOutcome::reject(err.to_string())
            }
        }
    }

    /// Release the engine instance.
    pub fn shut_down(self) {
        self.instance.destroy();
    }
}
