//! Decision protocol
//!
//! Encodes a request, submits it through a handle and decodes the engine's
//! answer. The three authorize variants differ only in request shape and in
//! which engine entry point they reach.
//!
//! Outcome mapping:
//! - request fails local checks or encoding: `Serialization`
//! - engine returns an error string: `EngineRejected`, message verbatim
//! - engine returns text that is not a valid result: `Decode`

use verdict_core::{
    AggregateResult, DecisionEngine, DecisionRequest, EngineResult, MultiIssuerRequest, Result,
    SignedRequest, UnsignedRequest, VerdictError,
};

use crate::registry::{Instance, InstanceId, InstanceRegistry};

impl InstanceRegistry {
    /// Authorize a request whose principals come from signed tokens.
    pub fn authorize(&self, id: InstanceId, request: &SignedRequest) -> Result<AggregateResult> {
        self.submit(id, request, |engine, body| engine.authorize(body))
    }

    /// Authorize a request with explicitly asserted principals.
    pub fn authorize_unsigned(
        &self,
        id: InstanceId,
        request: &UnsignedRequest,
    ) -> Result<AggregateResult> {
        self.submit(id, request, |engine, body| engine.authorize_unsigned(body))
    }

    /// Authorize a request carrying tokens from several issuers.
    pub fn authorize_multi_issuer(
        &self,
        id: InstanceId,
        request: &MultiIssuerRequest,
    ) -> Result<AggregateResult> {
        self.submit(id, request, |engine, body| {
            engine.authorize_multi_issuer(body)
        })
    }

    fn submit<R, F>(&self, id: InstanceId, request: &R, call: F) -> Result<AggregateResult>
    where
        R: DecisionRequest,
        F: FnOnce(&dyn DecisionEngine, &str) -> EngineResult<String>,
    {
        let span = tracing::debug_span!("decision", op = R::OPERATION, handle = %id);
        let _entered = span.enter();

        let slot = self.slot(id)?;
        let body = request.encode()?;

        let raw = call(slot.engine(), &body).map_err(|message| {
            let err = if message.is_empty() {
                VerdictError::engine_rejected("engine rejected the request without a message")
            } else {
                VerdictError::engine_rejected(message)
            };
            tracing::debug!(code = err.code(), error = %err, "engine rejected request");
            err
        })?;

        let result = AggregateResult::decode(&raw).map_err(|err| {
            tracing::warn!(error = %err, "engine returned an undecodable result");
            err
        })?;

        tracing::debug!(
            request_id = result.request_id(),
            decision = result.decision(),
            "decision received"
        );
        Ok(result)
    }
}

impl Instance {
    /// See [`InstanceRegistry::authorize`]
    pub fn authorize(&self, request: &SignedRequest) -> Result<AggregateResult> {
        self.registry().authorize(self.id(), request)
    }

    /// See [`InstanceRegistry::authorize_unsigned`]
    pub fn authorize_unsigned(&self, request: &UnsignedRequest) -> Result<AggregateResult> {
        self.registry().authorize_unsigned(self.id(), request)
    }

    /// See [`InstanceRegistry::authorize_multi_issuer`]
    pub fn authorize_multi_issuer(&self, request: &MultiIssuerRequest) -> Result<AggregateResult> {
        self.registry().authorize_multi_issuer(self.id(), request)
    }
}
