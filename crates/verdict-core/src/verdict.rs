//! Decoded decision results
//!
//! The engine is the only source of truth for decisions. Types here decode its
//! response and project fields for callers; nothing is recomputed from the
//! per-entity verdicts.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::entity::EntityUid;
use crate::errors::{Result, VerdictError};

/// Per-entity decision. Wire values are exactly `"allow"` and `"deny"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The entity is permitted
    Allow,
    /// The entity is not permitted
    Deny,
}

impl Decision {
    /// True for [`Decision::Allow`]
    pub fn is_allow(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Deny => f.write_str("deny"),
        }
    }
}

/// Verdict for a single principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityVerdict {
    decision: Decision,
    #[serde(default, deserialize_with = "null_as_default")]
    reason: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    errors: Vec<String>,
}

impl EntityVerdict {
    /// Create a verdict
    pub fn new(decision: Decision, reason: Vec<String>, errors: Vec<String>) -> Self {
        Self {
            decision,
            reason,
            errors,
        }
    }

    /// The engine's decision for this entity
    pub fn decision(&self) -> Decision {
        self.decision
    }

    /// True when the engine allowed this entity
    pub fn is_allowed(&self) -> bool {
        self.decision.is_allow()
    }

    /// Ids of the policies that produced the decision, in engine order.
    /// Empty when the engine denied with no matching policy.
    pub fn reason(&self) -> &[String] {
        &self.reason
    }

    /// Evaluation errors, in engine order
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

/// Caller-facing result of any authorize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workload: Option<EntityVerdict>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    person: Option<EntityVerdict>,
    #[serde(default, deserialize_with = "null_as_default")]
    principals: IndexMap<String, EntityVerdict>,
    decision: bool,
    request_id: String,
}

impl AggregateResult {
    /// Decode an engine response.
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| VerdictError::decode(format!("malformed authorization result: {e}")))
    }

    /// Top-level verdict as computed by the engine
    pub fn decision(&self) -> bool {
        self.decision
    }

    /// Engine-assigned id, usable with the log query surface
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Workload verdict; only present on the signed-token path
    pub fn workload(&self) -> Option<&EntityVerdict> {
        self.workload.as_ref()
    }

    /// Person verdict; only present on the signed-token path
    pub fn person(&self) -> Option<&EntityVerdict> {
        self.person.as_ref()
    }

    /// Verdict by principal key (entity type or rendered uid).
    ///
    /// `None` means the engine never evaluated a principal under that key,
    /// which is distinct from a present verdict that denies.
    pub fn principal(&self, key: &str) -> Option<&EntityVerdict> {
        self.principals.get(key)
    }

    /// Verdict by entity uid, falling back to the uid's entity type.
    pub fn principal_by_uid(&self, uid: &EntityUid) -> Option<&EntityVerdict> {
        self.principals
            .get(uid.to_string().as_str())
            .or_else(|| self.principals.get(uid.entity_type()))
    }

    /// All principal verdicts in engine emission order
    pub fn principals(&self) -> impl Iterator<Item = (&str, &EntityVerdict)> {
        self.principals.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys of principals the engine allowed
    pub fn allowed_principals(&self) -> Vec<&str> {
        self.principals
            .iter()
            .filter(|(_, verdict)| verdict.is_allowed())
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Absent and `null` collections both decode as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
