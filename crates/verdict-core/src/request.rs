//! Decision request variants
//!
//! Three request shapes reach the engine:
//! - [`SignedRequest`] - identity derived from a map of signed tokens
//! - [`UnsignedRequest`] - identity asserted directly as a list of principals
//! - [`MultiIssuerRequest`] - tokens from several trust issuers, each mapped to an entity type
//!
//! All three share the action/resource/context triple. `context` is always an
//! object on the wire, `{}` when the caller supplies none.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::entity::{json_kind, EntityData};
use crate::errors::{Result, VerdictError};

/// Request context object
pub type Context = Map<String, Value>;

/// Render a fully qualified action uid, `Namespace::Action::"Name"`.
pub fn action_uid(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        format!("Action::{name:?}")
    } else {
        format!("{namespace}::Action::{name:?}")
    }
}

/// Encoding shared by every request variant.
pub trait DecisionRequest: Serialize {
    /// Operation name used in logs and spans
    const OPERATION: &'static str;

    /// Structural checks that must pass before the request is encoded
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Validate and encode the request into its wire JSON.
    fn encode(&self) -> Result<String> {
        self.validate()?;
        serde_json::to_string(self).map_err(|e| {
            VerdictError::serialization(format!("failed to encode {}: {e}", Self::OPERATION))
        })
    }
}

/// Turn an arbitrary JSON value into a request context.
///
/// `null` becomes the empty object; anything other than an object is rejected.
pub fn context_from_value(value: Value) -> Result<Context> {
    match value {
        Value::Null => Ok(Context::new()),
        Value::Object(map) => Ok(map),
        other => Err(VerdictError::serialization(format!(
            "context must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Request whose principals are derived from signed tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedRequest {
    /// Token kind (e.g. `access_token`) to raw token
    pub tokens: BTreeMap<String, String>,
    /// Action uid
    pub action: String,
    /// Resource being accessed
    pub resource: EntityData,
    /// Free-form request context
    #[serde(default)]
    pub context: Context,
}

impl SignedRequest {
    /// Create a request with no tokens and an empty context
    pub fn new(action: impl Into<String>, resource: EntityData) -> Self {
        Self {
            tokens: BTreeMap::new(),
            action: action.into(),
            resource,
            context: Context::new(),
        }
    }

    /// Add a token of the given kind
    pub fn with_token(mut self, kind: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(kind.into(), token.into());
        self
    }

    /// Replace the context
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

impl DecisionRequest for SignedRequest {
    const OPERATION: &'static str = "authorize";
}

/// Request whose principals are supplied explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedRequest {
    /// Principals, in the order the caller supplied them
    pub principals: Vec<EntityData>,
    /// Action uid
    pub action: String,
    /// Resource being accessed
    pub resource: EntityData,
    /// Free-form request context
    #[serde(default)]
    pub context: Context,
}

impl UnsignedRequest {
    /// Create a request with no principals and an empty context
    pub fn new(action: impl Into<String>, resource: EntityData) -> Self {
        Self {
            principals: Vec::new(),
            action: action.into(),
            resource,
            context: Context::new(),
        }
    }

    /// Append a principal
    pub fn with_principal(mut self, principal: EntityData) -> Self {
        self.principals.push(principal);
        self
    }

    /// Replace the context
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

impl DecisionRequest for UnsignedRequest {
    const OPERATION: &'static str = "authorize_unsigned";

    /// Results are keyed by principal type, so each type may appear once.
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.principals.len());
        for principal in &self.principals {
            if !seen.insert(principal.entity_type()) {
                return Err(VerdictError::serialization(format!(
                    "principal type `{}` appears more than once",
                    principal.entity_type()
                )));
            }
        }
        Ok(())
    }
}

/// A token together with the entity type it is mapped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInput {
    /// Entity type the token maps to, e.g. `Jans::Access_Token`
    pub mapping: String,
    /// Raw token
    pub payload: String,
}

impl TokenInput {
    /// Create a token input
    pub fn new(mapping: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            mapping: mapping.into(),
            payload: payload.into(),
        }
    }
}

/// Request carrying tokens from multiple trust issuers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiIssuerRequest {
    /// Tokens, in the order the caller supplied them
    pub tokens: Vec<TokenInput>,
    /// Action uid
    pub action: String,
    /// Resource being accessed
    pub resource: EntityData,
    /// Free-form request context
    #[serde(default)]
    pub context: Context,
}

impl MultiIssuerRequest {
    /// Create a request with no tokens and an empty context
    pub fn new(action: impl Into<String>, resource: EntityData) -> Self {
        Self {
            tokens: Vec::new(),
            action: action.into(),
            resource,
            context: Context::new(),
        }
    }

    /// Append a token
    pub fn with_token(mut self, token: TokenInput) -> Self {
        self.tokens.push(token);
        self
    }

    /// Replace the context
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }
}

impl DecisionRequest for MultiIssuerRequest {
    const OPERATION: &'static str = "authorize_multi_issuer";
}
