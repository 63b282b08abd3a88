//! Evaluation wire types
//!
//! A gateway intercepting HTTP calls posts an [`EvaluationRequest`] to the
//! decision-serving process and gets an [`EvaluationResponse`] back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use verdict_core::{action_uid, AggregateResult, EntityData, Payload, UnsignedRequest};

/// An entity as the gateway sends it: attributes nested under `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEntity {
    /// Entity type, e.g. `Jans::Issue`
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Entity id
    pub id: String,
    /// Attributes; absent on the wire means none
    #[serde(default)]
    pub properties: Payload,
}

impl WireEntity {
    /// Entity without properties
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            properties: Payload::new(),
        }
    }

    /// Builder-style property insertion
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Namespace part of the entity type, e.g. `Jans` for `Jans::Issue`
    pub fn namespace(&self) -> Option<&str> {
        self.entity_type.rsplit_once("::").map(|(ns, _)| ns)
    }

    fn into_entity(self) -> EntityData {
        EntityData::with_payload(self.entity_type, self.id, self.properties)
    }
}

/// Action being attempted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAction {
    /// Bare (`Update`) or qualified (`Jans::Action::"Update"`) action name
    pub name: String,
}

/// Body of an evaluation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Caller, evaluated as the only principal
    pub subject: WireEntity,
    /// Target of the call
    pub resource: WireEntity,
    /// What the caller attempts
    pub action: WireAction,
    /// Request context; absent on the wire means empty
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl EvaluationRequest {
    /// Request with an empty context
    pub fn new(subject: WireEntity, resource: WireEntity, action: impl Into<String>) -> Self {
        Self {
            subject,
            resource,
            action: WireAction {
                name: action.into(),
            },
            context: Map::new(),
        }
    }

    /// Fully qualified action uid. Bare names are placed in the resource's
    /// namespace, or the subject's when the resource type has none.
    pub fn action_uid(&self) -> String {
        let name = self.action.name.as_str();
        if name.contains("::") {
            return name.to_string();
        }
        let namespace = self
            .resource
            .namespace()
            .or_else(|| self.subject.namespace())
            .unwrap_or_default();
        action_uid(namespace, name)
    }

    /// Unsigned request with the subject as its only principal
    pub fn into_unsigned(self) -> UnsignedRequest {
        let action = self.action_uid();
        UnsignedRequest::new(action, self.resource.into_entity())
            .with_principal(self.subject.into_entity())
            .with_context(self.context)
    }
}

/// Body of an evaluation answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResponse {
    /// True forwards the intercepted call
    pub decision: bool,
}

impl EvaluationResponse {
    /// Project the engine's top-level decision
    pub fn from_result(result: &AggregateResult) -> Self {
        Self {
            decision: result.decision(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(action: &str) -> EvaluationRequest {
        EvaluationRequest::new(
            WireEntity::new("Jans::TestPrincipal1", "p1").with_property("is_ok", true),
            WireEntity::new("Jans::Issue", "random_id").with_property("org_id", "some_long_id"),
            action,
        )
    }

    #[test]
    fn bare_action_takes_the_resource_namespace() {
        assert_eq!(request("Update").action_uid(), r#"Jans::Action::"Update""#);
        assert_eq!(
            request(r#"Other::Action::"Read""#).action_uid(),
            r#"Other::Action::"Read""#
        );
    }

    #[test]
    fn wire_body_decodes_with_missing_context() {
        let body = json!({
            "subject": {"type": "Jans::User", "id": "u1", "properties": {"role": ["Admin"]}},
            "resource": {"type": "Jans::Issue", "id": "i1"},
            "action": {"name": "Update"}
        });
        let request: EvaluationRequest = serde_json::from_value(body).unwrap();
        assert!(request.context.is_empty());
        assert!(request.resource.properties.is_empty());
        assert_eq!(request.subject.properties["role"], json!(["Admin"]));
    }

    #[test]
    fn unsigned_conversion_flattens_properties() {
        let unsigned = request("Update").into_unsigned();
        assert_eq!(unsigned.principals.len(), 1);
        assert_eq!(unsigned.principals[0].entity_type(), "Jans::TestPrincipal1");
        assert_eq!(unsigned.principals[0].attr("is_ok"), Some(&json!(true)));
        assert_eq!(unsigned.resource.attr("org_id"), Some(&json!("some_long_id")));
        assert_eq!(unsigned.action, r#"Jans::Action::"Update""#);
    }
}
