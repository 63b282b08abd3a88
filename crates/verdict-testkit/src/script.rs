//! Scripted engine behaviour
//!
//! A [`Script`] says what the fake engine answers: which resource attributes
//! must have which JSON kind, and the verdict for each principal type.

use serde_json::Value;
use std::collections::HashMap;

use verdict_core::{Decision, EntityData, EntityVerdict};

/// JSON kind a resource attribute must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// JSON string
    String,
    /// JSON integer
    Long,
    /// JSON boolean
    Bool,
    /// JSON array
    Set,
    /// JSON object
    Record,
}

impl AttrKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            AttrKind::String => value.is_string(),
            AttrKind::Long => value.is_i64() || value.is_u64(),
            AttrKind::Bool => value.is_boolean(),
            AttrKind::Set => value.is_array(),
            AttrKind::Record => value.is_object(),
        }
    }
}

/// Scripted answers for a fake engine.
#[derive(Debug, Clone, Default)]
pub struct Script {
    schema: HashMap<String, Vec<(String, AttrKind)>>,
    verdicts: HashMap<String, EntityVerdict>,
    workload: Option<EntityVerdict>,
    person: Option<EntityVerdict>,
    raw_response: Option<String>,
}

impl Script {
    /// Script that denies every principal
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `attr` of resources of `entity_type` to have `kind` when present
    pub fn with_attribute(
        mut self,
        entity_type: impl Into<String>,
        attr: impl Into<String>,
        kind: AttrKind,
    ) -> Self {
        self.schema
            .entry(entity_type.into())
            .or_default()
            .push((attr.into(), kind));
        self
    }

    /// Verdict for principals (or multi-issuer token mappings) of `entity_type`
    pub fn with_principal(
        mut self,
        entity_type: impl Into<String>,
        decision: Decision,
        reason: &[&str],
    ) -> Self {
        self.verdicts
            .insert(entity_type.into(), verdict(decision, reason));
        self
    }

    /// Workload verdict on the signed-token path
    pub fn with_workload(mut self, decision: Decision, reason: &[&str]) -> Self {
        self.workload = Some(verdict(decision, reason));
        self
    }

    /// Person verdict on the signed-token path
    pub fn with_person(mut self, decision: Decision, reason: &[&str]) -> Self {
        self.person = Some(verdict(decision, reason));
        self
    }

    /// Answer every authorize call with `raw`, verbatim
    pub fn with_raw_response(mut self, raw: impl Into<String>) -> Self {
        self.raw_response = Some(raw.into());
        self
    }

    pub(crate) fn raw_response(&self) -> Option<&str> {
        self.raw_response.as_deref()
    }

    pub(crate) fn workload(&self) -> EntityVerdict {
        self.workload
            .clone()
            .unwrap_or_else(|| verdict(Decision::Deny, &[]))
    }

    pub(crate) fn person(&self) -> EntityVerdict {
        self.person
            .clone()
            .unwrap_or_else(|| verdict(Decision::Deny, &[]))
    }

    /// Scripted verdict for a principal type; unscripted types are denied.
    pub(crate) fn principal(&self, entity_type: &str) -> EntityVerdict {
        self.verdicts
            .get(entity_type)
            .cloned()
            .unwrap_or_else(|| verdict(Decision::Deny, &[]))
    }

    /// Check a resource against the declared attribute kinds.
    pub(crate) fn check_resource(&self, resource: &EntityData) -> Result<(), String> {
        let Some(attrs) = self.schema.get(resource.entity_type()) else {
            return Ok(());
        };
        for (name, kind) in attrs {
            if let Some(value) = resource.attr(name) {
                if !kind.matches(value) {
                    return Err(format!(
                        "could not create resource entity {}: \
                         attribute `{name}` expected {kind:?}, got {value}",
                        resource.uid()
                    ));
                }
            }
        }
        Ok(())
    }
}

fn verdict(decision: Decision, reason: &[&str]) -> EntityVerdict {
    EntityVerdict::new(
        decision,
        reason.iter().map(|r| (*r).to_string()).collect(),
        Vec::new(),
    )
}
