//! Entity model shared by requests and responses
//!
//! An entity is a typed, identified bag of attributes. On the wire the bag is
//! flattened next to the `type` and `id` keys; in memory the two identity
//! fields are kept apart from the payload. [`EntityData::from_flattened`] and
//! [`EntityData::into_flattened`] are the only places where the two
//! representations meet.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::{Result, VerdictError};

/// Wire key holding the entity type
pub const TYPE_KEY: &str = "type";
/// Wire key holding the entity id
pub const ID_KEY: &str = "id";

/// Attribute bag carried by an entity
pub type Payload = Map<String, Value>;

/// A principal, resource, or other entity sent to the engine.
///
/// Invariant: `payload` never contains the `type` or `id` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct EntityData {
    entity_type: String,
    id: String,
    payload: Payload,
}

impl EntityData {
    /// Create an entity with an empty payload
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            payload: Payload::new(),
        }
    }

    /// Create an entity from an attribute bag.
    ///
    /// Any `type`/`id` keys in the bag are dropped; the explicit arguments win.
    pub fn with_payload(
        entity_type: impl Into<String>,
        id: impl Into<String>,
        mut payload: Payload,
    ) -> Self {
        payload.remove(TYPE_KEY);
        payload.remove(ID_KEY);
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            payload,
        }
    }

    /// Builder-style attribute insertion. `type` and `id` are ignored.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Insert or replace an attribute. `type` and `id` are ignored.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        if key == TYPE_KEY || key == ID_KEY {
            return;
        }
        self.payload.insert(key, value.into());
    }

    /// Extract an entity from its flattened wire object.
    pub fn from_flattened(mut object: Map<String, Value>) -> Result<Self> {
        let entity_type = take_string(&mut object, TYPE_KEY)?;
        let id = take_string(&mut object, ID_KEY)?;
        Ok(Self {
            entity_type,
            id,
            payload: object,
        })
    }

    /// Parse an entity from any JSON value; the value must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(object) => Self::from_flattened(object),
            other => Err(VerdictError::decode(format!(
                "entity must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Flatten the entity into its wire object.
    pub fn into_flattened(self) -> Map<String, Value> {
        let mut object = Map::with_capacity(self.payload.len() + 2);
        object.insert(TYPE_KEY.to_string(), Value::String(self.entity_type));
        object.insert(ID_KEY.to_string(), Value::String(self.id));
        object.extend(self.payload);
        object
    }

    /// Entity type, e.g. `Jans::Issue`
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Entity id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attributes, without `type` and `id`
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Single attribute lookup
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// The `Type::"id"` uid of this entity
    pub fn uid(&self) -> EntityUid {
        EntityUid::new(self.entity_type.clone(), self.id.clone())
    }
}

impl TryFrom<Map<String, Value>> for EntityData {
    type Error = VerdictError;

    fn try_from(object: Map<String, Value>) -> Result<Self> {
        Self::from_flattened(object)
    }
}

impl From<EntityData> for Map<String, Value> {
    fn from(entity: EntityData) -> Self {
        entity.into_flattened()
    }
}

fn take_string(object: &mut Map<String, Value>, key: &str) -> Result<String> {
    match object.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(VerdictError::decode(format!(
            "entity `{key}` must be a string, got {}",
            json_kind(&other)
        ))),
        None => Err(VerdictError::decode(format!("entity is missing `{key}`"))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Entity type and id rendered as `Type::"id"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityUid {
    entity_type: String,
    id: String,
}

impl EntityUid {
    /// Create a uid from its parts
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Entity type part
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Id part
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for EntityUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{:?}", self.entity_type, self.id)
    }
}
