//! Data context
//!
//! Per-instance key/value store the engine merges into evaluation context.
//! Values cross the boundary as JSON text.

use serde_json::Value;
use std::time::Duration;

use verdict_core::{DataEntry, DataStoreStats, Result, VerdictError};

use crate::registry::{Instance, InstanceId, InstanceRegistry};

/// Data context operations for one instance.
#[derive(Debug, Clone, Copy)]
pub struct DataContext<'a> {
    registry: &'a InstanceRegistry,
    id: InstanceId,
}

impl<'a> DataContext<'a> {
    pub(crate) fn new(registry: &'a InstanceRegistry, id: InstanceId) -> Self {
        Self { registry, id }
    }

    /// Store `value` under `key`, replacing any previous value. `ttl` of
    /// `None` uses the engine's default retention.
    pub fn push(&self, key: &str, value: &Value, ttl: Option<Duration>) -> Result<()> {
        if key.is_empty() {
            return Err(VerdictError::serialization("data key must not be empty"));
        }
        let encoded = serde_json::to_string(value)
            .map_err(|e| VerdictError::serialization(format!("data value for `{key}`: {e}")))?;
        self.registry
            .slot(self.id)?
            .engine()
            .push_data(key, &encoded, ttl)
            .map_err(VerdictError::engine_rejected)?;
        tracing::trace!(handle = %self.id, key, ?ttl, "data pushed");
        Ok(())
    }

    /// Value under `key`, `None` when absent or expired
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw = self
            .registry
            .slot(self.id)?
            .engine()
            .get_data(key)
            .map_err(VerdictError::engine_rejected)?;
        raw.map(|text| {
            serde_json::from_str(&text)
                .map_err(|e| VerdictError::decode(format!("data value for `{key}`: {e}")))
        })
        .transpose()
    }

    /// Value with its metadata
    pub fn get_entry(&self, key: &str) -> Result<Option<DataEntry>> {
        let raw = self
            .registry
            .slot(self.id)?
            .engine()
            .get_data_entry(key)
            .map_err(VerdictError::engine_rejected)?;
        raw.as_deref().map(DataEntry::decode).transpose()
    }

    /// Remove `key`; true when something was removed
    pub fn remove(&self, key: &str) -> Result<bool> {
        self.registry
            .slot(self.id)?
            .engine()
            .remove_data(key)
            .map_err(VerdictError::engine_rejected)
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        self.registry
            .slot(self.id)?
            .engine()
            .clear_data()
            .map_err(VerdictError::engine_rejected)
    }

    /// Every live entry
    pub fn list(&self) -> Result<Vec<DataEntry>> {
        let raw = self
            .registry
            .slot(self.id)?
            .engine()
            .list_data()
            .map_err(VerdictError::engine_rejected)?;
        DataEntry::decode_list(&raw)
    }

    /// Store statistics as reported by the engine
    pub fn stats(&self) -> Result<DataStoreStats> {
        let raw = self
            .registry
            .slot(self.id)?
            .engine()
            .data_stats()
            .map_err(VerdictError::engine_rejected)?;
        DataStoreStats::decode(&raw)
    }
}

impl InstanceRegistry {
    /// Data context of the instance behind `id`
    pub fn data(&self, id: InstanceId) -> DataContext<'_> {
        DataContext::new(self, id)
    }
}

impl Instance {
    /// Data context of this instance
    pub fn data(&self) -> DataContext<'_> {
        DataContext::new(self.registry(), self.id())
    }
}
