//! Log index
//!
//! Read access to the diagnostic records an engine instance retains. Lookups
//! that find nothing return empty values; only a dead handle is an error.
//!
//! `pop_all` drains the engine's buffer and is the one destructive call. It
//! may race with concurrent authorize calls; entries written during the pop
//! land in either this drain or the next one.

use verdict_core::{LogRecord, Result};

use crate::registry::{Instance, InstanceId, InstanceRegistry};

/// Log queries for one instance. The handle is re-checked on every call.
#[derive(Debug, Clone, Copy)]
pub struct LogIndex<'a> {
    registry: &'a InstanceRegistry,
    id: InstanceId,
}

impl<'a> LogIndex<'a> {
    pub(crate) fn new(registry: &'a InstanceRegistry, id: InstanceId) -> Self {
        Self { registry, id }
    }

    /// Drain and return every buffered entry.
    pub fn pop_all(&self) -> Result<Vec<String>> {
        let entries = self.registry.slot(self.id)?.engine().pop_logs();
        tracing::trace!(handle = %self.id, drained = entries.len(), "log buffer drained");
        Ok(entries)
    }

    /// Entry by id; empty when unknown or expired.
    pub fn get_by_id(&self, log_id: &str) -> Result<String> {
        Ok(self.registry.slot(self.id)?.engine().get_log_by_id(log_id))
    }

    /// Entry by id, decoded. `None` when unknown or expired.
    pub fn record(&self, log_id: &str) -> Result<Option<LogRecord>> {
        let raw = self.get_by_id(log_id)?;
        if raw.is_empty() {
            return Ok(None);
        }
        LogRecord::parse(&raw).map(Some)
    }

    /// Ids of every retained entry
    pub fn list_ids(&self) -> Result<Vec<String>> {
        Ok(self.registry.slot(self.id)?.engine().get_log_ids())
    }

    /// Entries carrying `tag`, e.g. a log kind or level
    pub fn get_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        Ok(self.registry.slot(self.id)?.engine().get_logs_by_tag(tag))
    }

    /// Entries produced while serving `request_id`
    pub fn get_by_request_id(&self, request_id: &str) -> Result<Vec<String>> {
        Ok(self
            .registry
            .slot(self.id)?
            .engine()
            .get_logs_by_request_id(request_id))
    }

    /// Entries of `request_id` that also carry `tag`
    pub fn get_by_request_id_and_tag(&self, request_id: &str, tag: &str) -> Result<Vec<String>> {
        Ok(self
            .registry
            .slot(self.id)?
            .engine()
            .get_logs_by_request_id_and_tag(request_id, tag))
    }
}

impl InstanceRegistry {
    /// Log index of the instance behind `id`
    pub fn logs(&self, id: InstanceId) -> LogIndex<'_> {
        LogIndex::new(self, id)
    }
}

impl Instance {
    /// Log index of this instance
    pub fn logs(&self) -> LogIndex<'_> {
        LogIndex::new(self.registry(), self.id())
    }
}
