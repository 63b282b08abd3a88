//! Typed view over engine log entries
//!
//! The log index hands back raw JSON strings; [`LogRecord::parse`] pulls out
//! the fields callers usually filter on and keeps the rest as a raw object.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::{Result, VerdictError};

/// A decoded diagnostic record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogRecord {
    /// Unique id of this entry
    pub id: String,
    /// Request that produced it, when the entry belongs to a decision
    #[serde(default)]
    pub request_id: Option<String>,
    /// Kind of record, e.g. `Decision` or `System`
    #[serde(default)]
    pub log_kind: Option<String>,
    /// Severity as emitted by the engine
    #[serde(default)]
    pub level: Option<String>,
    /// Every field of the entry, including the ones above
    #[serde(skip)]
    pub raw: Map<String, Value>,
}

impl LogRecord {
    /// Decode a single JSON log entry.
    pub fn parse(entry: &str) -> Result<Self> {
        let raw: Map<String, Value> = serde_json::from_str(entry)
            .map_err(|e| VerdictError::decode(format!("malformed log entry: {e}")))?;
        let mut record: LogRecord = serde_json::from_value(Value::Object(raw.clone()))
            .map_err(|e| VerdictError::decode(format!("malformed log entry: {e}")))?;
        record.raw = raw;
        Ok(record)
    }

    /// Look up any field of the raw entry
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decision_entry_and_keeps_raw_fields() {
        let record = LogRecord::parse(
            r#"{"id":"0193-aa","request_id":"req-1","log_kind":"Decision","level":"INFO","decision":"ALLOW"}"#,
        )
        .unwrap();

        assert_eq!(record.id, "0193-aa");
        assert_eq!(record.request_id.as_deref(), Some("req-1"));
        assert_eq!(record.log_kind.as_deref(), Some("Decision"));
        assert_eq!(record.field("decision").and_then(Value::as_str), Some("ALLOW"));
    }

    #[test]
    fn entry_without_id_is_rejected() {
        let err = LogRecord::parse(r#"{"log_kind":"System"}"#).unwrap_err();
        assert!(err.is_protocol_fault());
    }
}
