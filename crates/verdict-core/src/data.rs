//! Data context records
//!
//! Engines keep a per-instance key/value store whose values are injected into
//! the evaluation context. These are the decoded shapes of its entries and
//! statistics.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, VerdictError};

/// A stored value together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    /// Key the value is stored under
    pub key: String,
    /// Stored JSON value
    pub value: Value,
    /// Engine-inferred type of `value`, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// RFC 3339 expiry, absent for entries without a TTL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// Reads of this entry so far
    #[serde(default)]
    pub access_count: u64,
}

impl DataEntry {
    /// Decode one entry
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| VerdictError::decode(format!("malformed data entry: {e}")))
    }

    /// Decode a JSON array of entries
    pub fn decode_list(raw: &str) -> Result<Vec<Self>> {
        serde_json::from_str(raw)
            .map_err(|e| VerdictError::decode(format!("malformed data entry list: {e}")))
    }
}

/// Store statistics. Fields the engine adds later are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStoreStats {
    /// Live entries
    pub entry_count: usize,
    /// Capacity; 0 means unlimited
    pub max_entries: usize,
    /// Maximum serialized size of a single entry; 0 means unlimited
    pub max_entry_size: usize,
    /// Whether the engine collects access metrics
    #[serde(default)]
    pub metrics_enabled: bool,
    /// Combined serialized size of all live values
    #[serde(default)]
    pub total_size_bytes: usize,
    /// Fields this crate does not know yet
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DataStoreStats {
    /// Decode engine-reported statistics
    pub fn decode(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| VerdictError::decode(format!("malformed data store stats: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_tolerate_unknown_fields() {
        let stats = DataStoreStats::decode(
            r#"{"entry_count":1,"max_entries":10000,"max_entry_size":1048576,"avg_entry_size_bytes":12}"#,
        )
        .unwrap();
        assert_eq!(stats.entry_count, 1);
        assert!(!stats.metrics_enabled);
        assert!(stats.extra.contains_key("avg_entry_size_bytes"));
    }

    #[test]
    fn entry_requires_created_at() {
        let err = DataEntry::decode(r#"{"key":"k","value":1}"#).unwrap_err();
        assert_eq!(err.code(), "decode");
    }
}
