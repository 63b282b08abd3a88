//! In-memory stand-in for the policy engine
//!
//! [`ScriptedEngine`] speaks the same JSON protocol as a real engine but
//! answers from a [`Script`]. It keeps a TTL'd log store with a pop buffer and
//! a data context store, so the whole client surface can be exercised without
//! native code.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use verdict_core::{
    BootstrapConfig, DataEntry, DataStoreStats, DecisionEngine, EngineFactory, EngineResult,
    EntityData, EntityVerdict, LogType, MultiIssuerRequest, SignedRequest, UnsignedRequest,
};

use crate::logic;
use crate::script::Script;

/// Entries the data store accepts before refusing new keys
pub const MAX_DATA_ENTRIES: usize = 10_000;
/// Largest encoded value the data store accepts
pub const MAX_DATA_ENTRY_SIZE: usize = 1024 * 1024;

/// Factory for [`ScriptedEngine`]s. Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngineFactory {
    script: Script,
    init_error: Option<String>,
    created: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
    last_config: Arc<Mutex<Option<Value>>>,
}

impl ScriptedEngineFactory {
    /// Factory whose engines answer from `script`
    pub fn new(script: Script) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Factory whose engines refuse to start with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            init_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Engines created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// `shut_down` calls received so far, across all engines
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Configuration object the most recent engine was created with
    pub fn last_config(&self) -> Option<Value> {
        self.last_config.lock().clone()
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn create(&self, config: &str) -> EngineResult<Box<dyn DecisionEngine>> {
        if let Some(message) = &self.init_error {
            return Err(message.clone());
        }
        let raw: Value =
            serde_json::from_str(config).map_err(|e| format!("bootstrap config is not JSON: {e}"))?;
        let bootstrap: BootstrapConfig = serde_json::from_value(raw.clone())
            .map_err(|e| format!("invalid bootstrap config: {e}"))?;
        *self.last_config.lock() = Some(raw);
        self.created.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(application = %bootstrap.application_name, "scripted engine created");

        let engine = ScriptedEngine::new(
            self.script.clone(),
            &bootstrap,
            Arc::clone(&self.shutdowns),
        );
        Ok(Box::new(engine))
    }
}

/// Fake engine answering from a [`Script`].
pub struct ScriptedEngine {
    script: Script,
    user_authz: bool,
    workload_authz: bool,
    principal_operation: Option<Value>,
    logs: Mutex<LogStore>,
    data: Mutex<HashMap<String, StoredData>>,
    shutdowns: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    fn new(script: Script, config: &BootstrapConfig, shutdowns: Arc<AtomicUsize>) -> Self {
        let mut logs = LogStore::new(
            config.log_type == LogType::Memory,
            config.log_ttl.map(Duration::from_secs),
        );
        logs.record(
            "System",
            "DEBUG",
            None,
            json!({"msg": format!("engine initialized for {}", config.application_name)}),
        );
        Self {
            script,
            user_authz: config.user_authz.is_enabled(),
            workload_authz: config.workload_authz.is_enabled(),
            principal_operation: config.principal_boolean_operation.clone(),
            logs: Mutex::new(logs),
            data: Mutex::new(HashMap::new()),
            shutdowns,
        }
    }

    fn respond(&self, response: &DecisionResponse, action: &str, resource: &EntityData) -> String {
        self.logs.lock().record(
            "Decision",
            "INFO",
            Some(&response.request_id),
            json!({
                "action": action,
                "resource": resource.uid().to_string(),
                "decision": if response.decision { "ALLOW" } else { "DENY" },
            }),
        );
        serde_json::to_string(response).unwrap_or_default()
    }

    fn combine(&self, principals: &IndexMap<String, EntityVerdict>) -> Result<bool, String> {
        match &self.principal_operation {
            Some(expr) => logic::evaluate(expr, principals),
            None => Ok(principals.values().all(EntityVerdict::is_allowed)),
        }
    }
}

#[derive(Serialize)]
struct DecisionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    workload: Option<EntityVerdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    person: Option<EntityVerdict>,
    principals: IndexMap<String, EntityVerdict>,
    decision: bool,
    request_id: String,
}

impl DecisionResponse {
    fn new(decision: bool) -> Self {
        Self {
            workload: None,
            person: None,
            principals: IndexMap::new(),
            decision,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Decode the claims segment of a compact JWT without verifying it.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, String> {
    let mut parts = token.split('.');
    let (Some(_header), Some(claims), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("token is not a compact JWT".to_string());
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(claims)
        .map_err(|e| format!("token claims are not base64url: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("token claims are not a JSON object: {e}"))
}

impl DecisionEngine for ScriptedEngine {
    fn authorize(&self, request: &str) -> EngineResult<String> {
        if let Some(raw) = self.script.raw_response() {
            return Ok(raw.to_string());
        }
        let request: SignedRequest =
            serde_json::from_str(request).map_err(|e| format!("malformed request: {e}"))?;
        self.script.check_resource(&request.resource)?;
        if request.tokens.is_empty() {
            return Err("no tokens were provided".to_string());
        }
        for (kind, token) in &request.tokens {
            decode_claims(token).map_err(|e| format!("could not decode {kind}: {e}"))?;
        }
        if !self.user_authz && !self.workload_authz {
            return Err("neither user nor workload authorization is enabled".to_string());
        }

        let workload = self.workload_authz.then(|| self.script.workload());
        let person = self.user_authz.then(|| self.script.person());
        let decision = workload.iter().chain(person.iter()).all(EntityVerdict::is_allowed);

        let mut response = DecisionResponse::new(decision);
        response.workload = workload;
        response.person = person;
        Ok(self.respond(&response, &request.action, &request.resource))
    }

    fn authorize_unsigned(&self, request: &str) -> EngineResult<String> {
        if let Some(raw) = self.script.raw_response() {
            return Ok(raw.to_string());
        }
        let request: UnsignedRequest =
            serde_json::from_str(request).map_err(|e| format!("malformed request: {e}"))?;
        self.script.check_resource(&request.resource)?;
        if request.principals.is_empty() {
            return Err("at least one principal is required".to_string());
        }

        let mut by_type = IndexMap::new();
        let mut principals = IndexMap::new();
        for principal in &request.principals {
            let verdict = self.script.principal(principal.entity_type());
            by_type.insert(principal.entity_type().to_string(), verdict.clone());
            principals.insert(principal.entity_type().to_string(), verdict.clone());
            principals.insert(principal.uid().to_string(), verdict);
        }

        let mut response = DecisionResponse::new(self.combine(&by_type)?);
        response.principals = principals;
        Ok(self.respond(&response, &request.action, &request.resource))
    }

    fn authorize_multi_issuer(&self, request: &str) -> EngineResult<String> {
        if let Some(raw) = self.script.raw_response() {
            return Ok(raw.to_string());
        }
        let request: MultiIssuerRequest =
            serde_json::from_str(request).map_err(|e| format!("malformed request: {e}"))?;
        self.script.check_resource(&request.resource)?;
        if request.tokens.is_empty() {
            return Err("at least one token is required".to_string());
        }

        let mut principals = IndexMap::new();
        for token in &request.tokens {
            match decode_claims(&token.payload) {
                Ok(_) => {
                    principals.insert(token.mapping.clone(), self.script.principal(&token.mapping));
                }
                Err(reason) => self.logs.lock().record(
                    "System",
                    "WARN",
                    None,
                    json!({"msg": format!("ignoring token mapped to {}: {reason}", token.mapping)}),
                ),
            }
        }
        if principals.is_empty() {
            return Err("none of the provided tokens could be decoded".to_string());
        }

        let decision = principals.values().all(EntityVerdict::is_allowed);
        let mut response = DecisionResponse::new(decision);
        response.principals = principals;
        Ok(self.respond(&response, &request.action, &request.resource))
    }

    fn pop_logs(&self) -> Vec<String> {
        self.logs.lock().pop()
    }

    fn get_log_by_id(&self, id: &str) -> String {
        self.logs.lock().get(id)
    }

    fn get_log_ids(&self) -> Vec<String> {
        self.logs.lock().ids()
    }

    fn get_logs_by_tag(&self, tag: &str) -> Vec<String> {
        self.logs.lock().filter(None, Some(tag))
    }

    fn get_logs_by_request_id(&self, request_id: &str) -> Vec<String> {
        self.logs.lock().filter(Some(request_id), None)
    }

    fn get_logs_by_request_id_and_tag(&self, request_id: &str, tag: &str) -> Vec<String> {
        self.logs.lock().filter(Some(request_id), Some(tag))
    }

    fn push_data(&self, key: &str, value: &str, ttl: Option<Duration>) -> EngineResult<()> {
        if value.len() > MAX_DATA_ENTRY_SIZE {
            return Err(format!(
                "value for `{key}` is {} bytes, limit is {MAX_DATA_ENTRY_SIZE}",
                value.len()
            ));
        }
        let value: Value =
            serde_json::from_str(value).map_err(|e| format!("value is not JSON: {e}"))?;
        let now = Utc::now();
        let expires_at = match ttl {
            Some(ttl) => Some(
                now + chrono::Duration::from_std(ttl).map_err(|e| format!("invalid ttl: {e}"))?,
            ),
            None => None,
        };

        let mut data = self.data.lock();
        purge_expired(&mut data, now);
        if !data.contains_key(key) && data.len() >= MAX_DATA_ENTRIES {
            return Err(format!("data store is full ({MAX_DATA_ENTRIES} entries)"));
        }
        data.insert(
            key.to_string(),
            StoredData {
                value,
                created_at: now,
                expires_at,
                access_count: 0,
            },
        );
        Ok(())
    }

    fn get_data(&self, key: &str) -> EngineResult<Option<String>> {
        Ok(self.get_data_entry_inner(key).map(|entry| entry.value.to_string()))
    }

    fn get_data_entry(&self, key: &str) -> EngineResult<Option<String>> {
        self.get_data_entry_inner(key)
            .map(|entry| serde_json::to_string(&entry).map_err(|e| e.to_string()))
            .transpose()
    }

    fn remove_data(&self, key: &str) -> EngineResult<bool> {
        let mut data = self.data.lock();
        purge_expired(&mut data, Utc::now());
        Ok(data.remove(key).is_some())
    }

    fn clear_data(&self) -> EngineResult<()> {
        self.data.lock().clear();
        Ok(())
    }

    fn list_data(&self) -> EngineResult<String> {
        let mut data = self.data.lock();
        purge_expired(&mut data, Utc::now());
        let mut entries: Vec<DataEntry> = data.iter().map(|(k, v)| v.to_entry(k)).collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        serde_json::to_string(&entries).map_err(|e| e.to_string())
    }

    fn data_stats(&self) -> EngineResult<String> {
        let mut data = self.data.lock();
        purge_expired(&mut data, Utc::now());
        let stats = DataStoreStats {
            entry_count: data.len(),
            max_entries: MAX_DATA_ENTRIES,
            max_entry_size: MAX_DATA_ENTRY_SIZE,
            metrics_enabled: false,
            total_size_bytes: data.values().map(|v| v.value.to_string().len()).sum(),
            extra: Map::new(),
        };
        serde_json::to_string(&stats).map_err(|e| e.to_string())
    }

    fn shut_down(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedEngine {
    fn get_data_entry_inner(&self, key: &str) -> Option<DataEntry> {
        let mut data = self.data.lock();
        purge_expired(&mut data, Utc::now());
        let stored = data.get_mut(key)?;
        stored.access_count += 1;
        Some(stored.to_entry(key))
    }
}

struct StoredData {
    value: Value,
    created_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    access_count: u64,
}

impl StoredData {
    fn to_entry(&self, key: &str) -> DataEntry {
        DataEntry {
            key: key.to_string(),
            value: self.value.clone(),
            data_type: Some(data_type(&self.value).to_string()),
            created_at: self.created_at.to_rfc3339(),
            expires_at: self.expires_at.map(|t| t.to_rfc3339()),
            access_count: self.access_count,
        }
    }
}

fn purge_expired(data: &mut HashMap<String, StoredData>, now: DateTime<Utc>) {
    data.retain(|_, stored| stored.expires_at.map_or(true, |at| at > now));
}

fn data_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_f64() => "Decimal",
        Value::Number(_) => "Long",
        Value::String(_) => "String",
        Value::Array(_) => "Set",
        Value::Object(_) => "Record",
    }
}

struct StoredLog {
    json: String,
    request_id: Option<String>,
    tags: Vec<String>,
    at: Instant,
}

/// Retained log entries plus the buffer `pop` drains. Popping empties the
/// buffer only; retained entries live until their TTL passes.
struct LogStore {
    enabled: bool,
    ttl: Option<Duration>,
    entries: IndexMap<String, StoredLog>,
    buffer: Vec<String>,
}

impl LogStore {
    fn new(enabled: bool, ttl: Option<Duration>) -> Self {
        Self {
            enabled,
            ttl,
            entries: IndexMap::new(),
            buffer: Vec::new(),
        }
    }

    fn record(&mut self, kind: &str, level: &str, request_id: Option<&str>, fields: Value) {
        if !self.enabled {
            return;
        }
        let id = uuid::Uuid::new_v4().to_string();
        let mut entry = Map::new();
        entry.insert("id".into(), Value::from(id.clone()));
        entry.insert("log_kind".into(), Value::from(kind));
        entry.insert("level".into(), Value::from(level));
        entry.insert("timestamp".into(), Value::from(Utc::now().to_rfc3339()));
        if let Some(request_id) = request_id {
            entry.insert("request_id".into(), Value::from(request_id));
        }
        if let Value::Object(fields) = fields {
            entry.extend(fields);
        }
        let json = Value::Object(entry).to_string();

        self.buffer.push(json.clone());
        self.entries.insert(
            id,
            StoredLog {
                json,
                request_id: request_id.map(String::from),
                tags: vec![kind.to_lowercase(), level.to_lowercase()],
                at: Instant::now(),
            },
        );
    }

    fn purge(&mut self) {
        if let Some(ttl) = self.ttl {
            self.entries.retain(|_, log| log.at.elapsed() < ttl);
        }
    }

    fn pop(&mut self) -> Vec<String> {
        std::mem::take(&mut self.buffer)
    }

    fn get(&mut self, id: &str) -> String {
        self.purge();
        self.entries
            .get(id)
            .map(|log| log.json.clone())
            .unwrap_or_default()
    }

    fn ids(&mut self) -> Vec<String> {
        self.purge();
        self.entries.keys().cloned().collect()
    }

    fn filter(&mut self, request_id: Option<&str>, tag: Option<&str>) -> Vec<String> {
        self.purge();
        let tag = tag.map(str::to_lowercase);
        self.entries
            .values()
            .filter(|log| request_id.map_or(true, |id| log.request_id.as_deref() == Some(id)))
            .filter(|log| tag.as_ref().map_or(true, |t| log.tags.contains(t)))
            .map(|log| log.json.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn decode_claims_reads_the_middle_segment() {
        let token = fixtures::unsigned_jwt(&json!({"iss": "https://test.jans.org"}));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims["iss"], json!("https://test.jans.org"));
        assert!(decode_claims("not-a-valid-jwt").is_err());
    }

    #[test]
    fn zero_ttl_expires_entries_immediately() {
        let mut store = LogStore::new(true, Some(Duration::ZERO));
        store.record("Decision", "INFO", Some("r-1"), json!({}));
        assert!(store.ids().is_empty());
        assert_eq!(store.pop().len(), 1);
    }

    #[test]
    fn disabled_store_retains_nothing() {
        let mut store = LogStore::new(false, None);
        store.record("System", "DEBUG", None, json!({}));
        assert!(store.pop().is_empty());
        assert!(store.ids().is_empty());
    }
}
