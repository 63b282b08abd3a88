//! Bootstrap configuration
//!
//! The engine is configured with a flat key/value object. Keys this crate
//! understands are typed fields of [`BootstrapConfig`]; everything else is kept
//! in a passthrough bag and forwarded untouched, so newer engine options work
//! without a release of this crate.
//!
//! Values may also come from the process environment: a variable named
//! `VERDICT_<KEY>` supplies `<KEY>`.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::errors::{Result, VerdictError};

/// Prefix for bootstrap keys read from the environment
pub const ENV_PREFIX: &str = "VERDICT_";

/// Key naming the application, the only required key
pub const APPLICATION_NAME: &str = "APPLICATION_NAME";

/// Keys held by typed fields of [`BootstrapConfig`]. They never appear in the
/// passthrough bag.
pub const RECOGNIZED_KEYS: &[&str] = &[
    APPLICATION_NAME,
    "POLICY_STORE_ID",
    "POLICY_STORE_LOCAL_FN",
    "USER_AUTHZ",
    "WORKLOAD_AUTHZ",
    "JWT_SIG_VALIDATION",
    "JWT_STATUS_VALIDATION",
    "ID_TOKEN_TRUST_MODE",
    "LOG_TYPE",
    "LOG_TTL",
    "LOG_LEVEL",
    "JWT_SIGNATURE_ALGORITHMS_SUPPORTED",
    "PRINCIPAL_BOOLEAN_OPERATION",
];

/// Whether `key` is held by a typed field rather than the passthrough bag
pub fn is_recognized_key(key: &str) -> bool {
    RECOGNIZED_KEYS.contains(&key)
}

/// An `enabled`/`disabled` switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureToggle {
    /// Feature is off
    #[default]
    Disabled,
    /// Feature is on
    Enabled,
}

impl FeatureToggle {
    /// True for [`FeatureToggle::Enabled`]
    pub fn is_enabled(self) -> bool {
        matches!(self, FeatureToggle::Enabled)
    }
}

impl From<bool> for FeatureToggle {
    fn from(enabled: bool) -> Self {
        if enabled {
            FeatureToggle::Enabled
        } else {
            FeatureToggle::Disabled
        }
    }
}

/// Where the engine writes its diagnostic logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    /// Logging disabled
    #[default]
    Off,
    /// Retained in memory and queryable through the log index
    Memory,
    /// Written to standard output
    StdOut,
    /// Shipped to a lock server
    Lock,
}

/// Minimum level of engine log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Unrecoverable failures only
    Fatal,
    /// Failed operations
    Error,
    /// Degraded but handled conditions
    Warn,
    /// Decisions and lifecycle events
    Info,
    /// Diagnostic detail
    Debug,
    /// Everything
    Trace,
}

/// How strictly the id token is tied to the access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdTokenTrustMode {
    /// id token audience must match the access token client
    Strict,
    /// No cross-token checks
    Never,
}

/// Typed bootstrap record with a passthrough bag for unrecognized keys.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Human friendly application identifier
    #[serde(rename = "APPLICATION_NAME")]
    pub application_name: String,

    /// Policy store to load
    #[serde(
        rename = "POLICY_STORE_ID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub policy_store_id: Option<String>,

    /// Path of a local policy store file
    #[serde(
        rename = "POLICY_STORE_LOCAL_FN",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub policy_store_local_fn: Option<String>,

    /// Evaluate the person principal
    #[serde(rename = "USER_AUTHZ", default)]
    pub user_authz: FeatureToggle,

    /// Evaluate the workload principal
    #[serde(rename = "WORKLOAD_AUTHZ", default)]
    pub workload_authz: FeatureToggle,

    /// Verify token signatures
    #[serde(rename = "JWT_SIG_VALIDATION", default)]
    pub jwt_sig_validation: FeatureToggle,

    /// Check token status lists
    #[serde(rename = "JWT_STATUS_VALIDATION", default)]
    pub jwt_status_validation: FeatureToggle,

    /// Cross-token checks between id and access tokens
    #[serde(
        rename = "ID_TOKEN_TRUST_MODE",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id_token_trust_mode: Option<IdTokenTrustMode>,

    /// Log sink
    #[serde(rename = "LOG_TYPE", default)]
    pub log_type: LogType,

    /// Retention of in-memory log entries, in seconds
    #[serde(
        rename = "LOG_TTL",
        default,
        deserialize_with = "lenient_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub log_ttl: Option<u64>,

    /// Minimum level of engine log records
    #[serde(
        rename = "LOG_LEVEL",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub log_level: Option<LogLevel>,

    /// Accepted token signature algorithms
    #[serde(
        rename = "JWT_SIGNATURE_ALGORITHMS_SUPPORTED",
        default,
        deserialize_with = "list_or_csv",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub jwt_signature_algorithms_supported: Vec<String>,

    /// JSON-logic expression combining per-principal verdicts
    #[serde(
        rename = "PRINCIPAL_BOOLEAN_OPERATION",
        default,
        deserialize_with = "json_or_encoded_json",
        skip_serializing_if = "Option::is_none"
    )]
    pub principal_boolean_operation: Option<Value>,

    /// Unrecognized keys, forwarded to the engine as-is. Must not repeat a
    /// key from [`RECOGNIZED_KEYS`]; [`validate`](Self::validate) rejects that.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl BootstrapConfig {
    /// Minimal configuration for the named application
    pub fn new(application_name: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a raw key/value object.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let config: Self = serde_json::from_value(Value::Object(map))
            .map_err(|e| VerdictError::config_invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read bootstrap keys from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&Map::new())
    }

    /// Read bootstrap keys from the environment, then apply `overrides` on top.
    pub fn from_env_with(overrides: &Map<String, Value>) -> Result<Self> {
        Self::from_vars_with(std::env::vars(), overrides)
    }

    /// Build a configuration from `(name, value)` pairs named `VERDICT_<KEY>`,
    /// with `overrides` taking precedence. Pairs without the prefix are ignored.
    pub fn from_vars_with<I>(vars: I, overrides: &Map<String, Value>) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = Map::new();
        for (name, raw) in vars {
            if let Some(key) = name.strip_prefix(ENV_PREFIX) {
                if !key.is_empty() {
                    map.insert(key.to_string(), env_value(&raw));
                }
            }
        }
        let from_env = map.len();
        map.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        tracing::debug!(
            from_env,
            overrides = overrides.len(),
            "assembled bootstrap configuration from environment"
        );
        Self::from_map(map)
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.application_name.trim().is_empty() {
            return Err(VerdictError::config_invalid(format!(
                "{APPLICATION_NAME} must not be empty"
            )));
        }
        if let Some(op) = &self.principal_boolean_operation {
            if !op.is_object() {
                return Err(VerdictError::config_invalid(
                    "PRINCIPAL_BOOLEAN_OPERATION must be a JSON object",
                ));
            }
        }
        if let Some(key) = self.extra.keys().find(|key| is_recognized_key(key)) {
            return Err(VerdictError::config_invalid(format!(
                "{key} is a typed setting and cannot be passed through"
            )));
        }
        if self.log_type != LogType::Memory && self.log_ttl.is_some() {
            tracing::debug!(
                log_type = ?self.log_type,
                "LOG_TTL is only honoured for in-memory logging"
            );
        }
        Ok(())
    }

    /// Add a passthrough key. Recognized keys are ignored; set the typed
    /// field instead.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if is_recognized_key(&key) {
            tracing::warn!(key = %key, "ignoring passthrough value for a typed setting");
            return self;
        }
        self.extra.insert(key, value.into());
        self
    }

    /// Render the key/value object handed to the engine.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VerdictError::serialization(format!("bootstrap config: {e}")))
    }
}

/// Environment values are strings; lists and objects arrive JSON-encoded.
fn env_value(raw: &str) -> Value {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str(raw) {
            return value;
        }
    }
    Value::String(raw.to_string())
}

fn lenient_u64<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(text)) => text.trim().parse().map(Some).map_err(|_| {
            D::Error::custom(format!("expected a non-negative integer, got `{text}`"))
        }),
    }
}

fn list_or_csv<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}

fn json_or_encoded_json<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(encoded)) => serde_json::from_str(&encoded)
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid JSON expression: {e}"))),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!("test helper expects an object"),
        }
    }

    #[test]
    fn recognized_keys_are_typed_and_unknown_keys_pass_through() {
        let config = BootstrapConfig::from_map(map(json!({
            "APPLICATION_NAME": "TestApp",
            "POLICY_STORE_ID": "a1bf93115de86de760ee0bea1d529b521489e5a11747",
            "USER_AUTHZ": "enabled",
            "WORKLOAD_AUTHZ": "enabled",
            "JWT_SIG_VALIDATION": "disabled",
            "ID_TOKEN_TRUST_MODE": "never",
            "LOG_TYPE": "memory",
            "LOG_TTL": 60,
            "LOG_LEVEL": "DEBUG",
            "JWT_SIGNATURE_ALGORITHMS_SUPPORTED": ["HS256"],
            "AUTHORIZATION_USE_USER_PRINCIPAL": "false"
        })))
        .unwrap();

        assert!(config.user_authz.is_enabled());
        assert!(!config.jwt_sig_validation.is_enabled());
        assert_eq!(config.id_token_trust_mode, Some(IdTokenTrustMode::Never));
        assert_eq!(config.log_type, LogType::Memory);
        assert_eq!(config.log_ttl, Some(60));
        assert_eq!(config.log_level, Some(LogLevel::Debug));
        assert_eq!(config.jwt_signature_algorithms_supported, ["HS256"]);
        assert_eq!(
            config.extra.get("AUTHORIZATION_USE_USER_PRINCIPAL"),
            Some(&json!("false"))
        );
    }

    #[test]
    fn missing_application_name_is_config_invalid() {
        let err = BootstrapConfig::from_map(map(json!({"LOG_TYPE": "off"}))).unwrap_err();
        assert_eq!(err.code(), "config_invalid");
    }

    #[test]
    fn malformed_toggle_is_config_invalid() {
        let err = BootstrapConfig::from_map(map(json!({
            "APPLICATION_NAME": "TestApp",
            "USER_AUTHZ": "sometimes"
        })))
        .unwrap_err();
        assert!(matches!(err, VerdictError::ConfigInvalid { .. }));
    }

    #[test]
    fn boolean_operation_accepts_encoded_json() {
        let config = BootstrapConfig::from_map(map(json!({
            "APPLICATION_NAME": "TestApp",
            "PRINCIPAL_BOOLEAN_OPERATION": r#"{"and": [{"===": [{"var": "Jans::User"}, "ALLOW"]}]}"#
        })))
        .unwrap();
        let op = config.principal_boolean_operation.unwrap();
        assert_eq!(op["and"][0]["==="][1], json!("ALLOW"));

        let err = BootstrapConfig::from_map(map(json!({
            "APPLICATION_NAME": "TestApp",
            "PRINCIPAL_BOOLEAN_OPERATION": "{not json"
        })))
        .unwrap_err();
        assert_eq!(err.code(), "config_invalid");
    }

    #[test]
    fn env_vars_are_prefixed_and_overrides_win() {
        let vars = vec![
            ("VERDICT_APPLICATION_NAME".to_string(), "FromEnv".to_string()),
            ("VERDICT_LOG_TTL".to_string(), "120".to_string()),
            ("VERDICT_JWT_SIGNATURE_ALGORITHMS_SUPPORTED".to_string(), "HS256, RS256".to_string()),
            ("LOG_LEVEL".to_string(), "TRACE".to_string()),
        ];
        let overrides = map(json!({"APPLICATION_NAME": "FromOverride"}));

        let config = BootstrapConfig::from_vars_with(vars, &overrides).unwrap();
        assert_eq!(config.application_name, "FromOverride");
        assert_eq!(config.log_ttl, Some(120));
        assert_eq!(config.jwt_signature_algorithms_supported, ["HS256", "RS256"]);
        assert_eq!(config.log_level, None);
    }

    #[test]
    fn non_numeric_ttl_from_env_is_config_invalid() {
        let vars = vec![
            ("VERDICT_APPLICATION_NAME".to_string(), "App".to_string()),
            ("VERDICT_LOG_TTL".to_string(), "a minute".to_string()),
        ];
        let err = BootstrapConfig::from_vars_with(vars, &Map::new()).unwrap_err();
        assert_eq!(err.code(), "config_invalid");
    }

    #[test]
    fn passthrough_never_shadows_typed_keys() {
        let config = BootstrapConfig::new("App").with_extra("LOG_TYPE", "memory");
        assert!(config.extra.is_empty());
        assert_eq!(config.log_type, LogType::Off);

        let rendered = config.to_json().unwrap();
        assert_eq!(rendered.matches("\"LOG_TYPE\"").count(), 1);
        let reparsed: BootstrapConfig = serde_json::from_str(&rendered).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn typed_key_in_passthrough_bag_is_config_invalid() {
        let mut config = BootstrapConfig::new("App");
        config.extra.insert("LOG_TYPE".into(), json!("memory"));
        let err = config.validate().unwrap_err();
        assert!(matches!(err, VerdictError::ConfigInvalid { .. }));
        assert!(err.to_string().contains("LOG_TYPE"));
    }

    #[test]
    fn recognized_keys_match_the_rendered_fields() {
        let mut config = BootstrapConfig::new("App");
        config.policy_store_id = Some("store".into());
        config.policy_store_local_fn = Some("store.yaml".into());
        config.id_token_trust_mode = Some(IdTokenTrustMode::Strict);
        config.log_ttl = Some(1);
        config.log_level = Some(LogLevel::Info);
        config.jwt_signature_algorithms_supported = vec!["HS256".into()];
        config.principal_boolean_operation = Some(json!({"and": []}));

        let rendered = map(serde_json::from_str(&config.to_json().unwrap()).unwrap());
        let mut rendered_keys: Vec<_> = rendered.keys().map(String::as_str).collect();
        let mut recognized = RECOGNIZED_KEYS.to_vec();
        rendered_keys.sort_unstable();
        recognized.sort_unstable();
        assert_eq!(rendered_keys, recognized);
    }

    #[test]
    fn rendered_json_round_trips_passthrough_keys() {
        let config = BootstrapConfig::new("TestApp")
            .with_extra("LOCK", "disabled")
            .with_extra("AUDIT_LOG_INTERVAL", 30);
        let rendered: Value = serde_json::from_str(&config.to_json().unwrap()).unwrap();

        assert_eq!(rendered["APPLICATION_NAME"], json!("TestApp"));
        assert_eq!(rendered["USER_AUTHZ"], json!("disabled"));
        assert_eq!(rendered["LOG_TYPE"], json!("off"));
        assert_eq!(rendered["LOCK"], json!("disabled"));
        assert_eq!(rendered["AUDIT_LOG_INTERVAL"], json!(30));
        assert!(rendered.get("LOG_TTL").is_none());
    }
}
