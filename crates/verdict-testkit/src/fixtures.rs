//! Reusable test fixtures
//!
//! The canonical scenario: a `Jans::Issue` resource, three test principals of
//! which the third is denied, and signed-path verdicts for a workload and a
//! person.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{json, Value};

use verdict_core::{BootstrapConfig, Decision, EntityData, FeatureToggle, LogType};

use crate::script::{AttrKind, Script};

/// Application name of [`bootstrap_config`]
pub const TEST_APPLICATION: &str = "TestApp";
/// Policy id behind the scripted workload allow
pub const WORKLOAD_REASON: &str = "840da5d85403f35ea76519ed1a18a33989f855bf1cf8";
/// Policy id behind the scripted person allow
pub const PERSON_REASON: &str = "444da5d85403f35ea76519ed1a18a33989f855bf1cf8";
/// Policy id behind the scripted test principal allows
pub const PRINCIPAL_REASON: &str = "5";

/// Bootstrap config with both authorization paths on and in-memory logs
pub fn bootstrap_config() -> BootstrapConfig {
    let mut config = BootstrapConfig::new(TEST_APPLICATION);
    config.policy_store_local_fn = Some("policy-store.yaml".to_string());
    config.user_authz = FeatureToggle::Enabled;
    config.workload_authz = FeatureToggle::Enabled;
    config.log_type = LogType::Memory;
    config.log_ttl = Some(120);
    config
}

/// The `Jans::Issue` resource with well-typed attributes
pub fn issue_resource() -> EntityData {
    EntityData::new("Jans::Issue", "random_id")
        .with_attr("org_id", "some_long_id")
        .with_attr("country", "US")
}

/// `Jans::TestPrincipal1` .. `Jans::TestPrincipal3`
pub fn test_principal(n: u8) -> EntityData {
    EntityData::new(format!("Jans::TestPrincipal{n}"), format!("principal_{n}"))
        .with_attr("is_ok", n != 3)
}

/// Script for the canonical scenario
pub fn jans_script() -> Script {
    Script::new()
        .with_attribute("Jans::Issue", "org_id", AttrKind::String)
        .with_attribute("Jans::Issue", "country", AttrKind::String)
        .with_principal("Jans::TestPrincipal1", Decision::Allow, &[PRINCIPAL_REASON])
        .with_principal("Jans::TestPrincipal2", Decision::Allow, &[PRINCIPAL_REASON])
        .with_principal("Jans::TestPrincipal3", Decision::Deny, &[])
        .with_principal("Jans::Access_token", Decision::Allow, &[PRINCIPAL_REASON])
        .with_workload(Decision::Allow, &[WORKLOAD_REASON])
        .with_person(Decision::Allow, &[PERSON_REASON])
}

/// Compact JWT carrying `claims` with an empty signature. Fine for engines
/// that do not validate signatures.
pub fn unsigned_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "none", "typ": "JWT"}).to_string());
    let body = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{body}.")
}

/// Access token claims for the canonical workload
pub fn access_token() -> String {
    unsigned_jwt(&json!({
        "iss": "https://test.jans.org",
        "sub": "boG8dfc5MKTn37o7gsdCeyqL8LpWQtgoO41m1KZwdq0",
        "client_id": "5b4487c4-8db1-409d-a653-f907b8094039",
        "aud": "5b4487c4-8db1-409d-a653-f907b8094039",
        "scope": ["openid", "profile"],
        "jti": "uZUh1hDUQo6PFkBPnwpGzg",
        "org_id": "some_long_id",
    }))
}

/// Id token claims for the canonical person
pub fn id_token() -> String {
    unsigned_jwt(&json!({
        "iss": "https://test.jans.org",
        "sub": "boG8dfc5MKTn37o7gsdCeyqL8LpWQtgoO41m1KZwdq0",
        "aud": "5b4487c4-8db1-409d-a653-f907b8094039",
        "jti": "ijLZO1ooRyWrgIn7cIdNyA",
    }))
}

/// Userinfo token claims for the canonical person
pub fn userinfo_token() -> String {
    unsigned_jwt(&json!({
        "iss": "https://test.jans.org",
        "sub": "boG8dfc5MKTn37o7gsdCeyqL8LpWQtgoO41m1KZwdq0",
        "client_id": "5b4487c4-8db1-409d-a653-f907b8094039",
        "country": "US",
        "role": ["Admin"],
    }))
}
