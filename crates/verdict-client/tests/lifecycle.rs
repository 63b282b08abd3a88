//! Instance creation, handle reuse and release

use serde_json::{json, Map};
use serial_test::serial;
use verdict_client::{
    action_uid, BootstrapConfig, InstanceId, InstanceRegistry, UnsignedRequest, VerdictError,
};
use verdict_testkit::*;

fn unsigned() -> UnsignedRequest {
    UnsignedRequest::new(action_uid("Jans", "Update"), issue_resource())
        .with_principal(test_principal(1))
}

#[test]
fn handles_are_distinct_and_nonzero() {
    let registry = InstanceRegistry::new(ScriptedEngineFactory::new(jans_script()));
    let a = registry.create(&bootstrap_config()).unwrap();
    let b = registry.create(&bootstrap_config()).unwrap();

    assert_ne!(a.id(), b.id());
    assert_ne!(a.id().get(), 0);
    assert_eq!(registry.live_handles(), vec![a.id(), b.id()]);
}

#[test]
fn destroying_twice_shuts_the_engine_down_once() {
    let factory = ScriptedEngineFactory::new(jans_script());
    let registry = InstanceRegistry::new(factory.clone());
    let id = registry.create(&bootstrap_config()).unwrap().into_raw();

    registry.destroy(id);
    registry.destroy(id);
    assert_eq!(factory.shutdowns(), 1);
    assert!(!registry.is_live(id));
}

#[test]
fn released_handle_is_reported_as_released() {
    let registry = InstanceRegistry::new(ScriptedEngineFactory::new(jans_script()));
    let id = registry.create(&bootstrap_config()).unwrap().into_raw();
    registry.destroy(id);

    let err = registry.authorize_unsigned(id, &unsigned()).unwrap_err();
    assert!(matches!(err, VerdictError::HandleReleased { handle } if handle == id.get()));
    assert!(matches!(
        registry.logs(id).pop_all(),
        Err(VerdictError::HandleReleased { .. })
    ));
    assert!(matches!(
        registry.data(id).stats(),
        Err(VerdictError::HandleReleased { .. })
    ));
}

#[test]
fn never_issued_handle_is_unknown() {
    let registry = InstanceRegistry::new(ScriptedEngineFactory::new(jans_script()));
    for raw in [0, 42] {
        let err = registry
            .authorize_unsigned(InstanceId::from_raw(raw), &unsigned())
            .unwrap_err();
        assert!(matches!(err, VerdictError::UnknownHandle { .. }), "{err:?}");
    }
}

#[test]
fn destroying_a_never_issued_handle_is_a_no_op() {
    let factory = ScriptedEngineFactory::new(jans_script());
    let registry = InstanceRegistry::new(factory.clone());
    let instance = registry.create(&bootstrap_config()).unwrap();

    registry.destroy(InstanceId::from_raw(0));
    registry.destroy(InstanceId::from_raw(instance.id().get() + 99));

    assert_eq!(factory.shutdowns(), 0);
    assert!(registry.is_live(instance.id()));
    assert_eq!(registry.live_handles(), vec![instance.id()]);
    assert!(instance.authorize_unsigned(&unsigned()).unwrap().decision());
}

#[test]
fn dropped_guard_releases_the_instance() {
    let factory = ScriptedEngineFactory::new(jans_script());
    let registry = InstanceRegistry::new(factory.clone());
    let id = {
        let instance = registry.create(&bootstrap_config()).unwrap();
        instance.id()
    };
    assert!(!registry.is_live(id));
    assert_eq!(factory.shutdowns(), 1);
}

#[test]
fn with_instance_destroys_after_the_closure() {
    let factory = ScriptedEngineFactory::new(jans_script());
    let registry = InstanceRegistry::new(factory.clone());

    let decision = registry
        .with_instance(&bootstrap_config(), |instance| {
            instance.authorize_unsigned(&unsigned()).map(|r| r.decision())
        })
        .unwrap();
    assert!(decision);
    assert!(registry.live_handles().is_empty());
    assert_eq!(factory.shutdowns(), 1);
}

#[test]
fn invalid_config_never_reaches_the_engine() {
    let factory = ScriptedEngineFactory::new(jans_script());
    let registry = InstanceRegistry::new(factory.clone());

    let err = registry.create(&BootstrapConfig::new("")).unwrap_err();
    assert!(matches!(err, VerdictError::ConfigInvalid { .. }));
    assert_eq!(factory.created(), 0);
}

#[test]
fn engine_start_failure_is_reported() {
    let registry = InstanceRegistry::new(ScriptedEngineFactory::failing("policy store not found"));
    let err = registry.create(&bootstrap_config()).unwrap_err();
    assert_eq!(err.code(), "engine_init_failed");
    assert!(err.to_string().contains("policy store not found"));
    assert!(registry.live_handles().is_empty());
}

#[test]
fn passthrough_keys_reach_the_engine() {
    let factory = ScriptedEngineFactory::new(jans_script());
    let registry = InstanceRegistry::new(factory.clone());
    let config = bootstrap_config()
        .with_extra("LOCK_SERVER_CONFIGURATION_URI", "https://lock.test/config");
    let _instance = registry.create(&config).unwrap();

    let seen = factory.last_config().unwrap();
    assert_eq!(seen["APPLICATION_NAME"], json!(TEST_APPLICATION));
    assert_eq!(seen["LOG_TYPE"], json!("memory"));
    assert_eq!(
        seen["LOCK_SERVER_CONFIGURATION_URI"],
        json!("https://lock.test/config")
    );
}

#[test]
#[serial]
fn environment_supplies_config_and_overrides_win() {
    std::env::set_var("VERDICT_APPLICATION_NAME", "FromEnv");
    std::env::set_var("VERDICT_LOG_TYPE", "memory");
    std::env::set_var("VERDICT_LOG_TTL", "60");

    let factory = ScriptedEngineFactory::new(jans_script());
    let registry = InstanceRegistry::new(factory.clone());
    let mut overrides = Map::new();
    overrides.insert("APPLICATION_NAME".into(), json!("FromOverride"));
    let outcome = registry.create_from_environment(&overrides);

    std::env::remove_var("VERDICT_APPLICATION_NAME");
    std::env::remove_var("VERDICT_LOG_TYPE");
    std::env::remove_var("VERDICT_LOG_TTL");

    let _instance = outcome.unwrap();
    let seen = factory.last_config().unwrap();
    assert_eq!(seen["APPLICATION_NAME"], json!("FromOverride"));
    assert_eq!(seen["LOG_TYPE"], json!("memory"));
    assert_eq!(seen["LOG_TTL"], json!(60));
}

#[test]
#[serial]
fn environment_without_application_name_is_invalid() {
    std::env::remove_var("VERDICT_APPLICATION_NAME");
    let registry = InstanceRegistry::new(ScriptedEngineFactory::new(jans_script()));
    let err = registry.create_from_environment(&Map::new()).unwrap_err();
    assert!(matches!(err, VerdictError::ConfigInvalid { .. }), "{err:?}");
}
