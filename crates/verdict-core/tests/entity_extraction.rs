//! Property tests for the flatten/extract step of the entity model

use proptest::prelude::*;
use serde_json::{json, Value};
use verdict_core::{EntityData, Payload};

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 _-]{0,16}".prop_map(Value::from),
    ]
}

fn arb_payload() -> impl Strategy<Value = Payload> {
    prop::collection::btree_map("[a-z_]{1,12}", arb_scalar(), 0..8)
        .prop_map(|entries| entries.into_iter().collect())
}

#[test]
fn issue_resource_round_trips_without_leaking_identity() {
    let entity: EntityData = serde_json::from_value(json!({
        "type": "Jans::Issue",
        "id": "random_id",
        "org_id": "X",
        "country": "Y"
    }))
    .unwrap();

    let wire = serde_json::to_value(&entity).unwrap();
    let decoded: EntityData = serde_json::from_value(wire).unwrap();

    assert_eq!(decoded.entity_type(), "Jans::Issue");
    let expected = json!({"org_id": "X", "country": "Y"});
    assert_eq!(Value::Object(decoded.payload().clone()), expected);
}

proptest! {
    /// Decoding never leaves `type` or `id` in the payload, whatever the bag held.
    #[test]
    fn identity_never_leaks_into_payload(
        entity_type in "[A-Z][a-z]{0,6}::[A-Z][a-z]{0,8}",
        id in "[a-z0-9]{1,10}",
        payload in arb_payload(),
    ) {
        let entity = EntityData::with_payload(entity_type.clone(), id.clone(), payload.clone());
        let decoded: EntityData =
            serde_json::from_value(serde_json::to_value(&entity).unwrap()).unwrap();

        prop_assert_eq!(decoded.entity_type(), entity_type.as_str());
        prop_assert_eq!(decoded.id(), id.as_str());
        prop_assert!(decoded.attr("type").is_none());
        prop_assert!(decoded.attr("id").is_none());

        let mut expected = payload;
        expected.remove("type");
        expected.remove("id");
        prop_assert_eq!(decoded.payload(), &expected);
    }
}
