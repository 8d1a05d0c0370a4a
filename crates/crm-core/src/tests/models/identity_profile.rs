use crate::models::identity_profile::is_valid_email;
use crate::{CoreError, CustomValue, IdentityProfile};

use chrono::{Duration, NaiveDate, Utc};
use serde_json::{Map, Value, json};

fn bridge(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("bridge fixture must be an object"),
    }
}

#[test]
fn given_builder_when_built_then_all_fields_are_set() {
    let birthday = NaiveDate::from_ymd_opt(1990, 5, 17).unwrap();
    let profile = IdentityProfile::builder("u1")
        .name("Alice")
        .email("alice@example.com")
        .gender("female")
        .birthday(birthday)
        .location("Recife")
        .custom("plan", "gold")
        .custom("visits", 3_i64)
        .build();

    assert_eq!(profile.id(), "u1");
    assert_eq!(profile.name(), Some("Alice"));
    assert_eq!(profile.email(), Some("alice@example.com"));
    assert_eq!(profile.gender(), Some("female"));
    assert_eq!(profile.birthday(), Some(birthday));
    assert_eq!(profile.location(), Some("Recife"));
    assert_eq!(profile.custom_data().len(), 2);
    assert_eq!(profile.custom_data().get("visits"), Some(&CustomValue::Int(3)));
}

#[test]
fn given_invalid_email_when_built_then_email_is_dropped() {
    let profile = IdentityProfile::builder("u1").email("not-an-email").build();

    assert_eq!(profile.email(), None);
}

#[test]
fn given_email_candidates_when_validated_then_match_expected_shape() {
    assert!(is_valid_email("a.b+c@mail.example.com"));
    assert!(is_valid_email("x_y%z@domain.io"));
    assert!(!is_valid_email("missing-at.example.com"));
    assert!(!is_valid_email("@example.com"));
    assert!(!is_valid_email("a@b@example.com"));
    assert!(!is_valid_email("a@example"));
    assert!(!is_valid_email("a@example.c"));
    assert!(!is_valid_email("a@.com"));
    assert!(!is_valid_email("a b@example.com"));
}

#[test]
fn given_blank_ids_when_checked_then_reported_blank() {
    assert!(IdentityProfile::builder("").build().has_blank_id());
    assert!(IdentityProfile::builder("  \t").build().has_blank_id());
    assert!(!IdentityProfile::builder("u1").build().has_blank_id());
}

#[test]
fn given_different_created_at_when_fingerprinted_then_equal() {
    let now = Utc::now();
    let first = IdentityProfile::builder("u1").name("A").created_at(now).build();
    let second = IdentityProfile::builder("u1")
        .name("A")
        .created_at(now - Duration::hours(1))
        .build();

    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_ne!(first, second);
}

#[test]
fn given_profile_when_serialized_roundtrip_then_preserves_all_fields() {
    let original = IdentityProfile::builder("u1")
        .name("Bob")
        .birthday(NaiveDate::from_ymd_opt(2000, 1, 2).unwrap())
        .custom("ratio", 0.5)
        .custom("vip", true)
        .build();

    let json = serde_json::to_string(&original).unwrap();
    let restored: IdentityProfile = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, original);
    assert!(json.contains("\"birthday\":\"2000-01-02\""));
    assert!(!json.contains("email"));
}

#[test]
fn given_full_bridge_map_when_converted_then_profile_matches() {
    let map = bridge(json!({
        "id": "u1",
        "name": "Carol",
        "email": "carol@example.com",
        "birthday": "1985-12-01",
        "customData": { "tier": "silver", "age": 39, "score": 9.5, "active": true, "skip": null }
    }));

    let profile = IdentityProfile::from_bridge_map(&map).unwrap();

    assert_eq!(profile.id(), "u1");
    assert_eq!(profile.name(), Some("Carol"));
    assert_eq!(profile.birthday(), Some(NaiveDate::from_ymd_opt(1985, 12, 1).unwrap()));
    assert_eq!(profile.custom_data().len(), 4);
    assert_eq!(profile.custom_data().get("score"), Some(&CustomValue::Double(9.5)));
}

#[test]
fn given_bridge_map_without_id_when_converted_then_validation_error() {
    let map = bridge(json!({ "name": "No Id" }));

    let result = IdentityProfile::from_bridge_map(&map);

    assert!(matches!(result, Err(CoreError::Validation { .. })));
}

#[test]
fn given_nested_custom_data_when_converted_then_validation_error() {
    let map = bridge(json!({ "id": "u1", "customData": { "nested": { "a": 1 } } }));

    let result = IdentityProfile::from_bridge_map(&map);

    match result {
        Err(CoreError::Validation { field, .. }) => {
            assert_eq!(field.as_deref(), Some("customData"));
        }
        other => panic!("Expected Validation error, got {other:?}"),
    }
}

#[test]
fn given_malformed_birthday_when_converted_then_invalid_date_error() {
    let map = bridge(json!({ "id": "u1", "birthday": "17/05/1990" }));

    let result = IdentityProfile::from_bridge_map(&map);

    assert!(matches!(result, Err(CoreError::InvalidDate { .. })));
}

#[test]
fn given_blank_optional_strings_when_converted_then_treated_as_absent() {
    let map = bridge(json!({ "id": "u1", "name": "  ", "location": null }));

    let profile = IdentityProfile::from_bridge_map(&map).unwrap();

    assert_eq!(profile.name(), None);
    assert_eq!(profile.location(), None);
}
