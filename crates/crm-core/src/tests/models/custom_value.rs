use crate::CustomValue;

use serde_json::json;

#[test]
fn given_json_scalars_when_converted_then_variants_match() {
    assert_eq!(CustomValue::from_json(&json!(true)), Some(CustomValue::Bool(true)));
    assert_eq!(CustomValue::from_json(&json!(42)), Some(CustomValue::Int(42)));
    assert_eq!(CustomValue::from_json(&json!(1.5)), Some(CustomValue::Double(1.5)));
    assert_eq!(
        CustomValue::from_json(&json!("gold")),
        Some(CustomValue::String("gold".into()))
    );
}

#[test]
fn given_non_scalar_json_when_converted_then_none() {
    assert_eq!(CustomValue::from_json(&json!(null)), None);
    assert_eq!(CustomValue::from_json(&json!([1, 2])), None);
    assert_eq!(CustomValue::from_json(&json!({"a": 1})), None);
}

#[test]
fn given_serialized_values_when_deserialized_then_types_survive() {
    let values = vec![
        CustomValue::Bool(false),
        CustomValue::Int(-7),
        CustomValue::Double(2.25),
        CustomValue::String("x".into()),
    ];

    let json = serde_json::to_string(&values).unwrap();
    let restored: Vec<CustomValue> = serde_json::from_str(&json).unwrap();

    assert_eq!(values, restored);
}
