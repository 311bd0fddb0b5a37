//! Default application for attribute payloads
//!
//! Runs after validation and before persistence. Validation must see the
//! caller's literal payload so that `required` means "supplied by the
//! caller"; defaults only shape what is stored.

use crate::model::{Payload, Schema};

/// Return a copy of `payload` with schema defaults filled in.
///
/// Every existing entry is kept as-is, including values that would fail
/// validation. A default is inserted only for an attribute that is absent
/// and declares a non-null default. Applying twice gives the same result as
/// applying once.
pub fn apply_defaults(payload: &Payload, schema: &Schema) -> Payload {
    let mut result = payload.clone();

    for definition in &schema.attributes {
        if result.contains_key(&definition.name) {
            continue;
        }
        if let Some(default) = definition.effective_default() {
            result.insert(definition.name.clone(), default.clone());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDefinition, AttributeType, SchemaDraft, SchemaKind};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn schema() -> Schema {
        let draft = SchemaDraft::new("database")
            .with_attribute(AttributeDefinition::required("engine", AttributeType::String))
            .with_attribute(
                AttributeDefinition::new("port", AttributeType::Number).with_default(json!(5432)),
            )
            .with_attribute(
                AttributeDefinition::new("replicas", AttributeType::Number)
                    .with_default(Value::Null),
            )
            .with_attribute(
                AttributeDefinition::new("tags", AttributeType::Array).with_default(json!([])),
            );
        Schema::from_draft(SchemaKind::Ci, draft, "test")
    }

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fills_absent_attributes() {
        let result = apply_defaults(&payload(json!({"engine": "postgres"})), &schema());
        assert_eq!(
            Value::Object(result),
            json!({"engine": "postgres", "port": 5432, "tags": []})
        );
    }

    #[test]
    fn test_never_overwrites_present_values() {
        let input = payload(json!({"port": "not-a-number", "tags": null}));
        let result = apply_defaults(&input, &schema());
        assert_eq!(result["port"], json!("not-a-number"));
        assert_eq!(result["tags"], Value::Null);
    }

    #[test]
    fn test_null_default_is_not_injected() {
        let result = apply_defaults(&Payload::new(), &schema());
        assert!(!result.contains_key("replicas"));
        assert!(!result.contains_key("engine"));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let input = payload(json!({"engine": "mysql"}));
        let _ = apply_defaults(&input, &schema());
        assert_eq!(input.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_idempotent(port in proptest::option::of(0i64..65536), extra in "[a-z]{1,6}") {
            let mut input = Payload::new();
            if let Some(port) = port {
                input.insert("port".to_string(), json!(port));
            }
            input.insert(extra, json!(true));

            let once = apply_defaults(&input, &schema());
            let twice = apply_defaults(&once, &schema());
            prop_assert_eq!(once, twice);
        }
    }
}
