//! Attribute payload validation against a runtime-declared schema

use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashSet;

use super::{rules, types, ValidationError, ValidationResult};
use crate::model::{Payload, Schema};

/// Field name used for errors about the payload as a whole
pub const PAYLOAD_FIELD: &str = "attributes";

/// Validates attribute payloads against schemas.
///
/// The validator is deterministic: the same payload and schema always yield
/// the same result, with errors in schema declaration order followed by
/// warnings in payload key order. It never modifies the payload and never
/// injects defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeValidator;

impl AttributeValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a raw JSON document
    pub fn validate_raw(&self, raw: &str, schema: &Schema) -> ValidationResult {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => self.validate(&value, schema),
            Err(e) => ValidationResult::fatal(
                ValidationError::new(
                    PAYLOAD_FIELD,
                    Value::String(raw.to_string()),
                    format!("attributes are not valid JSON: {}", e),
                )
                .with_rule("type"),
            ),
        }
    }

    /// Validate a decoded payload. Anything other than a map (or `null`,
    /// read as an empty map) fails with a single error.
    pub fn validate(&self, payload: &Value, schema: &Schema) -> ValidationResult {
        match Self::payload_ref(payload) {
            Ok(map) => self.validate_payload(&map, schema),
            Err(result) => result,
        }
    }

    /// Validate a payload that is already known to be a map
    pub fn validate_payload(&self, payload: &Payload, schema: &Schema) -> ValidationResult {
        let mut result = ValidationResult::new();

        for definition in &schema.attributes {
            let Some(value) = payload.get(&definition.name) else {
                if definition.required {
                    result.push_error(
                        ValidationError::new(
                            &definition.name,
                            Value::Null,
                            format!("{} is required", definition.name),
                        )
                        .with_rule("required"),
                    );
                }
                continue;
            };

            let attribute_type = match definition.attribute_type() {
                Ok(t) => t,
                Err(unknown) => {
                    result.push_error(
                        ValidationError::new(&definition.name, value.clone(), unknown.to_string())
                            .with_rule("type"),
                    );
                    continue;
                }
            };

            if !types::check_type(attribute_type, value) {
                result.push_error(
                    ValidationError::new(
                        &definition.name,
                        value.clone(),
                        format!(
                            "{} must be of type {}, got {}",
                            definition.name,
                            attribute_type,
                            types::json_kind(value)
                        ),
                    )
                    .with_rule("type"),
                );
                continue;
            }

            for constraint in definition.rules.constraints() {
                if let Some(error) = rules::evaluate(&definition.name, value, constraint) {
                    result.push_error(error);
                }
            }
        }

        let declared: HashSet<&str> = schema.attributes.iter().map(|a| a.name.as_str()).collect();
        for (key, value) in payload {
            if !declared.contains(key.as_str()) {
                result.push_warning(ValidationError::new(
                    key,
                    value.clone(),
                    format!("{} is not defined in schema {}", key, schema.name),
                ));
            }
        }

        result
    }

    /// Borrow a payload as a map, or produce the malformed-payload result
    pub fn payload_ref(value: &Value) -> Result<Cow<'_, Payload>, ValidationResult> {
        match value {
            Value::Object(map) => Ok(Cow::Borrowed(map)),
            Value::Null => Ok(Cow::Owned(Payload::new())),
            other => Err(malformed(other)),
        }
    }

    /// Take ownership of a payload as a map, or produce the malformed-payload result
    pub fn into_payload(value: Value) -> Result<Payload, ValidationResult> {
        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Payload::new()),
            other => Err(malformed(&other)),
        }
    }
}

fn malformed(value: &Value) -> ValidationResult {
    ValidationResult::fatal(
        ValidationError::new(
            PAYLOAD_FIELD,
            value.clone(),
            format!("attributes must be a JSON object, got {}", types::json_kind(value)),
        )
        .with_rule("type"),
    )
}
