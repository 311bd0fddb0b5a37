//! Validation of schema definitions before they are saved

use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

use super::{types, ValidationError, ValidationResult};
use crate::model::{AttributeDefinition, AttributeType, Constraint, Schema, SchemaDraft};

/// Checks a proposed schema for authoring mistakes.
///
/// All checks run and accumulate:
/// - the schema name is not blank
/// - every attribute name is not blank
/// - no two attributes share a name
/// - every declared type is one of the six known types
/// - a declared default type-checks against its attribute type (constraint
///   rules are not applied to defaults)
///
/// Rule problems never reject a schema. They are reported as warnings on
/// `attributes[i].validation.<rule>`:
/// - unknown rule names and malformed parameters (the rule is not enforced)
/// - a `format` naming an unrecognised format (values pass unchecked)
/// - string rules on an attribute that cannot hold a string
/// - `min` above `max`, `minLength` above `maxLength`, an empty `enum`
/// - a `pattern` that does not compile (every value fails at write time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDefinitionValidator;

impl SchemaDefinitionValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_draft(&self, draft: &SchemaDraft) -> ValidationResult {
        self.validate_definition(&draft.name, &draft.attributes)
    }

    pub fn validate_schema(&self, schema: &Schema) -> ValidationResult {
        self.validate_definition(&schema.name, &schema.attributes)
    }

    pub fn validate_definition(
        &self,
        name: &str,
        attributes: &[AttributeDefinition],
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        if name.trim().is_empty() {
            result.push_error(
                ValidationError::new("name", Value::String(name.to_string()), "schema name is required")
                    .with_rule("required"),
            );
        }

        let mut seen = HashSet::new();
        for (index, attribute) in attributes.iter().enumerate() {
            let path = format!("attributes[{}]", index);

            if attribute.name.trim().is_empty() {
                result.push_error(
                    ValidationError::new(
                        format!("{}.name", path),
                        Value::String(attribute.name.clone()),
                        "attribute name is required",
                    )
                    .with_rule("required"),
                );
            } else if !seen.insert(attribute.name.as_str()) {
                result.push_error(
                    ValidationError::new(
                        format!("{}.name", path),
                        Value::String(attribute.name.clone()),
                        format!("Duplicate attribute name: {}", attribute.name),
                    )
                    .with_rule("unique"),
                );
            }

            let attribute_type = match attribute.attribute_type() {
                Ok(t) => t,
                Err(unknown) => {
                    result.push_error(
                        ValidationError::new(
                            format!("{}.type", path),
                            Value::String(attribute.type_name.clone()),
                            unknown.to_string(),
                        )
                        .with_rule("type"),
                    );
                    continue;
                }
            };

            if let Some(default) = attribute.effective_default() {
                if !types::check_type(attribute_type, default) {
                    result.push_error(
                        ValidationError::new(
                            format!("{}.default", path),
                            default.clone(),
                            format!(
                                "default for {} must be of type {}",
                                attribute.name, attribute_type
                            ),
                        )
                        .with_rule("default"),
                    );
                }
            }

            check_rules(&mut result, &path, attribute, attribute_type);
        }

        result
    }
}

/// Date values are strings on the wire, so string rules apply to them too
fn holds_strings(attribute_type: AttributeType) -> bool {
    matches!(attribute_type, AttributeType::String | AttributeType::Date)
}

fn check_rules(
    result: &mut ValidationResult,
    path: &str,
    attribute: &AttributeDefinition,
    attribute_type: AttributeType,
) {
    let name = &attribute.name;
    let raw = attribute.rules.raw();
    let param = |rule: &str| raw.get(rule).cloned().unwrap_or(Value::Null);
    let mut warnings = Vec::new();
    let mut warn = |rule: &str, message: String| {
        warnings.push(
            ValidationError::new(format!("{}.validation.{}", path, rule), param(rule), message)
                .with_rule(rule),
        );
    };

    for (rule, value) in raw {
        if !Constraint::is_known_rule(rule) {
            warn(rule.as_str(), format!("unknown rule {} on {} is ignored", rule, name));
        } else if Constraint::parse(rule, value).is_none() {
            warn(
                rule.as_str(),
                format!("{} parameter on {} is malformed and is ignored", rule, name),
            );
        }
    }

    let (mut min, mut max, mut min_len, mut max_len) = (None, None, None, None);
    for constraint in attribute.rules.constraints() {
        let rule = constraint.rule_name();
        if constraint.is_string_rule() && !holds_strings(attribute_type) {
            warn(
                rule,
                format!("{} only applies to strings but {} is a {}", rule, name, attribute_type),
            );
        }

        match constraint {
            Constraint::Min(n) => min = Some(*n),
            Constraint::Max(n) => max = Some(*n),
            Constraint::MinLength(n) => min_len = Some(*n),
            Constraint::MaxLength(n) => max_len = Some(*n),
            Constraint::Pattern(pattern) => {
                if let Err(e) = Regex::new(pattern) {
                    warn(
                        rule,
                        format!("pattern for {} does not compile: {}", name, e),
                    );
                }
            }
            Constraint::Format(format) => {
                if !format.is_known() {
                    warn(
                        rule,
                        format!(
                            "format {} is not recognised; values of {} will not be checked",
                            format, name
                        ),
                    );
                }
            }
            Constraint::Enum(values) => {
                if values.is_empty() {
                    warn(rule, format!("enum for {} allows no values", name));
                }
            }
        }
    }

    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            warn("min", format!("min {} exceeds max {} for {}", min, max, name));
        }
    }
    if let (Some(min_len), Some(max_len)) = (min_len, max_len) {
        if min_len > max_len {
            warn(
                "minLength",
                format!("minLength {} exceeds maxLength {} for {}", min_len, max_len, name),
            );
        }
    }

    for warning in warnings {
        result.push_warning(warning);
    }
}
