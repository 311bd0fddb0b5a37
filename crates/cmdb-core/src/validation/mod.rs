//! Validation of attribute payloads and of schema definitions
//!
//! Both validators are stateless values: they hold no configuration and no
//! caches, so one instance can be shared by every request task, or a fresh
//! one created per call.
//!
//! Every check accumulates into a [`ValidationResult`]. Errors block a write,
//! warnings never do.

pub mod attributes;
pub mod definition;
pub mod rules;
pub mod types;

pub use attributes::AttributeValidator;
pub use definition::SchemaDefinitionValidator;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One problem found during validation
///
/// Also used for warnings, which carry the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Attribute name (or definition path for schema checks)
    pub field: String,
    /// Offending value; `null` when the value is missing
    #[serde(default)]
    pub value: Value,
    pub message: String,
    /// Rule that produced the problem (`required`, `type`, `min`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, value: Value, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value,
            message: message.into(),
            rule: None,
        }
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "[{}] {}: {}", rule, self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Outcome of a validation pass
///
/// Errors are ordered by schema declaration order; warnings by payload key
/// order. `is_valid` is true exactly when `errors` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationError>,
    #[serde(default)]
    pub warnings: Vec<ValidationError>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    /// An empty, valid result
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// A result holding a single fatal error
    pub fn fatal(error: ValidationError) -> Self {
        let mut result = Self::new();
        result.push_error(error);
        result
    }

    pub fn push_error(&mut self, error: ValidationError) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn push_warning(&mut self, warning: ValidationError) {
        self.warnings.push(warning);
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Errors reported against one field
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors.iter().filter(move |e| e.field == field)
    }
}
