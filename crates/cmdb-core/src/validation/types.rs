//! Type checks for attribute values

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::model::AttributeType;

/// Fallback layouts tried, in order, when a date is not RFC 3339
pub const DATE_FORMATS: [&str; 5] = [
    "%Y-%m-%d",  // 2024-01-15
    "%Y/%m/%d",  // 2024/01/15
    "%m-%d-%Y",  // 01-15-2024
    "%m/%d/%Y",  // 01/15/2024
    "%B %d, %Y", // January 15, 2024
];

/// Whether `value` has the runtime kind `attribute_type` demands.
///
/// `null` matches no type.
pub fn check_type(attribute_type: AttributeType, value: &Value) -> bool {
    match attribute_type {
        AttributeType::String => value.is_string(),
        AttributeType::Number => value.is_number(),
        AttributeType::Boolean => value.is_boolean(),
        AttributeType::Date => value.as_str().map(is_date).unwrap_or(false),
        AttributeType::Array => value.is_array(),
        AttributeType::Object => value.is_object(),
    }
}

/// Parse a date string: RFC 3339 first, then each fallback layout.
/// The first layout that parses wins.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }

    DATE_FORMATS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(input, layout).ok())
}

pub fn is_date(input: &str) -> bool {
    parse_date(input).is_some()
}

/// Name of the JSON kind of a value, for messages
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
