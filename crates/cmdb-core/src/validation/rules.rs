//! Evaluation of constraint rules against a type-checked value
//!
//! Each rule is evaluated on its own and yields at most one error. Rules only
//! look at values of the kind they apply to:
//!
//! - `min`/`max`: values coercible to a number (integers, floats, numeric strings)
//! - `minLength`/`maxLength`, `pattern`, `format`: strings
//! - `enum`: any value
//!
//! A value outside a rule's kind passes that rule.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use super::ValidationError;
use crate::model::constraint::coerce_number;
use crate::model::{Constraint, StringFormat};

// Literal patterns, compiled once on first use
fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("email regex")
    })
}

fn ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^((25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
        )
        .expect("ipv4 regex")
    })
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url regex"))
}

/// Whether `input` satisfies a named format. Unrecognised formats always pass.
pub fn matches_format(format: &StringFormat, input: &str) -> bool {
    match format {
        StringFormat::Email => email_regex().is_match(input),
        StringFormat::Ipv4 => ipv4_regex().is_match(input),
        StringFormat::Url => url_regex().is_match(input),
        StringFormat::Other(_) => true,
    }
}

/// JSON equality that compares numbers by value, so `4` equals `4.0`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).map(|y| values_equal(x, y)).unwrap_or(false))
        }
        _ => a == b,
    }
}

fn render_allowed(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Evaluate one rule for one attribute value
pub fn evaluate(field: &str, value: &Value, constraint: &Constraint) -> Option<ValidationError> {
    let message = match constraint {
        Constraint::Min(min) => {
            let n = coerce_number(value)?;
            (n < *min).then(|| format!("{} must be at least {}", field, min))
        }
        Constraint::Max(max) => {
            let n = coerce_number(value)?;
            (n > *max).then(|| format!("{} must be at most {}", field, max))
        }
        Constraint::MinLength(len) => {
            let s = value.as_str()?;
            (s.chars().count() < *len)
                .then(|| format!("{} must be at least {} characters long", field, len))
        }
        Constraint::MaxLength(len) => {
            let s = value.as_str()?;
            (s.chars().count() > *len)
                .then(|| format!("{} must be at most {} characters long", field, len))
        }
        Constraint::Pattern(pattern) => {
            let s = value.as_str()?;
            match Regex::new(pattern) {
                Ok(re) => (!re.is_match(s))
                    .then(|| format!("{} does not match pattern {}", field, pattern)),
                Err(e) => Some(format!("invalid pattern for {}: {}", field, e)),
            }
        }
        Constraint::Format(format) => {
            let s = value.as_str()?;
            (!matches_format(format, s)).then(|| format!("{} must be a valid {}", field, format))
        }
        Constraint::Enum(allowed) => (!allowed.iter().any(|a| values_equal(a, value)))
            .then(|| format!("{} must be one of: {}", field, render_allowed(allowed))),
    }?;

    Some(ValidationError::new(field, value.clone(), message).with_rule(constraint.rule_name()))
}
