//! Constraint rules attached to attribute definitions
//!
//! On the wire a definition carries an open map of rule name to parameter,
//! e.g. `{"min": 1, "format": "ipv4"}`. The map is parsed once, when the
//! definition is deserialized, into a list of [`Constraint`]s. Rule names this
//! crate does not know, and known rules whose parameter has the wrong shape,
//! are dropped from the parsed list and therefore never enforced. The raw map
//! is kept so that the definition serializes back exactly as it was written.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Named string formats understood by the `format` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringFormat {
    Email,
    Ipv4,
    Url,
    /// A format name with no checker. Values always pass.
    Other(String),
}

impl StringFormat {
    pub fn parse(name: &str) -> Self {
        match name {
            "email" => StringFormat::Email,
            "ipv4" => StringFormat::Ipv4,
            "url" => StringFormat::Url,
            other => StringFormat::Other(other.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StringFormat::Other(_))
    }
}

impl fmt::Display for StringFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringFormat::Email => write!(f, "email"),
            StringFormat::Ipv4 => write!(f, "ipv4"),
            StringFormat::Url => write!(f, "url"),
            StringFormat::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A single parsed constraint rule
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Inclusive numeric lower bound
    Min(f64),
    /// Inclusive numeric upper bound
    Max(f64),
    /// Minimum string length in characters
    MinLength(usize),
    /// Maximum string length in characters
    MaxLength(usize),
    /// Regex the value must contain a match for. Compiled at validation time.
    Pattern(String),
    Format(StringFormat),
    /// Allowed values, compared by deep equality
    Enum(Vec<Value>),
}

/// Rule names with a checker
pub const KNOWN_RULES: [&str; 7] = [
    "min",
    "max",
    "minLength",
    "maxLength",
    "pattern",
    "format",
    "enum",
];

impl Constraint {
    pub fn is_known_rule(rule: &str) -> bool {
        KNOWN_RULES.contains(&rule)
    }

    /// Whether the rule only ever looks at string values
    pub fn is_string_rule(&self) -> bool {
        matches!(
            self,
            Constraint::MinLength(_)
                | Constraint::MaxLength(_)
                | Constraint::Pattern(_)
                | Constraint::Format(_)
        )
    }

    /// Parse one entry of the rule map. Returns `None` for unknown rule names
    /// and for parameters of the wrong shape.
    pub fn parse(rule: &str, param: &Value) -> Option<Self> {
        match rule {
            "min" => coerce_number(param).map(Constraint::Min),
            "max" => coerce_number(param).map(Constraint::Max),
            "minLength" => coerce_length(param).map(Constraint::MinLength),
            "maxLength" => coerce_length(param).map(Constraint::MaxLength),
            "pattern" => param.as_str().map(|p| Constraint::Pattern(p.to_string())),
            "format" => param.as_str().map(|f| Constraint::Format(StringFormat::parse(f))),
            "enum" => param.as_array().map(|values| Constraint::Enum(values.clone())),
            _ => None,
        }
    }

    /// Wire name of the rule, reported on validation errors
    pub fn rule_name(&self) -> &'static str {
        match self {
            Constraint::Min(_) => "min",
            Constraint::Max(_) => "max",
            Constraint::MinLength(_) => "minLength",
            Constraint::MaxLength(_) => "maxLength",
            Constraint::Pattern(_) => "pattern",
            Constraint::Format(_) => "format",
            Constraint::Enum(_) => "enum",
        }
    }
}

/// Numeric coercion shared by the `min`/`max` rules and their parameters.
///
/// Integers, floats and numeric strings are all accepted. Weakly-typed JSON
/// producers routinely send `"4"` where `4` was meant.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn coerce_length(value: &Value) -> Option<usize> {
    coerce_number(value)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0)
        .map(|n| n as usize)
}

/// The rule map of one attribute definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ConstraintSet {
    raw: Map<String, Value>,
    parsed: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a rule and re-parse the set
    pub fn insert(&mut self, rule: impl Into<String>, param: Value) {
        self.raw.insert(rule.into(), param);
        self.parsed = parse_rules(&self.raw);
    }

    /// Recognised rules in rule-map order
    pub fn constraints(&self) -> &[Constraint] {
        &self.parsed
    }

    /// The rule map as written
    pub fn raw(&self) -> &Map<String, Value> {
        &self.raw
    }

    /// Number of entries in the rule map, recognised or not
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

fn parse_rules(raw: &Map<String, Value>) -> Vec<Constraint> {
    raw.iter()
        .filter_map(|(rule, param)| Constraint::parse(rule, param))
        .collect()
}

impl From<Map<String, Value>> for ConstraintSet {
    fn from(raw: Map<String, Value>) -> Self {
        let parsed = parse_rules(&raw);
        Self { raw, parsed }
    }
}

impl From<ConstraintSet> for Map<String, Value> {
    fn from(set: ConstraintSet) -> Self {
        set.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_known_rules() {
        assert_eq!(Constraint::parse("min", &json!(1)), Some(Constraint::Min(1.0)));
        assert_eq!(Constraint::parse("max", &json!("2.5")), Some(Constraint::Max(2.5)));
        assert_eq!(
            Constraint::parse("minLength", &json!(3.0)),
            Some(Constraint::MinLength(3))
        );
        assert_eq!(
            Constraint::parse("format", &json!("ipv4")),
            Some(Constraint::Format(StringFormat::Ipv4))
        );
        assert_eq!(
            Constraint::parse("enum", &json!(["a", "b"])),
            Some(Constraint::Enum(vec![json!("a"), json!("b")]))
        );
    }

    #[test]
    fn test_unknown_rule_and_bad_params_are_dropped() {
        assert_eq!(Constraint::parse("unique", &json!(true)), None);
        assert_eq!(Constraint::parse("minLength", &json!(-1)), None);
        assert_eq!(Constraint::parse("maxLength", &json!(1.5)), None);
        assert_eq!(Constraint::parse("pattern", &json!(12)), None);
        assert_eq!(Constraint::parse("enum", &json!("a")), None);
    }

    #[test]
    fn test_known_rule_names() {
        assert!(Constraint::is_known_rule("maxLength"));
        assert!(!Constraint::is_known_rule("max_length"));
        assert!(Constraint::MinLength(1).is_string_rule());
        assert!(!Constraint::Enum(vec![]).is_string_rule());
    }

    #[test]
    fn test_unknown_format_is_kept_but_flagged() {
        let c = Constraint::parse("format", &json!("hostname")).unwrap();
        match c {
            Constraint::Format(f) => assert!(!f.is_known()),
            other => panic!("unexpected constraint {:?}", other),
        }
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!(4)), Some(4.0));
        assert_eq!(coerce_number(&json!(4.5)), Some(4.5));
        assert_eq!(coerce_number(&json!(" 7 ")), Some(7.0));
        assert_eq!(coerce_number(&json!("seven")), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!(true)), None);
    }

    #[test]
    fn test_set_keeps_raw_map_and_order() {
        let set: ConstraintSet = serde_json::from_value(json!({
            "max": 10,
            "unique": true,
            "min": 1
        }))
        .unwrap();

        assert_eq!(set.len(), 3);
        let names: Vec<_> = set.constraints().iter().map(|c| c.rule_name()).collect();
        assert_eq!(names, vec!["max", "min"]);

        let back = serde_json::to_value(&set).unwrap();
        assert_eq!(back, json!({"max": 10, "unique": true, "min": 1}));
    }

    #[test]
    fn test_insert_reparses() {
        let mut set = ConstraintSet::new();
        set.insert("min", json!(1));
        set.insert("min", json!(5));
        assert_eq!(set.constraints(), &[Constraint::Min(5.0)]);
    }
}
