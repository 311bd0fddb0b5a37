//! Type schemas and attribute definitions
//!
//! A [`Schema`] is an administrator-declared, named list of
//! [`AttributeDefinition`]s. Entities never embed their schema: a CI refers to
//! it by `ci_type` and a relationship by `relationship_type`, and the schema is
//! resolved by name at write time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::constraint::ConstraintSet;
use super::entity::AuditFields;

/// Which family of entities a schema describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    /// Configuration item types (server, database, ...)
    Ci,
    /// Relationship types (depends_on, hosts, ...)
    Relationship,
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Ci => write!(f, "ci"),
            SchemaKind::Relationship => write!(f, "relationship"),
        }
    }
}

impl FromStr for SchemaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ci" => Ok(SchemaKind::Ci),
            "relationship" => Ok(SchemaKind::Relationship),
            other => Err(format!("unknown schema kind '{}'", other)),
        }
    }
}

/// The six attribute types a schema may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl AttributeType {
    pub const ALL: [AttributeType; 6] = [
        AttributeType::String,
        AttributeType::Number,
        AttributeType::Boolean,
        AttributeType::Date,
        AttributeType::Array,
        AttributeType::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Number => "number",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::Array => "array",
            AttributeType::Object => "object",
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared type name outside the six known types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAttributeType(pub String);

impl fmt::Display for UnknownAttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown type {}", self.0)
    }
}

impl std::error::Error for UnknownAttributeType {}

impl FromStr for AttributeType {
    type Err = UnknownAttributeType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttributeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownAttributeType(s.to_string()))
    }
}

/// Declaration of a single attribute within a schema
///
/// The declared type is kept as the raw string so that a corrupted schema
/// (one naming a type outside [`AttributeType`]) can still be loaded and
/// reported on instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute key in the payload; unique within its schema
    pub name: String,

    /// Declared type name (`string`, `number`, `boolean`, `date`, `array`, `object`)
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub description: String,

    /// Stored when the caller omits the attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Constraint rules, parsed once from the open rule map
    #[serde(default, rename = "validation", skip_serializing_if = "ConstraintSet::is_empty")]
    pub rules: ConstraintSet,
}

impl AttributeDefinition {
    /// Create an optional attribute of the given type
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            type_name: attribute_type.as_str().to_string(),
            required: false,
            description: String::new(),
            default: None,
            rules: ConstraintSet::default(),
        }
    }

    /// Create a required attribute of the given type
    pub fn required(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self::new(name, attribute_type).set_required(true)
    }

    pub fn set_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Add a constraint rule by its wire name (`min`, `pattern`, `format`, ...)
    pub fn with_rule(mut self, rule: impl Into<String>, param: Value) -> Self {
        self.rules.insert(rule, param);
        self
    }

    /// Resolve the declared type name
    pub fn attribute_type(&self) -> Result<AttributeType, UnknownAttributeType> {
        self.type_name.parse()
    }

    /// The default to inject when the attribute is absent, ignoring explicit nulls
    pub fn effective_default(&self) -> Option<&Value> {
        self.default.as_ref().filter(|v| !v.is_null())
    }
}

/// A stored type schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub id: Uuid,

    pub kind: SchemaKind,

    /// Type name entities refer to; unique among active schemas of one kind
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Attribute declarations in declaration order
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,

    pub active: bool,

    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Schema {
    /// Build a new active schema from a draft
    pub fn from_draft(kind: SchemaKind, draft: SchemaDraft, actor: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: draft.name,
            description: draft.description,
            attributes: draft.attributes,
            active: true,
            audit: AuditFields::new(actor),
        }
    }

    /// Look up an attribute definition by name
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether the payload key is declared by this schema
    pub fn declares(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn required_attributes(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.iter().filter(|a| a.required)
    }
}

/// Caller-supplied schema content for create and update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDraft {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
}

impl SchemaDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            attributes: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeDefinition) -> Self {
        self.attributes.push(attribute);
        self
    }
}
