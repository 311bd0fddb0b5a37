//! Configuration items and relationships

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Attribute payload of one entity
///
/// Keys keep their insertion order, so validation warnings follow the order
/// in which the caller wrote them.
pub type Payload = Map<String, Value>;

/// Who created and last touched a record, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

impl AuditFields {
    pub fn new(actor: &str) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            created_by: actor.to_string(),
            updated_by: actor.to_string(),
        }
    }

    /// Stamp a modification
    pub fn touch(&mut self, actor: &str) {
        self.updated_at = Utc::now();
        self.updated_by = actor.to_string();
    }
}

/// A tracked asset whose attributes are described by a CI schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationItem {
    pub id: Uuid,
    pub name: String,
    /// Name of the CI schema this item is interpreted against
    pub ci_type: String,
    pub status: String,
    #[serde(default)]
    pub attributes: Payload,
    #[serde(flatten)]
    pub audit: AuditFields,
}

/// A typed, directed edge between two configuration items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    /// Name of the relationship schema this edge is interpreted against
    pub relationship_type: String,
    pub active: bool,
    #[serde(default)]
    pub attributes: Payload,
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl Relationship {
    /// Whether this edge touches the given CI at either end
    pub fn touches(&self, ci_id: Uuid) -> bool {
        self.source_id == ci_id || self.target_id == ci_id
    }
}

pub const DEFAULT_CI_STATUS: &str = "active";

fn empty_attributes() -> Value {
    Value::Object(Map::new())
}

/// Request to create a configuration item
///
/// `attributes` is kept as a raw JSON value: a caller may send something that
/// is not a map at all, and that must surface as a validation error rather
/// than a decoding failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConfigurationItem {
    pub name: String,
    pub ci_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
}

impl NewConfigurationItem {
    pub fn new(name: impl Into<String>, ci_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ci_type: ci_type.into(),
            status: None,
            attributes: empty_attributes(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Caller-supplied fields for a CI update; omitted fields keep stored values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigurationItemUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Replaces the stored attributes wholesale when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
}

/// Request to create a relationship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRelationship {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relationship_type: String,
    #[serde(default = "empty_attributes")]
    pub attributes: Value,
}

impl NewRelationship {
    pub fn new(source_id: Uuid, target_id: Uuid, relationship_type: impl Into<String>) -> Self {
        Self {
            source_id,
            target_id,
            relationship_type: relationship_type.into(),
            attributes: empty_attributes(),
        }
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Caller-supplied fields for a relationship update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipUpdate {
    /// Replaces the stored attributes wholesale when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}
