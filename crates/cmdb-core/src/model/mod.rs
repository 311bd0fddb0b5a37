//! Data model for schemas, configuration items and relationships

pub mod constraint;
pub mod entity;
pub mod schema;

pub use constraint::{Constraint, ConstraintSet, StringFormat, KNOWN_RULES};
pub use entity::{
    AuditFields, ConfigurationItem, ConfigurationItemUpdate, NewConfigurationItem,
    NewRelationship, Payload, Relationship, RelationshipUpdate, DEFAULT_CI_STATUS,
};
pub use schema::{
    AttributeDefinition, AttributeType, Schema, SchemaDraft, SchemaKind, UnknownAttributeType,
};
