//! Persistence collaborators
//!
//! The write path talks to storage only through the traits in this module.
//! Stores receive fully validated, fully defaulted entities and persist them
//! as opaque JSON blobs; they never interpret attribute payloads.
//!
//! Two backends are provided:
//! - [`MemoryStore`]: process-local maps, used for tests and ephemeral runs
//! - [`SledStore`]: embedded on-disk storage

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{ConfigurationItem, Relationship, Schema, SchemaKind};

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend itself failed (I/O, corruption, ...)
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Insert of a record whose id is already stored
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Update of a record that is not stored
    #[error("Record not found: {0}")]
    Missing(String),

    /// A store call exceeded the configured deadline
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write access to type schemas
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn insert_schema(&self, schema: &Schema) -> StoreResult<()>;

    async fn update_schema(&self, schema: &Schema) -> StoreResult<()>;

    async fn get_schema(&self, id: Uuid) -> StoreResult<Option<Schema>>;

    /// The active schema of `kind` named `name`, if any
    async fn find_active_schema(&self, kind: SchemaKind, name: &str)
        -> StoreResult<Option<Schema>>;

    /// Schemas ordered by creation time
    async fn list_schemas(
        &self,
        kind: Option<SchemaKind>,
        include_inactive: bool,
    ) -> StoreResult<Vec<Schema>>;
}

/// Read/write access to configuration items
#[async_trait]
pub trait CiRepository: Send + Sync {
    async fn insert_ci(&self, ci: &ConfigurationItem) -> StoreResult<()>;

    async fn update_ci(&self, ci: &ConfigurationItem) -> StoreResult<()>;

    async fn get_ci(&self, id: Uuid) -> StoreResult<Option<ConfigurationItem>>;

    /// Items ordered by creation time, optionally restricted to one type
    async fn list_cis(&self, ci_type: Option<String>) -> StoreResult<Vec<ConfigurationItem>>;

    /// Returns whether a record was removed
    async fn delete_ci(&self, id: Uuid) -> StoreResult<bool>;
}

/// Read/write access to relationships
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    async fn insert_relationship(&self, relationship: &Relationship) -> StoreResult<()>;

    async fn update_relationship(&self, relationship: &Relationship) -> StoreResult<()>;

    async fn get_relationship(&self, id: Uuid) -> StoreResult<Option<Relationship>>;

    /// The active edge `source -> target` of the given type, if any
    async fn find_active_relationship(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relationship_type: &str,
    ) -> StoreResult<Option<Relationship>>;

    /// Relationships ordered by creation time, optionally restricted to
    /// edges touching one CI
    async fn list_relationships(&self, ci_id: Option<Uuid>) -> StoreResult<Vec<Relationship>>;

    /// Returns whether a record was removed
    async fn delete_relationship(&self, id: Uuid) -> StoreResult<bool>;

    /// Remove every edge touching `ci_id`; returns how many were removed
    async fn delete_relationships_for_ci(&self, ci_id: Uuid) -> StoreResult<usize>;
}

/// A backend that provides all three collaborators
#[async_trait]
pub trait Store: SchemaStore + CiRepository + RelationshipRepository {
    /// Short backend name for health reporting
    fn backend_name(&self) -> &'static str;

    /// Make all writes durable
    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

pub(crate) fn encode<T: Serialize>(record: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub(crate) fn filter_schemas(
    mut schemas: Vec<Schema>,
    kind: Option<SchemaKind>,
    include_inactive: bool,
) -> Vec<Schema> {
    schemas.retain(|s| kind.map_or(true, |k| s.kind == k) && (include_inactive || s.active));
    schemas.sort_by(|a, b| (a.audit.created_at, a.id).cmp(&(b.audit.created_at, b.id)));
    schemas
}

pub(crate) fn filter_cis(
    mut cis: Vec<ConfigurationItem>,
    ci_type: Option<&str>,
) -> Vec<ConfigurationItem> {
    cis.retain(|ci| ci_type.map_or(true, |t| ci.ci_type == t));
    cis.sort_by(|a, b| (a.audit.created_at, a.id).cmp(&(b.audit.created_at, b.id)));
    cis
}

pub(crate) fn filter_relationships(
    mut relationships: Vec<Relationship>,
    ci_id: Option<Uuid>,
) -> Vec<Relationship> {
    relationships.retain(|r| ci_id.map_or(true, |id| r.touches(id)));
    relationships.sort_by(|a, b| (a.audit.created_at, a.id).cmp(&(b.audit.created_at, b.id)));
    relationships
}

pub(crate) fn is_active_edge(
    relationship: &Relationship,
    source_id: Uuid,
    target_id: Uuid,
    relationship_type: &str,
) -> bool {
    relationship.active
        && relationship.source_id == source_id
        && relationship.target_id == target_id
        && relationship.relationship_type == relationship_type
}
