//! Embedded on-disk store backed by sled
//!
//! One tree per record kind, keyed by the record's UUID bytes, values are
//! JSON-encoded records.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use uuid::Uuid;

use super::{
    decode, encode, filter_cis, filter_relationships, filter_schemas, is_active_edge,
    CiRepository, RelationshipRepository, SchemaStore, Store, StoreError, StoreResult,
};
use crate::model::{ConfigurationItem, Relationship, Schema, SchemaKind};

const SCHEMAS_TREE: &str = "schemas";
const CIS_TREE: &str = "configuration_items";
const RELATIONSHIPS_TREE: &str = "relationships";

pub struct SledStore {
    db: sled::Db,
    schemas: sled::Tree,
    cis: sled::Tree,
    relationships: sled::Tree,
}

impl SledStore {
    /// Open (or create) a store at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// A store that lives in a temporary directory and is removed on drop
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> StoreResult<Self> {
        Ok(Self {
            schemas: db.open_tree(SCHEMAS_TREE)?,
            cis: db.open_tree(CIS_TREE)?,
            relationships: db.open_tree(RELATIONSHIPS_TREE)?,
            db,
        })
    }
}

fn insert_row<T: Serialize>(tree: &sled::Tree, id: Uuid, record: &T) -> StoreResult<()> {
    let bytes = encode(record)?;
    tree.compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(bytes))?
        .map_err(|_| StoreError::Duplicate(id.to_string()))
}

/// Replace an existing row. The swap is conditional on the row read just
/// before, so a concurrent delete wins and the record is not brought back.
fn update_row<T: Serialize>(tree: &sled::Tree, id: Uuid, record: &T) -> StoreResult<()> {
    let bytes = encode(record)?;
    let mut current = tree.get(id.as_bytes())?;

    loop {
        let old = match current {
            Some(old) => old,
            None => return Err(StoreError::Missing(id.to_string())),
        };
        match tree.compare_and_swap(id.as_bytes(), Some(&old), Some(bytes.clone()))? {
            Ok(()) => return Ok(()),
            Err(conflict) => current = conflict.current,
        }
    }
}

fn get_row<T: DeserializeOwned>(tree: &sled::Tree, id: Uuid) -> StoreResult<Option<T>> {
    tree.get(id.as_bytes())?
        .map(|bytes| decode(&bytes))
        .transpose()
}

fn all_rows<T: DeserializeOwned>(tree: &sled::Tree) -> StoreResult<Vec<T>> {
    let mut rows = Vec::new();
    for entry in tree.iter() {
        let (_, bytes) = entry?;
        rows.push(decode(&bytes)?);
    }
    Ok(rows)
}

#[async_trait]
impl SchemaStore for SledStore {
    async fn insert_schema(&self, schema: &Schema) -> StoreResult<()> {
        insert_row(&self.schemas, schema.id, schema)
    }

    async fn update_schema(&self, schema: &Schema) -> StoreResult<()> {
        update_row(&self.schemas, schema.id, schema)
    }

    async fn get_schema(&self, id: Uuid) -> StoreResult<Option<Schema>> {
        get_row(&self.schemas, id)
    }

    async fn find_active_schema(
        &self,
        kind: SchemaKind,
        name: &str,
    ) -> StoreResult<Option<Schema>> {
        let schemas: Vec<Schema> = all_rows(&self.schemas)?;
        Ok(schemas
            .into_iter()
            .find(|s| s.active && s.kind == kind && s.name == name))
    }

    async fn list_schemas(
        &self,
        kind: Option<SchemaKind>,
        include_inactive: bool,
    ) -> StoreResult<Vec<Schema>> {
        Ok(filter_schemas(all_rows(&self.schemas)?, kind, include_inactive))
    }
}

#[async_trait]
impl CiRepository for SledStore {
    async fn insert_ci(&self, ci: &ConfigurationItem) -> StoreResult<()> {
        insert_row(&self.cis, ci.id, ci)
    }

    async fn update_ci(&self, ci: &ConfigurationItem) -> StoreResult<()> {
        update_row(&self.cis, ci.id, ci)
    }

    async fn get_ci(&self, id: Uuid) -> StoreResult<Option<ConfigurationItem>> {
        get_row(&self.cis, id)
    }

    async fn list_cis(&self, ci_type: Option<String>) -> StoreResult<Vec<ConfigurationItem>> {
        Ok(filter_cis(all_rows(&self.cis)?, ci_type.as_deref()))
    }

    async fn delete_ci(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.cis.remove(id.as_bytes())?.is_some())
    }
}

#[async_trait]
impl RelationshipRepository for SledStore {
    async fn insert_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        insert_row(&self.relationships, relationship.id, relationship)
    }

    async fn update_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        update_row(&self.relationships, relationship.id, relationship)
    }

    async fn get_relationship(&self, id: Uuid) -> StoreResult<Option<Relationship>> {
        get_row(&self.relationships, id)
    }

    async fn find_active_relationship(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relationship_type: &str,
    ) -> StoreResult<Option<Relationship>> {
        let relationships: Vec<Relationship> = all_rows(&self.relationships)?;
        Ok(relationships
            .into_iter()
            .find(|r| is_active_edge(r, source_id, target_id, relationship_type)))
    }

    async fn list_relationships(&self, ci_id: Option<Uuid>) -> StoreResult<Vec<Relationship>> {
        Ok(filter_relationships(all_rows(&self.relationships)?, ci_id))
    }

    async fn delete_relationship(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.relationships.remove(id.as_bytes())?.is_some())
    }

    async fn delete_relationships_for_ci(&self, ci_id: Uuid) -> StoreResult<usize> {
        let relationships: Vec<Relationship> = all_rows(&self.relationships)?;
        let mut removed = 0;
        for relationship in relationships.iter().filter(|r| r.touches(ci_id)) {
            if self.relationships.remove(relationship.id.as_bytes())?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Store for SledStore {
    fn backend_name(&self) -> &'static str {
        "sled"
    }

    async fn flush(&self) -> StoreResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
