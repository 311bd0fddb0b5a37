//! In-memory store

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    decode, encode, filter_cis, filter_relationships, filter_schemas, is_active_edge,
    CiRepository, RelationshipRepository, SchemaStore, Store, StoreError, StoreResult,
};
use crate::model::{ConfigurationItem, Relationship, Schema, SchemaKind};

type Table = RwLock<HashMap<Uuid, Vec<u8>>>;

/// Process-local store holding each record as an encoded blob
#[derive(Debug, Default)]
pub struct MemoryStore {
    schemas: Table,
    cis: Table,
    relationships: Table,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

async fn insert_row<T: Serialize>(table: &Table, id: Uuid, record: &T) -> StoreResult<()> {
    let bytes = encode(record)?;
    let mut rows = table.write().await;
    if rows.contains_key(&id) {
        return Err(StoreError::Duplicate(id.to_string()));
    }
    rows.insert(id, bytes);
    Ok(())
}

async fn update_row<T: Serialize>(table: &Table, id: Uuid, record: &T) -> StoreResult<()> {
    let bytes = encode(record)?;
    let mut rows = table.write().await;
    match rows.get_mut(&id) {
        Some(slot) => {
            *slot = bytes;
            Ok(())
        }
        None => Err(StoreError::Missing(id.to_string())),
    }
}

async fn get_row<T: DeserializeOwned>(table: &Table, id: Uuid) -> StoreResult<Option<T>> {
    let rows = table.read().await;
    rows.get(&id).map(|bytes| decode(bytes)).transpose()
}

async fn all_rows<T: DeserializeOwned>(table: &Table) -> StoreResult<Vec<T>> {
    let rows = table.read().await;
    rows.values().map(|bytes| decode(bytes)).collect()
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn insert_schema(&self, schema: &Schema) -> StoreResult<()> {
        insert_row(&self.schemas, schema.id, schema).await
    }

    async fn update_schema(&self, schema: &Schema) -> StoreResult<()> {
        update_row(&self.schemas, schema.id, schema).await
    }

    async fn get_schema(&self, id: Uuid) -> StoreResult<Option<Schema>> {
        get_row(&self.schemas, id).await
    }

    async fn find_active_schema(
        &self,
        kind: SchemaKind,
        name: &str,
    ) -> StoreResult<Option<Schema>> {
        let schemas: Vec<Schema> = all_rows(&self.schemas).await?;
        Ok(schemas
            .into_iter()
            .find(|s| s.active && s.kind == kind && s.name == name))
    }

    async fn list_schemas(
        &self,
        kind: Option<SchemaKind>,
        include_inactive: bool,
    ) -> StoreResult<Vec<Schema>> {
        Ok(filter_schemas(all_rows(&self.schemas).await?, kind, include_inactive))
    }
}

#[async_trait]
impl CiRepository for MemoryStore {
    async fn insert_ci(&self, ci: &ConfigurationItem) -> StoreResult<()> {
        insert_row(&self.cis, ci.id, ci).await
    }

    async fn update_ci(&self, ci: &ConfigurationItem) -> StoreResult<()> {
        update_row(&self.cis, ci.id, ci).await
    }

    async fn get_ci(&self, id: Uuid) -> StoreResult<Option<ConfigurationItem>> {
        get_row(&self.cis, id).await
    }

    async fn list_cis(&self, ci_type: Option<String>) -> StoreResult<Vec<ConfigurationItem>> {
        Ok(filter_cis(all_rows(&self.cis).await?, ci_type.as_deref()))
    }

    async fn delete_ci(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.cis.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl RelationshipRepository for MemoryStore {
    async fn insert_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        insert_row(&self.relationships, relationship.id, relationship).await
    }

    async fn update_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        update_row(&self.relationships, relationship.id, relationship).await
    }

    async fn get_relationship(&self, id: Uuid) -> StoreResult<Option<Relationship>> {
        get_row(&self.relationships, id).await
    }

    async fn find_active_relationship(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relationship_type: &str,
    ) -> StoreResult<Option<Relationship>> {
        let relationships: Vec<Relationship> = all_rows(&self.relationships).await?;
        Ok(relationships
            .into_iter()
            .find(|r| is_active_edge(r, source_id, target_id, relationship_type)))
    }

    async fn list_relationships(&self, ci_id: Option<Uuid>) -> StoreResult<Vec<Relationship>> {
        Ok(filter_relationships(all_rows(&self.relationships).await?, ci_id))
    }

    async fn delete_relationship(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.relationships.write().await.remove(&id).is_some())
    }

    async fn delete_relationships_for_ci(&self, ci_id: Uuid) -> StoreResult<usize> {
        let relationships: Vec<Relationship> = all_rows(&self.relationships).await?;
        let mut rows = self.relationships.write().await;
        let mut removed = 0;
        for relationship in relationships.iter().filter(|r| r.touches(ci_id)) {
            if rows.remove(&relationship.id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AuditFields, Payload, SchemaDraft};

    fn relationship(source: Uuid, target: Uuid, kind: &str) -> Relationship {
        Relationship {
            id: Uuid::new_v4(),
            source_id: source,
            target_id: target,
            relationship_type: kind.to_string(),
            active: true,
            attributes: Payload::new(),
            audit: AuditFields::new("test"),
        }
    }

    #[tokio::test]
    async fn test_schema_insert_and_find() {
        let store = MemoryStore::new();
        let schema = Schema::from_draft(SchemaKind::Ci, SchemaDraft::new("server"), "test");
        store.insert_schema(&schema).await.unwrap();

        let found = store.find_active_schema(SchemaKind::Ci, "server").await.unwrap();
        assert_eq!(found, Some(schema.clone()));
        assert!(store
            .find_active_schema(SchemaKind::Relationship, "server")
            .await
            .unwrap()
            .is_none());

        let dup = store.insert_schema(&schema).await;
        assert!(matches!(dup, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_inactive_schema_is_not_resolved() {
        let store = MemoryStore::new();
        let mut schema = Schema::from_draft(SchemaKind::Ci, SchemaDraft::new("server"), "test");
        schema.active = false;
        store.insert_schema(&schema).await.unwrap();

        assert!(store.find_active_schema(SchemaKind::Ci, "server").await.unwrap().is_none());
        assert_eq!(store.list_schemas(None, false).await.unwrap().len(), 0);
        assert_eq!(store.list_schemas(None, true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = MemoryStore::new();
        let schema = Schema::from_draft(SchemaKind::Ci, SchemaDraft::new("server"), "test");
        assert!(matches!(
            store.update_schema(&schema).await,
            Err(StoreError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_find_active_relationship_is_directional() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store
            .insert_relationship(&relationship(a, b, "depends_on"))
            .await
            .unwrap();

        assert!(store.find_active_relationship(a, b, "depends_on").await.unwrap().is_some());
        assert!(store.find_active_relationship(b, a, "depends_on").await.unwrap().is_none());
        assert!(store.find_active_relationship(a, b, "hosts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_relationships_for_ci() {
        let store = MemoryStore::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.insert_relationship(&relationship(a, b, "hosts")).await.unwrap();
        store.insert_relationship(&relationship(c, a, "hosts")).await.unwrap();
        store.insert_relationship(&relationship(b, c, "hosts")).await.unwrap();

        assert_eq!(store.delete_relationships_for_ci(a).await.unwrap(), 2);
        assert_eq!(store.list_relationships(None).await.unwrap().len(), 1);
    }
}
