//! Write orchestration for configuration items and relationships

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{with_deadline, DEFAULT_STORE_TIMEOUT};
use crate::defaults::apply_defaults;
use crate::error::{CmdbError, Result};
use crate::integrity::would_conflict;
use crate::model::{
    AuditFields, ConfigurationItem, ConfigurationItemUpdate, NewConfigurationItem,
    NewRelationship, Payload, Relationship, RelationshipUpdate, Schema, SchemaKind,
    DEFAULT_CI_STATUS,
};
use crate::store::{CiRepository, RelationshipRepository, SchemaStore, Store};
use crate::validation::{AttributeValidator, ValidationError};

/// A persisted entity together with the non-blocking validation warnings
#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome<T> {
    #[serde(flatten)]
    pub entity: T,
    pub warnings: Vec<ValidationError>,
}

impl<T> WriteOutcome<T> {
    pub fn new(entity: T, warnings: Vec<ValidationError>) -> Self {
        Self { entity, warnings }
    }
}

/// Sequences every CI and relationship write.
///
/// Create: resolve schema -> (relationships only) endpoint and integrity
/// checks -> validate -> apply defaults -> persist. Any stage can end the
/// pipeline, and nothing is written unless every earlier stage passed.
/// Updates load the stored entity, merge the caller's fields and run the
/// same validate -> default -> persist sequence.
///
/// Store failures propagate unchanged and are never retried.
#[derive(Clone)]
pub struct WriteOrchestrator {
    schemas: Arc<dyn SchemaStore>,
    cis: Arc<dyn CiRepository>,
    relationships: Arc<dyn RelationshipRepository>,
    validator: AttributeValidator,
    timeout: Duration,
}

impl WriteOrchestrator {
    pub fn new(
        schemas: Arc<dyn SchemaStore>,
        cis: Arc<dyn CiRepository>,
        relationships: Arc<dyn RelationshipRepository>,
    ) -> Self {
        Self {
            schemas,
            cis,
            relationships,
            validator: AttributeValidator::new(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Use one backend for all three collaborators
    pub fn from_store<S: Store + 'static>(store: Arc<S>) -> Self {
        Self::new(store.clone(), store.clone(), store)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    // ---------------------------------------------------------------------
    // Configuration items
    // ---------------------------------------------------------------------

    pub async fn create_ci(
        &self,
        request: NewConfigurationItem,
        actor: &str,
    ) -> Result<WriteOutcome<ConfigurationItem>> {
        require_name(&request.name)?;
        let schema = self.resolve_schema(SchemaKind::Ci, &request.ci_type).await?;
        let (attributes, warnings) = self.validate_and_default(request.attributes, &schema)?;

        let ci = ConfigurationItem {
            id: Uuid::new_v4(),
            name: request.name,
            ci_type: request.ci_type,
            status: request
                .status
                .unwrap_or_else(|| DEFAULT_CI_STATUS.to_string()),
            attributes,
            audit: AuditFields::new(actor),
        };
        with_deadline(self.timeout, "insert_ci", self.cis.insert_ci(&ci)).await?;

        tracing::info!(
            ci_id = %ci.id,
            ci_type = %ci.ci_type,
            warnings = warnings.len(),
            actor = actor,
            "Configuration item created"
        );
        Ok(WriteOutcome::new(ci, warnings))
    }

    pub async fn update_ci(
        &self,
        id: Uuid,
        update: ConfigurationItemUpdate,
        actor: &str,
    ) -> Result<WriteOutcome<ConfigurationItem>> {
        let mut ci = self.get_ci(id).await?;
        if let Some(name) = &update.name {
            require_name(name)?;
        }
        let schema = self.resolve_schema(SchemaKind::Ci, &ci.ci_type).await?;

        let attributes = update
            .attributes
            .unwrap_or_else(|| Value::Object(ci.attributes.clone()));
        let (attributes, warnings) = self.validate_and_default(attributes, &schema)?;

        if let Some(name) = update.name {
            ci.name = name;
        }
        if let Some(status) = update.status {
            ci.status = status;
        }
        ci.attributes = attributes;
        ci.audit.touch(actor);
        with_deadline(self.timeout, "update_ci", self.cis.update_ci(&ci)).await?;

        tracing::info!(ci_id = %id, warnings = warnings.len(), actor = actor, "Configuration item updated");
        Ok(WriteOutcome::new(ci, warnings))
    }

    pub async fn get_ci(&self, id: Uuid) -> Result<ConfigurationItem> {
        with_deadline(self.timeout, "get_ci", self.cis.get_ci(id))
            .await?
            .ok_or(CmdbError::CiNotFound(id))
    }

    pub async fn list_cis(&self, ci_type: Option<&str>) -> Result<Vec<ConfigurationItem>> {
        with_deadline(
            self.timeout,
            "list_cis",
            self.cis.list_cis(ci_type.map(str::to_string)),
        )
        .await
    }

    /// Delete a CI and every relationship touching it. Returns the number of
    /// relationships removed along with it.
    pub async fn delete_ci(&self, id: Uuid, actor: &str) -> Result<usize> {
        self.get_ci(id).await?;

        let cascaded = with_deadline(
            self.timeout,
            "delete_relationships_for_ci",
            self.relationships.delete_relationships_for_ci(id),
        )
        .await?;
        if !with_deadline(self.timeout, "delete_ci", self.cis.delete_ci(id)).await? {
            return Err(CmdbError::CiNotFound(id));
        }

        tracing::info!(ci_id = %id, relationships = cascaded, actor = actor, "Configuration item deleted");
        Ok(cascaded)
    }

    // ---------------------------------------------------------------------
    // Relationships
    // ---------------------------------------------------------------------

    pub async fn create_relationship(
        &self,
        request: NewRelationship,
        actor: &str,
    ) -> Result<WriteOutcome<Relationship>> {
        let schema = self
            .resolve_schema(SchemaKind::Relationship, &request.relationship_type)
            .await?;

        if request.source_id == request.target_id {
            return Err(CmdbError::invalid_request(
                "source_id and target_id must refer to different configuration items",
            ));
        }
        self.get_ci(request.source_id).await?;
        self.get_ci(request.target_id).await?;

        self.check_integrity(request.source_id, request.target_id, &request.relationship_type)
            .await?;

        let (attributes, warnings) = self.validate_and_default(request.attributes, &schema)?;

        let relationship = Relationship {
            id: Uuid::new_v4(),
            source_id: request.source_id,
            target_id: request.target_id,
            relationship_type: request.relationship_type,
            active: true,
            attributes,
            audit: AuditFields::new(actor),
        };
        with_deadline(
            self.timeout,
            "insert_relationship",
            self.relationships.insert_relationship(&relationship),
        )
        .await?;

        tracing::info!(
            relationship_id = %relationship.id,
            relationship_type = %relationship.relationship_type,
            source_id = %relationship.source_id,
            target_id = %relationship.target_id,
            actor = actor,
            "Relationship created"
        );
        Ok(WriteOutcome::new(relationship, warnings))
    }

    /// Update attributes and/or the active flag. Reactivating an edge runs
    /// the integrity check again.
    pub async fn update_relationship(
        &self,
        id: Uuid,
        update: RelationshipUpdate,
        actor: &str,
    ) -> Result<WriteOutcome<Relationship>> {
        let mut relationship = self.get_relationship(id).await?;
        let schema = self
            .resolve_schema(SchemaKind::Relationship, &relationship.relationship_type)
            .await?;

        if update.active == Some(true) && !relationship.active {
            self.check_integrity(
                relationship.source_id,
                relationship.target_id,
                &relationship.relationship_type,
            )
            .await?;
        }

        let attributes = update
            .attributes
            .unwrap_or_else(|| Value::Object(relationship.attributes.clone()));
        let (attributes, warnings) = self.validate_and_default(attributes, &schema)?;

        if let Some(active) = update.active {
            relationship.active = active;
        }
        relationship.attributes = attributes;
        relationship.audit.touch(actor);
        with_deadline(
            self.timeout,
            "update_relationship",
            self.relationships.update_relationship(&relationship),
        )
        .await?;

        tracing::info!(relationship_id = %id, active = relationship.active, actor = actor, "Relationship updated");
        Ok(WriteOutcome::new(relationship, warnings))
    }

    pub async fn get_relationship(&self, id: Uuid) -> Result<Relationship> {
        with_deadline(
            self.timeout,
            "get_relationship",
            self.relationships.get_relationship(id),
        )
        .await?
        .ok_or(CmdbError::RelationshipNotFound(id))
    }

    pub async fn list_relationships(&self, ci_id: Option<Uuid>) -> Result<Vec<Relationship>> {
        with_deadline(
            self.timeout,
            "list_relationships",
            self.relationships.list_relationships(ci_id),
        )
        .await
    }

    pub async fn delete_relationship(&self, id: Uuid, actor: &str) -> Result<()> {
        let removed = with_deadline(
            self.timeout,
            "delete_relationship",
            self.relationships.delete_relationship(id),
        )
        .await?;
        if !removed {
            return Err(CmdbError::RelationshipNotFound(id));
        }
        tracing::info!(relationship_id = %id, actor = actor, "Relationship deleted");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Pipeline stages
    // ---------------------------------------------------------------------

    async fn resolve_schema(&self, kind: SchemaKind, name: &str) -> Result<Schema> {
        with_deadline(
            self.timeout,
            "find_active_schema",
            self.schemas.find_active_schema(kind, name),
        )
        .await?
        .ok_or_else(|| CmdbError::SchemaNotFound(name.to_string()))
    }

    async fn check_integrity(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relationship_type: &str,
    ) -> Result<()> {
        let conflict = with_deadline(
            self.timeout,
            "find_active_relationship",
            would_conflict(
                self.relationships.as_ref(),
                source_id,
                target_id,
                relationship_type,
            ),
        )
        .await?;

        if conflict {
            tracing::warn!(
                source_id = %source_id,
                target_id = %target_id,
                relationship_type = relationship_type,
                "Rejected relationship: reverse edge exists"
            );
            return Err(CmdbError::RelationshipIntegrityConflict);
        }
        Ok(())
    }

    /// Validate the caller's literal payload, then fill defaults on success
    fn validate_and_default(
        &self,
        attributes: Value,
        schema: &Schema,
    ) -> Result<(Payload, Vec<ValidationError>)> {
        let payload = match AttributeValidator::into_payload(attributes) {
            Ok(payload) => payload,
            Err(result) => {
                tracing::warn!(schema = %schema.name, "Rejected malformed attribute payload");
                return Err(CmdbError::AttributeValidationFailed(result));
            }
        };

        let result = self.validator.validate_payload(&payload, schema);
        tracing::debug!(
            schema = %schema.name,
            errors = result.error_count(),
            warnings = result.warning_count(),
            "Validated attribute payload"
        );
        if !result.is_valid {
            tracing::warn!(
                schema = %schema.name,
                errors = result.error_count(),
                "Rejected attribute payload"
            );
            return Err(CmdbError::AttributeValidationFailed(result));
        }

        Ok((apply_defaults(&payload, schema), result.warnings))
    }
}

fn require_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CmdbError::invalid_request("name is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDefinition, AttributeType, SchemaDraft};
    use crate::service::SchemaService;
    use crate::store::{MemoryStore, MockRelationshipRepository, StoreError, StoreResult};
    use async_trait::async_trait;
    use serde_json::json;

    async fn setup() -> (Arc<MemoryStore>, WriteOrchestrator) {
        let store = Arc::new(MemoryStore::new());
        let schemas = SchemaService::from_store(store.clone());

        let server = SchemaDraft::new("server")
            .with_attribute(
                AttributeDefinition::required("ip_address", AttributeType::String)
                    .with_rule("format", json!("ipv4")),
            )
            .with_attribute(
                AttributeDefinition::required("cpu_cores", AttributeType::Number)
                    .with_rule("min", json!(1)),
            )
            .with_attribute(
                AttributeDefinition::new("environment", AttributeType::String)
                    .with_default(json!("production")),
            );
        schemas
            .create_schema(SchemaKind::Ci, server, "admin")
            .await
            .unwrap();

        let depends_on = SchemaDraft::new("depends_on").with_attribute(
            AttributeDefinition::new("criticality", AttributeType::String)
                .with_rule("enum", json!(["low", "high"]))
                .with_default(json!("low")),
        );
        schemas
            .create_schema(SchemaKind::Relationship, depends_on, "admin")
            .await
            .unwrap();

        let writer = WriteOrchestrator::from_store(store.clone());
        (store, writer)
    }

    fn server(name: &str) -> NewConfigurationItem {
        NewConfigurationItem::new(name, "server")
            .with_attributes(json!({"ip_address": "10.0.0.1", "cpu_cores": 4}))
    }

    #[tokio::test]
    async fn test_create_ci_applies_defaults_after_validation() {
        let (_, writer) = setup().await;
        let created = writer.create_ci(server("web-01"), "alice").await.unwrap();

        assert_eq!(created.entity.status, "active");
        assert_eq!(created.entity.attributes["environment"], json!("production"));
        assert_eq!(created.entity.audit.created_by, "alice");
        assert!(created.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_create_ci_missing_required_is_rejected() {
        let (store, writer) = setup().await;
        let request =
            NewConfigurationItem::new("web-01", "server").with_attributes(json!({"cpu_cores": 4}));

        let err = writer.create_ci(request, "alice").await.unwrap_err();
        let result = err.validation().unwrap();
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "ip_address");
        assert!(store.list_cis(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_ci_extra_key_is_a_warning() {
        let (_, writer) = setup().await;
        let request = NewConfigurationItem::new("web-01", "server").with_attributes(json!({
            "ip_address": "10.0.0.1",
            "cpu_cores": 4,
            "extra_field": "x"
        }));

        let created = writer.create_ci(request, "alice").await.unwrap();
        assert_eq!(created.warnings.len(), 1);
        assert_eq!(created.warnings[0].field, "extra_field");
        assert_eq!(created.entity.attributes["extra_field"], json!("x"));
    }

    #[tokio::test]
    async fn test_create_ci_unknown_type() {
        let (_, writer) = setup().await;
        let err = writer
            .create_ci(NewConfigurationItem::new("x", "mainframe"), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::SchemaNotFound(name) if name == "mainframe"));
    }

    #[tokio::test]
    async fn test_create_ci_malformed_payload() {
        let (_, writer) = setup().await;
        let request = NewConfigurationItem::new("web-01", "server").with_attributes(json!([1, 2]));

        let err = writer.create_ci(request, "alice").await.unwrap_err();
        let result = err.validation().unwrap();
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.errors[0].field, "attributes");
    }

    #[tokio::test]
    async fn test_create_ci_blank_name() {
        let (_, writer) = setup().await;
        let err = writer.create_ci(server("  "), "alice").await.unwrap_err();
        assert!(matches!(err, CmdbError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_update_ci_revalidates_merged_payload() {
        let (_, writer) = setup().await;
        let created = writer.create_ci(server("web-01"), "alice").await.unwrap().entity;

        let update = ConfigurationItemUpdate {
            status: Some("retired".to_string()),
            ..Default::default()
        };
        let updated = writer.update_ci(created.id, update, "bob").await.unwrap().entity;
        assert_eq!(updated.status, "retired");
        assert_eq!(updated.name, "web-01");
        assert_eq!(updated.attributes, created.attributes);
        assert_eq!(updated.audit.updated_by, "bob");

        let bad = ConfigurationItemUpdate {
            attributes: Some(json!({"ip_address": "999.1.1.1", "cpu_cores": 0})),
            ..Default::default()
        };
        let err = writer.update_ci(created.id, bad, "bob").await.unwrap_err();
        assert_eq!(err.validation().unwrap().error_count(), 2);

        let stored = writer.get_ci(created.id).await.unwrap();
        assert_eq!(stored.status, "retired");
    }

    #[tokio::test]
    async fn test_update_ci_under_retired_schema() {
        let (store, writer) = setup().await;
        let created = writer.create_ci(server("web-01"), "alice").await.unwrap().entity;

        let schemas = SchemaService::from_store(store);
        let schema = schemas.list_schemas(Some(SchemaKind::Ci), false).await.unwrap();
        schemas.deactivate_schema(schema[0].id, "admin").await.unwrap();

        let err = writer
            .update_ci(created.id, ConfigurationItemUpdate::default(), "bob")
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::SchemaNotFound(_)));
    }

    #[tokio::test]
    async fn test_relationship_lifecycle() {
        let (_, writer) = setup().await;
        let a = writer.create_ci(server("a"), "alice").await.unwrap().entity;
        let b = writer.create_ci(server("b"), "alice").await.unwrap().entity;

        let created = writer
            .create_relationship(NewRelationship::new(a.id, b.id, "depends_on"), "alice")
            .await
            .unwrap()
            .entity;
        assert!(created.active);
        assert_eq!(created.attributes["criticality"], json!("low"));

        let reverse = writer
            .create_relationship(NewRelationship::new(b.id, a.id, "depends_on"), "alice")
            .await
            .unwrap_err();
        assert!(matches!(reverse, CmdbError::RelationshipIntegrityConflict));

        // Same direction again is not a conflict
        writer
            .create_relationship(NewRelationship::new(a.id, b.id, "depends_on"), "alice")
            .await
            .unwrap();

        assert_eq!(writer.list_relationships(Some(a.id)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_integrity_runs_before_validation() {
        let (_, writer) = setup().await;
        let a = writer.create_ci(server("a"), "alice").await.unwrap().entity;
        let b = writer.create_ci(server("b"), "alice").await.unwrap().entity;
        writer
            .create_relationship(NewRelationship::new(a.id, b.id, "depends_on"), "alice")
            .await
            .unwrap();

        let request = NewRelationship::new(b.id, a.id, "depends_on")
            .with_attributes(json!({"criticality": "extreme"}));
        let err = writer.create_relationship(request, "alice").await.unwrap_err();
        assert!(matches!(err, CmdbError::RelationshipIntegrityConflict));
    }

    #[tokio::test]
    async fn test_relationship_endpoint_checks() {
        let (_, writer) = setup().await;
        let a = writer.create_ci(server("a"), "alice").await.unwrap().entity;

        let self_loop = writer
            .create_relationship(NewRelationship::new(a.id, a.id, "depends_on"), "alice")
            .await
            .unwrap_err();
        assert!(matches!(self_loop, CmdbError::InvalidRequest(_)));

        let ghost = Uuid::new_v4();
        let missing = writer
            .create_relationship(NewRelationship::new(a.id, ghost, "depends_on"), "alice")
            .await
            .unwrap_err();
        assert!(matches!(missing, CmdbError::CiNotFound(id) if id == ghost));
    }

    #[tokio::test]
    async fn test_reactivation_rechecks_integrity() {
        let (_, writer) = setup().await;
        let a = writer.create_ci(server("a"), "alice").await.unwrap().entity;
        let b = writer.create_ci(server("b"), "alice").await.unwrap().entity;

        let forward = writer
            .create_relationship(NewRelationship::new(a.id, b.id, "depends_on"), "alice")
            .await
            .unwrap()
            .entity;
        let deactivate = RelationshipUpdate {
            active: Some(false),
            ..Default::default()
        };
        writer
            .update_relationship(forward.id, deactivate, "alice")
            .await
            .unwrap();

        writer
            .create_relationship(NewRelationship::new(b.id, a.id, "depends_on"), "alice")
            .await
            .unwrap();

        let reactivate = RelationshipUpdate {
            active: Some(true),
            ..Default::default()
        };
        let err = writer
            .update_relationship(forward.id, reactivate, "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::RelationshipIntegrityConflict));
    }

    #[tokio::test]
    async fn test_delete_ci_cascades() {
        let (_, writer) = setup().await;
        let a = writer.create_ci(server("a"), "alice").await.unwrap().entity;
        let b = writer.create_ci(server("b"), "alice").await.unwrap().entity;
        let c = writer.create_ci(server("c"), "alice").await.unwrap().entity;
        writer
            .create_relationship(NewRelationship::new(a.id, b.id, "depends_on"), "alice")
            .await
            .unwrap();
        writer
            .create_relationship(NewRelationship::new(b.id, c.id, "depends_on"), "alice")
            .await
            .unwrap();

        assert_eq!(writer.delete_ci(a.id, "alice").await.unwrap(), 1);
        assert!(matches!(
            writer.get_ci(a.id).await,
            Err(CmdbError::CiNotFound(_))
        ));
        assert_eq!(writer.list_relationships(None).await.unwrap().len(), 1);
        assert!(matches!(
            writer.delete_ci(a.id, "alice").await,
            Err(CmdbError::CiNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_persistence_failure_propagates() {
        let (store, _) = setup().await;
        let a = WriteOrchestrator::from_store(store.clone())
            .create_ci(server("a"), "alice")
            .await
            .unwrap()
            .entity;
        let b = WriteOrchestrator::from_store(store.clone())
            .create_ci(server("b"), "alice")
            .await
            .unwrap()
            .entity;

        let mut relationships = MockRelationshipRepository::new();
        relationships
            .expect_find_active_relationship()
            .returning(|_, _, _| Ok(None));
        relationships
            .expect_insert_relationship()
            .times(1)
            .returning(|_| Err(StoreError::Backend("disk full".to_string())));

        let writer = WriteOrchestrator::new(store.clone(), store, Arc::new(relationships));
        let err = writer
            .create_relationship(NewRelationship::new(a.id, b.id, "depends_on"), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::Store(StoreError::Backend(_))));
    }

    struct SlowSchemas;

    #[async_trait]
    impl SchemaStore for SlowSchemas {
        async fn insert_schema(&self, _: &Schema) -> StoreResult<()> {
            Ok(())
        }

        async fn update_schema(&self, _: &Schema) -> StoreResult<()> {
            Ok(())
        }

        async fn get_schema(&self, _: Uuid) -> StoreResult<Option<Schema>> {
            Ok(None)
        }

        async fn find_active_schema(&self, _: SchemaKind, _: &str) -> StoreResult<Option<Schema>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }

        async fn list_schemas(&self, _: Option<SchemaKind>, _: bool) -> StoreResult<Vec<Schema>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_store_timeout() {
        let store = Arc::new(MemoryStore::new());
        let writer = WriteOrchestrator::new(Arc::new(SlowSchemas), store.clone(), store)
            .with_timeout(Duration::from_millis(20));

        let err = writer.create_ci(server("a"), "alice").await.unwrap_err();
        assert!(matches!(err, CmdbError::Store(StoreError::Timeout(_))));
    }
}
