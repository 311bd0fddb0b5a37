//! Schema management

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{with_deadline, WriteOutcome, DEFAULT_STORE_TIMEOUT};
use crate::error::{CmdbError, Result};
use crate::model::{Schema, SchemaDraft, SchemaKind};
use crate::store::{SchemaStore, Store};
use crate::templates;
use crate::validation::{AttributeValidator, SchemaDefinitionValidator, ValidationResult};

/// Creates, updates and retires type schemas.
///
/// Every create and update runs the definition validator first; a definition
/// with errors is never stored. Updates replace the attribute list wholesale
/// for both CI and relationship schemas.
#[derive(Clone)]
pub struct SchemaService {
    store: Arc<dyn SchemaStore>,
    definitions: SchemaDefinitionValidator,
    timeout: Duration,
}

impl SchemaService {
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self {
            store,
            definitions: SchemaDefinitionValidator::new(),
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn from_store<S: Store + 'static>(store: Arc<S>) -> Self {
        Self::new(store)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn create_schema(
        &self,
        kind: SchemaKind,
        draft: SchemaDraft,
        actor: &str,
    ) -> Result<WriteOutcome<Schema>> {
        let checked = self.check_definition(&draft)?;
        self.ensure_name_free(kind, &draft.name, None).await?;

        let schema = Schema::from_draft(kind, draft, actor);
        with_deadline(self.timeout, "insert_schema", self.store.insert_schema(&schema)).await?;

        tracing::info!(
            schema_id = %schema.id,
            kind = %kind,
            name = %schema.name,
            attributes = schema.attributes.len(),
            actor = actor,
            "Schema created"
        );
        Ok(WriteOutcome::new(schema, checked.warnings))
    }

    pub async fn update_schema(
        &self,
        id: Uuid,
        draft: SchemaDraft,
        actor: &str,
    ) -> Result<WriteOutcome<Schema>> {
        let mut schema = self.get_schema(id).await?;
        let checked = self.check_definition(&draft)?;
        if draft.name != schema.name && schema.active {
            self.ensure_name_free(schema.kind, &draft.name, Some(id)).await?;
        }

        schema.name = draft.name;
        schema.description = draft.description;
        schema.attributes = draft.attributes;
        schema.audit.touch(actor);
        with_deadline(self.timeout, "update_schema", self.store.update_schema(&schema)).await?;

        tracing::info!(schema_id = %id, name = %schema.name, actor = actor, "Schema updated");
        Ok(WriteOutcome::new(schema, checked.warnings))
    }

    /// Logically retire a schema. Entities that reference it are left alone,
    /// but no further writes resolve against it.
    pub async fn deactivate_schema(&self, id: Uuid, actor: &str) -> Result<Schema> {
        let mut schema = self.get_schema(id).await?;
        if schema.active {
            schema.active = false;
            schema.audit.touch(actor);
            with_deadline(self.timeout, "update_schema", self.store.update_schema(&schema))
                .await?;
            tracing::info!(schema_id = %id, name = %schema.name, actor = actor, "Schema deactivated");
        }
        Ok(schema)
    }

    pub async fn get_schema(&self, id: Uuid) -> Result<Schema> {
        with_deadline(self.timeout, "get_schema", self.store.get_schema(id))
            .await?
            .ok_or_else(|| CmdbError::SchemaNotFound(id.to_string()))
    }

    pub async fn list_schemas(
        &self,
        kind: Option<SchemaKind>,
        include_inactive: bool,
    ) -> Result<Vec<Schema>> {
        with_deadline(
            self.timeout,
            "list_schemas",
            self.store.list_schemas(kind, include_inactive),
        )
        .await
    }

    /// Clone a built-in template into a new schema called `new_name`
    pub async fn create_from_template(
        &self,
        template_name: &str,
        new_name: &str,
        actor: &str,
    ) -> Result<WriteOutcome<Schema>> {
        let template = templates::find(template_name)
            .ok_or_else(|| CmdbError::TemplateNotFound(template_name.to_string()))?;
        self.create_schema(template.kind, template.instantiate(new_name), actor)
            .await
    }

    /// Dry-run a payload against a stored schema without writing anything
    pub async fn validate_payload(&self, id: Uuid, payload: &Value) -> Result<ValidationResult> {
        let schema = self.get_schema(id).await?;
        Ok(AttributeValidator::new().validate(payload, &schema))
    }

    fn check_definition(&self, draft: &SchemaDraft) -> Result<ValidationResult> {
        let result = self.definitions.validate_draft(draft);
        if !result.is_valid {
            tracing::warn!(
                name = %draft.name,
                errors = result.error_count(),
                "Rejected schema definition"
            );
            return Err(CmdbError::SchemaDefinitionInvalid(result));
        }
        Ok(result)
    }

    async fn ensure_name_free(
        &self,
        kind: SchemaKind,
        name: &str,
        except: Option<Uuid>,
    ) -> Result<()> {
        let existing = with_deadline(
            self.timeout,
            "find_active_schema",
            self.store.find_active_schema(kind, name),
        )
        .await?;

        match existing {
            Some(schema) if Some(schema.id) != except => Err(CmdbError::SchemaNameConflict {
                kind,
                name: name.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDefinition, AttributeType};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> SchemaService {
        SchemaService::from_store(Arc::new(MemoryStore::new()))
    }

    fn server_draft() -> SchemaDraft {
        SchemaDraft::new("server")
            .with_attribute(
                AttributeDefinition::required("ip_address", AttributeType::String)
                    .with_rule("format", json!("ipv4")),
            )
            .with_attribute(
                AttributeDefinition::required("cpu_cores", AttributeType::Number)
                    .with_rule("min", json!(1)),
            )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = service();
        let created = service
            .create_schema(SchemaKind::Ci, server_draft(), "admin")
            .await
            .unwrap();
        assert!(created.warnings.is_empty());
        assert_eq!(created.entity.audit.created_by, "admin");

        let fetched = service.get_schema(created.entity.id).await.unwrap();
        assert_eq!(fetched, created.entity);
    }

    #[tokio::test]
    async fn test_invalid_definition_is_not_stored() {
        let service = service();
        let draft = SchemaDraft::new("server")
            .with_attribute(AttributeDefinition::new("x", AttributeType::String))
            .with_attribute(AttributeDefinition::new("x", AttributeType::String));

        let err = service
            .create_schema(SchemaKind::Ci, draft, "admin")
            .await
            .unwrap_err();
        let result = err.validation().unwrap();
        assert!(result.errors[0].message.contains("Duplicate attribute name"));
        assert!(service.list_schemas(None, true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_conflict_is_per_kind() {
        let service = service();
        service
            .create_schema(SchemaKind::Ci, SchemaDraft::new("link"), "admin")
            .await
            .unwrap();

        let err = service
            .create_schema(SchemaKind::Ci, SchemaDraft::new("link"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::SchemaNameConflict { .. }));

        service
            .create_schema(SchemaKind::Relationship, SchemaDraft::new("link"), "admin")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_replaces_attributes() {
        let service = service();
        let created = service
            .create_schema(SchemaKind::Relationship, server_draft(), "admin")
            .await
            .unwrap();

        let replacement = SchemaDraft::new("server")
            .with_description("slimmed")
            .with_attribute(AttributeDefinition::new("rack", AttributeType::String));
        let updated = service
            .update_schema(created.entity.id, replacement, "ops")
            .await
            .unwrap()
            .entity;

        assert_eq!(updated.attributes.len(), 1);
        assert_eq!(updated.attributes[0].name, "rack");
        assert_eq!(updated.description, "slimmed");
        assert_eq!(updated.audit.updated_by, "ops");
        assert_eq!(updated.audit.created_by, "admin");
    }

    #[tokio::test]
    async fn test_rename_into_taken_name() {
        let service = service();
        service
            .create_schema(SchemaKind::Ci, SchemaDraft::new("server"), "admin")
            .await
            .unwrap();
        let other = service
            .create_schema(SchemaKind::Ci, SchemaDraft::new("database"), "admin")
            .await
            .unwrap();

        let err = service
            .update_schema(other.entity.id, SchemaDraft::new("server"), "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::SchemaNameConflict { .. }));

        // Keeping its own name is not a conflict
        service
            .update_schema(other.entity.id, SchemaDraft::new("database"), "admin")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deactivate_frees_name() {
        let service = service();
        let created = service
            .create_schema(SchemaKind::Ci, SchemaDraft::new("server"), "admin")
            .await
            .unwrap();

        let retired = service.deactivate_schema(created.entity.id, "admin").await.unwrap();
        assert!(!retired.active);
        assert!(service.list_schemas(Some(SchemaKind::Ci), false).await.unwrap().is_empty());

        service
            .create_schema(SchemaKind::Ci, SchemaDraft::new("server"), "admin")
            .await
            .unwrap();
        assert_eq!(service.list_schemas(None, true).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_from_template() {
        let service = service();
        let created = service
            .create_from_template("depends_on", "requires", "admin")
            .await
            .unwrap()
            .entity;
        assert_eq!(created.kind, SchemaKind::Relationship);
        assert_eq!(created.name, "requires");

        let err = service
            .create_from_template("mainframe", "mf", "admin")
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn test_validate_payload_dry_run() {
        let service = service();
        let schema = service
            .create_schema(SchemaKind::Ci, server_draft(), "admin")
            .await
            .unwrap()
            .entity;

        let result = service
            .validate_payload(schema.id, &json!({"cpu_cores": 4}))
            .await
            .unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].field, "ip_address");

        let err = service
            .validate_payload(Uuid::new_v4(), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CmdbError::SchemaNotFound(_)));
    }
}
