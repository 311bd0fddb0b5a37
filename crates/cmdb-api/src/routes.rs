//! Route definitions
//!
//! - `GET /health`
//! - `/api/v1/schemas/...` schema management and dry-run validation
//! - `/api/v1/templates/...` built-in template catalog
//! - `/api/v1/cis/...` configuration items
//! - `/api/v1/relationships/...` relationships
//!
//! Every write goes through the core services; handlers only decode the
//! request, pick the actor and map the outcome to a status code.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use cmdb_core::{
    model::{
        ConfigurationItem, ConfigurationItemUpdate, NewConfigurationItem, NewRelationship,
        Relationship, RelationshipUpdate,
    },
    service::{SchemaService, WriteOrchestrator, WriteOutcome},
    templates::{self, Template},
    Schema, SchemaDraft, SchemaKind, Store, ValidationResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::Actor;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub schemas: SchemaService,
    pub writer: WriteOrchestrator,
    pub store: Arc<dyn Store>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new<S: Store + 'static>(store: Arc<S>, timeout: Duration) -> Self {
        Self {
            schemas: SchemaService::from_store(store.clone()).with_timeout(timeout),
            writer: WriteOrchestrator::from_store(store.clone()).with_timeout(timeout),
            store,
            start_time: Instant::now(),
        }
    }
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Schemas
        .route(
            "/api/v1/schemas/ci",
            get(list_ci_schemas).post(create_ci_schema),
        )
        .route(
            "/api/v1/schemas/relationship",
            get(list_relationship_schemas).post(create_relationship_schema),
        )
        .route(
            "/api/v1/schemas/:id",
            get(get_schema).put(update_schema).delete(deactivate_schema),
        )
        .route("/api/v1/schemas/:id/validate", post(validate_payload))
        // Templates
        .route("/api/v1/templates", get(list_templates))
        .route("/api/v1/templates/:name/instantiate", post(instantiate_template))
        // Configuration items
        .route("/api/v1/cis", get(list_cis).post(create_ci))
        .route(
            "/api/v1/cis/:id",
            get(get_ci).put(update_ci).delete(delete_ci),
        )
        // Relationships
        .route(
            "/api/v1/relationships",
            get(list_relationships).post(create_relationship),
        )
        .route(
            "/api/v1/relationships/:id",
            get(get_relationship)
                .put(update_relationship)
                .delete(delete_relationship),
        )
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        backend: state.store.backend_name().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct SchemaListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

async fn list_schemas_of(
    state: &AppState,
    kind: SchemaKind,
    query: Result<Query<SchemaListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Schema>>> {
    let Query(query) = query?;
    let schemas = state
        .schemas
        .list_schemas(Some(kind), query.include_inactive)
        .await?;
    Ok(Json(schemas))
}

async fn create_schema_of(
    state: &AppState,
    kind: SchemaKind,
    actor: Actor,
    body: Result<Json<SchemaDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WriteOutcome<Schema>>)> {
    let Json(draft) = body?;
    let created = state
        .schemas
        .create_schema(kind, draft, actor.as_str())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/schemas/ci
pub async fn list_ci_schemas(
    State(state): State<AppState>,
    query: Result<Query<SchemaListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Schema>>> {
    list_schemas_of(&state, SchemaKind::Ci, query).await
}

/// POST /api/v1/schemas/ci
pub async fn create_ci_schema(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<SchemaDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WriteOutcome<Schema>>)> {
    create_schema_of(&state, SchemaKind::Ci, actor, body).await
}

/// GET /api/v1/schemas/relationship
pub async fn list_relationship_schemas(
    State(state): State<AppState>,
    query: Result<Query<SchemaListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Schema>>> {
    list_schemas_of(&state, SchemaKind::Relationship, query).await
}

/// POST /api/v1/schemas/relationship
pub async fn create_relationship_schema(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<SchemaDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WriteOutcome<Schema>>)> {
    create_schema_of(&state, SchemaKind::Relationship, actor, body).await
}

pub async fn get_schema(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Schema>> {
    let Path(id) = id?;
    Ok(Json(state.schemas.get_schema(id).await?))
}

/// PUT /api/v1/schemas/:id - replaces name, description and the full attribute list
pub async fn update_schema(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SchemaDraft>, JsonRejection>,
) -> ApiResult<Json<WriteOutcome<Schema>>> {
    let Path(id) = id?;
    let Json(draft) = body?;
    let updated = state.schemas.update_schema(id, draft, actor.as_str()).await?;
    Ok(Json(updated))
}

/// DELETE /api/v1/schemas/:id - logical retirement, the record is kept
pub async fn deactivate_schema(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Schema>> {
    let Path(id) = id?;
    Ok(Json(state.schemas.deactivate_schema(id, actor.as_str()).await?))
}

/// POST /api/v1/schemas/:id/validate - dry run, never writes
pub async fn validate_payload(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ValidationResult>> {
    let Path(id) = id?;
    let Json(payload) = body?;
    Ok(Json(state.schemas.validate_payload(id, &payload).await?))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TemplateQuery {
    pub kind: Option<SchemaKind>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InstantiateRequest {
    /// Name of the new schema; defaults to the template name
    pub name: Option<String>,
}

pub async fn list_templates(
    query: Result<Query<TemplateQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Template>>> {
    let Query(query) = query?;
    let catalog = match query.kind {
        Some(kind) => templates::catalog_for(kind),
        None => templates::catalog(),
    };
    Ok(Json(catalog))
}

pub async fn instantiate_template(
    State(state): State<AppState>,
    actor: Actor,
    name: Result<Path<String>, PathRejection>,
    body: Option<Json<InstantiateRequest>>,
) -> ApiResult<(StatusCode, Json<WriteOutcome<Schema>>)> {
    let Path(template) = name?;
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let new_name = request.name.unwrap_or_else(|| template.clone());
    let created = state
        .schemas
        .create_from_template(&template, &new_name, actor.as_str())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// ---------------------------------------------------------------------------
// Configuration items
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CiListQuery {
    pub ci_type: Option<String>,
}

pub async fn list_cis(
    State(state): State<AppState>,
    query: Result<Query<CiListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ConfigurationItem>>> {
    let Query(query) = query?;
    Ok(Json(state.writer.list_cis(query.ci_type.as_deref()).await?))
}

pub async fn create_ci(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<NewConfigurationItem>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WriteOutcome<ConfigurationItem>>)> {
    let Json(request) = body?;
    let created = state.writer.create_ci(request, actor.as_str()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_ci(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<ConfigurationItem>> {
    let Path(id) = id?;
    Ok(Json(state.writer.get_ci(id).await?))
}

pub async fn update_ci(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<ConfigurationItemUpdate>, JsonRejection>,
) -> ApiResult<Json<WriteOutcome<ConfigurationItem>>> {
    let Path(id) = id?;
    let Json(update) = body?;
    Ok(Json(state.writer.update_ci(id, update, actor.as_str()).await?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CiDeleted {
    pub id: Uuid,
    pub relationships_removed: usize,
}

/// DELETE /api/v1/cis/:id - also removes every relationship touching the item
pub async fn delete_ci(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<CiDeleted>> {
    let Path(id) = id?;
    let relationships_removed = state.writer.delete_ci(id, actor.as_str()).await?;
    Ok(Json(CiDeleted {
        id,
        relationships_removed,
    }))
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RelationshipListQuery {
    pub ci_id: Option<Uuid>,
}

pub async fn list_relationships(
    State(state): State<AppState>,
    query: Result<Query<RelationshipListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Relationship>>> {
    let Query(query) = query?;
    Ok(Json(state.writer.list_relationships(query.ci_id).await?))
}

pub async fn create_relationship(
    State(state): State<AppState>,
    actor: Actor,
    body: Result<Json<NewRelationship>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<WriteOutcome<Relationship>>)> {
    let Json(request) = body?;
    let created = state
        .writer
        .create_relationship(request, actor.as_str())
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_relationship(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Json<Relationship>> {
    let Path(id) = id?;
    Ok(Json(state.writer.get_relationship(id).await?))
}

pub async fn update_relationship(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<RelationshipUpdate>, JsonRejection>,
) -> ApiResult<Json<WriteOutcome<Relationship>>> {
    let Path(id) = id?;
    let Json(update) = body?;
    Ok(Json(
        state
            .writer
            .update_relationship(id, update, actor.as_str())
            .await?,
    ))
}

pub async fn delete_relationship(
    State(state): State<AppState>,
    actor: Actor,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id?;
    state.writer.delete_relationship(id, actor.as_str()).await?;
    Ok(StatusCode::NO_CONTENT)
}
