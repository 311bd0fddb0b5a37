//! Core library for the schema-driven CMDB
//!
//! Configuration Items (CIs) and the typed relationships between them carry
//! attribute payloads whose shape is declared at runtime by administrators
//! through type schemas. This crate owns everything that gives those payloads
//! meaning:
//!
//! - **Model** (`model/`): schemas, attribute definitions, constraint rules,
//!   configuration items and relationships.
//! - **Validation** (`validation/`): the attribute validator that judges a
//!   payload against a schema, and the definition validator that judges a
//!   schema before it is saved.
//! - **Defaults** (`defaults`): fills absent attributes from schema defaults.
//! - **Integrity** (`integrity`): rejects a relationship that directly
//!   contradicts an existing one.
//! - **Services** (`service/`): the write orchestrator for CIs and
//!   relationships, and schema management.
//! - **Templates** (`templates`): built-in schema templates.
//! - **Store** (`store/`): persistence traits with in-memory and sled backends.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cmdb_core::{
//!     model::{NewConfigurationItem, SchemaKind},
//!     service::{SchemaService, WriteOrchestrator},
//!     store::MemoryStore,
//! };
//!
//! # async fn run() -> Result<(), cmdb_core::CmdbError> {
//! let store = Arc::new(MemoryStore::new());
//! let schemas = SchemaService::from_store(store.clone());
//! schemas.create_from_template("server", "server", "admin").await?;
//!
//! let writer = WriteOrchestrator::from_store(store);
//! let created = writer
//!     .create_ci(
//!         NewConfigurationItem::new("web-01", "server").with_attributes(serde_json::json!({
//!             "hostname": "web-01",
//!             "ip_address": "10.0.0.1",
//!             "cpu_cores": 4
//!         })),
//!         "admin",
//!     )
//!     .await?;
//! assert!(created.warnings.is_empty());
//! # Ok(())
//! # }
//! ```

pub mod defaults;
pub mod error;
pub mod integrity;
pub mod model;
pub mod service;
pub mod store;
pub mod templates;
pub mod validation;

pub use defaults::apply_defaults;
pub use error::{CmdbError, Result};
pub use integrity::{would_conflict, INTEGRITY_CONFLICT_MESSAGE};
pub use model::{
    AttributeDefinition, AttributeType, AuditFields, ConfigurationItem, Constraint,
    ConstraintSet, Payload, Relationship, Schema, SchemaDraft, SchemaKind, StringFormat,
};
pub use service::{SchemaService, WriteOrchestrator, WriteOutcome};
pub use store::{MemoryStore, SledStore, Store, StoreError};
pub use validation::{
    AttributeValidator, SchemaDefinitionValidator, ValidationError, ValidationResult,
};
