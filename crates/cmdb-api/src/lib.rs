//! REST API for the schema-driven CMDB
//!
//! Thin axum layer over `cmdb-core`: handlers decode requests, pass them to
//! the schema service or the write orchestrator, and map [`CmdbError`]s to
//! status codes and a uniform JSON error body.
//!
//! [`CmdbError`]: cmdb_core::CmdbError

pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod server;

pub use config::{AppConfig, ConfigError, LoggingConfig, ServerConfig, StorageBackend, StorageConfig};
pub use error::{ApiError, ApiResult, ErrorBody};
pub use middleware::{request_logging_middleware, Actor};
pub use routes::{create_router, AppState};
pub use server::{build_app, build_state, shutdown_signal};
