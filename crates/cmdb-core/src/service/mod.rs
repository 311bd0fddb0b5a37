//! Write path services
//!
//! [`WriteOrchestrator`] runs every CI and relationship write through
//! resolve schema -> (integrity check) -> validate -> apply defaults ->
//! persist. [`SchemaService`] guards schema create and update with the
//! definition validator.

pub mod orchestrator;
pub mod schemas;

pub use orchestrator::{WriteOrchestrator, WriteOutcome};
pub use schemas::SchemaService;

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::store::{StoreError, StoreResult};

/// Deadline applied to each individual store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Run one store call under `deadline`
pub(crate) async fn with_deadline<T, F>(deadline: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(StoreError::Timeout(format!(
            "{} exceeded {}ms",
            operation,
            deadline.as_millis()
        ))
        .into()),
    }
}
