//! Error types for CMDB operations

use thiserror::Error;
use uuid::Uuid;

use crate::integrity::INTEGRITY_CONFLICT_MESSAGE;
use crate::model::SchemaKind;
use crate::store::StoreError;
use crate::validation::ValidationResult;

/// Failure of a schema, CI or relationship operation
#[derive(Error, Debug)]
pub enum CmdbError {
    /// No active schema resolves for the requested type
    #[error("Schema not found: {0}")]
    SchemaNotFound(String),

    #[error("Configuration item not found: {0}")]
    CiNotFound(Uuid),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(Uuid),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// A proposed schema failed definition checks
    #[error("Invalid schema definition: {} error(s)", .0.error_count())]
    SchemaDefinitionInvalid(ValidationResult),

    /// An active schema of the same kind already uses the name
    #[error("An active {kind} schema named {name} already exists")]
    SchemaNameConflict { kind: SchemaKind, name: String },

    /// The attribute payload failed validation; nothing was persisted
    #[error("Attribute validation failed: {} error(s)", .0.error_count())]
    AttributeValidationFailed(ValidationResult),

    #[error("{}", INTEGRITY_CONFLICT_MESSAGE)]
    RelationshipIntegrityConflict,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CmdbError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        CmdbError::InvalidRequest(msg.into())
    }

    /// The validation result carried by this error, if any
    pub fn validation(&self) -> Option<&ValidationResult> {
        match self {
            CmdbError::SchemaDefinitionInvalid(result)
            | CmdbError::AttributeValidationFailed(result) => Some(result),
            _ => None,
        }
    }

    /// Check if this is caused by the caller (vs the storage layer)
    pub fn is_user_error(&self) -> bool {
        !matches!(self, CmdbError::Store(_))
    }
}

pub type Result<T> = std::result::Result<T, CmdbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;
    use serde_json::Value;

    #[test]
    fn test_error_display() {
        let err = CmdbError::SchemaNameConflict {
            kind: SchemaKind::Ci,
            name: "server".to_string(),
        };
        assert_eq!(err.to_string(), "An active ci schema named server already exists");
        assert_eq!(
            CmdbError::RelationshipIntegrityConflict.to_string(),
            "A conflicting relationship already exists in the opposite direction"
        );
    }

    #[test]
    fn test_validation_accessor() {
        let result =
            ValidationResult::fatal(ValidationError::new("ip", Value::Null, "ip is required"));
        let err = CmdbError::AttributeValidationFailed(result.clone());
        assert_eq!(err.validation(), Some(&result));
        assert_eq!(err.to_string(), "Attribute validation failed: 1 error(s)");
        assert!(CmdbError::SchemaNotFound("x".into()).validation().is_none());
    }

    #[test]
    fn test_is_user_error() {
        assert!(CmdbError::invalid_request("bad").is_user_error());
        assert!(!CmdbError::Store(StoreError::Timeout("insert".into())).is_user_error());
    }
}
