//! HTTP error mapping

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cmdb_core::{CmdbError, StoreError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by every handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Cmdb(#[from] CmdbError),

    /// The request could not be decoded (body, path or query)
    #[error("{0}")]
    BadRequest(String),
}

/// JSON body of every error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<ValidationError>>,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "INVALID_REQUEST",
            ApiError::Cmdb(err) => match err {
                CmdbError::SchemaNotFound(_) => "SCHEMA_NOT_FOUND",
                CmdbError::CiNotFound(_) => "CI_NOT_FOUND",
                CmdbError::RelationshipNotFound(_) => "RELATIONSHIP_NOT_FOUND",
                CmdbError::TemplateNotFound(_) => "TEMPLATE_NOT_FOUND",
                CmdbError::SchemaDefinitionInvalid(_) => "SCHEMA_DEFINITION_INVALID",
                CmdbError::SchemaNameConflict { .. } => "SCHEMA_NAME_CONFLICT",
                CmdbError::AttributeValidationFailed(_) => "VALIDATION_FAILED",
                CmdbError::RelationshipIntegrityConflict => "RELATIONSHIP_INTEGRITY_CONFLICT",
                CmdbError::InvalidRequest(_) => "INVALID_REQUEST",
                CmdbError::Store(StoreError::Timeout(_)) => "STORE_TIMEOUT",
                CmdbError::Store(_) => "STORE_ERROR",
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Cmdb(err) => match err {
                CmdbError::SchemaNotFound(_)
                | CmdbError::CiNotFound(_)
                | CmdbError::RelationshipNotFound(_)
                | CmdbError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
                CmdbError::SchemaDefinitionInvalid(_)
                | CmdbError::AttributeValidationFailed(_)
                | CmdbError::RelationshipIntegrityConflict
                | CmdbError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                CmdbError::SchemaNameConflict { .. } => StatusCode::CONFLICT,
                CmdbError::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
                CmdbError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let (error, result) = match self {
            ApiError::Cmdb(CmdbError::AttributeValidationFailed(result)) => {
                ("Attribute validation failed".to_string(), Some(result))
            }
            ApiError::Cmdb(CmdbError::SchemaDefinitionInvalid(result)) => {
                ("Invalid schema definition".to_string(), Some(result))
            }
            other => (other.to_string(), None),
        };

        ErrorBody {
            error,
            code: self.error_code().to_string(),
            errors: result.map(|r| r.errors.clone()),
            warnings: result
                .filter(|r| !r.warnings.is_empty())
                .map(|r| r.warnings.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        }
        (status, Json(self.to_body())).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
