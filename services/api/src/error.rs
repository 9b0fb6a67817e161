//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! variant is turned into an HTTP response.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use casebook_core::permissions::Permission;
use casebook_core::ports::PortError;
use casebook_core::ValidationErrors;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a failure to load the print templates.
    #[error("Template Error: {0}")]
    Template(#[from] tera::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Submitted data failed field validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// No valid staff session.
    #[error("Unauthorized")]
    Unauthorized,

    /// The staff member lacks one or more named permissions.
    #[error("Missing permissions: {0:?}")]
    Forbidden(Vec<Permission>),

    #[error("Not found")]
    NotFound,

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) | ApiError::Port(PortError::Invalid(errors)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": errors })),
            )
                .into_response(),
            ApiError::NotFound | ApiError::Port(PortError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Not found".to_string()).into_response()
            }
            ApiError::Unauthorized | ApiError::Port(PortError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()).into_response()
            }
            ApiError::Forbidden(missing) => {
                let missing: Vec<&str> = missing.iter().map(|p| p.codename()).collect();
                (
                    StatusCode::FORBIDDEN,
                    Json(json!({ "missing_permissions": missing })),
                )
                    .into_response()
            }
            other => {
                error!("Request failed: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
                    .into_response()
            }
        }
    }
}

/// A convenience type alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;
