//! Errors surfaced by the session services
//!
//! Store failures never leak to callers: they are logged with their context
//! and replaced by a generic message. Missing rows and rejected filters keep
//! their own variants so callers can render them distinctly.

use thiserror::Error;

use crate::data::DataError;

/// Message returned for any failed read
pub const READ_FAILED: &str = "unable to get sessions";

/// Message returned for any failed mutation
pub const WRITE_FAILED: &str = "unable to update session";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{code}: {message}")]
    NotFound { code: String, message: String },

    #[error("{code}: {message}")]
    Forbidden { code: String, message: String },

    #[error("{code}: {message}")]
    BadRequest { code: String, message: String },

    #[error("{message}")]
    Internal { message: String },
}

impl ServiceError {
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Map a store error for `operation` on `project_id`.
    ///
    /// `fallback` is the message used for opaque failures.
    pub fn from_data(
        e: DataError,
        project_id: &str,
        operation: &'static str,
        fallback: &'static str,
    ) -> Self {
        match e {
            DataError::NotFound { entity, id } => {
                tracing::debug!(project_id, operation, entity, id = %id, "Row not found");
                Self::not_found(
                    format!("{}_NOT_FOUND", entity.to_uppercase()),
                    format!("{} {} not found", entity, id),
                )
            }
            DataError::InvalidQuery(filter_error) => {
                Self::bad_request(filter_error.code(), filter_error.to_string())
            }
            other => {
                tracing::error!(
                    project_id,
                    operation,
                    backend = other.backend(),
                    transient = other.is_transient(),
                    error = %other,
                    "Store operation failed"
                );
                Self::internal(fallback)
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<crate::data::filters::FilterError> for ServiceError {
    fn from(e: crate::data::filters::FilterError) -> Self {
        Self::bad_request(e.code(), e.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self::bad_request("INVALID_REQUEST", e.to_string())
    }
}
