//! Repository error types.

use std::time::Duration;

use sea_orm::{DbErr, SqlErr};
use upkeep_shared::{AppError, FieldViolations, MissingTenant};

/// Errors raised by tenant-scoped repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// No tenant bound to the calling context.
    #[error("Tenant context is missing")]
    TenantContextMissing,

    /// Row absent, soft-deleted, or owned by another tenant.
    #[error("Record not found")]
    NotFound,

    /// Row failed the entity's validation hook.
    #[error("Validation error: {0}")]
    Validation(FieldViolations),

    /// Unique constraint violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The operation exceeded its time budget and was rolled back.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Any other database failure.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl RepositoryError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Database(_))
    }
}

impl From<DbErr> for RepositoryError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => Self::Conflict(message),
            _ => Self::Database(err),
        }
    }
}

impl From<MissingTenant> for RepositoryError {
    fn from(_: MissingTenant) -> Self {
        Self::TenantContextMissing
    }
}

impl From<FieldViolations> for RepositoryError {
    fn from(violations: FieldViolations) -> Self {
        Self::Validation(violations)
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::TenantContextMissing => Self::TenantContextMissing,
            RepositoryError::NotFound => Self::NotFound(err.to_string()),
            RepositoryError::Validation(violations) => Self::Validation(violations),
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::Timeout(_) | RepositoryError::Database(_) => {
                Self::Infrastructure(err.to_string())
            }
        }
    }
}
