//! Application-wide error types.
//!
//! Every layer keeps its own `thiserror` enum; they all funnel into `AppError`
//! at the boundary handed to callers.

use thiserror::Error;

use crate::tenant::MissingTenant;
use crate::validation::FieldViolations;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// No tenant bound to the calling context.
    #[error("Tenant context is missing")]
    TenantContextMissing,

    /// Access denied.
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Resource not found. Missing, deleted, and foreign rows are indistinguishable.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error listing every violated field.
    #[error("Validation error: {0}")]
    Validation(FieldViolations),

    /// Conflict (e.g., duplicate completion).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage unavailable, transaction failure, or timeout.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// External service error.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::TenantContextMissing => 401,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::ExternalService(_) => 502,
            Self::Infrastructure(_) => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TenantContextMissing => "TENANT_CONTEXT_MISSING",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Infrastructure(_) => "INFRASTRUCTURE_ERROR",
            Self::ExternalService(_) => "EXTERNAL_SERVICE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure(_) | Self::ExternalService(_))
    }
}

impl From<MissingTenant> for AppError {
    fn from(_: MissingTenant) -> Self {
        Self::TenantContextMissing
    }
}

impl From<FieldViolations> for AppError {
    fn from(violations: FieldViolations) -> Self {
        Self::Validation(violations)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
