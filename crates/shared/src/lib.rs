//! Shared types, errors, and configuration for Upkeep.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - The explicit tenant context passed through every call
//! - Field-level validation results
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod tenant;
pub mod types;
pub mod validation;

pub use config::{AppConfig, DatabaseConfig, SchedulingConfig};
pub use error::{AppError, AppResult};
pub use tenant::{MissingTenant, TenantContext, TenantResolver};
pub use validation::{FieldViolation, FieldViolations};
