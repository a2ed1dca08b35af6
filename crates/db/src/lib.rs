//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions for locations, assets and PM schedules
//! - Generic tenant-scoped, soft-delete aware persistence ([`scoped`])
//! - Tenant-bound transactions with `PostgreSQL` row-level security
//! - Repositories, including the PM schedule store
//! - Database migrations

pub mod entities;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod scoped;
pub mod tenancy;

pub use error::RepositoryError;
pub use repositories::{AssetRepository, LocationRepository, ScheduleRepository};
pub use scoped::{AuditScoped, TenantRepository, TenantScoped};
pub use tenancy::TenantTransaction;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use upkeep_shared::DatabaseConfig;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection sized by `config`.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout())
        .sqlx_logging(false);

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting to database"
    );
    Database::connect(options).await
}
