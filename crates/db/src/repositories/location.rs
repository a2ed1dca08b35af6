//! Location repository.

use std::time::Duration;

use sea_orm::{DatabaseConnection, Set};
use upkeep_shared::TenantContext;
use upkeep_shared::types::LocationId;

use crate::entities::locations;
use crate::error::RepositoryError;
use crate::scoped::TenantRepository;

/// Tenant-scoped access to locations.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    rows: TenantRepository<locations::Entity>,
}

impl LocationRepository {
    /// Creates a new location repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        Self {
            rows: TenantRepository::new(db, timeout),
        }
    }

    /// Creates a location for the caller's tenant.
    ///
    /// # Errors
    ///
    /// `TenantContextMissing`, `Validation` for an empty name, or a database error.
    pub async fn create(
        &self,
        ctx: &TenantContext,
        name: &str,
    ) -> Result<locations::Model, RepositoryError> {
        let model = locations::ActiveModel {
            name: Set(name.trim().to_string()),
            ..Default::default()
        };
        self.rows.create(ctx, model).await
    }

    /// Finds a live location.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: LocationId,
    ) -> Result<Option<locations::Model>, RepositoryError> {
        self.rows.find_by_id(ctx, id.into_inner()).await
    }

    /// Lists live locations by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, ctx: &TenantContext) -> Result<Vec<locations::Model>, RepositoryError> {
        self.rows.find_all(ctx, locations::Column::Name).await
    }

    /// Renames a live location.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, or a database error.
    pub async fn rename(
        &self,
        ctx: &TenantContext,
        id: LocationId,
        name: &str,
    ) -> Result<locations::Model, RepositoryError> {
        let patch = locations::ActiveModel {
            name: Set(name.trim().to_string()),
            ..Default::default()
        };
        self.rows.update(ctx, id.into_inner(), patch).await
    }

    /// Soft-deletes a location.
    ///
    /// # Errors
    ///
    /// `NotFound` or a database error.
    pub async fn delete(&self, ctx: &TenantContext, id: LocationId) -> Result<(), RepositoryError> {
        self.rows.soft_delete(ctx, id.into_inner()).await
    }

    /// Number of live locations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self, ctx: &TenantContext) -> Result<u64, RepositoryError> {
        self.rows.count(ctx).await
    }
}
