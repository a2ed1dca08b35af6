//! Asset repository.

use std::time::Duration;

use sea_orm::{DatabaseConnection, Set};
use upkeep_shared::TenantContext;
use upkeep_shared::types::{AssetId, LocationId};

use crate::entities::{assets, locations};
use crate::error::RepositoryError;
use crate::scoped::{self, TenantRepository};
use crate::tenancy::{TenantTransaction, bounded};

/// Tenant-scoped access to assets.
#[derive(Debug, Clone)]
pub struct AssetRepository {
    db: DatabaseConnection,
    timeout: Duration,
    rows: TenantRepository<assets::Entity>,
}

impl AssetRepository {
    /// Creates a new asset repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        Self {
            rows: TenantRepository::new(db.clone(), timeout),
            db,
            timeout,
        }
    }

    /// Creates an asset, optionally placed at one of the tenant's locations.
    ///
    /// # Errors
    ///
    /// `NotFound` if the location is not visible, `Validation`, or a
    /// database error.
    pub async fn create(
        &self,
        ctx: &TenantContext,
        name: &str,
        location_id: Option<LocationId>,
    ) -> Result<assets::Model, RepositoryError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;

            if let Some(location_id) = location_id {
                let location = scoped::find_by_id::<locations::Entity, _>(
                    txn.transaction(),
                    ctx,
                    location_id.into_inner(),
                )
                .await?;
                if location.is_none() {
                    return Err(RepositoryError::NotFound);
                }
            }

            let model = assets::ActiveModel {
                name: Set(name.trim().to_string()),
                location_id: Set(location_id.map(LocationId::into_inner)),
                ..Default::default()
            };
            let asset = scoped::create::<assets::Entity, _>(txn.transaction(), ctx, model).await?;
            txn.commit().await?;
            Ok(asset)
        })
        .await
    }

    /// Finds a live asset.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: AssetId,
    ) -> Result<Option<assets::Model>, RepositoryError> {
        self.rows.find_by_id(ctx, id.into_inner()).await
    }

    /// Lists live assets by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, ctx: &TenantContext) -> Result<Vec<assets::Model>, RepositoryError> {
        self.rows.find_all(ctx, assets::Column::Name).await
    }

    /// Renames a live asset.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, or a database error.
    pub async fn rename(
        &self,
        ctx: &TenantContext,
        id: AssetId,
        name: &str,
    ) -> Result<assets::Model, RepositoryError> {
        let patch = assets::ActiveModel {
            name: Set(name.trim().to_string()),
            ..Default::default()
        };
        self.rows.update(ctx, id.into_inner(), patch).await
    }

    /// Soft-deletes an asset.
    ///
    /// # Errors
    ///
    /// `NotFound` or a database error.
    pub async fn delete(&self, ctx: &TenantContext, id: AssetId) -> Result<(), RepositoryError> {
        self.rows.soft_delete(ctx, id.into_inner()).await
    }

    /// Number of live assets.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self, ctx: &TenantContext) -> Result<u64, RepositoryError> {
        self.rows.count(ctx).await
    }
}
