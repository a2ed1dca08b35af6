//! Tenant-bound transactions.
//!
//! Every unit of work runs inside a [`TenantTransaction`]. On `PostgreSQL`
//! the transaction sets `app.current_tenant_id` with `SET LOCAL`, so the
//! row-level security policies installed by the migrations enforce the same
//! boundary as the application filters. Other backends rely on the filters
//! alone.
//!
//! ```ignore
//! let txn = TenantTransaction::begin(&db, &ctx).await?;
//! let assets = scoped::find_all::<assets::Entity, _>(txn.transaction(), &ctx, assets::Column::Name).await?;
//! txn.commit().await?;
//! ```

use std::future::Future;
use std::time::Duration;

use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, DbErr,
    TransactionTrait,
};
use upkeep_shared::TenantContext;
use upkeep_shared::types::TenantId;

use crate::error::RepositoryError;

/// A transaction bound to one tenant.
pub struct TenantTransaction {
    txn: DatabaseTransaction,
    tenant_id: TenantId,
}

impl TenantTransaction {
    /// Begins a transaction for the context's tenant.
    ///
    /// # Errors
    ///
    /// `TenantContextMissing` before touching the database, or a database
    /// error if the transaction or RLS context cannot be set up.
    pub async fn begin(
        db: &DatabaseConnection,
        ctx: &TenantContext,
    ) -> Result<Self, RepositoryError> {
        let tenant_id = ctx.tenant_id()?;
        let txn = db.begin().await?;

        if txn.get_database_backend() == DatabaseBackend::Postgres {
            set_tenant_context(&txn, tenant_id).await?;
        }

        Ok(Self { txn, tenant_id })
    }

    /// The underlying transaction for executing queries.
    #[must_use]
    pub const fn transaction(&self) -> &DatabaseTransaction {
        &self.txn
    }

    /// The tenant this transaction is bound to.
    #[must_use]
    pub const fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Commits the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    pub async fn commit(self) -> Result<(), DbErr> {
        self.txn.commit().await
    }

    /// Rolls back the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    pub async fn rollback(self) -> Result<(), DbErr> {
        self.txn.rollback().await
    }
}

/// Sets the RLS tenant on an existing `PostgreSQL` transaction.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub async fn set_tenant_context(txn: &DatabaseTransaction, tenant_id: TenantId) -> Result<(), DbErr> {
    let sql = format!("SET LOCAL app.current_tenant_id = '{tenant_id}'");
    txn.execute_unprepared(&sql).await?;
    Ok(())
}

/// Runs `operation` under a time limit.
///
/// An expired operation is dropped, which rolls back any open transaction.
///
/// # Errors
///
/// `Timeout` on expiry, otherwise whatever the operation returns.
pub async fn bounded<T, F>(limit: Duration, operation: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(timeout = ?limit, "repository operation timed out");
            Err(RepositoryError::Timeout(limit))
        }
    }
}
