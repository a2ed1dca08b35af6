//! Generic tenant-scoped persistence.
//!
//! Every read and write of a tenant-owned row goes through the functions in
//! this module. They resolve the tenant from the context (failing fast when
//! there is none), confine the statement to that tenant's live rows, and
//! keep `id`, `tenant_id`, `created_at` and `deleted_at` out of caller
//! control.
//!
//! Entities opt in by implementing [`TenantScoped`] (usually through
//! [`tenant_scoped!`]). Append-only audit rows implement [`AuditScoped`]
//! instead and inherit their tenant from an owning row.

use std::marker::PhantomData;
use std::time::Duration;

use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, IntoCondition};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    EntityTrait, IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationDef, Value,
};
use upkeep_shared::{FieldViolations, TenantContext};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::tenancy::{TenantTransaction, bounded};

/// Schema description of a tenant-owned, soft-deletable entity.
pub trait TenantScoped: EntityTrait {
    /// Primary key column.
    fn id_column() -> Self::Column;
    /// Owning tenant.
    fn tenant_column() -> Self::Column;
    /// Creation timestamp.
    fn created_at_column() -> Self::Column;
    /// Last update timestamp.
    fn updated_at_column() -> Self::Column;
    /// Soft-delete marker.
    fn deleted_at_column() -> Self::Column;

    /// Structural checks run before create and update. Only fields present
    /// in the active model are checked.
    ///
    /// # Errors
    ///
    /// Returns every violated field.
    fn validate(_model: &Self::ActiveModel) -> Result<(), FieldViolations> {
        Ok(())
    }
}

/// Schema description of an append-only audit entity owned by a
/// [`TenantScoped`] row.
pub trait AuditScoped: EntityTrait {
    /// Entity carrying the tenant.
    type Owner: TenantScoped;

    /// Primary key column.
    fn id_column() -> Self::Column;
    /// Foreign key to the owner.
    fn owner_column() -> Self::Column;
    /// Creation timestamp.
    fn created_at_column() -> Self::Column;
    /// Join from this entity to its owner.
    fn owner_relation() -> RelationDef;
}

/// Implements [`TenantScoped`] for an entity module following the standard
/// column names, optionally with a validation function.
macro_rules! tenant_scoped {
    ($entity:ident) => {
        $crate::scoped::tenant_scoped!(@impl $entity, |_| Ok(()));
    };
    ($entity:ident, validate = $validate:expr) => {
        $crate::scoped::tenant_scoped!(@impl $entity, $validate);
    };
    (@impl $entity:ident, $validate:expr) => {
        impl $crate::scoped::TenantScoped for $entity {
            fn id_column() -> Column {
                Column::Id
            }

            fn tenant_column() -> Column {
                Column::TenantId
            }

            fn created_at_column() -> Column {
                Column::CreatedAt
            }

            fn updated_at_column() -> Column {
                Column::UpdatedAt
            }

            fn deleted_at_column() -> Column {
                Column::DeletedAt
            }

            fn validate(model: &ActiveModel) -> Result<(), upkeep_shared::FieldViolations> {
                ($validate)(model)
            }
        }
    };
}

pub(crate) use tenant_scoped;

/// The value of an active-model field, unless it is `NotSet`.
pub(crate) fn present<T: Into<Value>>(value: &ActiveValue<T>) -> Option<&T> {
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v),
        ActiveValue::NotSet => None,
    }
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn live<E: TenantScoped>(tenant: Uuid) -> Condition {
    Condition::all()
        .add(E::tenant_column().eq(tenant))
        .add(E::deleted_at_column().is_null())
}

/// Live rows of the tenant matching `condition`, ordered by `order_by`.
///
/// # Errors
///
/// `TenantContextMissing` or a database error.
pub async fn find_where<E, C>(
    conn: &C,
    ctx: &TenantContext,
    condition: impl IntoCondition,
    order_by: E::Column,
) -> Result<Vec<E::Model>, RepositoryError>
where
    E: TenantScoped,
    C: ConnectionTrait,
{
    let tenant = ctx.tenant_id()?.into_inner();
    Ok(E::find()
        .filter(live::<E>(tenant))
        .filter(condition)
        .order_by_asc(order_by)
        .all(conn)
        .await?)
}

/// All live rows of the tenant, ordered by `order_by`.
///
/// # Errors
///
/// `TenantContextMissing` or a database error.
pub async fn find_all<E, C>(
    conn: &C,
    ctx: &TenantContext,
    order_by: E::Column,
) -> Result<Vec<E::Model>, RepositoryError>
where
    E: TenantScoped,
    C: ConnectionTrait,
{
    find_where::<E, C>(conn, ctx, Condition::all(), order_by).await
}

/// A live row of the tenant; `None` when missing, deleted, or foreign.
///
/// # Errors
///
/// `TenantContextMissing` or a database error.
pub async fn find_by_id<E, C>(
    conn: &C,
    ctx: &TenantContext,
    id: Uuid,
) -> Result<Option<E::Model>, RepositoryError>
where
    E: TenantScoped,
    C: ConnectionTrait,
{
    let tenant = ctx.tenant_id()?.into_inner();
    Ok(E::find()
        .filter(live::<E>(tenant))
        .filter(E::id_column().eq(id))
        .one(conn)
        .await?)
}

/// Inserts a row owned by the caller's tenant.
///
/// Whatever the model says, `tenant_id` is the context's tenant, both
/// timestamps are now, and `deleted_at` is null. A missing `id` is
/// generated.
///
/// # Errors
///
/// `TenantContextMissing`, `Validation`, `Conflict` on a unique violation,
/// or a database error.
pub async fn create<E, C>(
    conn: &C,
    ctx: &TenantContext,
    mut model: E::ActiveModel,
) -> Result<E::Model, RepositoryError>
where
    E: TenantScoped,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    let tenant = ctx.tenant_id()?.into_inner();
    E::validate(&model)?;

    let now = now();
    if model.is_not_set(E::id_column()) {
        model.set(E::id_column(), Uuid::now_v7().into());
    }
    model.set(E::tenant_column(), tenant.into());
    model.set(E::created_at_column(), now.into());
    model.set(E::updated_at_column(), now.into());
    model.set(E::deleted_at_column(), Option::<DateTimeWithTimeZone>::None.into());

    Ok(model.insert(conn).await?)
}

fn protect<E: TenantScoped>(patch: &mut E::ActiveModel) {
    for column in [
        E::id_column(),
        E::tenant_column(),
        E::created_at_column(),
        E::deleted_at_column(),
    ] {
        patch.not_set(column);
    }
    patch.set(E::updated_at_column(), now().into());
}

/// Applies `patch` to a live row of the tenant and returns the new row.
///
/// Identity, tenant, creation time and deletion marker in the patch are
/// ignored.
///
/// # Errors
///
/// `NotFound` if the row is not visible, `Validation`, `Conflict`, or a
/// database error.
pub async fn update<E, C>(
    conn: &C,
    ctx: &TenantContext,
    id: Uuid,
    patch: E::ActiveModel,
) -> Result<E::Model, RepositoryError>
where
    E: TenantScoped,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    if update_if::<E, C>(conn, ctx, id, Condition::all(), patch).await? {
        find_by_id::<E, C>(conn, ctx, id)
            .await?
            .ok_or(RepositoryError::NotFound)
    } else {
        Err(RepositoryError::NotFound)
    }
}

/// Compare-and-set update: applies `patch` only while `condition` holds.
///
/// Returns `false` when the row is visible but the condition failed.
///
/// # Errors
///
/// `NotFound` if the row is not visible, `Validation`, `Conflict`, or a
/// database error.
pub async fn update_if<E, C>(
    conn: &C,
    ctx: &TenantContext,
    id: Uuid,
    condition: impl IntoCondition,
    mut patch: E::ActiveModel,
) -> Result<bool, RepositoryError>
where
    E: TenantScoped,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    let tenant = ctx.tenant_id()?.into_inner();
    E::validate(&patch)?;
    protect::<E>(&mut patch);

    let result = E::update_many()
        .set(patch)
        .filter(live::<E>(tenant))
        .filter(E::id_column().eq(id))
        .filter(condition)
        .exec(conn)
        .await?;

    if result.rows_affected > 0 {
        return Ok(true);
    }
    match find_by_id::<E, C>(conn, ctx, id).await? {
        Some(_) => Ok(false),
        None => Err(RepositoryError::NotFound),
    }
}

/// Marks a live row of the tenant as deleted.
///
/// # Errors
///
/// `NotFound` if the row is not visible, or a database error.
pub async fn soft_delete<E, C>(conn: &C, ctx: &TenantContext, id: Uuid) -> Result<(), RepositoryError>
where
    E: TenantScoped,
    C: ConnectionTrait,
{
    let tenant = ctx.tenant_id()?.into_inner();
    let now = now();

    let result = E::update_many()
        .col_expr(E::deleted_at_column(), Expr::value(Value::from(now)))
        .col_expr(E::updated_at_column(), Expr::value(Value::from(now)))
        .filter(live::<E>(tenant))
        .filter(E::id_column().eq(id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

/// Number of live rows of the tenant.
///
/// # Errors
///
/// `TenantContextMissing` or a database error.
pub async fn count<E, C>(conn: &C, ctx: &TenantContext) -> Result<u64, RepositoryError>
where
    E: TenantScoped,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let tenant = ctx.tenant_id()?.into_inner();
    Ok(E::find().filter(live::<E>(tenant)).count(conn).await?)
}

/// Appends an audit row to a live owner of the caller's tenant.
///
/// The owner column is forced to `owner_id`, `created_at` to now, and a
/// missing `id` is generated.
///
/// # Errors
///
/// `NotFound` if the owner is not visible, `Conflict` on a unique
/// violation, or a database error.
pub async fn append<E, C>(
    conn: &C,
    ctx: &TenantContext,
    owner_id: Uuid,
    mut model: E::ActiveModel,
) -> Result<E::Model, RepositoryError>
where
    E: AuditScoped,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: Send,
    C: ConnectionTrait,
{
    if find_by_id::<E::Owner, C>(conn, ctx, owner_id).await?.is_none() {
        return Err(RepositoryError::NotFound);
    }

    if model.is_not_set(E::id_column()) {
        model.set(E::id_column(), Uuid::now_v7().into());
    }
    model.set(E::owner_column(), owner_id.into());
    model.set(E::created_at_column(), now().into());

    Ok(model.insert(conn).await?)
}

/// Audit rows whose owner is a live row of the tenant, filtered and ordered.
///
/// # Errors
///
/// `TenantContextMissing` or a database error.
pub async fn find_audit<E, C>(
    conn: &C,
    ctx: &TenantContext,
    condition: impl IntoCondition,
    order_by: E::Column,
) -> Result<Vec<E::Model>, RepositoryError>
where
    E: AuditScoped,
    C: ConnectionTrait,
{
    let tenant = ctx.tenant_id()?.into_inner();
    Ok(E::find()
        .join(JoinType::InnerJoin, E::owner_relation())
        .filter(live::<E::Owner>(tenant))
        .filter(condition)
        .order_by_asc(order_by)
        .all(conn)
        .await?)
}

/// Tenant-scoped repository for one entity.
///
/// Each call runs in its own [`TenantTransaction`] under the operation
/// timeout.
pub struct TenantRepository<E> {
    db: DatabaseConnection,
    timeout: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for TenantRepository<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            timeout: self.timeout,
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for TenantRepository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRepository")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<E> TenantRepository<E>
where
    E: TenantScoped,
    E::Model: IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: Send,
{
    /// Creates a repository bounding every operation by `timeout`.
    #[must_use]
    pub const fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        Self {
            db,
            timeout,
            _entity: PhantomData,
        }
    }

    /// See [`find_all`].
    ///
    /// # Errors
    ///
    /// `TenantContextMissing`, `Timeout`, or a database error.
    pub async fn find_all(
        &self,
        ctx: &TenantContext,
        order_by: E::Column,
    ) -> Result<Vec<E::Model>, RepositoryError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let rows = find_all::<E, _>(txn.transaction(), ctx, order_by).await?;
            txn.commit().await?;
            Ok(rows)
        })
        .await
    }

    /// See [`find_by_id`].
    ///
    /// # Errors
    ///
    /// `TenantContextMissing`, `Timeout`, or a database error.
    pub async fn find_by_id(
        &self,
        ctx: &TenantContext,
        id: Uuid,
    ) -> Result<Option<E::Model>, RepositoryError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let row = find_by_id::<E, _>(txn.transaction(), ctx, id).await?;
            txn.commit().await?;
            Ok(row)
        })
        .await
    }

    /// See [`create`].
    ///
    /// # Errors
    ///
    /// `TenantContextMissing`, `Validation`, `Conflict`, `Timeout`, or a
    /// database error.
    pub async fn create(
        &self,
        ctx: &TenantContext,
        model: E::ActiveModel,
    ) -> Result<E::Model, RepositoryError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let row = create::<E, _>(txn.transaction(), ctx, model).await?;
            txn.commit().await?;
            Ok(row)
        })
        .await
    }

    /// See [`update`].
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, `Conflict`, `Timeout`, or a database error.
    pub async fn update(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        patch: E::ActiveModel,
    ) -> Result<E::Model, RepositoryError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let row = update::<E, _>(txn.transaction(), ctx, id, patch).await?;
            txn.commit().await?;
            Ok(row)
        })
        .await
    }

    /// See [`update_if`].
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation`, `Conflict`, `Timeout`, or a database error.
    pub async fn update_if(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        condition: Condition,
        patch: E::ActiveModel,
    ) -> Result<bool, RepositoryError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let applied = update_if::<E, _>(txn.transaction(), ctx, id, condition, patch).await?;
            txn.commit().await?;
            Ok(applied)
        })
        .await
    }

    /// See [`soft_delete`].
    ///
    /// # Errors
    ///
    /// `NotFound`, `Timeout`, or a database error.
    pub async fn soft_delete(&self, ctx: &TenantContext, id: Uuid) -> Result<(), RepositoryError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            soft_delete::<E, _>(txn.transaction(), ctx, id).await?;
            txn.commit().await?;
            Ok(())
        })
        .await
    }

    /// See [`count`].
    ///
    /// # Errors
    ///
    /// `TenantContextMissing`, `Timeout`, or a database error.
    pub async fn count(&self, ctx: &TenantContext) -> Result<u64, RepositoryError>
    where
        E::Model: Sync,
    {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let total = count::<E, _>(txn.transaction(), ctx).await?;
            txn.commit().await?;
            Ok(total)
        })
        .await
    }
}
