//! PM schedule repository.
//!
//! Stores schedules and their completion history and implements the
//! scheduling service's [`ScheduleStore`]. Completion and schedule
//! advancement share one transaction; the unique occurrence index and the
//! compare-and-set on `next_due_date` make concurrent completions of the
//! same occurrence resolve to one success and one conflict.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, Set};
use tracing::{debug, warn};
use upkeep_core::maintenance::{
    CompletionOutcome, NewCompletion, NewSchedule, PmCompletion, PmSchedule, SchedulePatch,
    ScheduleStore, ScheduleTarget, StoreError, WorkOrderClaim, WorkOrderRef,
};
use upkeep_core::recurrence::RecurrenceRule;
use upkeep_shared::types::{
    AssetId, CompletionId, LocationId, ScheduleId, TemplateId, TenantId, TicketId, UserId,
    VendorId,
};
use upkeep_shared::{FieldViolations, TenantContext};

use crate::entities::{assets, locations, pm_completions, pm_schedules};
use crate::error::RepositoryError;
use crate::scoped;
use crate::tenancy::{TenantTransaction, bounded};

/// PM schedule and completion storage.
#[derive(Debug, Clone)]
pub struct ScheduleRepository {
    db: DatabaseConnection,
    timeout: Duration,
}

impl ScheduleRepository {
    /// Creates a new schedule repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::TenantContextMissing => Self::TenantContextMissing,
            RepositoryError::Validation(violations) => Self::Validation(violations),
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::NotFound => Self::Conflict("record no longer exists".to_string()),
            RepositoryError::Timeout(_) | RepositoryError::Database(_) => {
                Self::Unavailable(err.to_string())
            }
        }
    }
}

fn for_schedule(err: RepositoryError, id: ScheduleId) -> StoreError {
    match err {
        RepositoryError::NotFound => StoreError::NotFound(id),
        other => other.into(),
    }
}

fn corrupt(field: &str, message: &str) -> RepositoryError {
    let mut violations = FieldViolations::new();
    violations.push(field, message);
    RepositoryError::Validation(violations)
}

fn small(field: &str, value: Option<i16>) -> Result<Option<u8>, RepositoryError> {
    value
        .map(u8::try_from)
        .transpose()
        .map_err(|_| corrupt(field, "stored value out of range"))
}

fn to_schedule(model: pm_schedules::Model) -> Result<PmSchedule, RepositoryError> {
    let target = ScheduleTarget::from_parts(
        model.asset_id.map(AssetId::from_uuid),
        model.location_id.map(LocationId::from_uuid),
    )
    .ok_or_else(|| corrupt("asset_id", "stored schedule has no single target"))?;

    let rule = RecurrenceRule {
        frequency: model.frequency.into(),
        day_of_week: small("day_of_week", model.day_of_week)?,
        day_of_month: small("day_of_month", model.day_of_month)?,
        month_of_year: small("month_of_year", model.month_of_year)?,
    };

    let work_order = model
        .work_order_date
        .zip(model.work_order_claimed_at)
        .map(|(scheduled_date, claimed_at)| WorkOrderRef {
            scheduled_date,
            ticket_id: model.work_order_ticket_id.map(TicketId::from_uuid),
            claimed_at: claimed_at.with_timezone(&Utc),
        });

    Ok(PmSchedule {
        id: ScheduleId::from_uuid(model.id),
        tenant_id: TenantId::from_uuid(model.tenant_id),
        template_id: model.template_id.map(TemplateId::from_uuid),
        name: model.name,
        description: model.description,
        target,
        rule,
        assigned_to: model.assigned_to.map(UserId::from_uuid),
        vendor_id: model.vendor_id.map(VendorId::from_uuid),
        estimated_cost: model.estimated_cost,
        next_due_date: model.next_due_date,
        is_active: model.is_active,
        work_order,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn to_completion(model: pm_completions::Model) -> PmCompletion {
    PmCompletion {
        id: CompletionId::from_uuid(model.id),
        schedule_id: ScheduleId::from_uuid(model.schedule_id),
        ticket_id: TicketId::from_uuid(model.ticket_id),
        scheduled_date: model.scheduled_date,
        completed_date: model.completed_date,
        completed_by: UserId::from_uuid(model.completed_by),
        checklist_results: model.checklist_results,
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn rule_columns(rule: &RecurrenceRule, model: &mut pm_schedules::ActiveModel) {
    model.frequency = Set(rule.frequency.into());
    model.day_of_week = Set(rule.day_of_week.map(i16::from));
    model.day_of_month = Set(rule.day_of_month.map(i16::from));
    model.month_of_year = Set(rule.month_of_year.map(i16::from));
}

fn new_schedule_model(schedule: NewSchedule) -> pm_schedules::ActiveModel {
    let mut model = pm_schedules::ActiveModel {
        template_id: Set(schedule.template_id.map(TemplateId::into_inner)),
        name: Set(schedule.name),
        description: Set(schedule.description),
        asset_id: Set(schedule.target.asset_id().map(AssetId::into_inner)),
        location_id: Set(schedule.target.location_id().map(LocationId::into_inner)),
        assigned_to: Set(schedule.assigned_to.map(UserId::into_inner)),
        vendor_id: Set(schedule.vendor_id.map(VendorId::into_inner)),
        estimated_cost: Set(schedule.estimated_cost),
        next_due_date: Set(schedule.next_due_date),
        is_active: Set(true),
        work_order_date: Set(None),
        work_order_ticket_id: Set(None),
        work_order_claimed_at: Set(None),
        ..Default::default()
    };
    rule_columns(&schedule.rule, &mut model);
    model
}

fn patch_model(patch: SchedulePatch) -> pm_schedules::ActiveModel {
    let mut model = pm_schedules::ActiveModel::default();
    if let Some(name) = patch.name {
        model.name = Set(name);
    }
    if let Some(description) = patch.description {
        model.description = Set(description);
    }
    if let Some(template_id) = patch.template_id {
        model.template_id = Set(template_id.map(TemplateId::into_inner));
    }
    if let Some(assigned_to) = patch.assigned_to {
        model.assigned_to = Set(assigned_to.map(UserId::into_inner));
    }
    if let Some(vendor_id) = patch.vendor_id {
        model.vendor_id = Set(vendor_id.map(VendorId::into_inner));
    }
    if let Some(cost) = patch.estimated_cost {
        model.estimated_cost = Set(cost);
    }
    if let Some(rule) = &patch.rule {
        rule_columns(rule, &mut model);
    }
    if let Some(next_due_date) = patch.next_due_date {
        model.next_due_date = Set(next_due_date);
    }
    if let Some(active) = patch.is_active {
        model.is_active = Set(active);
    }
    model
}

/// Matches a slot still held by `claim` with no ticket attached.
fn held(claim: WorkOrderClaim) -> Condition {
    Condition::all()
        .add(pm_schedules::Column::WorkOrderDate.eq(claim.scheduled_date))
        .add(pm_schedules::Column::WorkOrderClaimedAt.eq(claim.claimed_at.fixed_offset()))
        .add(pm_schedules::Column::WorkOrderTicketId.is_null())
}

#[async_trait::async_trait]
impl ScheduleStore for ScheduleRepository {
    async fn target_exists(
        &self,
        ctx: &TenantContext,
        target: ScheduleTarget,
    ) -> Result<bool, StoreError> {
        Ok(bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let exists = match target {
                ScheduleTarget::Asset(id) => {
                    scoped::find_by_id::<assets::Entity, _>(txn.transaction(), ctx, id.into_inner())
                        .await?
                        .is_some()
                }
                ScheduleTarget::Location(id) => scoped::find_by_id::<locations::Entity, _>(
                    txn.transaction(),
                    ctx,
                    id.into_inner(),
                )
                .await?
                .is_some(),
            };
            txn.commit().await?;
            Ok(exists)
        })
        .await?)
    }

    async fn insert_schedule(
        &self,
        ctx: &TenantContext,
        schedule: NewSchedule,
    ) -> Result<PmSchedule, StoreError> {
        Ok(bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let model = scoped::create::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                new_schedule_model(schedule),
            )
            .await?;
            txn.commit().await?;
            to_schedule(model)
        })
        .await?)
    }

    async fn find_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
    ) -> Result<Option<PmSchedule>, StoreError> {
        Ok(bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let model =
                scoped::find_by_id::<pm_schedules::Entity, _>(txn.transaction(), ctx, id.into_inner())
                    .await?;
            txn.commit().await?;
            model.map(to_schedule).transpose()
        })
        .await?)
    }

    async fn list_schedules(
        &self,
        ctx: &TenantContext,
        active_only: bool,
    ) -> Result<Vec<PmSchedule>, StoreError> {
        let mut condition = Condition::all();
        if active_only {
            condition = condition.add(pm_schedules::Column::IsActive.eq(true));
        }

        Ok(bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let models = scoped::find_where::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                condition,
                pm_schedules::Column::NextDueDate,
            )
            .await?;
            txn.commit().await?;
            models.into_iter().map(to_schedule).collect()
        })
        .await?)
    }

    async fn update_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        patch: SchedulePatch,
    ) -> Result<PmSchedule, StoreError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let model = scoped::update::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                id.into_inner(),
                patch_model(patch),
            )
            .await?;
            txn.commit().await?;
            to_schedule(model)
        })
        .await
        .map_err(|err| for_schedule(err, id))
    }

    async fn update_schedule_if_due(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        expected_next_due: NaiveDate,
        patch: SchedulePatch,
    ) -> Result<PmSchedule, StoreError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let applied = scoped::update_if::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                id.into_inner(),
                pm_schedules::Column::NextDueDate.eq(expected_next_due),
                patch_model(patch),
            )
            .await?;
            if !applied {
                txn.rollback().await?;
                return Err(RepositoryError::Conflict(format!(
                    "PM schedule is no longer due on {expected_next_due}"
                )));
            }
            let model =
                scoped::find_by_id::<pm_schedules::Entity, _>(txn.transaction(), ctx, id.into_inner())
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
            txn.commit().await?;
            to_schedule(model)
        })
        .await
        .map_err(|err| for_schedule(err, id))
    }

    async fn delete_schedule(&self, ctx: &TenantContext, id: ScheduleId) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            scoped::soft_delete::<pm_schedules::Entity, _>(txn.transaction(), ctx, id.into_inner())
                .await?;
            txn.commit().await?;
            Ok(())
        })
        .await
        .map_err(|err| for_schedule(err, id))
    }

    async fn claim_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let lapsed = Condition::all()
            .add(pm_schedules::Column::WorkOrderTicketId.is_null())
            .add(pm_schedules::Column::WorkOrderClaimedAt.lt(stale_before.fixed_offset()));
        let slot_free = Condition::any()
            .add(pm_schedules::Column::WorkOrderDate.is_null())
            .add(pm_schedules::Column::WorkOrderDate.ne(claim.scheduled_date))
            .add(lapsed);
        let claimable = Condition::all()
            .add(pm_schedules::Column::NextDueDate.eq(claim.scheduled_date))
            .add(slot_free);
        let patch = pm_schedules::ActiveModel {
            work_order_date: Set(Some(claim.scheduled_date)),
            work_order_ticket_id: Set(None),
            work_order_claimed_at: Set(Some(claim.claimed_at.fixed_offset())),
            ..Default::default()
        };

        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let claimed = scoped::update_if::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                id.into_inner(),
                claimable,
                patch,
            )
            .await?;
            txn.commit().await?;
            Ok(claimed)
        })
        .await
        .map_err(|err| for_schedule(err, id))
    }

    async fn attach_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
        ticket_id: TicketId,
    ) -> Result<(), StoreError> {
        let patch = pm_schedules::ActiveModel {
            work_order_ticket_id: Set(Some(ticket_id.into_inner())),
            ..Default::default()
        };

        let attached = bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let attached = scoped::update_if::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                id.into_inner(),
                held(claim),
                patch,
            )
            .await?;
            txn.commit().await?;
            Ok(attached)
        })
        .await
        .map_err(|err| for_schedule(err, id))?;

        if attached {
            Ok(())
        } else {
            let scheduled_date = claim.scheduled_date;
            warn!(schedule_id = %id, %scheduled_date, %ticket_id, "work order claim lost before ticket was attached");
            Err(StoreError::Conflict(format!(
                "work order claim for {scheduled_date} no longer held"
            )))
        }
    }

    async fn release_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
    ) -> Result<(), StoreError> {
        let patch = pm_schedules::ActiveModel {
            work_order_date: Set(None),
            work_order_claimed_at: Set(None),
            ..Default::default()
        };

        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let released = scoped::update_if::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                id.into_inner(),
                held(claim),
                patch,
            )
            .await?;
            txn.commit().await?;
            debug!(schedule_id = %id, scheduled_date = %claim.scheduled_date, released, "work order claim released");
            Ok(())
        })
        .await
        .map_err(|err| for_schedule(err, id))
    }

    async fn find_completion(
        &self,
        ctx: &TenantContext,
        schedule_id: ScheduleId,
        scheduled_date: NaiveDate,
    ) -> Result<Option<PmCompletion>, StoreError> {
        let occurrence = Condition::all()
            .add(pm_completions::Column::ScheduleId.eq(schedule_id.into_inner()))
            .add(pm_completions::Column::ScheduledDate.eq(scheduled_date));

        Ok(bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let models = scoped::find_audit::<pm_completions::Entity, _>(
                txn.transaction(),
                ctx,
                occurrence,
                pm_completions::Column::ScheduledDate,
            )
            .await?;
            txn.commit().await?;
            Ok(models.into_iter().next().map(to_completion))
        })
        .await?)
    }

    async fn list_completions(
        &self,
        ctx: &TenantContext,
        schedule_id: ScheduleId,
    ) -> Result<Vec<PmCompletion>, StoreError> {
        Ok(bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let models = scoped::find_audit::<pm_completions::Entity, _>(
                txn.transaction(),
                ctx,
                pm_completions::Column::ScheduleId.eq(schedule_id.into_inner()),
                pm_completions::Column::ScheduledDate,
            )
            .await?;
            txn.commit().await?;
            Ok(models.into_iter().map(to_completion).collect())
        })
        .await?)
    }

    async fn completions_between(
        &self,
        ctx: &TenantContext,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PmCompletion>, StoreError> {
        Ok(bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;
            let models = scoped::find_audit::<pm_completions::Entity, _>(
                txn.transaction(),
                ctx,
                pm_completions::Column::ScheduledDate.between(from, to),
                pm_completions::Column::ScheduledDate,
            )
            .await?;
            txn.commit().await?;
            Ok(models.into_iter().map(to_completion).collect())
        })
        .await?)
    }

    async fn record_completion(
        &self,
        ctx: &TenantContext,
        completion: NewCompletion,
        next_due_date: NaiveDate,
    ) -> Result<CompletionOutcome, StoreError> {
        let schedule_id = completion.schedule_id;
        let scheduled_date = completion.scheduled_date;

        let record = pm_completions::ActiveModel {
            ticket_id: Set(completion.ticket_id.into_inner()),
            scheduled_date: Set(scheduled_date),
            completed_date: Set(completion.completed_date),
            completed_by: Set(completion.completed_by.into_inner()),
            checklist_results: Set(completion.checklist_results),
            notes: Set(completion.notes),
            ..Default::default()
        };
        let advance = pm_schedules::ActiveModel {
            next_due_date: Set(next_due_date),
            work_order_date: Set(None),
            work_order_ticket_id: Set(None),
            work_order_claimed_at: Set(None),
            ..Default::default()
        };

        bounded(self.timeout, async {
            let txn = TenantTransaction::begin(&self.db, ctx).await?;

            let inserted = scoped::append::<pm_completions::Entity, _>(
                txn.transaction(),
                ctx,
                schedule_id.into_inner(),
                record,
            )
            .await?;

            let advanced = scoped::update_if::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                schedule_id.into_inner(),
                pm_schedules::Column::NextDueDate.eq(scheduled_date),
                advance,
            )
            .await?;
            if !advanced {
                txn.rollback().await?;
                return Err(RepositoryError::Conflict(format!(
                    "PM schedule has already moved past {scheduled_date}"
                )));
            }

            let schedule = scoped::find_by_id::<pm_schedules::Entity, _>(
                txn.transaction(),
                ctx,
                schedule_id.into_inner(),
            )
            .await?
            .ok_or(RepositoryError::NotFound)?;

            txn.commit().await?;

            Ok(CompletionOutcome {
                completion: to_completion(inserted),
                schedule: to_schedule(schedule)?,
            })
        })
        .await
        .map_err(|err| for_schedule(err, schedule_id))
    }
}
