//! Persistence seam for PM schedules and completions.
//!
//! Implementations must scope every call to the tenant resolved from the
//! context and fail with [`StoreError::TenantContextMissing`] when none is
//! bound. Rows of other tenants and soft-deleted rows behave as absent.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use upkeep_shared::types::{ScheduleId, TicketId};
use upkeep_shared::{FieldViolations, TenantContext};

use super::types::{
    CompletionOutcome, NewCompletion, NewSchedule, PmCompletion, PmSchedule, SchedulePatch,
    ScheduleTarget, WorkOrderClaim,
};

/// Errors reported by a [`ScheduleStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// No tenant bound to the context.
    #[error("Tenant context is missing")]
    TenantContextMissing,

    /// Schedule absent, deleted, or owned by another tenant.
    #[error("PM schedule not found: {0}")]
    NotFound(ScheduleId),

    /// Row failed the entity's validation hook.
    #[error("Validation error: {0}")]
    Validation(FieldViolations),

    /// Uniqueness or compare-and-set conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage failure or timeout.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Tenant-scoped storage for PM schedules and their completion history.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Whether the asset or location exists for the tenant.
    async fn target_exists(
        &self,
        ctx: &TenantContext,
        target: ScheduleTarget,
    ) -> Result<bool, StoreError>;

    /// Stores a new schedule under the context's tenant.
    async fn insert_schedule(
        &self,
        ctx: &TenantContext,
        schedule: NewSchedule,
    ) -> Result<PmSchedule, StoreError>;

    /// Loads a live schedule.
    async fn find_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
    ) -> Result<Option<PmSchedule>, StoreError>;

    /// Lists live schedules ordered by `next_due_date`, optionally only active ones.
    async fn list_schedules(
        &self,
        ctx: &TenantContext,
        active_only: bool,
    ) -> Result<Vec<PmSchedule>, StoreError>;

    /// Applies a patch to a live schedule.
    async fn update_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        patch: SchedulePatch,
    ) -> Result<PmSchedule, StoreError>;

    /// Applies a patch only while the schedule is still due on
    /// `expected_next_due`.
    ///
    /// Fails with [`StoreError::Conflict`] and writes nothing when the due
    /// date has moved since the caller read it.
    async fn update_schedule_if_due(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        expected_next_due: NaiveDate,
        patch: SchedulePatch,
    ) -> Result<PmSchedule, StoreError>;

    /// Soft-deletes a schedule.
    async fn delete_schedule(&self, ctx: &TenantContext, id: ScheduleId) -> Result<(), StoreError>;

    /// Claims the work order slot for `claim.scheduled_date`.
    ///
    /// Only the schedule's current occurrence can be claimed. Succeeds when
    /// the slot is empty, holds another occurrence, or holds a ticketless
    /// claim for this occurrence made before `stale_before`. Returns `false`
    /// when the occurrence is no longer current or a live claim or ticket
    /// already holds it.
    async fn claim_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Records the ticket created under `claim`.
    ///
    /// Fails with [`StoreError::Conflict`] when the claim was taken over or
    /// cleared by a completion.
    async fn attach_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
        ticket_id: TicketId,
    ) -> Result<(), StoreError>;

    /// Releases `claim` if it is still held and has no ticket.
    async fn release_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
    ) -> Result<(), StoreError>;

    /// Completion for one occurrence, if recorded.
    async fn find_completion(
        &self,
        ctx: &TenantContext,
        schedule_id: ScheduleId,
        scheduled_date: NaiveDate,
    ) -> Result<Option<PmCompletion>, StoreError>;

    /// Completion history of a schedule, oldest occurrence first.
    async fn list_completions(
        &self,
        ctx: &TenantContext,
        schedule_id: ScheduleId,
    ) -> Result<Vec<PmCompletion>, StoreError>;

    /// Completions of the tenant's live schedules with `scheduled_date` in `[from, to]`.
    async fn completions_between(
        &self,
        ctx: &TenantContext,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PmCompletion>, StoreError>;

    /// Atomically writes the completion and advances the schedule.
    ///
    /// The schedule moves to `next_due_date` only if its current due date is
    /// still `completion.scheduled_date`. Its work order slot is cleared. A
    /// duplicate completion or a moved due date fails with
    /// [`StoreError::Conflict`] and writes nothing.
    async fn record_completion(
        &self,
        ctx: &TenantContext,
        completion: NewCompletion,
        next_due_date: NaiveDate,
    ) -> Result<CompletionOutcome, StoreError>;
}
