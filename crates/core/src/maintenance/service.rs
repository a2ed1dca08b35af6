//! PM scheduling service.
//!
//! Turns schedule rules into dated occurrences, generates work orders for
//! due occurrences, and records completions. Storage and ticket creation
//! are injected so the service itself stays free of database and network
//! code.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, SubsecRound, TimeDelta, Utc};
use tracing::{debug, info, instrument, warn};
use upkeep_shared::TenantContext;
use upkeep_shared::types::{ScheduleId, TicketId};

use super::error::PmError;
use super::store::{ScheduleStore, StoreError};
use super::types::{
    CalendarEntry, CompletionOutcome, CreateScheduleInput, DueSchedules, GeneratedTicket,
    MarkCompletedInput, NewCompletion, NewSchedule, OccurrenceStatus, PmCompletion, PmSchedule,
    SchedulePatch, TicketGenerationFailure, TicketGenerationReport, UpdateScheduleInput,
    WorkOrderClaim,
};
use super::validation::{validate_create, validate_update};
use super::work_order::{WorkOrderCreator, WorkOrderRequest};
use crate::recurrence::{DueStatus, RecurrenceEngine};

/// How long a ticketless work order claim is honoured before another
/// caller may take it over.
pub const DEFAULT_CLAIM_LEASE: TimeDelta = TimeDelta::minutes(5);

fn fresh_claim(scheduled_date: NaiveDate) -> WorkOrderClaim {
    WorkOrderClaim {
        scheduled_date,
        claimed_at: Utc::now().trunc_subsecs(6),
    }
}

/// PM scheduling service.
pub struct PmScheduler<S, W> {
    store: S,
    work_orders: W,
    claim_lease: TimeDelta,
}

impl<S, W> PmScheduler<S, W>
where
    S: ScheduleStore,
    W: WorkOrderCreator,
{
    /// Creates a scheduler over a store and a ticket service.
    pub const fn new(store: S, work_orders: W) -> Self {
        Self {
            store,
            work_orders,
            claim_lease: DEFAULT_CLAIM_LEASE,
        }
    }

    /// Overrides the claim lease. It should comfortably exceed the ticket
    /// service's worst-case latency.
    #[must_use]
    pub const fn with_claim_lease(mut self, lease: TimeDelta) -> Self {
        self.claim_lease = lease;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Creates a schedule whose first occurrence falls on or after
    /// `input.start_date` (or `today`).
    ///
    /// # Errors
    ///
    /// - `Validation` listing every violated field.
    /// - `TargetNotFound` if the asset or location is not visible to the tenant.
    #[instrument(skip(self, ctx, input), fields(name = %input.name))]
    pub async fn create_schedule(
        &self,
        ctx: &TenantContext,
        input: CreateScheduleInput,
        today: NaiveDate,
    ) -> Result<PmSchedule, PmError> {
        ctx.tenant_id()?;
        let (target, rule) = validate_create(&input)?;

        if !self.store.target_exists(ctx, target).await? {
            return Err(PmError::TargetNotFound(target));
        }

        let start = input.start_date.unwrap_or(today);
        let next_due_date = RecurrenceEngine::first_occurrence(&rule, start)?;

        let schedule = self
            .store
            .insert_schedule(
                ctx,
                NewSchedule {
                    template_id: input.template_id,
                    name: input.name.trim().to_string(),
                    description: input.description,
                    target,
                    rule,
                    assigned_to: input.assigned_to,
                    vendor_id: input.vendor_id,
                    estimated_cost: input.estimated_cost,
                    next_due_date,
                },
            )
            .await?;

        info!(schedule_id = %schedule.id, %next_due_date, "PM schedule created");
        Ok(schedule)
    }

    /// Loads one schedule.
    ///
    /// # Errors
    ///
    /// `ScheduleNotFound` if absent, deleted, or foreign.
    pub async fn get_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
    ) -> Result<PmSchedule, PmError> {
        self.store
            .find_schedule(ctx, id)
            .await?
            .ok_or(PmError::ScheduleNotFound(id))
    }

    /// Lists the tenant's live schedules, active and inactive.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn list_schedules(&self, ctx: &TenantContext) -> Result<Vec<PmSchedule>, PmError> {
        Ok(self.store.list_schedules(ctx, false).await?)
    }

    /// Updates a schedule. A new rule re-anchors the due date to the first
    /// occurrence on or after the current one.
    ///
    /// # Errors
    ///
    /// - `Validation` or `ScheduleNotFound`.
    /// - `Conflict` if a rule change races a completion that moved the due date.
    #[instrument(skip(self, ctx, input))]
    pub async fn update_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        input: UpdateScheduleInput,
    ) -> Result<PmSchedule, PmError> {
        ctx.tenant_id()?;
        validate_update(&input)?;
        let current = self.get_schedule(ctx, id).await?;

        let next_due_date = match &input.rule {
            Some(rule) if *rule != current.rule => Some(RecurrenceEngine::first_occurrence(
                rule,
                current.next_due_date,
            )?),
            _ => None,
        };

        let patch = SchedulePatch {
            name: input.name.map(|n| n.trim().to_string()),
            description: input.description,
            template_id: input.template_id,
            assigned_to: input.assigned_to,
            vendor_id: input.vendor_id,
            estimated_cost: input.estimated_cost,
            rule: input.rule,
            next_due_date,
            is_active: None,
        };

        let updated = if next_due_date.is_some() {
            self.store
                .update_schedule_if_due(ctx, id, current.next_due_date, patch)
                .await?
        } else {
            self.store.update_schedule(ctx, id, patch).await?
        };
        debug!(schedule_id = %id, next_due_date = %updated.next_due_date, "PM schedule updated");
        Ok(updated)
    }

    /// Activates or deactivates a schedule. History is untouched.
    ///
    /// # Errors
    ///
    /// `ScheduleNotFound`.
    pub async fn set_active(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        active: bool,
    ) -> Result<PmSchedule, PmError> {
        let patch = SchedulePatch {
            is_active: Some(active),
            ..SchedulePatch::default()
        };
        let updated = self.store.update_schedule(ctx, id, patch).await?;
        info!(schedule_id = %id, active, "PM schedule activation changed");
        Ok(updated)
    }

    /// Soft-deletes a schedule.
    ///
    /// # Errors
    ///
    /// `ScheduleNotFound`.
    pub async fn delete_schedule(&self, ctx: &TenantContext, id: ScheduleId) -> Result<(), PmError> {
        self.store.delete_schedule(ctx, id).await?;
        info!(schedule_id = %id, "PM schedule deleted");
        Ok(())
    }

    /// Completion history of one schedule.
    ///
    /// # Errors
    ///
    /// `ScheduleNotFound` if the schedule is not visible.
    pub async fn list_completions(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
    ) -> Result<Vec<PmCompletion>, PmError> {
        self.get_schedule(ctx, id).await?;
        Ok(self.store.list_completions(ctx, id).await?)
    }

    /// Active schedules due today or overdue as of `today`.
    ///
    /// # Errors
    ///
    /// Propagates storage errors.
    pub async fn list_due(&self, ctx: &TenantContext, today: NaiveDate) -> Result<DueSchedules, PmError> {
        let schedules = self.store.list_schedules(ctx, true).await?;

        let mut result = DueSchedules::default();
        for schedule in schedules {
            match schedule.status(today) {
                DueStatus::Due => result.due.push(schedule),
                DueStatus::Overdue => result.overdue.push(schedule),
                DueStatus::Upcoming => {}
            }
        }
        Ok(result)
    }

    /// Every occurrence falling in the given month.
    ///
    /// Active schedules are projected forward from their current due date.
    /// Recorded completions in the month appear as `Completed`. Entries are
    /// sorted by date, then schedule ID.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad month; storage errors otherwise.
    pub async fn calendar(
        &self,
        ctx: &TenantContext,
        year: i32,
        month: u32,
        today: NaiveDate,
    ) -> Result<Vec<CalendarEntry>, PmError> {
        let (start, end) = RecurrenceEngine::month_window(year, month)?;
        let schedules = self.store.list_schedules(ctx, false).await?;

        let mut entries = Vec::new();
        for schedule in schedules.iter().filter(|s| s.is_active) {
            let dates = RecurrenceEngine::occurrences_in_window(
                &schedule.rule,
                schedule.next_due_date,
                start,
                end,
            )?;
            entries.extend(dates.into_iter().map(|date| CalendarEntry {
                schedule_id: schedule.id,
                schedule_name: schedule.name.clone(),
                target: schedule.target,
                date,
                status: RecurrenceEngine::classify(date, today).into(),
                ticket_id: schedule.ticket_for(date),
            }));
        }

        let by_id: HashMap<ScheduleId, &PmSchedule> = schedules.iter().map(|s| (s.id, s)).collect();
        for completion in self.store.completions_between(ctx, start, end).await? {
            let Some(schedule) = by_id.get(&completion.schedule_id) else {
                continue;
            };
            entries.push(CalendarEntry {
                schedule_id: schedule.id,
                schedule_name: schedule.name.clone(),
                target: schedule.target,
                date: completion.scheduled_date,
                status: OccurrenceStatus::Completed,
                ticket_id: Some(completion.ticket_id),
            });
        }

        entries.sort_by(|a, b| a.date.cmp(&b.date).then(a.schedule_id.cmp(&b.schedule_id)));
        Ok(entries)
    }

    /// Creates a work order for every due or overdue occurrence that has none.
    ///
    /// Each occurrence is claimed with a conditional update before the
    /// ticket service is called, so concurrent runs create at most one
    /// ticket per occurrence. A claim left without a ticket for longer than
    /// the claim lease is taken over. Failures of one occurrence are
    /// reported and do not stop the run.
    ///
    /// # Errors
    ///
    /// `TenantContextMissing`, or a storage error while listing schedules.
    #[instrument(skip(self, ctx))]
    pub async fn generate_tickets(
        &self,
        ctx: &TenantContext,
        today: NaiveDate,
    ) -> Result<TicketGenerationReport, PmError> {
        ctx.tenant_id()?;
        let schedules = self.store.list_schedules(ctx, true).await?;
        let mut report = TicketGenerationReport::default();

        for schedule in schedules.iter().filter(|s| s.status(today).is_actionable()) {
            match self.generate_for(ctx, schedule).await {
                Ok(Some(ticket)) => report.created.push(ticket),
                Ok(None) => report.skipped.push(schedule.id),
                Err(failure) => report.failed.push(failure),
            }
        }

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "PM ticket generation finished"
        );
        Ok(report)
    }

    async fn generate_for(
        &self,
        ctx: &TenantContext,
        schedule: &PmSchedule,
    ) -> Result<Option<GeneratedTicket>, TicketGenerationFailure> {
        let date = schedule.next_due_date;
        let failure = |ticket_id, reason: String| TicketGenerationFailure {
            schedule_id: schedule.id,
            scheduled_date: date,
            ticket_id,
            reason,
        };

        if schedule.ticket_for(date).is_some() {
            debug!(schedule_id = %schedule.id, %date, "occurrence already has a work order");
            return Ok(None);
        }
        let completed = self
            .store
            .find_completion(ctx, schedule.id, date)
            .await
            .map_err(|err| failure(None, err.to_string()))?;
        if completed.is_some() {
            debug!(schedule_id = %schedule.id, %date, "occurrence already completed");
            return Ok(None);
        }

        let claim = fresh_claim(date);
        let claimed = self
            .store
            .claim_work_order(ctx, schedule.id, claim, self.stale_before(claim))
            .await
            .map_err(|err| {
                warn!(schedule_id = %schedule.id, %date, error = %err, "PM work order claim failed");
                failure(None, err.to_string())
            })?;
        if !claimed {
            debug!(schedule_id = %schedule.id, %date, "occurrence claimed by another caller");
            return Ok(None);
        }

        let request = WorkOrderRequest::for_occurrence(schedule, date);
        let ticket_id = match self.work_orders.create_work_order(ctx, request).await {
            Ok(ticket_id) => ticket_id,
            Err(err) => {
                warn!(schedule_id = %schedule.id, %date, error = %err, "PM work order creation failed");
                self.release_claim(ctx, schedule.id, claim).await;
                return Err(failure(None, err.to_string()));
            }
        };

        if let Err(err) = self
            .store
            .attach_work_order(ctx, schedule.id, claim, ticket_id)
            .await
        {
            warn!(
                schedule_id = %schedule.id,
                %date,
                %ticket_id,
                error = %err,
                "PM work order created but not recorded"
            );
            if !matches!(err, StoreError::Conflict(_)) {
                self.release_claim(ctx, schedule.id, claim).await;
            }
            return Err(failure(Some(ticket_id), err.to_string()));
        }

        info!(schedule_id = %schedule.id, %date, %ticket_id, "PM work order created");
        Ok(Some(GeneratedTicket {
            schedule_id: schedule.id,
            scheduled_date: date,
            ticket_id,
        }))
    }

    fn stale_before(&self, claim: WorkOrderClaim) -> DateTime<Utc> {
        claim
            .claimed_at
            .checked_sub_signed(self.claim_lease)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    async fn release_claim(&self, ctx: &TenantContext, id: ScheduleId, claim: WorkOrderClaim) {
        if let Err(err) = self.store.release_work_order(ctx, id, claim).await {
            warn!(
                schedule_id = %id,
                scheduled_date = %claim.scheduled_date,
                error = %err,
                "PM work order claim not released; it lapses with the lease"
            );
        }
    }

    async fn issue_for_completion(
        &self,
        ctx: &TenantContext,
        schedule: &PmSchedule,
        scheduled_date: NaiveDate,
    ) -> Result<TicketId, PmError> {
        let claim = fresh_claim(scheduled_date);
        if !self
            .store
            .claim_work_order(ctx, schedule.id, claim, self.stale_before(claim))
            .await?
        {
            return Err(PmError::Conflict(format!(
                "work order for {scheduled_date} is already being generated"
            )));
        }

        let request = WorkOrderRequest::for_occurrence(schedule, scheduled_date);
        let ticket_id = match self.work_orders.create_work_order(ctx, request).await {
            Ok(ticket_id) => ticket_id,
            Err(err) => {
                self.release_claim(ctx, schedule.id, claim).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self
            .store
            .attach_work_order(ctx, schedule.id, claim, ticket_id)
            .await
        {
            warn!(schedule_id = %schedule.id, %scheduled_date, %ticket_id, error = %err, "PM work order created but not recorded");
            return Err(err.into());
        }
        Ok(ticket_id)
    }

    /// Fulfils the schedule's current occurrence and advances it.
    ///
    /// Writes one completion record and moves `next_due_date` to the next
    /// occurrence in a single atomic step. If the input carries no ticket
    /// and none was generated for the occurrence, the occurrence is claimed
    /// and one is created first.
    ///
    /// # Errors
    ///
    /// - `ScheduleNotFound`, `ScheduleInactive`.
    /// - `AlreadyCompleted` if the occurrence has a completion.
    /// - `OutOfOrderCompletion` if it is not the current occurrence.
    /// - `Conflict` if a concurrent completion won, or a ticket for the
    ///   occurrence is still being generated.
    #[instrument(skip(self, ctx, input), fields(schedule_id = %input.schedule_id))]
    pub async fn mark_completed(
        &self,
        ctx: &TenantContext,
        input: MarkCompletedInput,
    ) -> Result<CompletionOutcome, PmError> {
        ctx.tenant_id()?;
        let schedule = self.get_schedule(ctx, input.schedule_id).await?;
        let scheduled_date = input.scheduled_date.unwrap_or(schedule.next_due_date);

        if self
            .store
            .find_completion(ctx, schedule.id, scheduled_date)
            .await?
            .is_some()
        {
            return Err(PmError::AlreadyCompleted {
                schedule_id: schedule.id,
                scheduled_date,
            });
        }
        if !schedule.is_active {
            return Err(PmError::ScheduleInactive(schedule.id));
        }
        if scheduled_date != schedule.next_due_date {
            return Err(PmError::OutOfOrderCompletion {
                schedule_id: schedule.id,
                scheduled_date,
                next_due_date: schedule.next_due_date,
            });
        }

        let next_due_date = RecurrenceEngine::next_occurrence(&schedule.rule, scheduled_date)?;

        let ticket_id = match input.ticket_id.or_else(|| schedule.ticket_for(scheduled_date)) {
            Some(ticket_id) => ticket_id,
            None => self.issue_for_completion(ctx, &schedule, scheduled_date).await?,
        };

        let outcome = self
            .store
            .record_completion(
                ctx,
                NewCompletion {
                    schedule_id: schedule.id,
                    ticket_id,
                    scheduled_date,
                    completed_date: input.completed_date,
                    completed_by: input.completed_by,
                    checklist_results: input.checklist_results,
                    notes: input.notes,
                },
                next_due_date,
            )
            .await?;

        info!(
            %scheduled_date,
            %next_due_date,
            completion_id = %outcome.completion.id,
            "PM occurrence completed"
        );
        Ok(outcome)
    }
}
