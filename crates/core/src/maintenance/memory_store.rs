//! Tenant-aware in-memory `ScheduleStore` for service tests.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use upkeep_shared::TenantContext;
use upkeep_shared::types::{CompletionId, ScheduleId, TenantId, TicketId};

use super::store::{ScheduleStore, StoreError};
use super::types::{
    CompletionOutcome, NewCompletion, NewSchedule, PmCompletion, PmSchedule, SchedulePatch,
    ScheduleTarget, WorkOrderClaim, WorkOrderRef,
};

#[derive(Default)]
struct Inner {
    targets: HashSet<(TenantId, ScheduleTarget)>,
    schedules: Vec<(PmSchedule, bool)>,
    completions: Vec<PmCompletion>,
}

impl Inner {
    fn live_mut(&mut self, tenant: TenantId, id: ScheduleId) -> Result<&mut PmSchedule, StoreError> {
        self.schedules
            .iter_mut()
            .find(|(s, deleted)| !deleted && s.id == id && s.tenant_id == tenant)
            .map(|(s, _)| s)
            .ok_or(StoreError::NotFound(id))
    }

    fn live_ids(&self, tenant: TenantId) -> HashSet<ScheduleId> {
        self.schedules
            .iter()
            .filter(|(s, deleted)| !deleted && s.tenant_id == tenant)
            .map(|(s, _)| s.id)
            .collect()
    }
}

/// Shared handle; clones see the same data.
#[derive(Clone, Default)]
pub(crate) struct MemoryScheduleStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryScheduleStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub(crate) fn add_target(&self, tenant: TenantId, target: ScheduleTarget) {
        self.lock().targets.insert((tenant, target));
    }

    pub(crate) fn completion_count(&self) -> usize {
        self.lock().completions.len()
    }
}

fn held(work_order: &WorkOrderRef, claim: WorkOrderClaim) -> bool {
    work_order.scheduled_date == claim.scheduled_date
        && work_order.claimed_at == claim.claimed_at
        && work_order.ticket_id.is_none()
}

fn tenant_of(ctx: &TenantContext) -> Result<TenantId, StoreError> {
    ctx.tenant_id().map_err(|_| StoreError::TenantContextMissing)
}

fn apply(schedule: &mut PmSchedule, patch: SchedulePatch) {
    if let Some(name) = patch.name {
        schedule.name = name;
    }
    if let Some(description) = patch.description {
        schedule.description = description;
    }
    if let Some(template_id) = patch.template_id {
        schedule.template_id = template_id;
    }
    if let Some(assigned_to) = patch.assigned_to {
        schedule.assigned_to = assigned_to;
    }
    if let Some(vendor_id) = patch.vendor_id {
        schedule.vendor_id = vendor_id;
    }
    if let Some(cost) = patch.estimated_cost {
        schedule.estimated_cost = cost;
    }
    if let Some(rule) = patch.rule {
        schedule.rule = rule;
    }
    if let Some(next_due_date) = patch.next_due_date {
        schedule.next_due_date = next_due_date;
    }
    if let Some(active) = patch.is_active {
        schedule.is_active = active;
    }
    schedule.updated_at = Utc::now();
}

#[async_trait::async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn target_exists(
        &self,
        ctx: &TenantContext,
        target: ScheduleTarget,
    ) -> Result<bool, StoreError> {
        let tenant = tenant_of(ctx)?;
        Ok(self.lock().targets.contains(&(tenant, target)))
    }

    async fn insert_schedule(
        &self,
        ctx: &TenantContext,
        schedule: NewSchedule,
    ) -> Result<PmSchedule, StoreError> {
        let tenant = tenant_of(ctx)?;
        let now = Utc::now();
        let stored = PmSchedule {
            id: ScheduleId::new(),
            tenant_id: tenant,
            template_id: schedule.template_id,
            name: schedule.name,
            description: schedule.description,
            target: schedule.target,
            rule: schedule.rule,
            assigned_to: schedule.assigned_to,
            vendor_id: schedule.vendor_id,
            estimated_cost: schedule.estimated_cost,
            next_due_date: schedule.next_due_date,
            is_active: true,
            work_order: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().schedules.push((stored.clone(), false));
        Ok(stored)
    }

    async fn find_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
    ) -> Result<Option<PmSchedule>, StoreError> {
        let tenant = tenant_of(ctx)?;
        Ok(self.lock().live_mut(tenant, id).ok().map(|s| s.clone()))
    }

    async fn list_schedules(
        &self,
        ctx: &TenantContext,
        active_only: bool,
    ) -> Result<Vec<PmSchedule>, StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut schedules: Vec<PmSchedule> = self
            .lock()
            .schedules
            .iter()
            .filter(|(s, deleted)| !deleted && s.tenant_id == tenant && (!active_only || s.is_active))
            .map(|(s, _)| s.clone())
            .collect();
        schedules.sort_by_key(|s| (s.next_due_date, s.id));
        Ok(schedules)
    }

    async fn update_schedule(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        patch: SchedulePatch,
    ) -> Result<PmSchedule, StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut inner = self.lock();
        let schedule = inner.live_mut(tenant, id)?;
        apply(schedule, patch);
        Ok(schedule.clone())
    }

    async fn update_schedule_if_due(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        expected_next_due: NaiveDate,
        patch: SchedulePatch,
    ) -> Result<PmSchedule, StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut inner = self.lock();
        let schedule = inner.live_mut(tenant, id)?;
        if schedule.next_due_date != expected_next_due {
            return Err(StoreError::Conflict("schedule has moved on".to_string()));
        }
        apply(schedule, patch);
        Ok(schedule.clone())
    }

    async fn delete_schedule(&self, ctx: &TenantContext, id: ScheduleId) -> Result<(), StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut inner = self.lock();
        let entry = inner
            .schedules
            .iter_mut()
            .find(|(s, deleted)| !deleted && s.id == id && s.tenant_id == tenant)
            .ok_or(StoreError::NotFound(id))?;
        entry.1 = true;
        Ok(())
    }

    async fn claim_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
        stale_before: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut inner = self.lock();
        let schedule = inner.live_mut(tenant, id)?;
        let free = schedule.next_due_date == claim.scheduled_date
            && schedule.work_order.is_none_or(|wo| {
                wo.scheduled_date != claim.scheduled_date
                    || (wo.ticket_id.is_none() && wo.claimed_at < stale_before)
            });
        if free {
            schedule.work_order = Some(WorkOrderRef {
                scheduled_date: claim.scheduled_date,
                ticket_id: None,
                claimed_at: claim.claimed_at,
            });
        }
        Ok(free)
    }

    async fn attach_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
        ticket_id: TicketId,
    ) -> Result<(), StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut inner = self.lock();
        let schedule = inner.live_mut(tenant, id)?;
        match &mut schedule.work_order {
            Some(wo) if held(wo, claim) => {
                wo.ticket_id = Some(ticket_id);
                Ok(())
            }
            _ => Err(StoreError::Conflict("work order claim lost".to_string())),
        }
    }

    async fn release_work_order(
        &self,
        ctx: &TenantContext,
        id: ScheduleId,
        claim: WorkOrderClaim,
    ) -> Result<(), StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut inner = self.lock();
        let schedule = inner.live_mut(tenant, id)?;
        if schedule.work_order.is_some_and(|wo| held(&wo, claim)) {
            schedule.work_order = None;
        }
        Ok(())
    }

    async fn find_completion(
        &self,
        ctx: &TenantContext,
        schedule_id: ScheduleId,
        scheduled_date: NaiveDate,
    ) -> Result<Option<PmCompletion>, StoreError> {
        let tenant = tenant_of(ctx)?;
        let inner = self.lock();
        if !inner.live_ids(tenant).contains(&schedule_id) {
            return Ok(None);
        }
        Ok(inner
            .completions
            .iter()
            .find(|c| c.schedule_id == schedule_id && c.scheduled_date == scheduled_date)
            .cloned())
    }

    async fn list_completions(
        &self,
        ctx: &TenantContext,
        schedule_id: ScheduleId,
    ) -> Result<Vec<PmCompletion>, StoreError> {
        let tenant = tenant_of(ctx)?;
        let inner = self.lock();
        if !inner.live_ids(tenant).contains(&schedule_id) {
            return Ok(Vec::new());
        }
        let mut completions: Vec<PmCompletion> = inner
            .completions
            .iter()
            .filter(|c| c.schedule_id == schedule_id)
            .cloned()
            .collect();
        completions.sort_by_key(|c| c.scheduled_date);
        Ok(completions)
    }

    async fn completions_between(
        &self,
        ctx: &TenantContext,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PmCompletion>, StoreError> {
        let tenant = tenant_of(ctx)?;
        let inner = self.lock();
        let ids = inner.live_ids(tenant);
        Ok(inner
            .completions
            .iter()
            .filter(|c| ids.contains(&c.schedule_id) && c.scheduled_date >= from && c.scheduled_date <= to)
            .cloned()
            .collect())
    }

    async fn record_completion(
        &self,
        ctx: &TenantContext,
        completion: NewCompletion,
        next_due_date: NaiveDate,
    ) -> Result<CompletionOutcome, StoreError> {
        let tenant = tenant_of(ctx)?;
        let mut inner = self.lock();

        if inner
            .completions
            .iter()
            .any(|c| c.schedule_id == completion.schedule_id && c.scheduled_date == completion.scheduled_date)
        {
            return Err(StoreError::Conflict("occurrence already completed".to_string()));
        }

        let schedule = inner.live_mut(tenant, completion.schedule_id)?;
        if schedule.next_due_date != completion.scheduled_date {
            return Err(StoreError::Conflict("schedule has moved on".to_string()));
        }
        schedule.next_due_date = next_due_date;
        schedule.work_order = None;
        schedule.updated_at = Utc::now();
        let schedule = schedule.clone();

        let record = PmCompletion {
            id: CompletionId::new(),
            schedule_id: completion.schedule_id,
            ticket_id: completion.ticket_id,
            scheduled_date: completion.scheduled_date,
            completed_date: completion.completed_date,
            completed_by: completion.completed_by,
            checklist_results: completion.checklist_results,
            notes: completion.notes,
            created_at: Utc::now(),
        };
        inner.completions.push(record.clone());

        Ok(CompletionOutcome {
            completion: record,
            schedule,
        })
    }
}
