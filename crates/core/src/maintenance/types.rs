//! Preventive-maintenance data types.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use upkeep_shared::types::{
    AssetId, CompletionId, LocationId, ScheduleId, TemplateId, TenantId, TicketId, UserId,
    VendorId,
};

use crate::recurrence::{DueStatus, RecurrenceEngine, RecurrenceRule};

/// What a schedule maintains: exactly one asset or one location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScheduleTarget {
    /// A single asset.
    Asset(AssetId),
    /// A whole location.
    Location(LocationId),
}

impl ScheduleTarget {
    /// Builds a target from the two nullable columns; `None` unless exactly one is set.
    #[must_use]
    pub const fn from_parts(asset_id: Option<AssetId>, location_id: Option<LocationId>) -> Option<Self> {
        match (asset_id, location_id) {
            (Some(asset), None) => Some(Self::Asset(asset)),
            (None, Some(location)) => Some(Self::Location(location)),
            _ => None,
        }
    }

    /// The asset, if this targets one.
    #[must_use]
    pub const fn asset_id(&self) -> Option<AssetId> {
        match self {
            Self::Asset(id) => Some(*id),
            Self::Location(_) => None,
        }
    }

    /// The location, if this targets one.
    #[must_use]
    pub const fn location_id(&self) -> Option<LocationId> {
        match self {
            Self::Location(id) => Some(*id),
            Self::Asset(_) => None,
        }
    }
}

impl std::fmt::Display for ScheduleTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Asset(id) => write!(f, "asset {id}"),
            Self::Location(id) => write!(f, "location {id}"),
        }
    }
}

/// Reference to the work order generated for one occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrderRef {
    /// The occurrence the work order was claimed for.
    pub scheduled_date: NaiveDate,
    /// The ticket, once the ticket service has returned one.
    pub ticket_id: Option<TicketId>,
    /// When the slot was claimed. A ticketless claim older than the
    /// scheduler's lease may be taken over.
    pub claimed_at: DateTime<Utc>,
}

/// A claim on one occurrence's work order slot.
///
/// `claimed_at` identifies the holder: attaching or releasing only succeeds
/// while the stored claim still carries the same timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkOrderClaim {
    /// The occurrence being claimed.
    pub scheduled_date: NaiveDate,
    /// Claim time, truncated to microseconds.
    pub claimed_at: DateTime<Utc>,
}

/// A recurring maintenance rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmSchedule {
    /// Schedule ID.
    pub id: ScheduleId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Checklist template.
    pub template_id: Option<TemplateId>,
    /// Display name.
    pub name: String,
    /// Work description copied onto generated work orders.
    pub description: Option<String>,
    /// Asset or location being maintained.
    pub target: ScheduleTarget,
    /// Cadence.
    pub rule: RecurrenceRule,
    /// Default assignee for generated work orders.
    pub assigned_to: Option<UserId>,
    /// Vendor performing the work.
    pub vendor_id: Option<VendorId>,
    /// Estimated cost per occurrence.
    pub estimated_cost: Option<Decimal>,
    /// The current occurrence.
    pub next_due_date: NaiveDate,
    /// Inactive schedules are kept but never projected or generated.
    pub is_active: bool,
    /// Work order claimed for an occurrence, if any.
    pub work_order: Option<WorkOrderRef>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl PmSchedule {
    /// Due state of the current occurrence.
    #[must_use]
    pub fn status(&self, today: NaiveDate) -> DueStatus {
        RecurrenceEngine::classify(self.next_due_date, today)
    }

    /// Ticket already generated for `scheduled_date`, if any.
    #[must_use]
    pub fn ticket_for(&self, scheduled_date: NaiveDate) -> Option<TicketId> {
        self.work_order
            .filter(|wo| wo.scheduled_date == scheduled_date)
            .and_then(|wo| wo.ticket_id)
    }
}

/// Immutable record of one fulfilled occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmCompletion {
    /// Completion ID.
    pub id: CompletionId,
    /// Schedule the occurrence belongs to.
    pub schedule_id: ScheduleId,
    /// Work order that carried out the occurrence.
    pub ticket_id: TicketId,
    /// The occurrence fulfilled.
    pub scheduled_date: NaiveDate,
    /// When the work was done.
    pub completed_date: NaiveDate,
    /// Who did it.
    pub completed_by: UserId,
    /// Checklist answers, free-form.
    pub checklist_results: Option<serde_json::Value>,
    /// Technician notes.
    pub notes: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a PM schedule.
#[derive(Debug, Clone)]
pub struct CreateScheduleInput {
    /// Checklist template.
    pub template_id: Option<TemplateId>,
    /// Display name.
    pub name: String,
    /// Work description.
    pub description: Option<String>,
    /// Asset to maintain (exclusive with `location_id`).
    pub asset_id: Option<AssetId>,
    /// Location to maintain (exclusive with `asset_id`).
    pub location_id: Option<LocationId>,
    /// Cadence.
    pub frequency: crate::recurrence::Frequency,
    /// Weekday for weekly schedules, 0 = Sunday.
    pub day_of_week: Option<u8>,
    /// Day of month for month-based schedules.
    pub day_of_month: Option<u8>,
    /// Month for annual schedules.
    pub month_of_year: Option<u8>,
    /// Default assignee.
    pub assigned_to: Option<UserId>,
    /// Vendor.
    pub vendor_id: Option<VendorId>,
    /// Estimated cost per occurrence.
    pub estimated_cost: Option<Decimal>,
    /// First date the schedule may fall on; defaults to today.
    pub start_date: Option<NaiveDate>,
}

impl CreateScheduleInput {
    /// The recurrence rule described by the input fields.
    #[must_use]
    pub const fn rule(&self) -> RecurrenceRule {
        RecurrenceRule {
            frequency: self.frequency,
            day_of_week: self.day_of_week,
            day_of_month: self.day_of_month,
            month_of_year: self.month_of_year,
        }
    }
}

/// Input for updating a PM schedule. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateScheduleInput {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New template.
    pub template_id: Option<Option<TemplateId>>,
    /// New assignee.
    pub assigned_to: Option<Option<UserId>>,
    /// New vendor.
    pub vendor_id: Option<Option<VendorId>>,
    /// New estimated cost.
    pub estimated_cost: Option<Option<Decimal>>,
    /// New cadence; the due date is recomputed from the current one.
    pub rule: Option<RecurrenceRule>,
}

/// A validated schedule ready to be stored.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    /// Checklist template.
    pub template_id: Option<TemplateId>,
    /// Display name.
    pub name: String,
    /// Work description.
    pub description: Option<String>,
    /// Asset or location.
    pub target: ScheduleTarget,
    /// Cadence.
    pub rule: RecurrenceRule,
    /// Default assignee.
    pub assigned_to: Option<UserId>,
    /// Vendor.
    pub vendor_id: Option<VendorId>,
    /// Estimated cost.
    pub estimated_cost: Option<Decimal>,
    /// Initial occurrence.
    pub next_due_date: NaiveDate,
}

/// Field changes applied to a stored schedule. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct SchedulePatch {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<Option<String>>,
    /// New template.
    pub template_id: Option<Option<TemplateId>>,
    /// New assignee.
    pub assigned_to: Option<Option<UserId>>,
    /// New vendor.
    pub vendor_id: Option<Option<VendorId>>,
    /// New estimated cost.
    pub estimated_cost: Option<Option<Decimal>>,
    /// New cadence.
    pub rule: Option<RecurrenceRule>,
    /// New current occurrence.
    pub next_due_date: Option<NaiveDate>,
    /// Activate or deactivate.
    pub is_active: Option<bool>,
}

/// Input for completing a schedule's current occurrence.
#[derive(Debug, Clone)]
pub struct MarkCompletedInput {
    /// Schedule being completed.
    pub schedule_id: ScheduleId,
    /// Occurrence being completed; defaults to the schedule's `next_due_date`.
    /// Supplying it makes a retry of the same request idempotent.
    pub scheduled_date: Option<NaiveDate>,
    /// Work order that carried out the work; generated if neither supplied nor already linked.
    pub ticket_id: Option<TicketId>,
    /// Who did the work.
    pub completed_by: UserId,
    /// When the work was done.
    pub completed_date: NaiveDate,
    /// Checklist answers.
    pub checklist_results: Option<serde_json::Value>,
    /// Technician notes.
    pub notes: Option<String>,
}

/// A completion ready to be stored.
#[derive(Debug, Clone)]
pub struct NewCompletion {
    /// Schedule.
    pub schedule_id: ScheduleId,
    /// Work order.
    pub ticket_id: TicketId,
    /// Occurrence fulfilled.
    pub scheduled_date: NaiveDate,
    /// Completion date.
    pub completed_date: NaiveDate,
    /// Completing user.
    pub completed_by: UserId,
    /// Checklist answers.
    pub checklist_results: Option<serde_json::Value>,
    /// Notes.
    pub notes: Option<String>,
}

/// Result of completing an occurrence.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    /// The audit record written.
    pub completion: PmCompletion,
    /// The schedule, advanced to its next occurrence.
    pub schedule: PmSchedule,
}

/// Schedules needing attention today.
#[derive(Debug, Clone, Default)]
pub struct DueSchedules {
    /// Due exactly today.
    pub due: Vec<PmSchedule>,
    /// Past due and not completed.
    pub overdue: Vec<PmSchedule>,
}

/// Status of a calendar entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    /// In the future.
    Upcoming,
    /// Today.
    Due,
    /// In the past and not completed.
    Overdue,
    /// Fulfilled by a completion record.
    Completed,
}

impl From<DueStatus> for OccurrenceStatus {
    fn from(status: DueStatus) -> Self {
        match status {
            DueStatus::Upcoming => Self::Upcoming,
            DueStatus::Due => Self::Due,
            DueStatus::Overdue => Self::Overdue,
        }
    }
}

/// One occurrence on the maintenance calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    /// Schedule.
    pub schedule_id: ScheduleId,
    /// Schedule name.
    pub schedule_name: String,
    /// Asset or location.
    pub target: ScheduleTarget,
    /// Occurrence date.
    pub date: NaiveDate,
    /// Occurrence state.
    pub status: OccurrenceStatus,
    /// Linked work order, if known.
    pub ticket_id: Option<TicketId>,
}

/// A work order created for a due occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedTicket {
    /// Schedule.
    pub schedule_id: ScheduleId,
    /// Occurrence.
    pub scheduled_date: NaiveDate,
    /// Ticket returned by the ticket service.
    pub ticket_id: TicketId,
}

/// A due occurrence for which no work order could be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketGenerationFailure {
    /// Schedule.
    pub schedule_id: ScheduleId,
    /// Occurrence.
    pub scheduled_date: NaiveDate,
    /// Ticket created but not recorded on the schedule, for reconciliation.
    pub ticket_id: Option<TicketId>,
    /// Reason reported by the ticket service or the store.
    pub reason: String,
}

/// Outcome of one ticket-generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketGenerationReport {
    /// Work orders created in this run.
    pub created: Vec<GeneratedTicket>,
    /// Occurrences already claimed or completed.
    pub skipped: Vec<ScheduleId>,
    /// Occurrences whose work order could not be created; retried on the next run.
    pub failed: Vec<TicketGenerationFailure>,
}
