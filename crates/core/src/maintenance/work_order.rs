//! Work-order creation seam.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use upkeep_shared::TenantContext;
use upkeep_shared::types::{ScheduleId, TemplateId, TicketId, UserId, VendorId};

use super::types::{PmSchedule, ScheduleTarget};

/// Errors reported by the ticket service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkOrderError {
    /// The ticket service refused the request.
    #[error("Work order rejected: {0}")]
    Rejected(String),

    /// The ticket service could not be reached.
    #[error("Ticket service unavailable: {0}")]
    Unavailable(String),
}

/// Payload for a preventive-maintenance work order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrderRequest {
    /// Originating schedule.
    pub schedule_id: ScheduleId,
    /// Occurrence being worked.
    pub scheduled_date: NaiveDate,
    /// Ticket title.
    pub title: String,
    /// Ticket body.
    pub description: Option<String>,
    /// Asset or location.
    pub target: ScheduleTarget,
    /// Checklist template.
    pub template_id: Option<TemplateId>,
    /// Assignee.
    pub assigned_to: Option<UserId>,
    /// Vendor.
    pub vendor_id: Option<VendorId>,
    /// Estimated cost.
    pub estimated_cost: Option<Decimal>,
}

impl WorkOrderRequest {
    /// Builds the request for one occurrence of a schedule.
    #[must_use]
    pub fn for_occurrence(schedule: &PmSchedule, scheduled_date: NaiveDate) -> Self {
        Self {
            schedule_id: schedule.id,
            scheduled_date,
            title: format!("PM: {} ({scheduled_date})", schedule.name),
            description: schedule.description.clone(),
            target: schedule.target,
            template_id: schedule.template_id,
            assigned_to: schedule.assigned_to,
            vendor_id: schedule.vendor_id,
            estimated_cost: schedule.estimated_cost,
        }
    }
}

/// Creates work orders in the external ticket service.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait WorkOrderCreator: Send + Sync {
    /// Creates a work order and returns its ticket ID.
    async fn create_work_order(
        &self,
        ctx: &TenantContext,
        request: WorkOrderRequest,
    ) -> Result<TicketId, WorkOrderError>;
}
