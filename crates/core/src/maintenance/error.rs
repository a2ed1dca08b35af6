//! Preventive-maintenance error types.

use chrono::NaiveDate;
use thiserror::Error;
use upkeep_shared::types::ScheduleId;
use upkeep_shared::{AppError, FieldViolations, MissingTenant};

use super::store::StoreError;
use super::types::ScheduleTarget;
use super::work_order::WorkOrderError;
use crate::recurrence::RecurrenceError;

/// PM scheduling errors.
#[derive(Debug, Error)]
pub enum PmError {
    /// No tenant was resolved for the operation.
    #[error("Tenant context is missing")]
    TenantContextMissing,

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(FieldViolations),

    /// Schedule not found (or belongs to another tenant).
    #[error("PM schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),

    /// The referenced asset or location does not exist for the tenant.
    #[error("Referenced {0} not found")]
    TargetNotFound(ScheduleTarget),

    /// The occurrence already has a completion record.
    #[error("Occurrence {scheduled_date} of PM schedule {schedule_id} is already completed")]
    AlreadyCompleted {
        /// Schedule.
        schedule_id: ScheduleId,
        /// Occurrence.
        scheduled_date: NaiveDate,
    },

    /// Completion requested for an occurrence other than the current one.
    #[error(
        "Cannot complete occurrence {scheduled_date} of PM schedule {schedule_id}: current occurrence is {next_due_date}"
    )]
    OutOfOrderCompletion {
        /// Schedule.
        schedule_id: ScheduleId,
        /// Requested occurrence.
        scheduled_date: NaiveDate,
        /// The schedule's current occurrence.
        next_due_date: NaiveDate,
    },

    /// Inactive schedules cannot be completed.
    #[error("PM schedule is inactive: {0}")]
    ScheduleInactive(ScheduleId),

    /// A concurrent write won.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The ticket service failed.
    #[error(transparent)]
    WorkOrder(#[from] WorkOrderError),

    /// Storage is unavailable or timed out.
    #[error("Storage unavailable: {0}")]
    Infrastructure(String),
}

impl PmError {
    /// Whether this error reports a lost race or a state conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyCompleted { .. }
                | Self::OutOfOrderCompletion { .. }
                | Self::ScheduleInactive(_)
                | Self::Conflict(_)
        )
    }
}

impl From<MissingTenant> for PmError {
    fn from(_: MissingTenant) -> Self {
        Self::TenantContextMissing
    }
}

impl From<FieldViolations> for PmError {
    fn from(violations: FieldViolations) -> Self {
        Self::Validation(violations)
    }
}

impl From<RecurrenceError> for PmError {
    fn from(err: RecurrenceError) -> Self {
        match err {
            RecurrenceError::InvalidRule(violations) => Self::Validation(violations),
            RecurrenceError::InvalidMonth(month) => {
                let mut violations = FieldViolations::new();
                violations.push("month", format!("{month} is not a month"));
                Self::Validation(violations)
            }
            RecurrenceError::OutOfRange => {
                let mut violations = FieldViolations::new();
                violations.push("next_due_date", "outside the supported calendar range");
                Self::Validation(violations)
            }
        }
    }
}

impl From<StoreError> for PmError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TenantContextMissing => Self::TenantContextMissing,
            StoreError::NotFound(id) => Self::ScheduleNotFound(id),
            StoreError::Validation(violations) => Self::Validation(violations),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Unavailable(message) => Self::Infrastructure(message),
        }
    }
}

impl From<PmError> for AppError {
    fn from(err: PmError) -> Self {
        match err {
            PmError::TenantContextMissing => Self::TenantContextMissing,
            PmError::Validation(violations) => Self::Validation(violations),
            PmError::ScheduleNotFound(_) | PmError::TargetNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            PmError::AlreadyCompleted { .. }
            | PmError::OutOfOrderCompletion { .. }
            | PmError::ScheduleInactive(_)
            | PmError::Conflict(_) => Self::Conflict(err.to_string()),
            PmError::WorkOrder(inner) => Self::ExternalService(inner.to_string()),
            PmError::Infrastructure(message) => Self::Infrastructure(message),
        }
    }
}
