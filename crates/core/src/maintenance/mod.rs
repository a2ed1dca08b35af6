//! Preventive-maintenance scheduling: schedules, due projection, work order
//! generation, and completion history.

pub mod error;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;
pub mod work_order;

#[cfg(test)]
mod memory_store;

pub use error::PmError;
pub use service::PmScheduler;
pub use store::{ScheduleStore, StoreError};
pub use types::{
    CalendarEntry, CompletionOutcome, CreateScheduleInput, DueSchedules, GeneratedTicket,
    MarkCompletedInput, NewCompletion, NewSchedule, OccurrenceStatus, PmCompletion, PmSchedule,
    SchedulePatch, ScheduleTarget, TicketGenerationFailure, TicketGenerationReport,
    UpdateScheduleInput, WorkOrderClaim, WorkOrderRef,
};
pub use work_order::{WorkOrderCreator, WorkOrderError, WorkOrderRequest};
