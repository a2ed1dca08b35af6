//! Recurrence rules and occurrence projection for preventive maintenance.

pub mod engine;
pub mod error;
pub mod types;


pub use engine::RecurrenceEngine;
pub use error::RecurrenceError;
pub use types::{DueStatus, Frequency, RecurrenceRule};
