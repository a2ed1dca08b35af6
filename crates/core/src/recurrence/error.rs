//! Recurrence error types.

use thiserror::Error;
use upkeep_shared::FieldViolations;

/// Errors raised by the recurrence engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    /// The rule is missing a field its frequency needs, or a field is out of range.
    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(FieldViolations),

    /// Month outside 1..=12 for a calendar window.
    #[error("Invalid month: {0}")]
    InvalidMonth(u32),

    /// Date arithmetic left the supported calendar range.
    #[error("Date out of supported range")]
    OutOfRange,
}
