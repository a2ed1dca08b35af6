//! Core preventive-maintenance logic for Upkeep.
//!
//! This crate has no web or database dependencies. Storage and the ticket
//! service are reached through the traits in [`maintenance`].
//!
//! # Modules
//!
//! - `recurrence` - Recurrence rules, next-occurrence math, and window projection
//! - `maintenance` - PM schedules, due lists, calendars, work orders, and completions

pub mod maintenance;
pub mod recurrence;
