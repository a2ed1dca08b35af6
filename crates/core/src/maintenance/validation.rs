//! Structural validation of PM schedule input.

use rust_decimal::Decimal;
use upkeep_shared::FieldViolations;

use super::types::{CreateScheduleInput, ScheduleTarget, UpdateScheduleInput};
use crate::recurrence::RecurrenceRule;

/// Maximum schedule name length.
pub const MAX_NAME_LEN: usize = 200;

/// Validates a create request, reporting every violated field.
///
/// # Errors
///
/// Returns all violations found: target exclusivity, frequency-specific
/// fields, ranges, name, and cost.
pub fn validate_create(
    input: &CreateScheduleInput,
) -> Result<(ScheduleTarget, RecurrenceRule), FieldViolations> {
    let mut violations = FieldViolations::new();

    validate_name(&input.name, &mut violations);

    let target = validate_target(input, &mut violations);

    let rule = input.rule();
    if let Err(rule_violations) = rule.validate() {
        violations.extend(rule_violations);
    }

    validate_cost(input.estimated_cost, &mut violations);

    match target {
        Some(target) if violations.is_empty() => Ok((target, rule)),
        _ => Err(violations),
    }
}

/// Resolves the single target, recording a violation when there is none.
fn validate_target(
    input: &CreateScheduleInput,
    violations: &mut FieldViolations,
) -> Option<ScheduleTarget> {
    let target = ScheduleTarget::from_parts(input.asset_id, input.location_id);
    if target.is_none() {
        if input.asset_id.is_some() {
            violations.push("asset_id", "cannot be combined with location_id");
            violations.push("location_id", "cannot be combined with asset_id");
        } else {
            violations.push("asset_id", "either asset_id or location_id is required");
            violations.push("location_id", "either asset_id or location_id is required");
        }
    }
    target
}

/// Validates an update request, reporting every violated field.
///
/// # Errors
///
/// Returns all violations found.
pub fn validate_update(input: &UpdateScheduleInput) -> Result<(), FieldViolations> {
    let mut violations = FieldViolations::new();

    if let Some(name) = &input.name {
        validate_name(name, &mut violations);
    }
    if let Some(cost) = input.estimated_cost {
        validate_cost(cost, &mut violations);
    }
    if let Some(rule) = &input.rule {
        if let Err(rule_violations) = rule.validate() {
            violations.extend(rule_violations);
        }
    }

    violations.into_result()
}

fn validate_name(name: &str, violations: &mut FieldViolations) {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        violations.push("name", "must not be empty");
    } else if trimmed.chars().count() > MAX_NAME_LEN {
        violations.push("name", format!("must be at most {MAX_NAME_LEN} characters"));
    }
}

fn validate_cost(cost: Option<Decimal>, violations: &mut FieldViolations) {
    if cost.is_some_and(|c| c.is_sign_negative() && !c.is_zero()) {
        violations.push("estimated_cost", "must not be negative");
    }
}
