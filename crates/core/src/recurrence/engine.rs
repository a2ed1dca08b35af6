//! Occurrence projection and due-date classification.
//!
//! Everything here is a pure function of its arguments: no clock, no I/O.

use std::cmp::Ordering;

use chrono::{Datelike, Days, NaiveDate};
use upkeep_shared::FieldViolations;

use super::error::RecurrenceError;
use super::types::{DueStatus, Frequency, RecurrenceRule};

/// Stateless recurrence calculations.
pub struct RecurrenceEngine;

impl RecurrenceEngine {
    /// Checks that the rule carries every field its frequency needs and that
    /// all present fields are in range. Reports every problem at once.
    ///
    /// # Errors
    ///
    /// Returns the full list of violated fields.
    pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), FieldViolations> {
        let mut violations = FieldViolations::new();
        let frequency = rule.frequency;

        match rule.day_of_week {
            Some(dow) if dow > 6 => {
                violations.push("day_of_week", "must be between 0 (Sunday) and 6 (Saturday)");
            }
            None if frequency.requires_day_of_week() => {
                violations.push("day_of_week", format!("required for {frequency} schedules"));
            }
            _ => {}
        }

        match rule.day_of_month {
            Some(dom) if !(1..=31).contains(&dom) => {
                violations.push("day_of_month", "must be between 1 and 31");
            }
            None if frequency.requires_day_of_month() => {
                violations.push("day_of_month", format!("required for {frequency} schedules"));
            }
            _ => {}
        }

        match rule.month_of_year {
            Some(moy) if !(1..=12).contains(&moy) => {
                violations.push("month_of_year", "must be between 1 and 12");
            }
            None if frequency.requires_month_of_year() => {
                violations.push("month_of_year", format!("required for {frequency} schedules"));
            }
            _ => {}
        }

        violations.into_result()
    }

    /// Smallest date strictly after `after` consistent with the rule.
    ///
    /// - daily: the next day
    /// - weekly: the next date whose weekday is `day_of_week`
    /// - biweekly: 14 days later
    /// - monthly: `day_of_month` (clamped) in `after`'s month if still ahead,
    ///   otherwise in the following month
    /// - quarterly / semi-annually: `day_of_month` (clamped) 3 / 6 months after
    ///   `after`'s month
    /// - annually: `month_of_year`/`day_of_month` (clamped) this year if still
    ///   ahead, otherwise next year
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` for an incomplete rule and `OutOfRange` at the
    /// edge of the calendar.
    pub fn next_occurrence(
        rule: &RecurrenceRule,
        after: NaiveDate,
    ) -> Result<NaiveDate, RecurrenceError> {
        let fields = RuleFields::of(rule)?;

        match rule.frequency {
            Frequency::Daily => add_days(after, 1),
            Frequency::Weekly => next_weekday_on_or_after(add_days(after, 1)?, fields.day_of_week),
            Frequency::Biweekly => add_days(after, 14),
            Frequency::Monthly => {
                let candidate = clamped_date(after.year(), after.month(), fields.day_of_month)?;
                if candidate > after {
                    Ok(candidate)
                } else {
                    clamped_months_after(after, 1, fields.day_of_month)
                }
            }
            Frequency::Quarterly => clamped_months_after(after, 3, fields.day_of_month),
            Frequency::SemiAnnually => clamped_months_after(after, 6, fields.day_of_month),
            Frequency::Annually => {
                let candidate =
                    clamped_date(after.year(), fields.month_of_year, fields.day_of_month)?;
                if candidate > after {
                    Ok(candidate)
                } else {
                    clamped_date(after.year() + 1, fields.month_of_year, fields.day_of_month)
                }
            }
        }
    }

    /// Earliest date on or after `start` consistent with the rule.
    ///
    /// Used for the initial due date of a new schedule, so a schedule created
    /// on a matching day is due that same day.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` for an incomplete rule and `OutOfRange` at the
    /// edge of the calendar.
    pub fn first_occurrence(
        rule: &RecurrenceRule,
        start: NaiveDate,
    ) -> Result<NaiveDate, RecurrenceError> {
        let fields = RuleFields::of(rule)?;

        match rule.frequency {
            Frequency::Daily | Frequency::Biweekly => Ok(start),
            Frequency::Weekly => next_weekday_on_or_after(start, fields.day_of_week),
            Frequency::Monthly | Frequency::Quarterly | Frequency::SemiAnnually => {
                let candidate = clamped_date(start.year(), start.month(), fields.day_of_month)?;
                if candidate >= start {
                    Ok(candidate)
                } else {
                    clamped_months_after(start, 1, fields.day_of_month)
                }
            }
            Frequency::Annually => {
                let candidate =
                    clamped_date(start.year(), fields.month_of_year, fields.day_of_month)?;
                if candidate >= start {
                    Ok(candidate)
                } else {
                    clamped_date(start.year() + 1, fields.month_of_year, fields.day_of_month)
                }
            }
        }
    }

    /// Occurrences of the rule within `[window_start, window_end]`, ascending.
    ///
    /// `anchor` is itself an occurrence (normally the schedule's current
    /// `next_due_date`); the sequence is the anchor followed by repeated
    /// [`Self::next_occurrence`]. Recomputed from scratch on every call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRule` for an incomplete rule and `OutOfRange` at the
    /// edge of the calendar.
    pub fn occurrences_in_window(
        rule: &RecurrenceRule,
        anchor: NaiveDate,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, RecurrenceError> {
        Self::validate_rule(rule).map_err(RecurrenceError::InvalidRule)?;

        let mut occurrences = Vec::new();
        if window_start > window_end {
            return Ok(occurrences);
        }

        let mut current = anchor;
        while current <= window_end {
            if current >= window_start {
                occurrences.push(current);
            }
            current = Self::next_occurrence(rule, current)?;
        }

        Ok(occurrences)
    }

    /// Classifies an occurrence date relative to `today`.
    #[must_use]
    pub fn classify(next_due_date: NaiveDate, today: NaiveDate) -> DueStatus {
        match next_due_date.cmp(&today) {
            Ordering::Less => DueStatus::Overdue,
            Ordering::Equal => DueStatus::Due,
            Ordering::Greater => DueStatus::Upcoming,
        }
    }

    /// First and last day of a calendar month.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMonth` if `month` is not 1..=12.
    pub fn month_window(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), RecurrenceError> {
        if !(1..=12).contains(&month) {
            return Err(RecurrenceError::InvalidMonth(month));
        }
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(RecurrenceError::OutOfRange)?;
        let last = last_day_of_month(year, month)?;
        Ok((first, last))
    }
}

/// Rule fields with frequency-required values resolved.
///
/// Fields a frequency does not use default to values that are never read.
struct RuleFields {
    day_of_week: u32,
    day_of_month: u32,
    month_of_year: u32,
}

impl RuleFields {
    fn of(rule: &RecurrenceRule) -> Result<Self, RecurrenceError> {
        RecurrenceEngine::validate_rule(rule).map_err(RecurrenceError::InvalidRule)?;
        Ok(Self {
            day_of_week: u32::from(rule.day_of_week.unwrap_or(0)),
            day_of_month: u32::from(rule.day_of_month.unwrap_or(1)),
            month_of_year: u32::from(rule.month_of_year.unwrap_or(1)),
        })
    }
}

fn add_days(date: NaiveDate, days: u64) -> Result<NaiveDate, RecurrenceError> {
    date.checked_add_days(Days::new(days))
        .ok_or(RecurrenceError::OutOfRange)
}

/// First date on or after `from` whose weekday (0 = Sunday) is `day_of_week`.
fn next_weekday_on_or_after(
    from: NaiveDate,
    day_of_week: u32,
) -> Result<NaiveDate, RecurrenceError> {
    let current = from.weekday().num_days_from_sunday();
    let delta = (day_of_week + 7 - current) % 7;
    add_days(from, u64::from(delta))
}

/// Returns the last day of a month.
fn last_day_of_month(year: i32, month: u32) -> Result<NaiveDate, RecurrenceError> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };

    next_month
        .and_then(|d| d.pred_opt())
        .ok_or(RecurrenceError::OutOfRange)
}

/// `day_of_month` in the given month, clamped to the month's last day.
fn clamped_date(year: i32, month: u32, day_of_month: u32) -> Result<NaiveDate, RecurrenceError> {
    let last = last_day_of_month(year, month)?;
    let day = day_of_month.min(last.day());
    NaiveDate::from_ymd_opt(year, month, day).ok_or(RecurrenceError::OutOfRange)
}

/// `day_of_month` (clamped) in the month `months` after `date`'s month.
fn clamped_months_after(
    date: NaiveDate,
    months: u32,
    day_of_month: u32,
) -> Result<NaiveDate, RecurrenceError> {
    let zero_based = date.month0() + months;
    let year = date.year() + i32::try_from(zero_based / 12).map_err(|_| RecurrenceError::OutOfRange)?;
    let month = zero_based % 12 + 1;
    clamped_date(year, month, day_of_month)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[rstest]
    #[case(RecurrenceRule::daily(), d(2025, 1, 31), d(2025, 2, 1))]
    #[case(RecurrenceRule::biweekly(), d(2025, 1, 6), d(2025, 1, 20))]
    #[case(RecurrenceRule::weekly(3), d(2025, 1, 6), d(2025, 1, 8))]
    #[case(RecurrenceRule::weekly(3), d(2025, 1, 8), d(2025, 1, 15))]
    #[case(RecurrenceRule::weekly(1), d(2025, 1, 8), d(2025, 1, 13))]
    #[case(RecurrenceRule::monthly(31), d(2025, 1, 31), d(2025, 2, 28))]
    #[case(RecurrenceRule::monthly(31), d(2024, 1, 31), d(2024, 2, 29))]
    #[case(RecurrenceRule::monthly(31), d(2025, 2, 28), d(2025, 3, 31))]
    #[case(RecurrenceRule::monthly(31), d(2025, 4, 30), d(2025, 5, 31))]
    #[case(RecurrenceRule::monthly(15), d(2025, 12, 15), d(2026, 1, 15))]
    #[case(RecurrenceRule::monthly(15), d(2025, 3, 10), d(2025, 3, 15))]
    #[case(RecurrenceRule::quarterly(31), d(2025, 1, 31), d(2025, 4, 30))]
    #[case(RecurrenceRule::quarterly(31), d(2025, 4, 30), d(2025, 7, 31))]
    #[case(RecurrenceRule::quarterly(10), d(2025, 11, 10), d(2026, 2, 10))]
    #[case(RecurrenceRule::semi_annually(31), d(2025, 8, 31), d(2026, 2, 28))]
    #[case(RecurrenceRule::annually(2, 29), d(2024, 2, 29), d(2025, 2, 28))]
    #[case(RecurrenceRule::annually(2, 29), d(2027, 2, 28), d(2028, 2, 29))]
    #[case(RecurrenceRule::annually(6, 1), d(2025, 3, 1), d(2025, 6, 1))]
    fn test_next_occurrence(
        #[case] rule: RecurrenceRule,
        #[case] after: NaiveDate,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(RecurrenceEngine::next_occurrence(&rule, after), Ok(expected));
    }

    #[rstest]
    #[case(RecurrenceRule::daily(), d(2025, 1, 6), d(2025, 1, 6))]
    #[case(RecurrenceRule::biweekly(), d(2025, 1, 6), d(2025, 1, 6))]
    #[case(RecurrenceRule::weekly(3), d(2025, 1, 6), d(2025, 1, 8))]
    #[case(RecurrenceRule::weekly(1), d(2025, 1, 6), d(2025, 1, 6))]
    #[case(RecurrenceRule::monthly(15), d(2025, 1, 10), d(2025, 1, 15))]
    #[case(RecurrenceRule::monthly(15), d(2025, 1, 20), d(2025, 2, 15))]
    #[case(RecurrenceRule::monthly(31), d(2025, 2, 1), d(2025, 2, 28))]
    #[case(RecurrenceRule::quarterly(1), d(2025, 1, 2), d(2025, 2, 1))]
    #[case(RecurrenceRule::annually(3, 1), d(2025, 3, 1), d(2025, 3, 1))]
    #[case(RecurrenceRule::annually(3, 1), d(2025, 3, 2), d(2026, 3, 1))]
    fn test_first_occurrence(
        #[case] rule: RecurrenceRule,
        #[case] start: NaiveDate,
        #[case] expected: NaiveDate,
    ) {
        assert_eq!(RecurrenceEngine::first_occurrence(&rule, start), Ok(expected));
    }

    #[test]
    fn test_monthly_day_31_clamps_then_recovers() {
        let rule = RecurrenceRule::monthly(31);
        let jan = d(2025, 1, 31);
        let feb = RecurrenceEngine::next_occurrence(&rule, jan).unwrap();
        let mar = RecurrenceEngine::next_occurrence(&rule, feb).unwrap();
        assert_eq!((feb, mar), (d(2025, 2, 28), d(2025, 3, 31)));
    }

    #[test]
    fn test_classify_around_today() {
        let today = d(2025, 6, 10);
        assert_eq!(RecurrenceEngine::classify(d(2025, 6, 10), today), DueStatus::Due);
        assert_eq!(RecurrenceEngine::classify(d(2025, 6, 9), today), DueStatus::Overdue);
        assert_eq!(RecurrenceEngine::classify(d(2025, 6, 11), today), DueStatus::Upcoming);
    }

    #[test]
    fn test_window_includes_anchor_and_successors() {
        let rule = RecurrenceRule::weekly(3);
        let dates =
            RecurrenceEngine::occurrences_in_window(&rule, d(2025, 1, 8), d(2025, 1, 1), d(2025, 1, 31))
                .unwrap();
        assert_eq!(
            dates,
            vec![d(2025, 1, 8), d(2025, 1, 15), d(2025, 1, 22), d(2025, 1, 29)]
        );
    }

    #[test]
    fn test_window_skips_dates_before_start() {
        let rule = RecurrenceRule::monthly(5);
        let dates =
            RecurrenceEngine::occurrences_in_window(&rule, d(2025, 1, 5), d(2025, 3, 1), d(2025, 3, 31))
                .unwrap();
        assert_eq!(dates, vec![d(2025, 3, 5)]);
    }

    #[test]
    fn test_window_before_anchor_is_empty() {
        let rule = RecurrenceRule::daily();
        let dates =
            RecurrenceEngine::occurrences_in_window(&rule, d(2025, 5, 1), d(2025, 4, 1), d(2025, 4, 30))
                .unwrap();
        assert!(dates.is_empty());
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let rule = RecurrenceRule::daily();
        let dates =
            RecurrenceEngine::occurrences_in_window(&rule, d(2025, 1, 1), d(2025, 2, 1), d(2025, 1, 1))
                .unwrap();
        assert!(dates.is_empty());
    }

    #[test]
    fn test_validate_reports_every_missing_field() {
        let rule = RecurrenceRule {
            frequency: Frequency::Annually,
            day_of_week: Some(9),
            day_of_month: None,
            month_of_year: None,
        };
        let violations = RecurrenceEngine::validate_rule(&rule).unwrap_err();
        assert_eq!(violations.len(), 3);
        assert!(violations.contains("day_of_week"));
        assert!(violations.contains("day_of_month"));
        assert!(violations.contains("month_of_year"));
    }

    #[rstest]
    #[case(Frequency::Weekly, "day_of_week")]
    #[case(Frequency::Monthly, "day_of_month")]
    #[case(Frequency::Quarterly, "day_of_month")]
    #[case(Frequency::SemiAnnually, "day_of_month")]
    fn test_validate_requires_frequency_fields(#[case] frequency: Frequency, #[case] field: &str) {
        let rule = RecurrenceRule {
            frequency,
            day_of_week: None,
            day_of_month: None,
            month_of_year: None,
        };
        let violations = RecurrenceEngine::validate_rule(&rule).unwrap_err();
        assert!(violations.contains(field));
    }

    #[test]
    fn test_out_of_range_fields_rejected_even_when_unused() {
        let rule = RecurrenceRule {
            frequency: Frequency::Daily,
            day_of_week: None,
            day_of_month: Some(0),
            month_of_year: Some(13),
        };
        let violations = RecurrenceEngine::validate_rule(&rule).unwrap_err();
        assert!(violations.contains("day_of_month"));
        assert!(violations.contains("month_of_year"));
    }

    #[test]
    fn test_invalid_rule_is_an_error_not_a_panic() {
        let rule = RecurrenceRule {
            frequency: Frequency::Weekly,
            day_of_week: None,
            day_of_month: None,
            month_of_year: None,
        };
        assert!(matches!(
            RecurrenceEngine::next_occurrence(&rule, d(2025, 1, 1)),
            Err(RecurrenceError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_month_window() {
        assert_eq!(
            RecurrenceEngine::month_window(2024, 2),
            Ok((d(2024, 2, 1), d(2024, 2, 29)))
        );
        assert_eq!(
            RecurrenceEngine::month_window(2025, 12),
            Ok((d(2025, 12, 1), d(2025, 12, 31)))
        );
        assert_eq!(
            RecurrenceEngine::month_window(2025, 13),
            Err(RecurrenceError::InvalidMonth(13))
        );
    }
}
