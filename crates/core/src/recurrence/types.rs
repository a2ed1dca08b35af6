//! Recurrence rule data types.

use serde::{Deserialize, Serialize};

/// How often a maintenance rule recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every day.
    Daily,
    /// Every week on `day_of_week`.
    Weekly,
    /// Every 14 days from the anchor.
    Biweekly,
    /// Every month on `day_of_month`.
    Monthly,
    /// Every 3 months on `day_of_month`.
    Quarterly,
    /// Every 6 months on `day_of_month`.
    SemiAnnually,
    /// Every year on `month_of_year`/`day_of_month`.
    Annually,
}

impl Frequency {
    /// All frequencies, in cadence order.
    pub const ALL: [Self; 7] = [
        Self::Daily,
        Self::Weekly,
        Self::Biweekly,
        Self::Monthly,
        Self::Quarterly,
        Self::SemiAnnually,
        Self::Annually,
    ];

    /// Stable lowercase name used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::SemiAnnually => "semi_annually",
            Self::Annually => "annually",
        }
    }

    /// Calendar months between occurrences for month-based frequencies.
    #[must_use]
    pub const fn month_step(self) -> Option<u32> {
        match self {
            Self::Monthly => Some(1),
            Self::Quarterly => Some(3),
            Self::SemiAnnually => Some(6),
            Self::Annually => Some(12),
            Self::Daily | Self::Weekly | Self::Biweekly => None,
        }
    }

    /// Whether `day_of_week` is required.
    #[must_use]
    pub const fn requires_day_of_week(self) -> bool {
        matches!(self, Self::Weekly)
    }

    /// Whether `day_of_month` is required.
    #[must_use]
    pub const fn requires_day_of_month(self) -> bool {
        self.month_step().is_some()
    }

    /// Whether `month_of_year` is required.
    #[must_use]
    pub const fn requires_month_of_year(self) -> bool {
        matches!(self, Self::Annually)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown frequency: {s}"))
    }
}

/// The cadence of a PM schedule: frequency plus day/month constraints.
///
/// `day_of_week` counts from Sunday (0) to Saturday (6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecurrenceRule {
    /// Recurrence frequency.
    pub frequency: Frequency,
    /// Weekday for weekly rules, 0 = Sunday.
    pub day_of_week: Option<u8>,
    /// Day of month for month-based rules (clamped to month length).
    pub day_of_month: Option<u8>,
    /// Month for annual rules, 1 = January.
    pub month_of_year: Option<u8>,
}

impl RecurrenceRule {
    /// Every day.
    #[must_use]
    pub const fn daily() -> Self {
        Self::bare(Frequency::Daily)
    }

    /// Every week on `day_of_week` (0 = Sunday).
    #[must_use]
    pub const fn weekly(day_of_week: u8) -> Self {
        Self {
            day_of_week: Some(day_of_week),
            ..Self::bare(Frequency::Weekly)
        }
    }

    /// Every 14 days.
    #[must_use]
    pub const fn biweekly() -> Self {
        Self::bare(Frequency::Biweekly)
    }

    /// Every month on `day_of_month`.
    #[must_use]
    pub const fn monthly(day_of_month: u8) -> Self {
        Self::month_based(Frequency::Monthly, day_of_month)
    }

    /// Every quarter on `day_of_month`.
    #[must_use]
    pub const fn quarterly(day_of_month: u8) -> Self {
        Self::month_based(Frequency::Quarterly, day_of_month)
    }

    /// Every six months on `day_of_month`.
    #[must_use]
    pub const fn semi_annually(day_of_month: u8) -> Self {
        Self::month_based(Frequency::SemiAnnually, day_of_month)
    }

    /// Every year on `month_of_year`/`day_of_month`.
    #[must_use]
    pub const fn annually(month_of_year: u8, day_of_month: u8) -> Self {
        Self {
            month_of_year: Some(month_of_year),
            ..Self::month_based(Frequency::Annually, day_of_month)
        }
    }

    /// Reports every missing or out-of-range field.
    ///
    /// # Errors
    ///
    /// Returns the full list of violations.
    pub fn validate(&self) -> Result<(), upkeep_shared::FieldViolations> {
        super::RecurrenceEngine::validate_rule(self)
    }

    const fn bare(frequency: Frequency) -> Self {
        Self {
            frequency,
            day_of_week: None,
            day_of_month: None,
            month_of_year: None,
        }
    }

    const fn month_based(frequency: Frequency, day_of_month: u8) -> Self {
        Self {
            day_of_month: Some(day_of_month),
            ..Self::bare(frequency)
        }
    }
}

/// Time-relative state of a schedule's current occurrence. Always computed,
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    /// Occurrence is in the future.
    Upcoming,
    /// Occurrence is today.
    Due,
    /// Occurrence is in the past and not completed.
    Overdue,
}

impl DueStatus {
    /// Whether a work order should exist for this occurrence.
    #[must_use]
    pub const fn is_actionable(self) -> bool {
        matches!(self, Self::Due | Self::Overdue)
    }
}
