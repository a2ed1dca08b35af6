//! Enumerations stored as strings.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use upkeep_core::recurrence::Frequency;

/// Recurrence frequency column of `pm_schedules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PmFrequency {
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "biweekly")]
    Biweekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "quarterly")]
    Quarterly,
    #[sea_orm(string_value = "semi_annually")]
    SemiAnnually,
    #[sea_orm(string_value = "annually")]
    Annually,
}

impl From<Frequency> for PmFrequency {
    fn from(frequency: Frequency) -> Self {
        match frequency {
            Frequency::Daily => Self::Daily,
            Frequency::Weekly => Self::Weekly,
            Frequency::Biweekly => Self::Biweekly,
            Frequency::Monthly => Self::Monthly,
            Frequency::Quarterly => Self::Quarterly,
            Frequency::SemiAnnually => Self::SemiAnnually,
            Frequency::Annually => Self::Annually,
        }
    }
}

impl From<PmFrequency> for Frequency {
    fn from(frequency: PmFrequency) -> Self {
        match frequency {
            PmFrequency::Daily => Self::Daily,
            PmFrequency::Weekly => Self::Weekly,
            PmFrequency::Biweekly => Self::Biweekly,
            PmFrequency::Monthly => Self::Monthly,
            PmFrequency::Quarterly => Self::Quarterly,
            PmFrequency::SemiAnnually => Self::SemiAnnually,
            PmFrequency::Annually => Self::Annually,
        }
    }
}
