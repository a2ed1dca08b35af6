//! `SeaORM` Entity for pm_completions table.
//!
//! Append-only: rows carry no tenant and are scoped through their schedule.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scoped::AuditScoped;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pm_completions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub ticket_id: Uuid,
    pub scheduled_date: Date,
    pub completed_date: Date,
    pub completed_by: Uuid,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub checklist_results: Option<Json>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pm_schedules::Entity",
        from = "Column::ScheduleId",
        to = "super::pm_schedules::Column::Id"
    )]
    PmSchedules,
}

impl Related<super::pm_schedules::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmSchedules.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl AuditScoped for Entity {
    type Owner = super::pm_schedules::Entity;

    fn id_column() -> Column {
        Column::Id
    }

    fn owner_column() -> Column {
        Column::ScheduleId
    }

    fn created_at_column() -> Column {
        Column::CreatedAt
    }

    fn owner_relation() -> RelationDef {
        Relation::PmSchedules.def()
    }
}
