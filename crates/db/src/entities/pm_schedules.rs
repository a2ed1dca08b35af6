//! `SeaORM` Entity for pm_schedules table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use upkeep_shared::FieldViolations;

use super::sea_orm_active_enums::PmFrequency;
use crate::scoped::{present, tenant_scoped};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pm_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub template_id: Option<Uuid>,
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub asset_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub frequency: PmFrequency,
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    pub month_of_year: Option<i16>,
    pub assigned_to: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((14, 2)))", nullable)]
    pub estimated_cost: Option<Decimal>,
    pub next_due_date: Date,
    pub is_active: bool,
    pub work_order_date: Option<Date>,
    pub work_order_ticket_id: Option<Uuid>,
    pub work_order_claimed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assets::Entity",
        from = "Column::AssetId",
        to = "super::assets::Column::Id"
    )]
    Assets,
    #[sea_orm(
        belongs_to = "super::locations::Entity",
        from = "Column::LocationId",
        to = "super::locations::Column::Id"
    )]
    Locations,
    #[sea_orm(has_many = "super::pm_completions::Entity")]
    PmCompletions,
}

impl Related<super::assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
    }
}

impl Related<super::locations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Locations.def()
    }
}

impl Related<super::pm_completions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PmCompletions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn check_range(
    violations: &mut FieldViolations,
    field: &str,
    value: Option<&Option<i16>>,
    range: std::ops::RangeInclusive<i16>,
) {
    if let Some(Some(v)) = value {
        if !range.contains(v) {
            violations.push(
                field,
                format!("must be between {} and {}", range.start(), range.end()),
            );
        }
    }
}

fn validate(model: &ActiveModel) -> Result<(), FieldViolations> {
    let mut violations = FieldViolations::new();

    if let Some(name) = present(&model.name) {
        if name.trim().is_empty() {
            violations.push("name", "must not be empty");
        }
    }

    if let (Some(asset), Some(location)) = (present(&model.asset_id), present(&model.location_id)) {
        if asset.is_some() == location.is_some() {
            violations.push("asset_id", "exactly one of asset_id and location_id is required");
        }
    }

    check_range(&mut violations, "day_of_week", present(&model.day_of_week), 0..=6);
    check_range(&mut violations, "day_of_month", present(&model.day_of_month), 1..=31);
    check_range(&mut violations, "month_of_year", present(&model.month_of_year), 1..=12);

    if let Some(Some(cost)) = present(&model.estimated_cost) {
        if cost.is_sign_negative() && !cost.is_zero() {
            violations.push("estimated_cost", "must not be negative");
        }
    }

    if let (Some(date), Some(claimed_at)) = (
        present(&model.work_order_date),
        present(&model.work_order_claimed_at),
    ) {
        if date.is_some() != claimed_at.is_some() {
            violations.push("work_order_claimed_at", "must be set exactly when work_order_date is");
        }
    }

    violations.into_result()
}

tenant_scoped!(Entity, validate = validate);
