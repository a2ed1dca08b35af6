//! `SeaORM` Entity for assets table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use upkeep_shared::FieldViolations;

use super::locations;
use crate::scoped::{present, tenant_scoped};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub location_id: Option<Uuid>,
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::locations::Entity",
        from = "Column::LocationId",
        to = "super::locations::Column::Id"
    )]
    Locations,
}

impl Related<locations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Locations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn validate(model: &ActiveModel) -> Result<(), FieldViolations> {
    let mut violations = FieldViolations::new();
    if let Some(name) = present(&model.name) {
        if name.trim().is_empty() {
            violations.push("name", "must not be empty");
        }
    }
    violations.into_result()
}

tenant_scoped!(Entity, validate = validate);
