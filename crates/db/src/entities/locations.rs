//! `SeaORM` Entity for locations table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use upkeep_shared::FieldViolations;

use super::assets;
use crate::scoped::{present, tenant_scoped};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "locations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::assets::Entity")]
    Assets,
}

impl Related<assets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assets.def()
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
