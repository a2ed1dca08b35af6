//! `SeaORM` entity definitions.

pub mod prelude;

pub mod assets;
pub mod locations;
pub mod pm_completions;
pub mod pm_schedules;
pub mod sea_orm_active_enums;
