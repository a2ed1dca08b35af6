//! Entity re-exports.

pub use super::assets::Entity as Assets;
pub use super::locations::Entity as Locations;
pub use super::pm_completions::Entity as PmCompletions;
pub use super::pm_schedules::Entity as PmSchedules;
