//! Repository abstractions for data access.
//!
//! Repositories hide the `SeaORM` details from the rest of the application.
//! Each call runs in its own tenant-bound transaction.

pub mod asset;
pub mod location;
pub mod schedule;

pub use asset::AssetRepository;
pub use location::LocationRepository;
pub use schedule::ScheduleRepository;
