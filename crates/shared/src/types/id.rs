//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing an `AssetId` where a `TenantId` is expected,
//! which matters most for the tenant boundary.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(TenantId, "Unique identifier for a tenant (customer organization).");
typed_id!(UserId, "Unique identifier for a user.");
typed_id!(AssetId, "Unique identifier for an asset.");
typed_id!(LocationId, "Unique identifier for a location.");
typed_id!(VendorId, "Unique identifier for a vendor.");
typed_id!(TemplateId, "Unique identifier for a PM checklist template.");
typed_id!(ScheduleId, "Unique identifier for a preventive-maintenance schedule.");
typed_id!(CompletionId, "Unique identifier for a PM completion record.");
typed_id!(TicketId, "Unique identifier for a work-order ticket.");
