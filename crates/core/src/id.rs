//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered), so ids sort by creation time.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a user (actor identity supplied by the auth layer).
    UserId,
    "UserId"
);
uuid_newtype!(
    /// Identifier of a vehicle company (manufacturer side).
    CompanyId,
    "CompanyId"
);
uuid_newtype!(
    /// Identifier of a service center (repair side).
    ServiceCenterId,
    "ServiceCenterId"
);
uuid_newtype!(WarehouseId, "WarehouseId");
uuid_newtype!(
    /// Identifier of a catalog entry describing a component kind.
    TypeComponentId,
    "TypeComponentId"
);
uuid_newtype!(
    /// Identifier of a `(warehouse, component type)` stock bucket.
    StockId,
    "StockId"
);
uuid_newtype!(
    /// Identifier of a single serialized component unit.
    ComponentId,
    "ComponentId"
);
uuid_newtype!(ReservationId, "ReservationId");
uuid_newtype!(AdjustmentId, "AdjustmentId");
uuid_newtype!(TransferRequestId, "TransferRequestId");
uuid_newtype!(
    /// Identifier of a repair case line owned by the warranty-case subsystem.
    CaseLineId,
    "CaseLineId"
);
uuid_newtype!(HistoryEntryId, "HistoryEntryId");
