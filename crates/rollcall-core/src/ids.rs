//! Strongly Typed Identifiers
//!
//! This module provides type-safe identifier types for rollcall.
//! Using the newtype pattern, these types prevent accidental misuse of
//! different ID types at compile time.
//!
//! # Example
//!
//! ```
//! use rollcall_core::{TenantId, TenantEventId};
//!
//! let tenant = TenantId::new();
//! let event = TenantEventId::new();
//!
//! // Type safety: cannot pass TenantEventId where TenantId is expected
//! fn requires_tenant(id: TenantId) -> String {
//!     id.to_string()
//! }
//!
//! let result = requires_tenant(tenant);
//! // requires_tenant(event); // This would not compile!
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Error type for ID parsing failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse
    pub id_type: &'static str,
    /// The underlying UUID parse error message
    pub message: String,
}

impl Display for ParseIdError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse {}: {}", self.id_type, self.message)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to define a strongly-typed ID type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random ID using UUID v4.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns a reference to the underlying UUID.
            #[must_use]
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Returns the underlying UUID by value.
            #[must_use]
            pub fn into_uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        message: e.to_string(),
                    })
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
    };
}

define_id!(
    /// Strongly typed identifier for tenants.
    ///
    /// A tenant is the unit of data isolation and quota in rollcall.
    /// Every event, member, and quota record belongs to exactly one tenant.
    ///
    /// # Example
    ///
    /// ```
    /// use rollcall_core::TenantId;
    /// use uuid::Uuid;
    ///
    /// // Create a new random TenantId
    /// let tenant_id = TenantId::new();
    /// println!("Tenant: {}", tenant_id);
    ///
    /// // Create from existing UUID
    /// let uuid = Uuid::new_v4();
    /// let tenant_id = TenantId::from_uuid(uuid);
    /// assert_eq!(tenant_id.as_uuid(), &uuid);
    /// ```
    TenantId
);

define_id!(
    /// Strongly typed identifier for event records.
    ///
    /// Note this is the storage identifier; the sync identity of an event is
    /// its source identifier string (a content address), which is unique per
    /// tenant among live events.
    TenantEventId
);

define_id!(
    /// Strongly typed identifier for event types (event categories sharing a
    /// point value and discovery folders).
    EventTypeId
);

define_id!(
    /// Strongly typed identifier for member records.
    ///
    /// The *domain* identity of a member is the tenant-unique member key
    /// string; this id only names the stored row.
    MemberRecordId
);

define_id!(
    /// Strongly typed identifier for point types (scoring date windows).
    PointTypeId
);

define_id!(
    /// Strongly typed identifier for member property types.
    PropertyTypeId
);
