//! Multi-Tenant Traits
//!
//! This module provides traits for multi-tenant entities in rollcall.
//!
//! # Example
//!
//! ```
//! use rollcall_core::{TenantId, TenantAware};
//!
//! struct Event {
//!     id: uuid::Uuid,
//!     tenant_id: TenantId,
//!     source_id: String,
//! }
//!
//! impl TenantAware for Event {
//!     fn tenant_id(&self) -> TenantId {
//!         self.tenant_id
//!     }
//! }
//!
//! // Generic function that works with any TenantAware entity
//! fn verify_tenant<T: TenantAware>(entity: &T, expected: TenantId) -> bool {
//!     entity.tenant_id() == expected
//! }
//!
//! let tenant = TenantId::new();
//! let event = Event {
//!     id: uuid::Uuid::new_v4(),
//!     tenant_id: tenant,
//!     source_id: "1FxyZ".to_string(),
//! };
//!
//! assert!(verify_tenant(&event, tenant));
//! ```

use crate::ids::TenantId;

/// Trait for entities that belong to a specific tenant.
///
/// Implementing this trait marks an entity as tenant-scoped, enabling
/// compile-time verification that tenant isolation is properly implemented.
///
/// # Object Safety
///
/// This trait is object-safe, meaning it can be used with trait objects:
/// `Box<dyn TenantAware>` or `&dyn TenantAware`.
pub trait TenantAware {
    /// Returns the tenant ID associated with this entity.
    ///
    /// This method returns an owned `TenantId` (which is `Copy`) for
    /// convenience, allowing callers to use the value without lifetime
    /// concerns.
    fn tenant_id(&self) -> TenantId;
}
