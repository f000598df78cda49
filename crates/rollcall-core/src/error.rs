//! Error Types
//!
//! This module provides standardized error types for rollcall.
//!
//! # Example
//!
//! ```
//! use rollcall_core::{RollcallError, Result};
//!
//! fn find_member(key: &str) -> Result<String> {
//!     if key.is_empty() {
//!         return Err(RollcallError::NotFound {
//!             resource: "Member".to_string(),
//!             id: None,
//!         });
//!     }
//!     Ok(format!("Member {}", key))
//! }
//! ```

use crate::ids::TenantId;
use serde::Serialize;
use thiserror::Error;

/// Standardized error type for rollcall.
///
/// This enum provides the client-visible error scenarios shared across
/// rollcall services: bad input, missing resources, tenant isolation
/// violations, and exhausted quotas. Engine-internal failures carry their
/// own error types and are only folded into these at the API boundary.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollcallError {
    /// Requested resource was not found.
    ///
    /// Use when a database lookup returns no results.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of resource that was not found (e.g., "Tenant", "Event")
        resource: String,
        /// Optional identifier of the resource
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Tenant isolation violation.
    ///
    /// Use when an operation attempts to access data from a different
    /// tenant. This is a critical security error.
    #[error("Tenant mismatch: expected {expected}, got {actual}")]
    TenantMismatch {
        /// The expected tenant ID
        expected: TenantId,
        /// The actual tenant ID that was provided
        actual: TenantId,
    },

    /// Input validation failure.
    #[error("Validation error on field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// A per-tenant quota counter would go negative.
    ///
    /// Surfaced to callers of create/update operations; never retried.
    #[error("Quota exceeded for tenant {tenant_id}: {counter}")]
    QuotaExceeded {
        /// The tenant whose quota was exhausted
        tenant_id: TenantId,
        /// The counter that would have gone negative
        counter: String,
    },
}

impl RollcallError {
    /// Create a `NotFound` error for a resource type and id.
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create a `Validation` error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a `QuotaExceeded` error.
    pub fn quota_exceeded(tenant_id: TenantId, counter: impl Into<String>) -> Self {
        Self::QuotaExceeded {
            tenant_id,
            counter: counter.into(),
        }
    }
}

/// Convenience result alias using [`RollcallError`].
pub type Result<T> = std::result::Result<T, RollcallError>;
