//! Sync error types.

use rollcall_core::RollcallError;
use rollcall_provider::ProviderError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during synchronization.
///
/// Client-visible variants (`NotFound`, `AlreadyRunning`) surface before any
/// phase runs; everything after lock acquisition is contained at the sync
/// boundary except [`SyncError::LockStuck`], which is fatal and requires
/// operator intervention.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Provider adapter error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Client-visible input/policy violation.
    #[error(transparent)]
    Policy(#[from] RollcallError),

    /// Not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A sync already holds the tenant's lock.
    #[error("Sync already running for tenant {tenant_id}")]
    AlreadyRunning { tenant_id: Uuid },

    /// The authoritative quota decrement failed at commit time because
    /// concurrent operations consumed quota after discovery admitted work.
    #[error("Quota decrement failed at commit for tenant {tenant_id}")]
    QuotaConflict { tenant_id: Uuid },

    /// An invariant the engine relies on does not hold.
    #[error("Invariant violation: {message}")]
    Invariant { message: String },

    /// The sync lock could not be released after exhausting retries.
    /// The tenant remains locked until an operator clears it.
    #[error("Failed to release sync lock for tenant {tenant_id} after {attempts} attempts")]
    LockStuck { tenant_id: Uuid, attempts: u32 },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a `NotFound` error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create an `Invariant` error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }

    /// Whether this error leaves the tenant in a state that cannot be
    /// repaired by simply re-running the sync.
    #[must_use]
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, SyncError::LockStuck { .. })
    }
}

/// Convenience result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let tenant_id = Uuid::new_v4();
        let err = SyncError::AlreadyRunning { tenant_id };
        assert_eq!(
            err.to_string(),
            format!("Sync already running for tenant {tenant_id}")
        );

        let err = SyncError::not_found("Tenant", tenant_id);
        assert_eq!(err.to_string(), format!("Tenant not found: {tenant_id}"));
    }

    #[test]
    fn test_only_lock_stuck_is_unrecoverable() {
        let tenant_id = Uuid::new_v4();
        assert!(SyncError::LockStuck {
            tenant_id,
            attempts: 3
        }
        .is_unrecoverable());
        assert!(!SyncError::AlreadyRunning { tenant_id }.is_unrecoverable());
        assert!(!SyncError::invariant("missing quota record").is_unrecoverable());
    }

    #[test]
    fn test_provider_error_converts() {
        let err: SyncError = ProviderError::gone("1AbC").into();
        assert!(matches!(err, SyncError::Provider(_)));
    }

    #[test]
    fn test_policy_error_displays_transparently() {
        let err: SyncError = RollcallError::validation("member_key", "empty").into();
        assert_eq!(
            err.to_string(),
            "Validation error on field 'member_key': empty"
        );
    }
}
