//! Quota limiting for sync and API operations.
//!
//! Two layers of accounting:
//!
//! - a **speculative** in-memory delta ([`SpeculativeQuota`]) that discovery
//!   consults for admission decisions without touching persisted counters;
//! - the **authoritative** counters in `quota_records`, adjusted exactly
//!   once per sync inside the commit transaction via
//!   [`QuotaLimiter::increment`].
//!
//! A reference-counted ignore context ([`QuotaExemption`]) lets a composed
//! operation disable both check and increment for a tenant while its nested
//! steps run, so internally re-entrant paths do not double-charge.

use rollcall_db::QuotaRecord;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::SyncResult;

/// A signed adjustment to a tenant's remaining counters.
///
/// Consumption is negative: admitting one event is `events: -1`. The delta
/// is a plain value threaded through discovery and consumed exactly once by
/// the committer; it never touches persisted counters itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDelta {
    pub events: i64,
    pub folders: i64,
    pub members: i64,
    pub operations: i64,
}

impl QuotaDelta {
    /// The zero delta.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether every counter adjustment is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Speculative quota state for one sync run.
///
/// Wraps the quota snapshot loaded at sync start plus the running pending
/// delta. Admission decisions during traversal are answered from memory so
/// discovery can make many back-and-forth decisions cheaply.
#[derive(Debug, Clone)]
pub struct SpeculativeQuota {
    snapshot: QuotaRecord,
    pending: QuotaDelta,
}

impl SpeculativeQuota {
    /// Start speculating from a quota snapshot.
    #[must_use]
    pub fn new(snapshot: QuotaRecord) -> Self {
        Self {
            snapshot,
            pending: QuotaDelta::none(),
        }
    }

    /// Try to admit one new event. Decrements the pending delta on success.
    pub fn try_take_event(&mut self) -> bool {
        if self.snapshot.events_remaining + self.pending.events - 1 >= 0 {
            self.pending.events -= 1;
            true
        } else {
            false
        }
    }

    /// Try to admit one new source folder.
    pub fn try_take_folder(&mut self) -> bool {
        if self.snapshot.folders_remaining + self.pending.folders - 1 >= 0 {
            self.pending.folders -= 1;
            true
        } else {
            false
        }
    }

    /// The accumulated pending delta, to be applied at commit.
    #[must_use]
    pub fn pending(&self) -> QuotaDelta {
        self.pending
    }
}

/// Reference-counted per-tenant ignore context.
///
/// While a tenant's depth is above zero, quota checks and increments for it
/// short-circuit to success. Guards restore the depth on drop, so the
/// context unwinds correctly even when a nested operation fails.
#[derive(Debug, Clone, Default)]
pub struct ExemptionRegistry {
    depths: Arc<Mutex<HashMap<Uuid, usize>>>,
}

impl ExemptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the ignore context for a tenant.
    #[must_use]
    pub fn exempt(&self, tenant_id: Uuid) -> QuotaExemption {
        let mut depths = self.depths.lock().unwrap_or_else(|e| e.into_inner());
        *depths.entry(tenant_id).or_insert(0) += 1;
        QuotaExemption {
            depths: Arc::clone(&self.depths),
            tenant_id,
        }
    }

    /// Whether a tenant is currently inside the ignore context.
    #[must_use]
    pub fn is_exempt(&self, tenant_id: Uuid) -> bool {
        let depths = self.depths.lock().unwrap_or_else(|e| e.into_inner());
        depths.get(&tenant_id).copied().unwrap_or(0) > 0
    }
}

/// RAII guard for the quota ignore context; see [`ExemptionRegistry`].
#[derive(Debug)]
pub struct QuotaExemption {
    depths: Arc<Mutex<HashMap<Uuid, usize>>>,
    tenant_id: Uuid,
}

impl Drop for QuotaExemption {
    fn drop(&mut self) {
        let mut depths = self.depths.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(depth) = depths.get_mut(&self.tenant_id) {
            *depth = depth.saturating_sub(1);
            if *depth == 0 {
                depths.remove(&self.tenant_id);
            }
        }
    }
}

/// Limiter over the persisted per-tenant counters.
#[derive(Clone)]
pub struct QuotaLimiter {
    pool: PgPool,
    exemptions: ExemptionRegistry,
}

impl QuotaLimiter {
    /// Create a limiter over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            exemptions: ExemptionRegistry::new(),
        }
    }

    /// The ignore-context registry shared by this limiter.
    #[must_use]
    pub fn exemptions(&self) -> &ExemptionRegistry {
        &self.exemptions
    }

    /// Read-only check: would `delta` keep every counter >= 0?
    ///
    /// Returns `false` when the tenant has no quota record. Exempt tenants
    /// always pass.
    pub async fn within_limits(&self, tenant_id: Uuid, delta: &QuotaDelta) -> SyncResult<bool> {
        if self.exemptions.is_exempt(tenant_id) {
            return Ok(true);
        }

        let Some(record) = QuotaRecord::find_by_tenant(&self.pool, tenant_id).await? else {
            return Ok(false);
        };

        Ok(record.allows(delta.events, delta.folders, delta.members, delta.operations))
    }

    /// Atomic conditional apply of `delta` to the persisted counters.
    ///
    /// Applies only if every resulting counter stays >= 0; returns whether a
    /// matching quota record existed and the guard passed. Takes a
    /// connection so the decrement can join the commit transaction. Exempt
    /// tenants always pass without touching the counters.
    pub async fn increment(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        delta: &QuotaDelta,
    ) -> SyncResult<bool> {
        if self.exemptions.is_exempt(tenant_id) {
            return Ok(true);
        }
        if delta.is_zero() {
            return Ok(true);
        }

        let applied = QuotaRecord::apply_delta(
            conn,
            tenant_id,
            delta.events,
            delta.folders,
            delta.members,
            delta.operations,
        )
        .await?;

        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(events: i64, folders: i64) -> QuotaRecord {
        QuotaRecord {
            tenant_id: Uuid::new_v4(),
            events_remaining: events,
            folders_remaining: folders,
            members_remaining: 0,
            operations_remaining: 0,
        }
    }

    #[test]
    fn test_speculative_admission_stops_at_zero() {
        let mut quota = SpeculativeQuota::new(snapshot(2, 0));

        assert!(quota.try_take_event());
        assert!(quota.try_take_event());
        assert!(!quota.try_take_event());
        assert!(!quota.try_take_event());

        assert_eq!(quota.pending().events, -2);
    }

    #[test]
    fn test_speculative_counters_are_independent() {
        let mut quota = SpeculativeQuota::new(snapshot(0, 1));

        assert!(!quota.try_take_event());
        assert!(quota.try_take_folder());
        assert!(!quota.try_take_folder());

        assert_eq!(
            quota.pending(),
            QuotaDelta {
                events: 0,
                folders: -1,
                members: 0,
                operations: 0
            }
        );
    }

    #[test]
    fn test_exemption_depth_balances() {
        let registry = ExemptionRegistry::new();
        let tenant_id = Uuid::new_v4();

        assert!(!registry.is_exempt(tenant_id));

        let outer = registry.exempt(tenant_id);
        assert!(registry.is_exempt(tenant_id));

        {
            let _inner = registry.exempt(tenant_id);
            assert!(registry.is_exempt(tenant_id));
        }
        // Inner guard dropped; outer still holds the context.
        assert!(registry.is_exempt(tenant_id));

        drop(outer);
        assert!(!registry.is_exempt(tenant_id));
    }

    #[test]
    fn test_exemption_is_per_tenant() {
        let registry = ExemptionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let _guard = registry.exempt(a);
        assert!(registry.is_exempt(a));
        assert!(!registry.is_exempt(b));
    }

    #[test]
    fn test_exemption_unwinds_on_panic() {
        let registry = ExemptionRegistry::new();
        let tenant_id = Uuid::new_v4();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = registry.exempt(tenant_id);
            panic!("nested operation failed");
        }));
        assert!(result.is_err());
        assert!(!registry.is_exempt(tenant_id));
    }
}
