//! Sync coordinator.
//!
//! Owns the lock lifecycle and phase sequencing for one tenant sync:
//! acquire the lock (compare-and-set on the tenant row), load the snapshot,
//! run discovery → audience merge → commit, release the lock with bounded
//! retry, and refresh the report last.
//!
//! Failure containment: everything after lock acquisition is caught here
//! and folded into the summary. The only error that escapes once the lock
//! is held is [`SyncError::LockStuck`] — the lock could not be cleared and
//! the tenant needs operator attention.

use chrono::Utc;
use rollcall_core::TenantId;
use rollcall_db::{AttendanceBucket, Event, EventType, Member, QuotaRecord, Tenant};
use rollcall_provider::{FolderProvider, ProviderRegistry};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::audience::AudienceDiscovery;
use crate::committer::{self, derive_delta};
use crate::config::SyncConfig;
use crate::discovery::EventDiscovery;
use crate::error::{SyncError, SyncResult};
use crate::quota::{QuotaLimiter, SpeculativeQuota};
use crate::report::{sort_events_for_report, sort_members_for_report, ReportPublisher};
use crate::state::{EventDraft, MemberDraft, SyncSummary};

/// Options for one sync invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Skip the report refresh after commit.
    pub skip_report: bool,
    /// Run discovery and merge and derive the delta, but commit nothing.
    pub dry_run: bool,
}

/// The synchronization coordinator for all tenants of a deployment.
pub struct SyncCoordinator {
    pool: PgPool,
    discovery: EventDiscovery,
    audience: AudienceDiscovery,
    publisher: Arc<dyn ReportPublisher>,
    limiter: QuotaLimiter,
    config: SyncConfig,
}

impl SyncCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        pool: PgPool,
        folder_provider: Arc<dyn FolderProvider>,
        providers: ProviderRegistry,
        publisher: Arc<dyn ReportPublisher>,
        config: SyncConfig,
    ) -> Self {
        Self {
            limiter: QuotaLimiter::new(pool.clone()),
            discovery: EventDiscovery::new(folder_provider),
            audience: AudienceDiscovery::new(providers),
            publisher,
            pool,
            config,
        }
    }

    /// The quota limiter shared with this coordinator, for callers (the
    /// API layer) that validate create/update operations against it.
    #[must_use]
    pub fn limiter(&self) -> &QuotaLimiter {
        &self.limiter
    }

    /// Synchronize one tenant.
    ///
    /// Fails fast with [`SyncError::AlreadyRunning`] when the tenant's lock
    /// is already set. Once the lock is held, phase failures degrade to
    /// warnings in the returned summary; the lock is cleared on the way out
    /// regardless of outcome.
    #[instrument(skip(self, options), fields(tenant_id = %tenant_id))]
    pub async fn sync(&self, tenant_id: TenantId, options: SyncOptions) -> SyncResult<SyncSummary> {
        let id = tenant_id.into_uuid();
        let Some(tenant) = Tenant::acquire_sync_lock(&self.pool, id).await? else {
            return Err(match Tenant::find_by_id(&self.pool, id).await? {
                Some(_) => SyncError::AlreadyRunning { tenant_id: id },
                None => SyncError::not_found("Tenant", id),
            });
        };

        let summary = match self.run_phases(&tenant, options).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "sync aborted");
                let mut summary = SyncSummary::new();
                summary.dry_run = options.dry_run;
                summary.warnings.push(format!("sync aborted: {e}"));
                summary
            }
        };

        self.release_lock(id).await?;

        info!(
            committed = summary.committed,
            events_admitted = summary.events_admitted,
            members_synced = summary.members_synced,
            warnings = summary.warnings.len(),
            "sync finished"
        );
        Ok(summary)
    }

    /// The phases that run under the lock.
    async fn run_phases(&self, tenant: &Tenant, options: SyncOptions) -> SyncResult<SyncSummary> {
        let mut summary = SyncSummary::new();
        summary.dry_run = options.dry_run;
        let now = Utc::now();

        let quota_record = QuotaRecord::find_by_tenant(&self.pool, tenant.id)
            .await?
            .ok_or_else(|| {
                SyncError::invariant(format!("quota record missing for tenant {}", tenant.id))
            })?;
        let event_types = EventType::list_for_tenant(&self.pool, tenant.id).await?;
        let existing_events = Event::list_for_tenant(&self.pool, tenant.id).await?;
        let existing_members = Member::list_for_tenant(&self.pool, tenant.id).await?;
        let existing_buckets = AttendanceBucket::list_for_tenant(&self.pool, tenant.id).await?;

        let mut quota = SpeculativeQuota::new(quota_record);

        // Per-operation quota checks are disabled while the engine runs:
        // the sync accounts for everything it admits in one pending delta,
        // applied authoritatively at commit. The guard must be gone before
        // the commit so the decrement itself is not skipped.
        let (discovery, members) = {
            let _exempt = self.limiter.exemptions().exempt(tenant.id);
            let mut discovery = self
                .discovery
                .run(
                    tenant,
                    &event_types,
                    existing_events,
                    &mut quota,
                    now.date_naive(),
                    &mut summary,
                )
                .await;
            let members = self
                .audience
                .run(tenant, &mut discovery.events, existing_members, &mut summary)
                .await;
            (discovery, members)
        };

        let delta = derive_delta(
            tenant.id,
            &discovery.events,
            &members,
            &existing_buckets,
            &event_types,
            &discovery.event_types,
            quota.pending(),
            self.config.bucket_capacity,
            now,
        );
        delta.record(&mut summary);

        if options.dry_run {
            info!("dry run: delta derived, nothing committed");
            return Ok(summary);
        }

        committer::commit(&self.pool, &self.limiter, &delta).await?;
        summary.committed = true;

        if !options.skip_report {
            self.publish_report(tenant, &discovery.events, &members, &mut summary)
                .await;
        }

        Ok(summary)
    }

    /// Publish the report from the final in-memory sets, in the sort order
    /// the report service expects. Publish failures are warnings; the
    /// committed data stands either way.
    async fn publish_report(
        &self,
        tenant: &Tenant,
        events: &HashMap<String, EventDraft>,
        members: &HashMap<String, MemberDraft>,
        summary: &mut SyncSummary,
    ) {
        let mut event_rows: Vec<Event> = events
            .values()
            .filter(|e| !e.invalid)
            .map(EventDraft::to_row)
            .collect();
        let mut member_rows: Vec<Member> = members
            .values()
            .filter(|m| !m.marked_for_deletion)
            .map(|m| m.to_row(None))
            .collect();
        sort_events_for_report(&mut event_rows);
        sort_members_for_report(&mut member_rows);

        match self
            .publisher
            .publish(tenant.id, &event_rows, &member_rows)
            .await
        {
            Ok(Some(report_ref)) => {
                if let Err(e) = Tenant::set_report_ref(&self.pool, tenant.id, &report_ref.0).await {
                    summary.warn(format!("failed to record report reference: {e}"));
                }
            }
            Ok(None) => {}
            Err(e) => summary.warn(format!("report publish failed: {e}")),
        }
    }

    /// Clear the sync lock with bounded retry.
    ///
    /// Release is the one step that must not fail silently: after the
    /// retries are exhausted the tenant is stuck and the fatal error says
    /// so.
    async fn release_lock(&self, tenant_id: Uuid) -> SyncResult<()> {
        let attempts = self.config.lock_release_retries.max(1);
        for attempt in 1..=attempts {
            match Tenant::release_sync_lock(&self.pool, tenant_id).await {
                Ok(true) => return Ok(()),
                Ok(false) => {
                    // Tenant row vanished mid-sync; nothing left to unlock.
                    warn!(%tenant_id, "tenant missing during lock release");
                    return Ok(());
                }
                Err(e) => {
                    warn!(%tenant_id, attempt, error = %e, "lock release attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.lock_release_delay()).await;
                    }
                }
            }
        }

        error!(%tenant_id, "sync lock stuck; operator intervention required");
        Err(SyncError::LockStuck {
            tenant_id,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default_to_full_sync() {
        let options = SyncOptions::default();
        assert!(!options.skip_report);
        assert!(!options.dry_run);
    }
}
