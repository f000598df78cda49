//! Report publishing contract.
//!
//! The report service itself is an external collaborator; the engine only
//! guarantees the sort order it is handed — events ascending by start date,
//! members ascending by total points — and records the returned reference.

use async_trait::async_trait;
use rollcall_db::{Event, Member};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncResult;

/// Reference to a published report (provider-specific, e.g. a document id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRef(pub String);

/// External service that renders canonical state into a human-readable
/// report.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Publish a report for the tenant.
    ///
    /// `events` arrive sorted ascending by start date and `members`
    /// ascending by total points. Returns `None` when the publisher
    /// declines to publish (e.g. the no-op publisher).
    async fn publish(
        &self,
        tenant_id: Uuid,
        events: &[Event],
        members: &[Member],
    ) -> SyncResult<Option<ReportRef>>;
}

/// Publisher for deployments with reporting disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReportPublisher;

#[async_trait]
impl ReportPublisher for NoopReportPublisher {
    async fn publish(
        &self,
        _tenant_id: Uuid,
        _events: &[Event],
        _members: &[Member],
    ) -> SyncResult<Option<ReportRef>> {
        Ok(None)
    }
}

/// Sort events the way the report service expects: ascending by start
/// date, name-stable within a day.
pub fn sort_events_for_report(events: &mut [Event]) {
    events.sort_by(|a, b| a.starts_on.cmp(&b.starts_on).then_with(|| a.name.cmp(&b.name)));
}

/// Sort members the way the report service expects: ascending by total
/// points, key-stable within a score.
pub fn sort_members_for_report(members: &mut [Member]) {
    members.sort_by(|a, b| {
        a.total_points()
            .cmp(&b.total_points())
            .then_with(|| a.member_key.cmp(&b.member_key))
    });
}
