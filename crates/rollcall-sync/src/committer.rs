//! Persistence committer.
//!
//! Derives the change set from the in-memory maps — event and member
//! upserts/deletes, attendance bucket repagination, the recomputed
//! dashboard, and the authoritative quota delta — and commits all of it in
//! one transaction. Any failure aborts the whole transaction; prior
//! committed state is left untouched.

use chrono::{DateTime, Utc};
use rollcall_core::{RollcallError, TenantAware, TenantId};
use rollcall_db::{AttendanceBucket, AttendanceEntry, Dashboard, Event, EventType, Member};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::quota::{QuotaDelta, QuotaLimiter};
use crate::state::{EventDraft, MemberDraft, SyncSummary};

/// Everything one sync run wants to persist, derived up front so the
/// transaction itself is a straight sequence of writes.
#[derive(Debug, Default)]
pub struct CommitDelta {
    pub tenant_id: Uuid,
    pub event_upserts: Vec<Event>,
    pub event_deletes: Vec<Uuid>,
    pub event_type_updates: Vec<EventType>,
    pub member_upserts: Vec<Member>,
    pub member_deletes: Vec<Uuid>,
    pub bucket_upserts: Vec<AttendanceBucket>,
    pub bucket_deletes: Vec<Uuid>,
    pub dashboard: Option<Dashboard>,
    pub quota: QuotaDelta,
}

impl CommitDelta {
    /// Whether the delta writes anything besides the dashboard refresh.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.event_upserts.is_empty()
            && self.event_deletes.is_empty()
            && self.event_type_updates.is_empty()
            && self.member_upserts.is_empty()
            && self.member_deletes.is_empty()
            && self.bucket_upserts.is_empty()
            && self.bucket_deletes.is_empty()
            && self.quota.is_zero()
    }

    /// Fold the delta's counts into a sync summary.
    pub fn record(&self, summary: &mut SyncSummary) {
        summary.events_deleted = self.event_deletes.len();
        summary.members_synced = self.member_upserts.len();
        summary.members_deleted = self.member_deletes.len();
        summary.buckets_written = self.bucket_upserts.len();
    }
}

/// Stable chunking of attendance entries into pages.
fn paginate(entries: &[AttendanceEntry], capacity: usize) -> Vec<Vec<AttendanceEntry>> {
    let capacity = capacity.max(1);
    entries
        .chunks(capacity)
        .map(<[AttendanceEntry]>::to_vec)
        .collect()
}

/// Derive the change set for one sync run.
///
/// Events and members are compared against their baselines so an unchanged
/// record produces no write; the dashboard is recomputed wholly from the
/// final sets, never patched.
#[allow(clippy::too_many_arguments)]
pub fn derive_delta(
    tenant_id: Uuid,
    events: &HashMap<String, EventDraft>,
    members: &HashMap<String, MemberDraft>,
    existing_buckets: &[AttendanceBucket],
    original_event_types: &[EventType],
    event_types: &[EventType],
    pending_quota: QuotaDelta,
    bucket_capacity: usize,
    now: DateTime<Utc>,
) -> CommitDelta {
    let mut delta = CommitDelta {
        tenant_id,
        quota: pending_quota,
        ..CommitDelta::default()
    };

    let originals: HashMap<Uuid, &EventType> =
        original_event_types.iter().map(|et| (et.id, et)).collect();
    for event_type in event_types {
        let changed = originals
            .get(&event_type.id)
            .is_none_or(|original| original.source_folders != event_type.source_folders);
        if changed {
            delta.event_type_updates.push(event_type.clone());
        }
    }

    for draft in events.values() {
        if draft.invalid {
            if !draft.is_new() {
                delta.event_deletes.push(draft.id);
            }
            continue;
        }
        if draft.changed() {
            delta.event_upserts.push(draft.to_row());
        }
    }

    let mut buckets_by_member: HashMap<Uuid, Vec<&AttendanceBucket>> = HashMap::new();
    for bucket in existing_buckets {
        buckets_by_member.entry(bucket.member_id).or_default().push(bucket);
    }
    for pages in buckets_by_member.values_mut() {
        pages.sort_by_key(|b| b.page_index);
    }

    for draft in members.values() {
        if draft.marked_for_deletion {
            if draft.baseline.is_some() {
                delta.member_deletes.push(draft.id);
                if let Some(pages) = buckets_by_member.get(&draft.id) {
                    delta.bucket_deletes.extend(pages.iter().map(|b| b.id));
                }
            }
            continue;
        }

        if draft.changed() {
            delta.member_upserts.push(draft.to_row(Some(now)));
        }

        // Repaginate: fill each page to capacity, then drop whatever stale
        // pages remain past the new page count. Entries are ordered by
        // event date then source id — append order varies with unit
        // completion order and would churn pages on every sync.
        let mut attendance = draft.attendance.clone();
        attendance.sort_by(|a, b| {
            a.occurred_on
                .cmp(&b.occurred_on)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });
        let pages = paginate(&attendance, bucket_capacity);
        let existing = buckets_by_member.get(&draft.id);
        for (index, entries) in pages.iter().enumerate() {
            let page_index = i32::try_from(index).unwrap_or(i32::MAX);
            let current = existing.and_then(|pages| {
                pages.iter().find(|b| b.page_index == page_index).copied()
            });
            if let Some(current) = current {
                if current.entries() != *entries {
                    let mut updated = current.clone();
                    updated.entries = serde_json::to_value(entries).unwrap_or_default();
                    updated.entry_count = i32::try_from(entries.len()).unwrap_or(i32::MAX);
                    delta.bucket_upserts.push(updated);
                }
            } else {
                delta.bucket_upserts.push(AttendanceBucket {
                    id: Uuid::new_v4(),
                    tenant_id,
                    member_id: draft.id,
                    page_index,
                    entries: serde_json::to_value(entries).unwrap_or_default(),
                    entry_count: i32::try_from(entries.len()).unwrap_or(i32::MAX),
                    created_at: now,
                    updated_at: now,
                });
            }
        }
        if let Some(existing) = existing {
            let page_count = i32::try_from(pages.len()).unwrap_or(i32::MAX);
            delta.bucket_deletes.extend(
                existing
                    .iter()
                    .filter(|b| b.page_index >= page_count)
                    .map(|b| b.id),
            );
        }
    }

    let surviving_members: Vec<&MemberDraft> = members
        .values()
        .filter(|m| !m.marked_for_deletion)
        .collect();
    delta.dashboard = Some(Dashboard {
        tenant_id,
        event_count: events.values().filter(|e| !e.invalid).count() as i64,
        member_count: surviving_members.len() as i64,
        attendance_count: surviving_members
            .iter()
            .map(|m| m.attendance.len() as i64)
            .sum(),
        points_awarded: surviving_members.iter().map(|m| m.total_points()).sum(),
        generated_at: now,
    });

    delta
}

/// Refuse to write rows that belong to another tenant.
fn verify_tenant<T: TenantAware>(expected: Uuid, rows: &[T]) -> SyncResult<()> {
    let expected = TenantId::from_uuid(expected);
    for row in rows {
        if row.tenant_id() != expected {
            return Err(RollcallError::TenantMismatch {
                expected,
                actual: row.tenant_id(),
            }
            .into());
        }
    }
    Ok(())
}

/// Commit the whole change set in one transaction.
///
/// The quota decrement runs inside the same transaction; if concurrent
/// operations consumed quota since discovery admitted work, the guard
/// fails, everything rolls back, and [`SyncError::QuotaConflict`] is
/// returned.
#[instrument(skip_all, fields(tenant_id = %delta.tenant_id))]
pub async fn commit(pool: &PgPool, limiter: &QuotaLimiter, delta: &CommitDelta) -> SyncResult<()> {
    verify_tenant(delta.tenant_id, &delta.event_type_updates)?;
    verify_tenant(delta.tenant_id, &delta.event_upserts)?;
    verify_tenant(delta.tenant_id, &delta.member_upserts)?;
    verify_tenant(delta.tenant_id, &delta.bucket_upserts)?;

    let mut tx = pool.begin().await?;

    for event_type in &delta.event_type_updates {
        EventType::update_source_folders(
            &mut tx,
            event_type.tenant_id,
            event_type.id,
            &event_type.source_folders,
        )
        .await?;
    }
    for event in &delta.event_upserts {
        Event::upsert(&mut tx, event).await?;
    }
    if !delta.event_deletes.is_empty() {
        Event::delete_by_ids(&mut tx, delta.tenant_id, &delta.event_deletes).await?;
    }
    for member in &delta.member_upserts {
        Member::upsert(&mut tx, member).await?;
    }
    if !delta.member_deletes.is_empty() {
        Member::delete_by_ids(&mut tx, delta.tenant_id, &delta.member_deletes).await?;
    }
    for bucket in &delta.bucket_upserts {
        AttendanceBucket::upsert(&mut tx, bucket).await?;
    }
    if !delta.bucket_deletes.is_empty() {
        AttendanceBucket::delete_by_ids(&mut tx, delta.tenant_id, &delta.bucket_deletes).await?;
    }
    if let Some(dashboard) = &delta.dashboard {
        Dashboard::replace(&mut tx, dashboard).await?;
    }

    if !limiter.increment(&mut tx, delta.tenant_id, &delta.quota).await? {
        tx.rollback().await?;
        return Err(SyncError::QuotaConflict {
            tenant_id: delta.tenant_id,
        });
    }

    tx.commit().await?;
    info!(
        events = delta.event_upserts.len(),
        members = delta.member_upserts.len(),
        buckets = delta.bucket_upserts.len(),
        "sync delta committed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rollcall_db::MemberProperty;
    use rollcall_provider::SourceKind;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(points: i32) -> AttendanceEntry {
        AttendanceEntry {
            event_id: Uuid::new_v4(),
            source_id: "src".to_string(),
            event_name: "Event".to_string(),
            occurred_on: date(2026, 10, 1),
            points,
        }
    }

    fn bucket_row(
        tenant_id: Uuid,
        member_id: Uuid,
        page_index: i32,
        entries: &[AttendanceEntry],
    ) -> AttendanceBucket {
        AttendanceBucket {
            id: Uuid::new_v4(),
            tenant_id,
            member_id,
            page_index,
            entries: serde_json::to_value(entries).unwrap(),
            entry_count: entries.len() as i32,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member_row(tenant_id: Uuid, key: &str) -> Member {
        Member {
            id: Uuid::new_v4(),
            tenant_id,
            member_key: key.to_string(),
            properties: serde_json::json!({}),
            point_totals: serde_json::json!({}),
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn event_row(tenant_id: Uuid, source_id: &str) -> Event {
        Event {
            id: Uuid::new_v4(),
            tenant_id,
            source_kind: "form".to_string(),
            source_id: source_id.to_string(),
            name: format!("Event {source_id}"),
            starts_on: date(2026, 10, 1),
            event_type_id: None,
            points: 5,
            field_mapping: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_pagination_is_stable_chunking() {
        let entries: Vec<AttendanceEntry> = (0..5).map(|i| entry(i)).collect();
        let pages = paginate(&entries, 2);

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 2);
        assert_eq!(pages[1].len(), 2);
        assert_eq!(pages[2].len(), 1);

        // Concatenating pages in order reproduces the source list exactly.
        let rejoined: Vec<AttendanceEntry> = pages.into_iter().flatten().collect();
        assert_eq!(rejoined, entries);
    }

    #[test]
    fn test_repagination_reuses_pages_and_drops_stale_tail() {
        let tenant_id = Uuid::new_v4();
        let row = member_row(tenant_id, "m1");
        let member_id = row.id;

        let mut draft = MemberDraft::from_row(row);
        let entries: Vec<AttendanceEntry> = (0..3).map(|i| entry(i)).collect();
        draft.attendance = entries.clone();

        // Page 0 already matches; pages 1 and 2 are stale leftovers from a
        // previous, longer history.
        let existing = vec![
            bucket_row(tenant_id, member_id, 0, &entries[0..2]),
            bucket_row(tenant_id, member_id, 1, &[entry(9), entry(9)]),
            bucket_row(tenant_id, member_id, 2, &[entry(9)]),
        ];

        let mut members = HashMap::new();
        members.insert("m1".to_string(), draft);

        let delta = derive_delta(
            tenant_id,
            &HashMap::new(),
            &members,
            &existing,
            &[],
            &[],
            QuotaDelta::none(),
            2,
            Utc::now(),
        );

        // Page 0 unchanged (skipped); page 1 rewritten in place; page 2
        // past the new count is deleted.
        assert_eq!(delta.bucket_upserts.len(), 1);
        assert_eq!(delta.bucket_upserts[0].page_index, 1);
        assert_eq!(delta.bucket_upserts[0].id, existing[1].id);
        assert_eq!(delta.bucket_upserts[0].entries(), vec![entries[2].clone()]);
        assert_eq!(delta.bucket_deletes, vec![existing[2].id]);
    }

    #[test]
    fn test_unchanged_state_derives_noop_delta() {
        let tenant_id = Uuid::new_v4();

        let event = event_row(tenant_id, "s1");
        let mut events = HashMap::new();
        events.insert(
            "s1".to_string(),
            EventDraft::from_row(event).unwrap(),
        );

        // Member whose only property is an override, with attendance that
        // matches the bucket already on file.
        let prop = Uuid::new_v4();
        let properties: HashMap<Uuid, MemberProperty> =
            [(prop, MemberProperty::overridden("m1".into()))]
                .into_iter()
                .collect();
        let mut row = member_row(tenant_id, "m1");
        row.properties = serde_json::to_value(&properties).unwrap();
        let member_id = row.id;

        let mut draft = MemberDraft::from_row(row);
        let history = vec![entry(3)];
        draft.attendance = history.clone();
        let existing_buckets = vec![bucket_row(tenant_id, member_id, 0, &history)];

        let mut members = HashMap::new();
        members.insert("m1".to_string(), draft);

        let event_types: Vec<EventType> = vec![];
        let delta = derive_delta(
            tenant_id,
            &events,
            &members,
            &existing_buckets,
            &event_types,
            &event_types,
            QuotaDelta::none(),
            10,
            Utc::now(),
        );

        assert!(delta.is_noop());
        // Dashboard is still recomputed every run.
        let dashboard = delta.dashboard.unwrap();
        assert_eq!(dashboard.event_count, 1);
        assert_eq!(dashboard.member_count, 1);
        assert_eq!(dashboard.attendance_count, 1);
        assert_eq!(dashboard.points_awarded, 0);
    }

    #[test]
    fn test_member_deletion_cascades_buckets() {
        let tenant_id = Uuid::new_v4();
        let row = member_row(tenant_id, "ghost");
        let member_id = row.id;
        let history = vec![entry(3)];
        let existing_buckets = vec![bucket_row(tenant_id, member_id, 0, &history)];

        let mut draft = MemberDraft::from_row(row);
        draft.marked_for_deletion = true;
        let mut members = HashMap::new();
        members.insert("ghost".to_string(), draft);

        let delta = derive_delta(
            tenant_id,
            &HashMap::new(),
            &members,
            &existing_buckets,
            &[],
            &[],
            QuotaDelta::none(),
            10,
            Utc::now(),
        );

        assert_eq!(delta.member_deletes, vec![member_id]);
        assert_eq!(delta.bucket_deletes, vec![existing_buckets[0].id]);
        assert!(delta.member_upserts.is_empty());
        assert!(delta.bucket_upserts.is_empty());
        assert_eq!(delta.dashboard.unwrap().member_count, 0);
    }

    #[test]
    fn test_invalid_event_deleted_only_when_on_file() {
        let tenant_id = Uuid::new_v4();

        let mut on_file = EventDraft::from_row(event_row(tenant_id, "gone")).unwrap();
        on_file.invalid = true;
        let mut never_committed = EventDraft::admitted(
            tenant_id,
            SourceKind::Form,
            "fresh",
            "Fresh",
            date(2026, 10, 1),
            Uuid::new_v4(),
            0,
        );
        never_committed.invalid = true;

        let mut events = HashMap::new();
        let on_file_id = on_file.id;
        events.insert("gone".to_string(), on_file);
        events.insert("fresh".to_string(), never_committed);

        let delta = derive_delta(
            tenant_id,
            &events,
            &HashMap::new(),
            &[],
            &[],
            &[],
            QuotaDelta::none(),
            10,
            Utc::now(),
        );

        assert_eq!(delta.event_deletes, vec![on_file_id]);
        assert!(delta.event_upserts.is_empty());
        assert_eq!(delta.dashboard.unwrap().event_count, 0);
    }

    #[test]
    fn test_cross_tenant_rows_are_refused() {
        let tenant_id = Uuid::new_v4();
        let foreign = vec![member_row(Uuid::new_v4(), "m1")];
        assert!(verify_tenant(tenant_id, &foreign).is_err());

        let own = vec![member_row(tenant_id, "m1")];
        assert!(verify_tenant(tenant_id, &own).is_ok());
    }

    #[test]
    fn test_event_type_folder_changes_are_detected() {
        let tenant_id = Uuid::new_v4();
        let original = EventType {
            id: Uuid::new_v4(),
            tenant_id,
            name: "Socials".to_string(),
            points: 5,
            source_folders: vec!["a".to_string(), "bad".to_string()],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut updated = original.clone();
        updated.source_folders = vec!["a".to_string()];

        let delta = derive_delta(
            tenant_id,
            &HashMap::new(),
            &HashMap::new(),
            &[],
            std::slice::from_ref(&original),
            std::slice::from_ref(&updated),
            QuotaDelta::none(),
            10,
            Utc::now(),
        );

        assert_eq!(delta.event_type_updates.len(), 1);
        assert_eq!(
            delta.event_type_updates[0].source_folders,
            vec!["a".to_string()]
        );
    }
}
