//! In-memory sync state.
//!
//! The two maps the phases hand off to each other: events keyed by source
//! identifier, members keyed by the tenant's domain member key. Each draft
//! carries the last-committed row as a baseline so the committer can derive
//! a minimal change set.

use chrono::NaiveDate;
use rollcall_db::{AttendanceEntry, Event, Member, MemberProperty, PointType};
use rollcall_provider::{PropertyValue, SourceKind};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Working copy of one event across a sync run.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub source_kind: SourceKind,
    pub source_id: String,
    pub name: String,
    pub starts_on: NaiveDate,
    pub event_type_id: Option<Uuid>,
    pub points: i32,
    /// Provider field id to tenant property id assignment.
    pub mapping: HashMap<String, Uuid>,
    /// The committed row this draft was seeded from; `None` for events
    /// admitted this run.
    pub baseline: Option<Event>,
    /// Set when the provider reports the source gone; the committer turns
    /// this into a delete for previously-committed events.
    pub invalid: bool,
}

impl EventDraft {
    /// Seed a draft from a committed row. Returns `None` when the stored
    /// source kind no longer parses (the row is left untouched this sync).
    #[must_use]
    pub fn from_row(event: Event) -> Option<Self> {
        let source_kind = event.source_kind()?;
        Some(Self {
            id: event.id,
            tenant_id: event.tenant_id,
            source_kind,
            source_id: event.source_id.clone(),
            name: event.name.clone(),
            starts_on: event.starts_on,
            event_type_id: event.event_type_id,
            points: event.points,
            mapping: event.field_mapping(),
            baseline: Some(event),
            invalid: false,
        })
    }

    /// Create a draft for a newly admitted content item.
    #[must_use]
    pub fn admitted(
        tenant_id: Uuid,
        source_kind: SourceKind,
        source_id: impl Into<String>,
        name: impl Into<String>,
        starts_on: NaiveDate,
        event_type_id: Uuid,
        points: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            source_kind,
            source_id: source_id.into(),
            name: name.into(),
            starts_on,
            event_type_id: Some(event_type_id),
            points,
            mapping: HashMap::new(),
            baseline: None,
            invalid: false,
        }
    }

    /// Whether this event was first admitted during the current run.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.baseline.is_none()
    }

    /// Render the draft as a row for persistence.
    #[must_use]
    pub fn to_row(&self) -> Event {
        let (created_at, updated_at) = match &self.baseline {
            Some(row) => (row.created_at, row.updated_at),
            None => {
                let now = chrono::Utc::now();
                (now, now)
            }
        };
        Event {
            id: self.id,
            tenant_id: self.tenant_id,
            source_kind: self.source_kind.as_str().to_string(),
            source_id: self.source_id.clone(),
            name: self.name.clone(),
            starts_on: self.starts_on,
            event_type_id: self.event_type_id,
            points: self.points,
            field_mapping: serde_json::to_value(&self.mapping).unwrap_or_default(),
            created_at,
            updated_at,
        }
    }

    /// Whether the draft differs materially from its baseline.
    #[must_use]
    pub fn changed(&self) -> bool {
        let Some(baseline) = &self.baseline else {
            return true;
        };
        baseline.name != self.name
            || baseline.starts_on != self.starts_on
            || baseline.event_type_id != self.event_type_id
            || baseline.points != self.points
            || baseline.field_mapping() != self.mapping
    }
}

/// Working copy of one member across a sync run.
///
/// Construction from a committed row performs the per-sync reset: point
/// totals zeroed, non-override properties cleared, pending attendance
/// emptied. Everything the merge step adds afterwards is purely additive.
#[derive(Debug, Clone)]
pub struct MemberDraft {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub member_key: String,
    pub properties: HashMap<Uuid, MemberProperty>,
    pub point_totals: HashMap<Uuid, i64>,
    /// Attendance in discovery order; repaginated into buckets at commit.
    pub attendance: Vec<AttendanceEntry>,
    pub baseline: Option<Member>,
    /// Set by the required-property post-pass.
    pub marked_for_deletion: bool,
}

impl MemberDraft {
    /// Seed a draft from a committed row, applying the per-sync reset:
    /// only override properties survive.
    #[must_use]
    pub fn from_row(member: Member) -> Self {
        let properties = member
            .properties()
            .into_iter()
            .filter(|(_, p)| p.is_override)
            .collect();
        Self {
            id: member.id,
            tenant_id: member.tenant_id,
            member_key: member.member_key.clone(),
            properties,
            point_totals: HashMap::new(),
            attendance: Vec::new(),
            baseline: Some(member),
            marked_for_deletion: false,
        }
    }

    /// Create a draft for a member first seen this run.
    #[must_use]
    pub fn new(tenant_id: Uuid, member_key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            member_key: member_key.into(),
            properties: HashMap::new(),
            point_totals: HashMap::new(),
            attendance: Vec::new(),
            baseline: None,
            marked_for_deletion: false,
        }
    }

    /// Union one submitted value into the property map.
    ///
    /// Origin-event data always wins and sets the override flag; anything
    /// else fills gaps only.
    pub fn merge_property(&mut self, property: Uuid, value: PropertyValue, from_origin: bool) {
        if from_origin {
            self.properties
                .insert(property, MemberProperty::overridden(value));
        } else {
            self.properties
                .entry(property)
                .or_insert_with(|| MemberProperty::synced(value));
        }
    }

    /// Record attendance of an event and accrue its points into every
    /// point-type window containing the event date.
    ///
    /// A member attends a given event at most once; repeat submissions are
    /// ignored.
    pub fn record_attendance(&mut self, entry: AttendanceEntry, point_types: &[PointType]) {
        if self.attendance.iter().any(|a| a.event_id == entry.event_id) {
            return;
        }
        for window in point_types {
            if window.contains(entry.occurred_on) {
                *self.point_totals.entry(window.id).or_insert(0) += i64::from(entry.points);
            }
        }
        self.attendance.push(entry);
    }

    /// Whether any value is present for the given property.
    #[must_use]
    pub fn has_property(&self, property: Uuid) -> bool {
        self.properties.contains_key(&property)
    }

    /// Whether the draft differs materially from its baseline.
    /// Attendance lives in buckets, not the member row, so it is not
    /// compared here.
    #[must_use]
    pub fn changed(&self) -> bool {
        let Some(baseline) = &self.baseline else {
            return true;
        };
        baseline.properties() != self.properties || baseline.point_totals() != self.point_totals
    }

    /// Render the draft as a row for persistence.
    #[must_use]
    pub fn to_row(&self, last_synced_at: Option<chrono::DateTime<chrono::Utc>>) -> Member {
        let (created_at, updated_at) = match &self.baseline {
            Some(row) => (row.created_at, row.updated_at),
            None => {
                let now = chrono::Utc::now();
                (now, now)
            }
        };
        Member {
            id: self.id,
            tenant_id: self.tenant_id,
            member_key: self.member_key.clone(),
            properties: serde_json::to_value(&self.properties).unwrap_or_default(),
            point_totals: serde_json::to_value(&self.point_totals).unwrap_or_default(),
            last_synced_at,
            created_at,
            updated_at,
        }
    }

    /// Total points across all point types.
    #[must_use]
    pub fn total_points(&self) -> i64 {
        self.point_totals.values().sum()
    }
}

/// Summary of one sync run, logged at completion and returned to embedding
/// code. The API boundary still reports only success/failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncSummary {
    pub events_discovered: usize,
    pub events_admitted: usize,
    pub events_skipped: usize,
    pub events_deleted: usize,
    pub members_synced: usize,
    pub members_deleted: usize,
    pub buckets_written: usize,
    pub dry_run: bool,
    pub committed: bool,
    pub warnings: Vec<String>,
}

impl SyncSummary {
    /// Create an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a non-fatal problem: logged immediately, kept for the caller.
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }
}
