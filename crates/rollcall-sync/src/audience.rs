//! Audience discovery and merge engine.
//!
//! Runs once per discovered event: the content provider for the event's
//! source kind lists field definitions and submitted records, and this
//! engine merges them into the shared member map.
//!
//! Discovery for each event is an independent unit of work; all units start
//! together and the phase completes when every unit has finished. The merge
//! step of a unit runs under the member-map mutex with no suspension points
//! inside, so a read-merge-write against the shared map never interleaves
//! with another unit's merge.

use rollcall_core::PropertyTypeId;
use rollcall_db::{AttendanceEntry, Member, PointType, Tenant};
use rollcall_provider::{
    member_key_property, ContentProvider, PropertyType, ProviderError, ProviderRegistry,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::state::{EventDraft, MemberDraft, SyncSummary};

/// State shared by all audience units of one sync run.
struct AudienceShared {
    tenant_id: Uuid,
    schema: Vec<PropertyType>,
    point_types: Vec<PointType>,
    origin_source_id: Option<String>,
    /// The property id of the tenant's domain member identifier.
    member_key: Uuid,
    /// Members keyed by domain member key. Guarded contract: the lock is
    /// never held across an await.
    members: tokio::sync::Mutex<HashMap<String, MemberDraft>>,
}

/// The per-event data moved into a unit of work.
struct EventSnapshot {
    id: Uuid,
    source_id: String,
    name: String,
    starts_on: chrono::NaiveDate,
    points: i32,
    mapping: HashMap<String, Uuid>,
}

impl EventSnapshot {
    fn from_draft(draft: &EventDraft) -> Self {
        Self {
            id: draft.id,
            source_id: draft.source_id.clone(),
            name: draft.name.clone(),
            starts_on: draft.starts_on,
            points: draft.points,
            mapping: draft.mapping.clone(),
        }
    }
}

/// What one unit reports back to the phase.
struct UnitOutcome {
    source_id: String,
    /// Field mapping refreshed from the provider, when the listing ran.
    mapping: Option<HashMap<String, Uuid>>,
    /// The source no longer exists; the committer deletes the event.
    invalid: bool,
    warnings: Vec<String>,
}

impl UnitOutcome {
    fn new(source_id: String) -> Self {
        Self {
            source_id,
            mapping: None,
            invalid: false,
            warnings: Vec::new(),
        }
    }

    fn fail(&mut self, source_id: &str, error: &ProviderError) {
        if matches!(error, ProviderError::SourceGone { .. }) {
            self.invalid = true;
            self.warnings
                .push(format!("event {source_id}: source gone, removing event"));
        } else {
            self.warnings
                .push(format!("event {source_id}: {error}; no audience data this sync"));
        }
    }
}

/// The audience discovery engine.
pub struct AudienceDiscovery {
    providers: ProviderRegistry,
}

impl AudienceDiscovery {
    /// Create an audience engine over a provider registry.
    #[must_use]
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers }
    }

    /// Discover and merge the audiences of all discovered events.
    ///
    /// Every member on file is reset first (totals zeroed, non-override
    /// properties cleared) so the merge is purely additive per sync. The
    /// required-property deletion pass runs after the full merge, since a
    /// required property may be supplied by any one of several events.
    #[instrument(skip_all, fields(tenant_id = %tenant.id))]
    pub async fn run(
        &self,
        tenant: &Tenant,
        events: &mut HashMap<String, EventDraft>,
        existing_members: Vec<Member>,
        summary: &mut SyncSummary,
    ) -> HashMap<String, MemberDraft> {
        let schema = tenant.property_types();
        let member_key = member_key_property(&schema).map(|p| *p.id.as_uuid());

        let members: HashMap<String, MemberDraft> = existing_members
            .into_iter()
            .map(|m| (m.member_key.clone(), MemberDraft::from_row(m)))
            .collect();

        let Some(member_key) = member_key else {
            summary.warn("no member-id property configured; audience discovery skipped");
            return finish(members, &schema);
        };

        let shared = Arc::new(AudienceShared {
            tenant_id: tenant.id,
            schema,
            point_types: tenant.point_types(),
            origin_source_id: tenant.origin_source_id.clone(),
            member_key,
            members: tokio::sync::Mutex::new(members),
        });

        let mut units = tokio::task::JoinSet::new();
        for draft in events.values().filter(|d| !d.invalid) {
            let provider = match self.providers.get(draft.source_kind) {
                Ok(provider) => provider,
                Err(e) => {
                    summary.warn(format!("event {}: {e}", draft.source_id));
                    continue;
                }
            };
            units.spawn(discover_event(
                provider,
                EventSnapshot::from_draft(draft),
                Arc::clone(&shared),
            ));
        }

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(outcome) => {
                    for warning in outcome.warnings {
                        summary.warn(warning);
                    }
                    if let Some(draft) = events.get_mut(&outcome.source_id) {
                        if let Some(mapping) = outcome.mapping {
                            draft.mapping = mapping;
                        }
                        draft.invalid = draft.invalid || outcome.invalid;
                    }
                }
                Err(e) => summary.warn(format!("audience unit failed to complete: {e}")),
            }
        }

        let (members, schema) = match Arc::try_unwrap(shared) {
            Ok(state) => (state.members.into_inner(), state.schema),
            // Unreachable once every unit has joined, but stay safe.
            Err(shared) => (shared.members.lock().await.clone(), shared.schema.clone()),
        };
        finish(members, &schema)
    }
}

/// Post-merge pass: members missing a required property are marked for
/// deletion.
fn finish(
    mut members: HashMap<String, MemberDraft>,
    schema: &[PropertyType],
) -> HashMap<String, MemberDraft> {
    let required: Vec<Uuid> = schema
        .iter()
        .filter(|p| p.required)
        .map(|p| *p.id.as_uuid())
        .collect();

    for draft in members.values_mut() {
        if required.iter().any(|p| !draft.has_property(*p)) {
            draft.marked_for_deletion = true;
        }
    }
    members
}

/// One unit of work: list fields and records for an event, then merge.
async fn discover_event(
    provider: Arc<dyn ContentProvider>,
    event: EventSnapshot,
    shared: Arc<AudienceShared>,
) -> UnitOutcome {
    let mut outcome = UnitOutcome::new(event.source_id.clone());

    let fields = match provider.list_fields(&event.source_id, &shared.schema).await {
        Ok(fields) => fields,
        Err(e) => {
            outcome.fail(&event.source_id, &e);
            return outcome;
        }
    };

    // Refresh the mapping: newly classified fields fill gaps; an existing
    // assignment is never overwritten.
    let mut mapping = event.mapping.clone();
    for field in fields {
        if let Some(property) = field.property {
            mapping.entry(field.field_id).or_insert(*property.as_uuid());
        }
    }
    outcome.mapping = Some(mapping.clone());

    // Without a field for the member identifier the event contributes no
    // audience data.
    if !mapping.values().any(|p| *p == shared.member_key) {
        return outcome;
    }

    let typed_mapping: HashMap<String, PropertyTypeId> = mapping
        .iter()
        .map(|(field, property)| (field.clone(), PropertyTypeId::from_uuid(*property)))
        .collect();
    let records = match provider
        .list_records(&event.source_id, &typed_mapping, &shared.schema)
        .await
    {
        Ok(records) => records,
        Err(e) => {
            outcome.fail(&event.source_id, &e);
            return outcome;
        }
    };

    let from_origin = shared.origin_source_id.as_deref() == Some(event.source_id.as_str());
    let member_key = PropertyTypeId::from_uuid(shared.member_key);

    // Merge step: the guard is held across no awaits, so each unit's
    // read-merge-write runs to completion before any other unit's.
    let mut members = shared.members.lock().await;
    for record in records {
        let Some(key) = record.value(member_key) else {
            continue;
        };
        let key = key.to_text().trim().to_string();
        if key.is_empty() {
            continue;
        }

        let draft = members
            .entry(key.clone())
            .or_insert_with(|| MemberDraft::new(shared.tenant_id, key));
        for (property, value) in &record.values {
            if let Some(value) = value {
                draft.merge_property(*property.as_uuid(), value.clone(), from_origin);
            }
        }
        draft.record_attendance(
            AttendanceEntry {
                event_id: event.id,
                source_id: event.source_id.clone(),
                event_name: event.name.clone(),
                occurred_on: event.starts_on,
                points: event.points,
            },
            &shared.point_types,
        );
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rollcall_provider::{
        FieldDefinition, PropertyKind, ProviderResult, SourceKind, SubmittedRecord,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Schema {
        member_id: PropertyType,
        email: PropertyType,
    }

    fn schema() -> Schema {
        Schema {
            member_id: PropertyType::new("Member ID", PropertyKind::String)
                .required()
                .member_key(),
            email: PropertyType::new("Email", PropertyKind::String),
        }
    }

    fn tenant_with(schema: &Schema, origin_source_id: Option<&str>) -> Tenant {
        let point_types = vec![PointType {
            id: Uuid::new_v4(),
            name: "Fall".to_string(),
            starts_on: date(2026, 9, 1),
            ends_on: date(2026, 12, 20),
        }];
        Tenant {
            id: Uuid::new_v4(),
            name: "Chapter".to_string(),
            sync_lock: true,
            origin_source_id: origin_source_id.map(ToString::to_string),
            properties: serde_json::to_value(vec![
                schema.member_id.clone(),
                schema.email.clone(),
            ])
            .unwrap(),
            point_types: serde_json::to_value(point_types).unwrap(),
            report_ref: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn event(tenant_id: Uuid, source_id: &str, points: i32) -> EventDraft {
        EventDraft::admitted(
            tenant_id,
            SourceKind::Form,
            source_id,
            format!("Event {source_id}"),
            date(2026, 10, 1),
            Uuid::new_v4(),
            points,
        )
    }

    /// Mock content provider keyed by source id.
    #[derive(Default)]
    struct MockContent {
        fields: HashMap<String, Vec<FieldDefinition>>,
        records: HashMap<String, Vec<SubmittedRecord>>,
        gone: std::collections::HashSet<String>,
        unreachable: std::collections::HashSet<String>,
    }

    impl MockContent {
        fn with_source(
            mut self,
            source_id: &str,
            fields: Vec<FieldDefinition>,
            records: Vec<SubmittedRecord>,
        ) -> Self {
            self.fields.insert(source_id.to_string(), fields);
            self.records.insert(source_id.to_string(), records);
            self
        }

        fn gone(mut self, source_id: &str) -> Self {
            self.gone.insert(source_id.to_string());
            self
        }

        fn unreachable(mut self, source_id: &str) -> Self {
            self.unreachable.insert(source_id.to_string());
            self
        }
    }

    #[async_trait]
    impl ContentProvider for MockContent {
        fn kind(&self) -> SourceKind {
            SourceKind::Form
        }

        fn display_name(&self) -> &str {
            "mock-forms"
        }

        async fn list_fields(
            &self,
            source_id: &str,
            _schema: &[PropertyType],
        ) -> ProviderResult<Vec<FieldDefinition>> {
            if self.gone.contains(source_id) {
                return Err(ProviderError::gone(source_id));
            }
            if self.unreachable.contains(source_id) {
                return Err(ProviderError::unreachable(source_id, "timeout"));
            }
            Ok(self.fields.get(source_id).cloned().unwrap_or_default())
        }

        async fn list_records(
            &self,
            source_id: &str,
            _mapping: &HashMap<String, PropertyTypeId>,
            _schema: &[PropertyType],
        ) -> ProviderResult<Vec<SubmittedRecord>> {
            Ok(self.records.get(source_id).cloned().unwrap_or_default())
        }
    }

    fn registry(provider: MockContent) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(provider));
        registry
    }

    fn record(
        schema: &Schema,
        key: &str,
        email: Option<&str>,
    ) -> SubmittedRecord {
        let mut record = SubmittedRecord::new().with_value(schema.member_id.id, key.into());
        if let Some(email) = email {
            record = record.with_value(schema.email.id, email.into());
        }
        record
    }

    fn key_field(schema: &Schema) -> FieldDefinition {
        FieldDefinition::mapped("f-key", "Member ID", schema.member_id.id)
    }

    fn email_field(schema: &Schema) -> FieldDefinition {
        FieldDefinition::mapped("f-email", "Email", schema.email.id)
    }

    #[tokio::test]
    async fn test_members_merge_across_events() {
        let s = schema();
        let tenant = tenant_with(&s, None);
        let mut events = HashMap::new();
        events.insert("a".to_string(), event(tenant.id, "a", 10));
        events.insert("b".to_string(), event(tenant.id, "b", 5));

        let provider = MockContent::default()
            .with_source(
                "a",
                vec![key_field(&s), email_field(&s)],
                vec![record(&s, "m1", Some("x@y.com"))],
            )
            .with_source(
                "b",
                vec![key_field(&s)],
                vec![record(&s, "m1", None), record(&s, "m2", None)],
            );

        let mut summary = SyncSummary::new();
        let members = AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![], &mut summary)
            .await;

        let m1 = &members["m1"];
        assert_eq!(m1.attendance.len(), 2);
        assert_eq!(m1.total_points(), 15);
        assert_eq!(
            m1.properties[s.email.id.as_uuid()].value.as_string(),
            Some("x@y.com")
        );
        // m2 attended only event b.
        assert_eq!(members["m2"].total_points(), 5);
    }

    #[tokio::test]
    async fn test_origin_event_wins_regardless_of_order() {
        let s = schema();
        // Event b is the designated origin event.
        let tenant = tenant_with(&s, Some("b"));
        let mut events = HashMap::new();
        events.insert("a".to_string(), event(tenant.id, "a", 0));
        events.insert("b".to_string(), event(tenant.id, "b", 0));

        let provider = MockContent::default()
            .with_source(
                "a",
                vec![key_field(&s), email_field(&s)],
                vec![record(&s, "m1", Some("x@y.com"))],
            )
            .with_source(
                "b",
                vec![key_field(&s), email_field(&s)],
                vec![record(&s, "m1", Some("z@y.com"))],
            );

        let mut summary = SyncSummary::new();
        let members = AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![], &mut summary)
            .await;

        let email = &members["m1"].properties[s.email.id.as_uuid()];
        assert_eq!(email.value.as_string(), Some("z@y.com"));
        assert!(email.is_override);
    }

    #[tokio::test]
    async fn test_event_without_member_id_field_contributes_nothing() {
        let s = schema();
        let tenant = tenant_with(&s, None);
        let mut events = HashMap::new();
        events.insert("a".to_string(), event(tenant.id, "a", 10));

        // Only the email field maps; records exist but cannot be keyed.
        let provider = MockContent::default().with_source(
            "a",
            vec![email_field(&s)],
            vec![record(&s, "m1", Some("x@y.com"))],
        );

        let mut summary = SyncSummary::new();
        let members = AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![], &mut summary)
            .await;

        assert!(members.is_empty());
        // The mapping refresh still happened.
        assert!(events["a"].mapping.contains_key("f-email"));
    }

    #[tokio::test]
    async fn test_field_mapping_fills_gaps_never_overwrites() {
        let s = schema();
        let tenant = tenant_with(&s, None);
        let manual_target = Uuid::new_v4();
        let mut draft = event(tenant.id, "a", 10);
        draft
            .mapping
            .insert("f-email".to_string(), manual_target);
        let mut events = HashMap::new();
        events.insert("a".to_string(), draft);

        let provider = MockContent::default().with_source(
            "a",
            vec![key_field(&s), email_field(&s)],
            vec![],
        );

        let mut summary = SyncSummary::new();
        AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![], &mut summary)
            .await;

        let mapping = &events["a"].mapping;
        assert_eq!(mapping["f-email"], manual_target);
        assert_eq!(mapping["f-key"], *s.member_id.id.as_uuid());
    }

    #[tokio::test]
    async fn test_existing_members_are_reset_then_remerged() {
        let s = schema();
        let tenant = tenant_with(&s, None);

        let properties: HashMap<Uuid, rollcall_db::MemberProperty> = [
            (
                *s.member_id.id.as_uuid(),
                rollcall_db::MemberProperty::overridden("m1".into()),
            ),
            (
                *s.email.id.as_uuid(),
                rollcall_db::MemberProperty::synced("stale@y.com".into()),
            ),
        ]
        .into_iter()
        .collect();
        let totals: HashMap<Uuid, i64> = [(Uuid::new_v4(), 99)].into_iter().collect();
        let existing = Member {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            member_key: "m1".to_string(),
            properties: serde_json::to_value(&properties).unwrap(),
            point_totals: serde_json::to_value(&totals).unwrap(),
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut events = HashMap::new();
        events.insert("a".to_string(), event(tenant.id, "a", 10));
        let provider = MockContent::default().with_source(
            "a",
            vec![key_field(&s), email_field(&s)],
            vec![record(&s, "m1", Some("fresh@y.com"))],
        );

        let mut summary = SyncSummary::new();
        let members = AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![existing.clone()], &mut summary)
            .await;

        let m1 = &members["m1"];
        // Stale synced property was cleared and replaced by this sync's
        // value; the stale totals are gone.
        assert_eq!(
            m1.properties[s.email.id.as_uuid()].value.as_string(),
            Some("fresh@y.com")
        );
        assert_eq!(m1.point_totals.len(), 1);
        assert_eq!(m1.total_points(), 10);
        assert_eq!(m1.id, existing.id);
        assert!(!m1.marked_for_deletion);
    }

    #[tokio::test]
    async fn test_member_missing_required_property_is_marked_for_deletion() {
        let s = schema();
        let tenant = tenant_with(&s, None);

        // On file, but with no override member-id property; nothing
        // rediscovers them this sync.
        let existing = Member {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            member_key: "ghost".to_string(),
            properties: serde_json::json!({}),
            point_totals: serde_json::json!({}),
            last_synced_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut events = HashMap::new();
        let provider = MockContent::default();

        let mut summary = SyncSummary::new();
        let members = AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![existing], &mut summary)
            .await;

        assert!(members["ghost"].marked_for_deletion);
    }

    #[tokio::test]
    async fn test_unreachable_source_is_pruned_not_removed() {
        let s = schema();
        let tenant = tenant_with(&s, None);
        let mut events = HashMap::new();
        events.insert("a".to_string(), event(tenant.id, "a", 10));

        let provider = MockContent::default().unreachable("a");

        let mut summary = SyncSummary::new();
        let members = AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![], &mut summary)
            .await;

        assert!(members.is_empty());
        assert!(!events["a"].invalid);
        assert!(summary.warnings.iter().any(|w| w.contains("unreachable")));
    }

    #[tokio::test]
    async fn test_gone_source_marks_event_invalid() {
        let s = schema();
        let tenant = tenant_with(&s, None);
        let mut events = HashMap::new();
        events.insert("a".to_string(), event(tenant.id, "a", 10));

        let provider = MockContent::default().gone("a");

        let mut summary = SyncSummary::new();
        AudienceDiscovery::new(registry(provider))
            .run(&tenant, &mut events, vec![], &mut summary)
            .await;

        assert!(events["a"].invalid);
    }
}
