//! Event discovery engine.
//!
//! Populates the in-memory event map from (a) events already on file,
//! seeded with their committed field mapping as the synchronized baseline,
//! and (b) traversal of the event types' source folders through the folder
//! provider.
//!
//! Folder ownership is resolved by a claim-count tie-break: a contested
//! folder goes to the event type with the strictly lower running
//! claimed-file count; an exact tie retains the incumbent owner. Counts
//! move as traversal proceeds, so a settled folder can flip owner and is
//! then re-queued.

use chrono::NaiveDate;
use rollcall_db::{Event, EventType, Tenant};
use rollcall_provider::{FolderItem, FolderProvider};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::quota::SpeculativeQuota;
use crate::state::{EventDraft, SyncSummary};

/// Result of a claim attempt on a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClaimOutcome {
    /// The folder had no owner; the candidate takes it.
    New,
    /// The candidate already owned the folder.
    Retained,
    /// The candidate won the tie-break; ownership moved.
    Transferred,
    /// The incumbent kept the folder (tie or lower count).
    Lost,
}

/// Folder ownership plus per-event-type claimed-file counts.
///
/// Purely transient traversal state; counts start at zero every sync and
/// are never persisted.
#[derive(Debug, Default)]
struct ClaimState {
    owners: HashMap<String, Uuid>,
    counts: HashMap<Uuid, u64>,
}

impl ClaimState {
    fn owner(&self, folder_id: &str) -> Option<Uuid> {
        self.owners.get(folder_id).copied()
    }

    fn count(&self, event_type_id: Uuid) -> u64 {
        self.counts.get(&event_type_id).copied().unwrap_or(0)
    }

    /// Count one claimed file for an event type.
    fn add_file(&mut self, event_type_id: Uuid) {
        *self.counts.entry(event_type_id).or_insert(0) += 1;
    }

    /// Run the tie-break for `candidate` against the folder's current
    /// owner. Strictly lower claimed-file count wins; ties favor the
    /// incumbent.
    fn claim(&mut self, folder_id: &str, candidate: Uuid) -> ClaimOutcome {
        match self.owners.get(folder_id).copied() {
            None => {
                self.owners.insert(folder_id.to_string(), candidate);
                ClaimOutcome::New
            }
            Some(owner) if owner == candidate => ClaimOutcome::Retained,
            Some(owner) => {
                if self.count(candidate) < self.count(owner) {
                    self.owners.insert(folder_id.to_string(), candidate);
                    ClaimOutcome::Transferred
                } else {
                    ClaimOutcome::Lost
                }
            }
        }
    }

    /// Drop a folder from the ownership map (unreadable folder).
    fn release(&mut self, folder_id: &str) {
        self.owners.remove(folder_id);
    }
}

/// What discovery hands to the audience and commit phases.
#[derive(Debug)]
pub struct DiscoveryOutcome {
    /// Events keyed by source identifier.
    pub events: HashMap<String, EventDraft>,
    /// Event types with their working folder lists (pruned folders removed,
    /// admitted subfolders appended).
    pub event_types: Vec<EventType>,
}

/// The event discovery engine.
pub struct EventDiscovery {
    folder_provider: Arc<dyn FolderProvider>,
}

impl EventDiscovery {
    /// Create a discovery engine over a folder provider.
    #[must_use]
    pub fn new(folder_provider: Arc<dyn FolderProvider>) -> Self {
        Self { folder_provider }
    }

    /// Populate the event map for one tenant.
    ///
    /// `as_of` supplies the event date for content items whose provider
    /// cannot derive one. Admission of new events and folders is gated by
    /// the speculative quota; nothing here touches persisted counters.
    #[instrument(skip_all, fields(tenant_id = %tenant.id))]
    pub async fn run(
        &self,
        tenant: &Tenant,
        event_types: &[EventType],
        existing_events: Vec<Event>,
        quota: &mut SpeculativeQuota,
        as_of: NaiveDate,
        summary: &mut SyncSummary,
    ) -> DiscoveryOutcome {
        let mut events: HashMap<String, EventDraft> = HashMap::new();
        for row in existing_events {
            let source_id = row.source_id.clone();
            match EventDraft::from_row(row) {
                Some(draft) => {
                    events.insert(source_id, draft);
                }
                None => summary.warn(format!(
                    "event {source_id}: unknown source kind on file, leaving row untouched"
                )),
            }
        }

        let points_by_type: HashMap<Uuid, i32> =
            event_types.iter().map(|et| (et.id, et.points)).collect();
        let mut folder_lists: HashMap<Uuid, Vec<String>> = event_types
            .iter()
            .map(|et| (et.id, et.source_folders.clone()))
            .collect();

        let mut claims = ClaimState::default();
        let mut worklist: VecDeque<String> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        // Initial ownership from the configured folder lists, in stable
        // order so a re-run with unchanged state resolves identically.
        for event_type in event_types {
            for folder_id in &event_type.source_folders {
                if matches!(
                    claims.claim(folder_id, event_type.id),
                    ClaimOutcome::New | ClaimOutcome::Transferred
                ) {
                    visited.remove(folder_id);
                    worklist.push_back(folder_id.clone());
                }
            }
        }

        while let Some(folder_id) = worklist.pop_front() {
            if !visited.insert(folder_id.clone()) {
                continue;
            }
            let Some(owner) = claims.owner(&folder_id) else {
                continue;
            };

            let children = match self.folder_provider.list_children(&folder_id).await {
                Ok(children) => children,
                Err(e) => {
                    summary.warn(format!(
                        "folder {folder_id}: {e}; dropping folder from its owner"
                    ));
                    claims.release(&folder_id);
                    if let Some(list) = folder_lists.get_mut(&owner) {
                        list.retain(|f| f != &folder_id);
                    }
                    continue;
                }
            };

            for child in children {
                match child {
                    FolderItem::Folder { id, .. } => {
                        let configured = claims.owner(&id).is_some();
                        if !configured {
                            // A folder nobody listed yet: admission consumes
                            // a source-folder slot.
                            if !quota.try_take_folder() {
                                summary.warn(format!(
                                    "folder {id}: source-folder quota exhausted, skipping"
                                ));
                                continue;
                            }
                            folder_lists.entry(owner).or_default().push(id.clone());
                        }
                        // Re-queue only when ownership actually moved; a
                        // Retained outcome on a visited folder would
                        // otherwise cycle forever.
                        if matches!(
                            claims.claim(&id, owner),
                            ClaimOutcome::New | ClaimOutcome::Transferred
                        ) {
                            visited.remove(&id);
                            worklist.push_back(id);
                        }
                    }
                    FolderItem::Content {
                        id,
                        name,
                        kind,
                        occurs_on,
                    } => {
                        summary.events_discovered += 1;
                        claims.add_file(owner);

                        if let Some(draft) = events.get_mut(&id) {
                            // Rediscovery never overwrites an admitted
                            // event's link, only fills a missing one.
                            if draft.event_type_id.is_none() {
                                draft.event_type_id = Some(owner);
                            }
                        } else if quota.try_take_event() {
                            let points = points_by_type.get(&owner).copied().unwrap_or(0);
                            let starts_on = occurs_on.unwrap_or(as_of);
                            debug!(source_id = %id, event_type = %owner, "admitting event");
                            events.insert(
                                id.clone(),
                                EventDraft::admitted(
                                    tenant.id, kind, id, name, starts_on, owner, points,
                                ),
                            );
                            summary.events_admitted += 1;
                        } else {
                            summary.events_skipped += 1;
                        }
                    }
                    FolderItem::Other { .. } => {}
                }
            }
        }

        if summary.events_skipped > 0 {
            summary.warn(format!(
                "{} content items skipped: event quota exhausted",
                summary.events_skipped
            ));
        }

        let event_types = event_types
            .iter()
            .map(|et| {
                let mut updated = et.clone();
                if let Some(list) = folder_lists.remove(&et.id) {
                    updated.source_folders = list;
                }
                updated
            })
            .collect();

        DiscoveryOutcome {
            events,
            event_types,
        }
    }
}
