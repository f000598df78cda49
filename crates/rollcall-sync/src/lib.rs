//! # Synchronization Engine
//!
//! Reconciles a tenant's events and audience members against external
//! content sources, then recomputes derived statistics.
//!
//! ## Synchronization Flow
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌──────────────────┐
//! │   Coordinator   │────►│ Event Discovery  │────►│    Audience      │
//! │  (lock, phases) │     │ (folders, quota) │     │ Discovery/Merge  │
//! └────────┬────────┘     └──────────────────┘     └────────┬─────────┘
//!          │                                                │
//!          │              ┌──────────────────┐              │
//!          └─────────────►│    Committer     │◄─────────────┘
//!                         │ (delta, buckets, │
//!                         │  dashboard, tx)  │
//!                         └──────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`SyncCoordinator`] - lock lifecycle, phase sequencing, failure
//!   containment, unlock retry
//! - [`EventDiscovery`] - folder traversal with event-type ownership
//!   tie-break and quota-gated admission
//! - [`AudienceDiscovery`] - per-event provider fan-out and member merging
//! - [`QuotaLimiter`] - tenant counters with speculative accounting and a
//!   reference-counted ignore context
//! - [`committer`] - delta derivation, bucket repagination, dashboard
//!   recomputation, atomic multi-collection commit
//! - [`ReportPublisher`] - contract for the external report service
//!
//! ## Concurrency model
//!
//! Engine logic is cooperative: suspension happens only at calls to
//! external collaborators (providers, the data store). "Concurrent"
//! audience discovery means multiple outstanding provider calls; each
//! unit's merge step runs under the member-map mutex with no awaits
//! inside, so read-merge-write is atomic per unit. The tenant-row
//! compare-and-set is the sole cross-process gate, and the commit
//! transaction is the only multi-document-atomic step.
//!
//! ## Example
//!
//! ```ignore
//! use rollcall_sync::{SyncCoordinator, SyncConfig, SyncOptions};
//!
//! let coordinator = SyncCoordinator::new(
//!     pool,
//!     folder_provider,
//!     providers,
//!     publisher,
//!     SyncConfig::default(),
//! );
//!
//! let summary = coordinator.sync(tenant_id, SyncOptions::default()).await?;
//! println!("admitted {} events", summary.events_admitted);
//! ```

pub mod audience;
pub mod committer;
pub mod config;
pub mod coordinator;
pub mod discovery;
pub mod error;
pub mod quota;
pub mod report;
pub mod state;

// Re-exports for convenience
pub use audience::AudienceDiscovery;
pub use committer::CommitDelta;
pub use config::SyncConfig;
pub use coordinator::{SyncCoordinator, SyncOptions};
pub use discovery::{DiscoveryOutcome, EventDiscovery};
pub use error::{SyncError, SyncResult};
pub use quota::{ExemptionRegistry, QuotaDelta, QuotaExemption, QuotaLimiter, SpeculativeQuota};
pub use report::{NoopReportPublisher, ReportPublisher, ReportRef};
pub use state::{EventDraft, MemberDraft, SyncSummary};
