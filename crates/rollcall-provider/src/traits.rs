//! Provider framework traits
//!
//! Capability-based trait definitions for the adapters the sync engine
//! delegates to. Adapters own everything provider-specific (API clients,
//! field-type inference); the engine sees only these contracts.

use async_trait::async_trait;
use std::collections::HashMap;

use rollcall_core::PropertyTypeId;

use crate::error::ProviderResult;
use crate::record::{FieldDefinition, SubmittedRecord};
use crate::schema::PropertyType;
use crate::types::{FolderItem, SourceKind};

/// Adapter for a folder-hierarchy service.
///
/// Discovery traverses folders through this trait alone. A failed listing
/// must be reported as an error, never a panic; the engine catches it,
/// prunes the folder, and continues with the rest of the tenant.
#[async_trait]
pub trait FolderProvider: Send + Sync {
    /// List the immediate children of a folder.
    ///
    /// Returns every child classified as folder, recognized content, or
    /// other. Fails when the folder is unreachable.
    async fn list_children(&self, folder_id: &str) -> ProviderResult<Vec<FolderItem>>;
}

/// Adapter for one kind of content source (spreadsheet, form).
///
/// Implementations classify raw submitted data against the tenant's
/// property schema and return typed values; a value that cannot be coerced
/// comes back as `None` rather than failing the whole listing.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// The source kind this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Display name for this adapter instance.
    fn display_name(&self) -> &str;

    /// List the fields the source exposes, classified against `schema`.
    ///
    /// Fails when the source is unreachable or malformed.
    async fn list_fields(
        &self,
        source_id: &str,
        schema: &[PropertyType],
    ) -> ProviderResult<Vec<FieldDefinition>>;

    /// List the records submitted to the source.
    ///
    /// `mapping` gives the field-id to tenant-property assignment the engine
    /// holds for the event; values are classified against the matching
    /// entry of `schema`. Same failure modes as [`Self::list_fields`].
    async fn list_records(
        &self,
        source_id: &str,
        mapping: &HashMap<String, PropertyTypeId>,
        schema: &[PropertyType],
    ) -> ProviderResult<Vec<SubmittedRecord>>;
}

impl std::fmt::Debug for dyn ContentProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentProvider")
            .field("kind", &self.kind())
            .field("display_name", &self.display_name())
            .finish()
    }
}
