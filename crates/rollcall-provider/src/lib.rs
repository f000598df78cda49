//! # Provider Framework
//!
//! Adapter contracts between the rollcall sync engine and external content
//! services (folder hierarchies, spreadsheets, forms).
//!
//! The engine never talks to an external API directly. It traverses folders
//! through [`FolderProvider`], reads event audiences through
//! [`ContentProvider`], and resolves adapters per source kind through
//! [`ProviderRegistry`]. Adapters are responsible for classification: every
//! submitted value comes back typed against the tenant's
//! [`PropertyType`] schema, with `None` standing in for values that do not
//! coerce.
//!
//! ## Key Components
//!
//! - [`FolderProvider`] - list the children of a folder
//! - [`ContentProvider`] - list fields and submitted records of a source
//! - [`ProviderRegistry`] - source kind to adapter resolution
//! - [`PropertyType`] / [`PropertyValue`] - the tenant schema contract
//! - [`ProviderError`] - failures with transient/permanent classification

pub mod error;
pub mod record;
pub mod registry;
pub mod schema;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use rollcall_core::PropertyTypeId;

pub use error::{ProviderError, ProviderResult};
pub use record::{FieldDefinition, SubmittedRecord};
pub use registry::ProviderRegistry;
pub use schema::{member_key_property, PropertyKind, PropertyType, PropertyValue};
pub use traits::{ContentProvider, FolderProvider};
pub use types::{FolderItem, ParseSourceKindError, SourceKind};
