//! Field definitions and submitted records
//!
//! The shapes a content provider returns: the fields a source exposes
//! (already classified against the tenant schema) and the records submitted
//! to it (typed values keyed by tenant property).

use chrono::{DateTime, Utc};
use rollcall_core::PropertyTypeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::schema::PropertyValue;

/// A field exposed by a content source, classified against the tenant's
/// property schema.
///
/// `property` is `None` when the provider could not match the field to any
/// tenant property; such fields are carried so the engine can report them,
/// but contribute no member data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Provider-specific field identifier (column id, question id, ...).
    pub field_id: String,
    /// Human-readable field label.
    pub label: String,
    /// The tenant property this field classified into, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<PropertyTypeId>,
}

impl FieldDefinition {
    /// Create a classified field definition.
    #[must_use]
    pub fn mapped(
        field_id: impl Into<String>,
        label: impl Into<String>,
        property: PropertyTypeId,
    ) -> Self {
        Self {
            field_id: field_id.into(),
            label: label.into(),
            property: Some(property),
        }
    }

    /// Create a field definition that matched no tenant property.
    #[must_use]
    pub fn unmapped(field_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            label: label.into(),
            property: None,
        }
    }
}

/// One record submitted to a content source (a spreadsheet row, a form
/// response), with values classified per tenant property.
///
/// A value of `None` means the submitted data could not be coerced to the
/// property's kind; providers return `None` rather than failing the whole
/// listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SubmittedRecord {
    /// Classified values keyed by tenant property.
    pub values: HashMap<PropertyTypeId, Option<PropertyValue>>,
    /// When the record was submitted, if the source tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl SubmittedRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a classified value.
    #[must_use]
    pub fn with_value(mut self, property: PropertyTypeId, value: PropertyValue) -> Self {
        self.values.insert(property, Some(value));
        self
    }

    /// Add an unmappable value slot.
    #[must_use]
    pub fn with_unmappable(mut self, property: PropertyTypeId) -> Self {
        self.values.insert(property, None);
        self
    }

    /// Get the mapped value for a property, flattening the unmappable case.
    #[must_use]
    pub fn value(&self, property: PropertyTypeId) -> Option<&PropertyValue> {
        self.values.get(&property).and_then(|v| v.as_ref())
    }
}
