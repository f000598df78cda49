//! Provider framework type definitions
//!
//! Enums and types shared by all content provider adapters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of external content source an event can be discovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Spreadsheet source (one submitted record per row)
    Spreadsheet,
    /// Form source (one submitted record per response)
    Form,
}

impl SourceKind {
    /// Get all available source kinds.
    #[must_use]
    pub fn all() -> &'static [SourceKind] {
        &[SourceKind::Spreadsheet, SourceKind::Form]
    }

    /// Get the string representation used in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Spreadsheet => "spreadsheet",
            SourceKind::Form => "form",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ParseSourceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spreadsheet" => Ok(SourceKind::Spreadsheet),
            "form" => Ok(SourceKind::Form),
            _ => Err(ParseSourceKindError(s.to_string())),
        }
    }
}

/// Error returned when parsing an unknown source kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSourceKindError(pub String);

impl fmt::Display for ParseSourceKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown source kind: {}", self.0)
    }
}

impl std::error::Error for ParseSourceKindError {}

/// An item returned when listing the immediate children of a folder.
///
/// Discovery only distinguishes three cases: a nested folder (traversed
/// further), a recognized content item (mapped to an event), and anything
/// else (ignored).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum FolderItem {
    /// A nested folder.
    Folder {
        /// Provider identifier of the folder.
        id: String,
        /// Display name of the folder.
        name: String,
    },
    /// A recognized content item (spreadsheet, form, ...).
    Content {
        /// Provider identifier of the item; becomes the event source id.
        id: String,
        /// Display name of the item; becomes the event name.
        name: String,
        /// The source kind this item maps to.
        kind: SourceKind,
        /// Date the event occurs on, when the provider can derive one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        occurs_on: Option<chrono::NaiveDate>,
    },
    /// Anything the provider does not recognize (images, documents, ...).
    Other {
        /// Provider identifier of the item.
        id: String,
        /// Display name of the item.
        name: String,
    },
}

impl FolderItem {
    /// Get the provider identifier of this item.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            FolderItem::Folder { id, .. }
            | FolderItem::Content { id, .. }
            | FolderItem::Other { id, .. } => id,
        }
    }

    /// Check whether this item is a nested folder.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self, FolderItem::Folder { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_roundtrip() {
        for kind in SourceKind::all() {
            let parsed: SourceKind = kind.as_str().parse().unwrap();
            assert_eq!(*kind, parsed);
        }
    }

    #[test]
    fn test_source_kind_parse_is_case_insensitive() {
        assert_eq!("Form".parse::<SourceKind>().unwrap(), SourceKind::Form);
    }

    #[test]
    fn test_source_kind_parse_rejects_unknown() {
        let err = "video".parse::<SourceKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown source kind: video");
    }

    #[test]
    fn test_folder_item_tagged_serde() {
        let item = FolderItem::Content {
            id: "1AbC".to_string(),
            name: "Fall Kickoff".to_string(),
            kind: SourceKind::Form,
            occurs_on: None,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["item_type"], "content");
        assert_eq!(value["kind"], "form");
        let back: FolderItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }
}
