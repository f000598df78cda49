//! Tenant property schema types
//!
//! Types describing the member property schema a tenant configures and the
//! typed values providers classify submitted data into.

use chrono::NaiveDate;
use rollcall_core::PropertyTypeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The data type of a member property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Free-text value.
    String,
    /// Numeric value.
    Number,
    /// True/false value.
    Boolean,
    /// Calendar date value.
    Date,
}

impl PropertyKind {
    /// Get the string representation used in persisted schemas.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::String => "string",
            PropertyKind::Number => "number",
            PropertyKind::Boolean => "boolean",
            PropertyKind::Date => "date",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PropertyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(PropertyKind::String),
            "number" => Ok(PropertyKind::Number),
            "boolean" => Ok(PropertyKind::Boolean),
            "date" => Ok(PropertyKind::Date),
            _ => Err(format!("Unknown property kind: {s}")),
        }
    }
}

/// One property in a tenant's member schema.
///
/// Providers receive the full schema so they can classify submitted values;
/// the engine uses `required` for the post-merge deletion pass and
/// `member_key` to locate the domain member identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyType {
    /// Identifier of this property within the tenant.
    pub id: PropertyTypeId,
    /// Display name (e.g. "Member ID", "Email").
    pub name: String,
    /// The data type values of this property must classify into.
    pub kind: PropertyKind,
    /// Whether every synced member must carry a value for this property.
    #[serde(default)]
    pub required: bool,
    /// Whether this property is the tenant's domain member identifier.
    /// Exactly one property per tenant carries this flag.
    #[serde(default)]
    pub member_key: bool,
}

impl PropertyType {
    /// Create a new optional property.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            id: PropertyTypeId::new(),
            name: name.into(),
            kind,
            required: false,
            member_key: false,
        }
    }

    /// Mark this property as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark this property as the domain member identifier.
    #[must_use]
    pub fn member_key(mut self) -> Self {
        self.member_key = true;
        self
    }
}

/// Find the member-key property in a tenant schema, if configured.
#[must_use]
pub fn member_key_property(schema: &[PropertyType]) -> Option<&PropertyType> {
    schema.iter().find(|p| p.member_key)
}

/// A classified, typed property value returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// A boolean value.
    Boolean(bool),
    /// A numeric value.
    Number(f64),
    /// A calendar date value.
    Date(NaiveDate),
    /// A text value.
    String(String),
}

impl PropertyValue {
    /// Get as a string if this is a text value.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as a number if this is a numeric value.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as a boolean if this is a boolean value.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as a date if this is a date value.
    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            PropertyValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Check whether this value is of the given property kind.
    #[must_use]
    pub fn matches_kind(&self, kind: PropertyKind) -> bool {
        matches!(
            (self, kind),
            (PropertyValue::String(_), PropertyKind::String)
                | (PropertyValue::Number(_), PropertyKind::Number)
                | (PropertyValue::Boolean(_), PropertyKind::Boolean)
                | (PropertyValue::Date(_), PropertyKind::Date)
        )
    }

    /// Render the value as the plain text form used for member keys.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::Boolean(b) => b.to_string(),
            PropertyValue::Date(d) => d.to_string(),
        }
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Boolean(b)
    }
}

impl From<NaiveDate> for PropertyValue {
    fn from(d: NaiveDate) -> Self {
        PropertyValue::Date(d)
    }
}
