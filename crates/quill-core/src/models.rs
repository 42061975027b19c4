//! Data models for Quill
//!
//! Remote-side structures (collections, their schema, and rows) as they
//! arrive from the remote API, plus the typed column values that get
//! written into record headers.

use serde::{Deserialize, Serialize};

use crate::ids::CollectionId;

/// Column types the mirror understands
///
/// Derived or interactive column types (formula, rollup, button, unique id,
/// verification, ...) have no variant and are dropped at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Title,
    RichText,
    Number,
    Select,
    Status,
    MultiSelect,
    Date,
    Checkbox,
    Url,
    Email,
    PhoneNumber,
    Relation,
    People,
    Files,
    CreatedTime,
    LastEditedTime,
}

impl ColumnType {
    /// Map a remote type tag to a supported column type
    pub fn from_tag(tag: &str) -> Option<Self> {
        let kind = match tag {
            "title" => Self::Title,
            "rich_text" => Self::RichText,
            "number" => Self::Number,
            "select" => Self::Select,
            "status" => Self::Status,
            "multi_select" => Self::MultiSelect,
            "date" => Self::Date,
            "checkbox" => Self::Checkbox,
            "url" => Self::Url,
            "email" => Self::Email,
            "phone_number" => Self::PhoneNumber,
            "relation" => Self::Relation,
            "people" => Self::People,
            "files" => Self::Files,
            "created_time" => Self::CreatedTime,
            "last_edited_time" => Self::LastEditedTime,
            _ => return None,
        };
        Some(kind)
    }
}

/// One column of a collection schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Display name, used as the header key
    pub name: String,
    pub kind: ColumnType,
}

/// A collection and its column schema, in remote display order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub id: CollectionId,
    pub title: String,
    pub url: Option<String>,
    pub columns: Vec<Column>,
}

impl CollectionSchema {
    /// The designated title column, if the schema has one
    pub fn title_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.kind == ColumnType::Title)
    }

    /// Columns that map to header entries, in schema order
    pub fn header_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.kind != ColumnType::Title)
    }
}

/// A date, or a date range rendered as `start → end`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateValue {
    pub start: String,
    pub end: Option<String>,
}

impl std::fmt::Display for DateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.end {
            Some(end) => write!(f, "{} → {}", self.start, end),
            None => f.write_str(&self.start),
        }
    }
}

/// A typed column value of one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Title or rich text, flattened to plain text
    Text(String),
    Number(Option<f64>),
    /// Single choice or status
    Choice(Option<String>),
    MultiChoice(Vec<String>),
    Date(Option<DateValue>),
    Checkbox(bool),
    /// URL, email or phone number
    Link(Option<String>),
    References(Vec<String>),
    People(Vec<String>),
    Files(Vec<String>),
    Timestamp(String),
}

impl PropertyValue {
    /// Encode as a header value
    pub fn to_yaml(&self) -> serde_yaml::Value {
        use serde_yaml::Value;

        fn string_list(items: &[String]) -> Value {
            Value::Sequence(items.iter().cloned().map(Value::String).collect())
        }

        match self {
            PropertyValue::Text(s) | PropertyValue::Timestamp(s) => Value::String(s.clone()),
            PropertyValue::Number(Some(n)) => number(*n),
            PropertyValue::Choice(Some(s)) | PropertyValue::Link(Some(s)) => {
                Value::String(s.clone())
            }
            PropertyValue::Number(None)
            | PropertyValue::Choice(None)
            | PropertyValue::Link(None)
            | PropertyValue::Date(None) => Value::Null,
            PropertyValue::Date(Some(date)) => Value::String(date.to_string()),
            PropertyValue::Checkbox(b) => Value::Bool(*b),
            PropertyValue::MultiChoice(items)
            | PropertyValue::References(items)
            | PropertyValue::People(items)
            | PropertyValue::Files(items) => string_list(items),
        }
    }
}

/// Integral floats are written without a fractional part
fn number(n: f64) -> serde_yaml::Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        serde_yaml::Value::Number((n as i64).into())
    } else {
        serde_yaml::Value::Number(n.into())
    }
}

/// One row of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Stable remote id
    pub id: String,
    /// Remote last-modified timestamp, compared verbatim when diffing
    pub last_edited: String,
    pub url: String,
    /// Plain text of the title column
    pub title: String,
    /// Mapped columns in schema order, title column excluded
    pub properties: Vec<(String, PropertyValue)>,
    /// Set when the row arrived but its fields could not be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<String>,
}

impl RemoteRecord {
    /// Look up a column value by display name
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}
