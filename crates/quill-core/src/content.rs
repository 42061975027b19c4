//! Content tree model
//!
//! A record body is a sequence of typed nodes. Nodes never own their
//! children: a node only says whether it has any, and the children are
//! fetched by id when the converter needs them.

use serde::{Deserialize, Serialize};

use crate::models::DateValue;

/// Formatting flags of an inline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    /// Remote color name, e.g. `default`, `red`, `yellow_background`
    pub color: Option<String>,
}

impl Annotations {
    /// Background colors render as a highlight
    pub fn is_highlighted(&self) -> bool {
        self.color
            .as_deref()
            .is_some_and(|c| c.ends_with("_background"))
    }
}

/// Target of an inline mention
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mention {
    Record(String),
    Collection(String),
    Date(DateValue),
    Person(String),
    Link(String),
}

/// What an inline run represents beyond its text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InlineKind {
    #[default]
    Text,
    Equation(String),
    Mention(Mention),
}

/// A span of text with formatting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineRun {
    pub text: String,
    pub annotations: Annotations,
    pub href: Option<String>,
    pub kind: InlineKind,
}

impl InlineRun {
    /// Unformatted text run
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Concatenated visible text of a run sequence, without markup
pub fn plain_text(runs: &[InlineRun]) -> String {
    runs.iter().map(|r| r.text.as_str()).collect()
}

/// Media node flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    File,
    Pdf,
    Bookmark,
    Embed,
}

/// A media reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub kind: MediaKind,
    pub external_url: Option<String>,
    pub file_url: Option<String>,
    pub caption: Vec<InlineRun>,
}

impl Media {
    /// First available of the external URL and the hosted file URL
    pub fn url(&self) -> Option<&str> {
        fn present(url: &Option<String>) -> Option<&str> {
            url.as_deref().filter(|u| !u.is_empty())
        }
        present(&self.external_url).or_else(|| present(&self.file_url))
    }
}

/// Target of a link-to-page node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageRef {
    Record(String),
    Collection(String),
}

impl PageRef {
    pub fn id(&self) -> &str {
        match self {
            PageRef::Record(id) | PageRef::Collection(id) => id,
        }
    }
}

/// Type-specific payload of a content node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Paragraph(Vec<InlineRun>),
    Heading {
        level: u8,
        text: Vec<InlineRun>,
        collapsible: bool,
    },
    BulletedItem(Vec<InlineRun>),
    NumberedItem(Vec<InlineRun>),
    Checklist {
        text: Vec<InlineRun>,
        checked: bool,
    },
    Toggle(Vec<InlineRun>),
    Quote(Vec<InlineRun>),
    Callout {
        text: Vec<InlineRun>,
        icon: Option<String>,
    },
    Code {
        text: Vec<InlineRun>,
        language: Option<String>,
    },
    Equation(String),
    Divider,
    Table,
    TableRow(Vec<Vec<InlineRun>>),
    ColumnList,
    Column,
    Media(Media),
    LinkToPage(PageRef),
    ChildRecord { title: String },
    ChildCollection { title: String },
    /// Container that renders nothing itself; its children pass through
    Synced,
    /// Known node types with no textual rendering
    Structural(String),
    /// A type tag this converter does not know
    Unsupported(String),
}

impl NodeKind {
    pub fn is_numbered_item(&self) -> bool {
        matches!(self, NodeKind::NumberedItem(_))
    }

    pub fn is_list_item(&self) -> bool {
        matches!(
            self,
            NodeKind::BulletedItem(_) | NodeKind::NumberedItem(_) | NodeKind::Checklist { .. }
        )
    }
}

/// One structural unit of a record body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: String,
    pub has_children: bool,
    pub kind: NodeKind,
}

impl ContentNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            has_children: false,
            kind,
        }
    }

    /// Mark this node as having children to fetch
    pub fn with_children(mut self) -> Self {
        self.has_children = true;
        self
    }
}
