//! Wire format decoding
//!
//! Turns the remote JSON (pages, blocks, rich text, database schemas)
//! into the crate's domain types. Shapes follow the Notion REST API:
//! every typed object carries a `type` tag and a payload under a key of
//! the same name.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::api::Page;
use super::error::{RemoteError, RemoteResult};
use crate::content::{
    Annotations, ContentNode, InlineKind, InlineRun, Media, MediaKind, Mention, NodeKind, PageRef,
};
use crate::ids::CollectionId;
use crate::models::{CollectionSchema, Column, ColumnType, DateValue, PropertyValue, RemoteRecord};

// ==================== Rich text ====================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireAnnotations {
    bold: bool,
    italic: bool,
    strikethrough: bool,
    underline: bool,
    code: bool,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireRichText {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    plain_text: String,
    #[serde(default)]
    href: Option<String>,
    #[serde(default)]
    annotations: WireAnnotations,
    #[serde(default)]
    mention: Option<Value>,
    #[serde(default)]
    equation: Option<WireEquation>,
}

#[derive(Debug, Default, Deserialize)]
struct WireEquation {
    #[serde(default)]
    expression: String,
}

#[derive(Debug, Deserialize)]
struct WireDate {
    start: String,
    #[serde(default)]
    end: Option<String>,
}

impl From<WireDate> for DateValue {
    fn from(d: WireDate) -> Self {
        DateValue {
            start: d.start,
            end: d.end,
        }
    }
}

fn decode_runs(runs: Vec<WireRichText>) -> Vec<InlineRun> {
    runs.into_iter().map(decode_run).collect()
}

fn decode_run(run: WireRichText) -> InlineRun {
    let kind = match run.kind.as_str() {
        "equation" => InlineKind::Equation(run.equation.unwrap_or_default().expression),
        "mention" => run
            .mention
            .and_then(decode_mention)
            .map(InlineKind::Mention)
            .unwrap_or_default(),
        _ => InlineKind::Text,
    };

    let color = run.annotations.color.filter(|c| c != "default");
    InlineRun {
        text: run.plain_text,
        annotations: Annotations {
            bold: run.annotations.bold,
            italic: run.annotations.italic,
            strikethrough: run.annotations.strikethrough,
            underline: run.annotations.underline,
            code: run.annotations.code,
            color,
        },
        href: run.href,
        kind,
    }
}

fn decode_mention(mut mention: Value) -> Option<Mention> {
    let kind = mention.get("type")?.as_str()?.to_string();
    let payload = mention.get_mut(&kind)?.take();
    let str_field = |key: &str| payload.get(key).and_then(Value::as_str).map(str::to_string);

    match kind.as_str() {
        "page" => str_field("id").map(Mention::Record),
        "database" => str_field("id").map(Mention::Collection),
        "date" => serde_json::from_value::<WireDate>(payload.clone())
            .ok()
            .map(|d| Mention::Date(d.into())),
        "user" => str_field("name")
            .or_else(|| str_field("id"))
            .map(Mention::Person),
        "link_preview" => str_field("url").map(Mention::Link),
        "link_mention" => str_field("href").map(Mention::Link),
        _ => None,
    }
}

// ==================== Blocks ====================

#[derive(Debug, Deserialize)]
struct WireBlock {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    has_children: bool,
    #[serde(flatten)]
    payloads: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TextPayload {
    rich_text: Vec<WireRichText>,
    checked: bool,
    is_toggleable: bool,
    language: Option<String>,
    icon: Option<WireIcon>,
}

#[derive(Debug, Deserialize)]
struct WireIcon {
    #[serde(default)]
    emoji: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UrlObject {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MediaPayload {
    external: Option<UrlObject>,
    file: Option<UrlObject>,
    url: Option<String>,
    caption: Vec<WireRichText>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableRowPayload {
    cells: Vec<Vec<WireRichText>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LinkToPagePayload {
    page_id: Option<String>,
    database_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TitlePayload {
    title: String,
}

fn payload<T: for<'de> Deserialize<'de> + Default>(value: Value) -> RemoteResult<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value)?)
}

/// Decode one block object
///
/// A block whose payload does not decode becomes `Unsupported` so the
/// rest of the listing survives. A block without an id or type is
/// dropped.
fn decode_node(value: Value) -> RemoteResult<Option<ContentNode>> {
    let mut block: WireBlock = match serde_json::from_value(value) {
        Ok(block) => block,
        Err(e) => {
            warn!("Skipping unreadable block: {}", e);
            return Ok(None);
        }
    };
    let body = block.payloads.remove(&block.kind).unwrap_or(Value::Null);

    let kind = decode_kind(&block.kind, body).unwrap_or_else(|e| {
        warn!("Block {} ({}) could not be decoded: {}", block.id, block.kind, e);
        NodeKind::Unsupported(block.kind.clone())
    });

    Ok(Some(ContentNode {
        id: block.id,
        has_children: block.has_children,
        kind,
    }))
}

/// Decode the payload of a block with type tag `tag`
fn decode_kind(tag: &str, body: Value) -> RemoteResult<NodeKind> {
    let text = |body: Value| -> RemoteResult<TextPayload> { payload(body) };
    let media = |kind: MediaKind, body: Value| -> RemoteResult<NodeKind> {
        let p: MediaPayload = payload(body)?;
        Ok(NodeKind::Media(Media {
            kind,
            external_url: p.external.map(|u| u.url).or(p.url),
            file_url: p.file.map(|u| u.url),
            caption: decode_runs(p.caption),
        }))
    };

    let kind = match tag {
        "paragraph" => NodeKind::Paragraph(decode_runs(text(body)?.rich_text)),
        "heading_1" | "heading_2" | "heading_3" => {
            let p = text(body)?;
            NodeKind::Heading {
                level: tag.as_bytes()[8] - b'0',
                text: decode_runs(p.rich_text),
                collapsible: p.is_toggleable,
            }
        }
        "bulleted_list_item" => NodeKind::BulletedItem(decode_runs(text(body)?.rich_text)),
        "numbered_list_item" => NodeKind::NumberedItem(decode_runs(text(body)?.rich_text)),
        "to_do" => {
            let p = text(body)?;
            NodeKind::Checklist {
                text: decode_runs(p.rich_text),
                checked: p.checked,
            }
        }
        "toggle" => NodeKind::Toggle(decode_runs(text(body)?.rich_text)),
        "quote" => NodeKind::Quote(decode_runs(text(body)?.rich_text)),
        "callout" => {
            let p = text(body)?;
            NodeKind::Callout {
                text: decode_runs(p.rich_text),
                icon: p.icon.and_then(|i| i.emoji),
            }
        }
        "code" => {
            let p = text(body)?;
            NodeKind::Code {
                text: decode_runs(p.rich_text),
                language: p.language,
            }
        }
        "equation" => {
            let p: WireEquation = payload(body)?;
            NodeKind::Equation(p.expression)
        }
        "divider" => NodeKind::Divider,
        "table" => NodeKind::Table,
        "table_row" => {
            let p: TableRowPayload = payload(body)?;
            NodeKind::TableRow(p.cells.into_iter().map(decode_runs).collect())
        }
        "column_list" => NodeKind::ColumnList,
        "column" => NodeKind::Column,
        "image" => media(MediaKind::Image, body)?,
        "video" => media(MediaKind::Video, body)?,
        "audio" => media(MediaKind::Audio, body)?,
        "file" => media(MediaKind::File, body)?,
        "pdf" => media(MediaKind::Pdf, body)?,
        "bookmark" | "link_preview" => media(MediaKind::Bookmark, body)?,
        "embed" => media(MediaKind::Embed, body)?,
        "link_to_page" => {
            let p: LinkToPagePayload = payload(body)?;
            match (p.page_id, p.database_id) {
                (Some(id), _) => NodeKind::LinkToPage(PageRef::Record(id)),
                (None, Some(id)) => NodeKind::LinkToPage(PageRef::Collection(id)),
                // Comment and block targets have no local counterpart
                (None, None) => NodeKind::Unsupported(tag.to_string()),
            }
        }
        "child_page" => NodeKind::ChildRecord {
            title: payload::<TitlePayload>(body)?.title,
        },
        "child_database" => NodeKind::ChildCollection {
            title: payload::<TitlePayload>(body)?.title,
        },
        "synced_block" | "template" => NodeKind::Synced,
        "table_of_contents" | "breadcrumb" => NodeKind::Structural(tag.to_string()),
        other => NodeKind::Unsupported(other.to_string()),
    };

    Ok(kind)
}

// ==================== Pagination ====================

#[derive(Debug, Deserialize)]
struct WireList {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

fn decode_list<T>(
    value: Value,
    mut decode: impl FnMut(Value) -> RemoteResult<Option<T>>,
) -> RemoteResult<Page<T>> {
    let list: WireList = serde_json::from_value(value)?;
    let mut items = Vec::with_capacity(list.results.len());
    for result in list.results {
        if let Some(item) = decode(result)? {
            items.push(item);
        }
    }

    Ok(Page {
        items,
        next_cursor: list.next_cursor.filter(|_| list.has_more),
    })
}

/// Decode a block-children listing
pub(crate) fn decode_children_page(value: Value) -> RemoteResult<Page<ContentNode>> {
    decode_list(value, decode_node)
}

/// Decode a collection query response
pub(crate) fn decode_records_page(value: Value) -> RemoteResult<Page<RemoteRecord>> {
    decode_list(value, decode_record)
}

// ==================== Records ====================

#[derive(Debug, Deserialize)]
struct WirePage {
    id: String,
    #[serde(default)]
    url: String,
    last_edited_time: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct NameObject {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireFile {
    #[serde(default)]
    external: Option<UrlObject>,
    #[serde(default)]
    file: Option<UrlObject>,
}

/// Decode one row; archived rows are skipped
///
/// A row that carries an id but does not otherwise decode is returned
/// with `decode_error` set, so the run can report it and still knows the
/// row exists. A row without an id is dropped.
fn decode_record(value: Value) -> RemoteResult<Option<RemoteRecord>> {
    let flag = |key: &str| value.get(key).and_then(Value::as_bool).unwrap_or(false);
    if flag("archived") || flag("in_trash") {
        return Ok(None);
    }
    let Some(id) = value.get("id").and_then(Value::as_str).map(str::to_string) else {
        warn!("Skipping row without an id");
        return Ok(None);
    };
    let last_edited = value
        .get("last_edited_time")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match decode_page(value) {
        Ok(record) => Ok(Some(record)),
        Err(e) => {
            warn!("Row {} could not be decoded: {}", id, e);
            Ok(Some(RemoteRecord {
                id,
                last_edited,
                url: String::new(),
                title: String::new(),
                properties: Vec::new(),
                decode_error: Some(e.to_string()),
            }))
        }
    }
}

fn decode_page(value: Value) -> RemoteResult<RemoteRecord> {
    let page: WirePage = serde_json::from_value(value)?;

    let mut title = String::new();
    let mut properties = Vec::new();
    for (name, value) in page.properties {
        let decoded = decode_property(value).map_err(|e| match e {
            RemoteError::Decode(msg) => RemoteError::Decode(format!("column '{}': {}", name, msg)),
            other => other,
        })?;
        match decoded {
            Some((ColumnType::Title, PropertyValue::Text(text))) => title = text,
            Some((_, property)) => properties.push((name, property)),
            None => {}
        }
    }

    Ok(RemoteRecord {
        id: page.id,
        last_edited: page.last_edited_time,
        url: page.url,
        title,
        properties,
        decode_error: None,
    })
}

/// Decode a typed column value; unsupported column types yield `None`
fn decode_property(mut value: Value) -> RemoteResult<Option<(ColumnType, PropertyValue)>> {
    let Some(tag) = value.get("type").and_then(Value::as_str).map(str::to_string) else {
        return Err(RemoteError::Decode("property without a type".to_string()));
    };
    let Some(kind) = ColumnType::from_tag(&tag) else {
        return Ok(None);
    };
    let body = value.get_mut(&tag).map(Value::take).unwrap_or(Value::Null);

    fn optional<T: for<'de> Deserialize<'de>>(body: Value) -> RemoteResult<Option<T>> {
        Ok(serde_json::from_value(body)?)
    }
    fn list<T: for<'de> Deserialize<'de>>(body: Value) -> RemoteResult<Vec<T>> {
        Ok(optional::<Vec<T>>(body)?.unwrap_or_default())
    }
    fn text(body: Value) -> RemoteResult<String> {
        let runs = decode_runs(list(body)?);
        Ok(crate::content::plain_text(&runs))
    }

    let property = match kind {
        ColumnType::Title | ColumnType::RichText => PropertyValue::Text(text(body)?),
        ColumnType::Number => PropertyValue::Number(optional(body)?),
        ColumnType::Select | ColumnType::Status => {
            PropertyValue::Choice(optional::<NameObject>(body)?.and_then(|n| n.name))
        }
        ColumnType::MultiSelect => PropertyValue::MultiChoice(
            list::<NameObject>(body)?
                .into_iter()
                .filter_map(|n| n.name)
                .collect(),
        ),
        ColumnType::Date => PropertyValue::Date(optional::<WireDate>(body)?.map(Into::into)),
        ColumnType::Checkbox => PropertyValue::Checkbox(optional(body)?.unwrap_or(false)),
        ColumnType::Url | ColumnType::Email | ColumnType::PhoneNumber => {
            PropertyValue::Link(optional(body)?)
        }
        ColumnType::Relation => PropertyValue::References(
            list::<IdObject>(body)?.into_iter().map(|r| r.id).collect(),
        ),
        ColumnType::People => PropertyValue::People(
            list::<NameObject>(body)?
                .into_iter()
                .filter_map(|p| p.name.or(p.id))
                .collect(),
        ),
        ColumnType::Files => PropertyValue::Files(
            list::<WireFile>(body)?
                .into_iter()
                .filter_map(|f| f.external.or(f.file).map(|u| u.url))
                .collect(),
        ),
        ColumnType::CreatedTime | ColumnType::LastEditedTime => {
            PropertyValue::Timestamp(optional(body)?.unwrap_or_default())
        }
    };

    Ok(Some((kind, property)))
}

// ==================== Schema ====================

#[derive(Debug, Deserialize)]
struct WireDatabase {
    id: String,
    #[serde(default)]
    title: Vec<WireRichText>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct WireColumn {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    kind: String,
}

/// Decode a collection object into its schema
pub(crate) fn decode_schema(value: Value) -> RemoteResult<CollectionSchema> {
    let database: WireDatabase = serde_json::from_value(value)?;
    let id = CollectionId::parse(&database.id)
        .map_err(|e| RemoteError::Decode(format!("collection id: {e}")))?;

    let mut columns = Vec::new();
    for (key, value) in database.properties {
        let column: WireColumn = serde_json::from_value(value)?;
        if let Some(kind) = ColumnType::from_tag(&column.kind) {
            columns.push(Column {
                name: column.name.unwrap_or(key),
                kind,
            });
        }
    }

    Ok(CollectionSchema {
        id,
        title: crate::content::plain_text(&decode_runs(database.title)),
        url: database.url,
        columns,
    })
}
