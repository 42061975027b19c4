//! Shared fixtures for unit tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::content::{ContentNode, InlineRun, NodeKind};
use crate::ids::CollectionId;
use crate::models::{CollectionSchema, Column, ColumnType, PropertyValue, RemoteRecord};
use crate::remote::{Clock, Page, RemoteApi, RemoteError, RemoteResult};

/// Clock that only moves when slept on or advanced
pub struct ManualClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

#[derive(Default)]
struct FakeState {
    schema: Option<CollectionSchema>,
    records: Vec<RemoteRecord>,
    children: HashMap<String, Vec<ContentNode>>,
    broken_nodes: HashSet<String>,
    scripted: HashMap<&'static str, VecDeque<RemoteError>>,
    calls: Vec<(&'static str, String)>,
    page_sizes: Vec<u32>,
}

/// In-memory remote with scripted failures
///
/// Clones share state, so a test can keep a handle after giving one to
/// the code under test. Operation names are `schema`, `query` and
/// `children`.
#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
}

impl FakeApi {
    /// A fake serving `tasks_schema()` and no rows
    pub fn new() -> Self {
        let api = Self::default();
        api.set_schema(tasks_schema());
        api
    }

    pub fn collection_id() -> CollectionId {
        CollectionId::parse("0123456789abcdef0123456789abcdef").unwrap()
    }

    pub fn set_schema(&self, schema: CollectionSchema) {
        self.state.lock().unwrap().schema = Some(schema);
    }

    pub fn set_records(&self, records: Vec<RemoteRecord>) {
        self.state.lock().unwrap().records = records;
    }

    pub fn set_children(&self, node_id: &str, nodes: Vec<ContentNode>) {
        self.state
            .lock()
            .unwrap()
            .children
            .insert(node_id.to_string(), nodes);
    }

    /// Every children listing of `node_id` fails with a 500
    pub fn break_node(&self, node_id: &str) {
        self.state
            .lock()
            .unwrap()
            .broken_nodes
            .insert(node_id.to_string());
    }

    /// The next call of `operation` fails with `error`
    pub fn fail_next(&self, operation: &'static str, error: RemoteError) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of calls made to `operation`, failed ones included
    pub fn calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    /// Targets of the calls made to `operation`
    pub fn call_targets(&self, operation: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(op, _)| *op == operation)
            .map(|(_, target)| target.clone())
            .collect()
    }

    pub fn page_sizes(&self) -> Vec<u32> {
        self.state.lock().unwrap().page_sizes.clone()
    }

    fn begin(&self, operation: &'static str, target: &str) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((operation, target.to_string()));
        match state.scripted.get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn page_of<T: Clone>(items: &[T], cursor: Option<&str>, page_size: u32) -> Page<T> {
    let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
    let end = (start + page_size as usize).min(items.len());
    Page {
        items: items[start.min(end)..end].to_vec(),
        next_cursor: (end < items.len()).then(|| end.to_string()),
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn retrieve_collection(&self, id: &CollectionId) -> RemoteResult<CollectionSchema> {
        self.begin("schema", id.as_str())?;
        let state = self.state.lock().unwrap();
        match &state.schema {
            Some(schema) if schema.id == *id => Ok(schema.clone()),
            _ => Err(RemoteError::status(404, "Could not find database")),
        }
    }

    async fn query_collection(
        &self,
        id: &CollectionId,
        cursor: Option<&str>,
        page_size: u32,
    ) -> RemoteResult<Page<RemoteRecord>> {
        self.begin("query", id.as_str())?;
        let mut state = self.state.lock().unwrap();
        state.page_sizes.push(page_size);
        Ok(page_of(&state.records, cursor, page_size))
    }

    async fn list_children(
        &self,
        node_id: &str,
        cursor: Option<&str>,
        page_size: u32,
    ) -> RemoteResult<Page<ContentNode>> {
        self.begin("children", node_id)?;
        let state = self.state.lock().unwrap();
        if state.broken_nodes.contains(node_id) {
            return Err(RemoteError::status(400, "Block is corrupted"));
        }
        let nodes = state.children.get(node_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(page_of(nodes, cursor, page_size))
    }
}

/// `Tasks` collection: `Name` (title), `Description` (text),
/// `Priority` (number), `Done` (checkbox)
pub fn tasks_schema() -> CollectionSchema {
    CollectionSchema {
        id: FakeApi::collection_id(),
        title: "Tasks".to_string(),
        url: Some("https://www.notion.so/0123456789abcdef0123456789abcdef".to_string()),
        columns: vec![
            column("Name", ColumnType::Title),
            column("Description", ColumnType::RichText),
            column("Priority", ColumnType::Number),
            column("Done", ColumnType::Checkbox),
        ],
    }
}

pub fn column(name: &str, kind: ColumnType) -> Column {
    Column {
        name: name.to_string(),
        kind,
    }
}

/// Row without column values
pub fn record(id: &str, title: &str, last_edited: &str) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        last_edited: last_edited.to_string(),
        url: format!("https://www.notion.so/{}", id.replace('-', "")),
        title: title.to_string(),
        properties: Vec::new(),
        decode_error: None,
    }
}

/// Row with a `Description` value
pub fn described(id: &str, title: &str, last_edited: &str, description: &str) -> RemoteRecord {
    let mut row = record(id, title, last_edited);
    row.properties.push((
        "Description".to_string(),
        PropertyValue::Text(description.to_string()),
    ));
    row
}

pub fn text(s: &str) -> Vec<InlineRun> {
    vec![InlineRun::plain(s)]
}

pub fn paragraph(id: &str, s: &str) -> ContentNode {
    ContentNode::new(id, NodeKind::Paragraph(text(s)))
}

pub fn bullet(id: &str, s: &str) -> ContentNode {
    ContentNode::new(id, NodeKind::BulletedItem(text(s)))
}

pub fn numbered(id: &str, s: &str) -> ContentNode {
    ContentNode::new(id, NodeKind::NumberedItem(text(s)))
}
