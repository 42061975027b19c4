//! Sync orchestrator
//!
//! Two workflows over one collection:
//!
//! - **import**: first-time mirror into a new folder; every row is written
//! - **refresh**: rewrite only rows whose last-edited time moved, then flag
//!   local records whose row disappeared as `deleted: true`
//!
//! Rows are processed one at a time, in query order. A failing row is
//! recorded in the `SyncResult` and the run moves on; only setup failures
//! abort a run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::SyncError;
use super::report::{ProgressSink, SyncProgress, SyncResult};
use super::view::{view_path, ViewDescriptor};
use super::writer::{sanitize_file_name, RecordWriter, WriteOutcome};
use crate::ids::CollectionId;
use crate::models::{CollectionSchema, RemoteRecord};
use crate::remote::{Fetcher, RemoteApi};
use crate::store::{keys, FrontMatterDoc, LocalRecord, RecordStore, StoreError};

/// Mirrors remote collections into a record store
pub struct SyncEngine<A, S> {
    fetcher: Fetcher<A>,
    store: S,
    /// Store-relative folder holding one subfolder per collection
    sync_folder: PathBuf,
}

impl<A: RemoteApi, S: RecordStore> SyncEngine<A, S> {
    pub fn new(fetcher: Fetcher<A>, store: S, sync_folder: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            store,
            sync_folder: sync_folder.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &Fetcher<A> {
        &self.fetcher
    }

    /// Default folder for a collection
    pub fn collection_folder(&self, schema: &CollectionSchema) -> PathBuf {
        self.sync_folder.join(sanitize_file_name(&schema.title))
    }

    /// First-time mirror of a collection
    ///
    /// Fails with `AlreadySynced` if any local record already carries the
    /// collection's id.
    pub async fn import(
        &self,
        id: &CollectionId,
        progress: ProgressSink,
    ) -> Result<SyncResult, SyncError> {
        info!("Importing collection {}", id);

        if let Some(existing) = self.store.records_in_collection(id)?.first() {
            return Err(SyncError::AlreadySynced {
                collection_id: id.to_string(),
                folder: parent_folder(&existing.path),
            });
        }

        let schema = self.load_schema(id).await?;
        let folder = self.free_folder(&schema)?;
        self.store.create_folder(&folder)?;
        self.write_view(&schema, &folder)?;

        progress.emit(SyncProgress::Querying);
        let rows = self.query(id).await?;

        let writer = RecordWriter::new(&self.fetcher, &self.store, &schema, &folder);
        let mut result = SyncResult::default();
        let total = rows.len();

        for (index, row) in rows.iter().enumerate() {
            progress.emit(SyncProgress::Importing {
                current: index + 1,
                total,
            });
            Self::apply(&writer, row, None, &mut result).await;
        }

        progress.emit(SyncProgress::Done);
        info!("Import of {} finished: {}", id, result);
        Ok(result)
    }

    /// Bring an already mirrored collection up to date
    pub async fn refresh(
        &self,
        id: &CollectionId,
        progress: ProgressSink,
    ) -> Result<SyncResult, SyncError> {
        info!("Refreshing collection {}", id);

        let schema = self.load_schema(id).await?;

        progress.emit(SyncProgress::Querying);
        let rows = self.query(id).await?;

        progress.emit(SyncProgress::Diffing);
        let locals = self.store.records_in_collection(id)?;
        let by_id = index_by_remote_id(&locals);
        let stale = stale_rows(&rows, &by_id);

        let mut result = SyncResult {
            skipped: rows.len() - stale.len(),
            ..SyncResult::default()
        };
        progress.emit(SyncProgress::Detected {
            stale: stale.len(),
            total: rows.len(),
        });
        debug!(
            "{} of {} rows stale, {} local records",
            stale.len(),
            rows.len(),
            locals.len()
        );

        let folder = match home_folder(&locals) {
            Some(folder) => folder,
            None => self.free_folder(&schema)?,
        };
        self.store.create_folder(&folder)?;
        self.write_view(&schema, &folder)?;

        let writer = RecordWriter::new(&self.fetcher, &self.store, &schema, &folder);
        let total = stale.len();
        for (index, (row, local)) in stale.iter().enumerate() {
            progress.emit(SyncProgress::Importing {
                current: index + 1,
                total,
            });
            Self::apply(&writer, row, *local, &mut result).await;
        }

        // Removal pass, strictly after all writes
        let present: HashSet<&str> = rows.iter().map(|row| row.id.as_str()).collect();
        for local in locals
            .iter()
            .filter(|local| !local.deleted && !present.contains(local.remote_id.as_str()))
        {
            match self.mark_removed(local) {
                Ok(()) => {
                    info!("Marked {:?} as deleted", local.path);
                    result.removed += 1;
                }
                Err(e) => {
                    warn!("Could not flag {:?} as deleted: {}", local.path, e);
                    result.record_failure(&local.remote_id, e);
                }
            }
        }

        progress.emit(SyncProgress::Done);
        info!("Refresh of {} finished: {}", id, result);
        Ok(result)
    }

    /// Write one row and fold the outcome into `result`
    async fn apply(
        writer: &RecordWriter<'_, A, S>,
        row: &RemoteRecord,
        local: Option<&LocalRecord>,
        result: &mut SyncResult,
    ) {
        if let Some(error) = &row.decode_error {
            warn!("Skipping row {}: {}", row.id, error);
            result.record_failure(&row.id, error);
            return;
        }
        match writer.write_one(row, local, false).await {
            Ok(WriteOutcome::Created) => result.created += 1,
            Ok(WriteOutcome::Updated) => result.updated += 1,
            Ok(WriteOutcome::Unchanged) => result.skipped += 1,
            Err(e) => {
                warn!("Failed to write row {}: {}", row.id, e);
                result.record_failure(&row.id, e);
            }
        }
    }

    /// Default folder, or a suffixed one when another collection's view
    /// descriptor already occupies it
    ///
    /// Tries `<title>`, then `<title> (<short id>)`, then the full id.
    fn free_folder(&self, schema: &CollectionSchema) -> Result<PathBuf, SyncError> {
        let base = self.collection_folder(schema);
        let stem = sanitize_file_name(&schema.title);
        let compact: String = schema.id.as_str().chars().filter(|c| *c != '-').collect();
        let short: String = compact.chars().take(8).collect();

        let candidates = [
            base,
            self.sync_folder.join(format!("{stem} ({short})")),
            self.sync_folder.join(format!("{stem} ({compact})")),
        ];
        for folder in &candidates {
            if !self.claimed_by_other(schema, folder)? {
                return Ok(folder.clone());
            }
            debug!("{:?} belongs to another collection", folder);
        }
        Ok(candidates[2].clone())
    }

    /// Whether `folder` holds a view descriptor for a different collection
    fn claimed_by_other(
        &self,
        schema: &CollectionSchema,
        folder: &Path,
    ) -> Result<bool, SyncError> {
        let path = view_path(schema, folder);
        if !self.store.exists(&path) {
            return Ok(false);
        }
        let text = self.store.read(&path)?;
        Ok(match serde_yaml::from_str::<ViewDescriptor>(&text) {
            Ok(view) => !view.selects(&schema.id),
            // Unreadable descriptors are left alone
            Err(_) => true,
        })
    }

    async fn load_schema(&self, id: &CollectionId) -> Result<CollectionSchema, SyncError> {
        let schema = self
            .fetcher
            .collection(id)
            .await
            .map_err(|e| SyncError::from_remote(id, e))?;

        if schema.columns.is_empty() {
            return Err(SyncError::NoSchema {
                id: id.to_string(),
                reason: "it has no columns".to_string(),
            });
        }
        if schema.title_column().is_none() {
            return Err(SyncError::NoSchema {
                id: id.to_string(),
                reason: "it has no title column".to_string(),
            });
        }
        Ok(schema)
    }

    async fn query(&self, id: &CollectionId) -> Result<Vec<RemoteRecord>, SyncError> {
        self.fetcher
            .records(id)
            .await
            .map_err(|e| SyncError::from_remote(id, e))
    }

    fn write_view(&self, schema: &CollectionSchema, folder: &Path) -> Result<(), SyncError> {
        let path = view_path(schema, folder);
        let yaml = ViewDescriptor::for_collection(schema, folder)
            .to_yaml()
            .map_err(|e| StoreError::invalid_header(path.clone(), e))?;
        self.store.write(&path, &yaml)?;
        debug!("Wrote view descriptor {:?}", path);
        Ok(())
    }

    /// Add `deleted: true` to a record's header, leaving the rest as is
    fn mark_removed(&self, local: &LocalRecord) -> Result<(), StoreError> {
        let text = self.store.read(&local.path)?;
        let mut doc = FrontMatterDoc::parse(&text)
            .map_err(|e| StoreError::invalid_header(local.path.clone(), e))?;
        doc.set(keys::DELETED, true);
        let contents = doc
            .render()
            .map_err(|e| StoreError::invalid_header(local.path.clone(), e))?;
        self.store.write(&local.path, &contents)
    }
}

fn parent_folder(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Folder holding most of a collection's live records
///
/// Falls back to deleted records when none are live. Ties go to the
/// folder that sorts first.
fn home_folder(locals: &[LocalRecord]) -> Option<PathBuf> {
    let live: Vec<_> = locals.iter().filter(|local| !local.deleted).collect();
    let candidates = if live.is_empty() {
        locals.iter().collect()
    } else {
        live
    };

    let mut counts: BTreeMap<PathBuf, usize> = BTreeMap::new();
    for local in candidates {
        *counts.entry(parent_folder(&local.path)).or_default() += 1;
    }

    let mut best: Option<(PathBuf, usize)> = None;
    for (folder, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((folder, count));
        }
    }
    best.map(|(folder, _)| folder)
}

/// Local records keyed by remote id; the first path wins on duplicates
fn index_by_remote_id(locals: &[LocalRecord]) -> HashMap<&str, &LocalRecord> {
    let mut by_id: HashMap<&str, &LocalRecord> = HashMap::with_capacity(locals.len());
    for local in locals {
        if let Some(first) = by_id.get(local.remote_id.as_str()) {
            warn!(
                "Record {} is mirrored twice ({:?} and {:?}); using the first",
                local.remote_id, first.path, local.path
            );
            continue;
        }
        by_id.insert(local.remote_id.as_str(), local);
    }
    by_id
}

/// Rows with no local record, or whose stored last-edited time differs
///
/// Rows that failed to decode are always included so they are reported.
fn stale_rows<'r, 'l>(
    rows: &'r [RemoteRecord],
    by_id: &HashMap<&str, &'l LocalRecord>,
) -> Vec<(&'r RemoteRecord, Option<&'l LocalRecord>)> {
    rows.iter()
        .filter_map(|row| match by_id.get(row.id.as_str()) {
            _ if row.decode_error.is_some() => Some((row, None)),
            None => Some((row, None)),
            Some(local) if local.last_edited.as_deref() != Some(row.last_edited.as_str()) => {
                Some((row, Some(*local)))
            }
            Some(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnType;
    use crate::remote::{RemoteClient, RemoteError, RetryPolicy};
    use crate::store::{FsStore, MemoryStore};
    use crate::test_support::{
        column, described, paragraph, record, tasks_schema, FakeApi, ManualClock,
    };
    use serde_yaml::Value;
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    const T1: &str = "2024-01-01T00:00:00.000Z";
    const T2: &str = "2024-02-01T00:00:00.000Z";

    fn engine<S: RecordStore>(api: &FakeApi, store: S) -> SyncEngine<FakeApi, S> {
        let client = RemoteClient::with_clock(RetryPolicy::default(), ManualClock::new());
        SyncEngine::new(Fetcher::new(api.clone(), client), store, "Remote")
    }

    fn id() -> CollectionId {
        FakeApi::collection_id()
    }

    fn abc_api() -> FakeApi {
        let api = FakeApi::new();
        api.set_records(vec![
            record("a", "Alpha", T1),
            record("b", "Beta", T1),
            record("c", "Gamma", T1),
        ]);
        api
    }

    fn drain(mut rx: UnboundedReceiver<SyncProgress>) -> Vec<SyncProgress> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn header(store: &MemoryStore, path: &str) -> FrontMatterDoc {
        FrontMatterDoc::parse(&store.get(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_minimal_round_trip() {
        let api = FakeApi::new();
        let mut schema = tasks_schema();
        schema.columns = vec![
            column("Name", ColumnType::Title),
            column("Description", ColumnType::RichText),
        ];
        api.set_schema(schema);
        api.set_records(vec![described("alpha", "Alpha", T1, "Alpha's text")]);
        let engine = engine(&api, MemoryStore::new());

        let result = engine.import(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(result.failed, 0);

        let records: Vec<_> = engine
            .store()
            .paths()
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "md"))
            .collect();
        assert_eq!(records, vec![PathBuf::from("Remote/Tasks/Alpha.md")]);

        let doc = header(engine.store(), "Remote/Tasks/Alpha.md");
        let keys: Vec<_> = doc.header.keys().filter_map(Value::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "remote-id",
                "remote-url",
                "frozen-at",
                "last-edited",
                "collection-id",
                "Description"
            ]
        );
        assert_eq!(doc.get_str("Description"), Some("Alpha's text"));
        assert_eq!(doc.get_str("last-edited"), Some(T1));
        assert_eq!(doc.body, "");

        let children_calls = api.calls("children");
        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.created, 0);
        assert_eq!(result.updated, 0);
        assert_eq!(api.calls("children"), children_calls);
    }

    #[tokio::test]
    async fn test_title_only_collection_has_mirror_keys_only() {
        let api = FakeApi::new();
        let mut schema = tasks_schema();
        schema.columns = vec![column("Name", ColumnType::Title)];
        api.set_schema(schema);
        api.set_records(vec![record("alpha", "Alpha", T1)]);
        let engine = engine(&api, MemoryStore::new());

        let result = engine.import(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.created, 1);

        let doc = header(engine.store(), "Remote/Tasks/Alpha.md");
        let keys: Vec<_> = doc.header.keys().filter_map(Value::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "remote-id",
                "remote-url",
                "frozen-at",
                "last-edited",
                "collection-id"
            ]
        );
        assert_eq!(doc.get_str("remote-id"), Some("alpha"));
        assert_eq!(doc.get_str("collection-id"), Some(id().as_str()));

        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.created, 0);
        assert_eq!(result.updated, 0);
    }

    #[tokio::test]
    async fn test_import_writes_view_and_reports_progress() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        let (sink, rx) = ProgressSink::channel();

        let result = engine.import(&id(), sink).await.unwrap();
        assert_eq!(result.created, 3);

        assert!(engine.store().get("Remote/Tasks/Tasks.base").is_some());
        assert_eq!(
            drain(rx),
            vec![
                SyncProgress::Querying,
                SyncProgress::Importing { current: 1, total: 3 },
                SyncProgress::Importing { current: 2, total: 3 },
                SyncProgress::Importing { current: 3, total: 3 },
                SyncProgress::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_second_import_is_rejected() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();
        let schema_calls = api.calls("schema");

        let err = engine.import(&id(), ProgressSink::none()).await.unwrap_err();
        match err {
            SyncError::AlreadySynced {
                collection_id,
                folder,
            } => {
                assert_eq!(collection_id, id().to_string());
                assert_eq!(folder, PathBuf::from("Remote/Tasks"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.calls("schema"), schema_calls);
    }

    #[tokio::test]
    async fn test_refresh_twice_is_idempotent() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();

        let first = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        let second = engine.refresh(&id(), ProgressSink::none()).await.unwrap();

        for result in [first, second] {
            assert_eq!(
                result,
                SyncResult {
                    skipped: 3,
                    ..SyncResult::default()
                }
            );
        }
    }

    #[tokio::test]
    async fn test_refresh_writes_only_stale_rows() {
        let api = abc_api();
        api.set_children("b", vec![paragraph("p1", "old body")]);
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();

        api.set_records(vec![
            record("a", "Alpha", T1),
            record("b", "Beta", T2),
            record("c", "Gamma", T1),
            record("d", "Delta", T1),
        ]);
        api.set_children("b", vec![paragraph("p2", "new body")]);
        let before = api.call_targets("children").len();

        let (sink, rx) = ProgressSink::channel();
        let result = engine.refresh(&id(), sink).await.unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.updated, 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.removed, 0);
        assert_eq!(
            api.call_targets("children")[before..].to_vec(),
            vec!["b".to_string(), "d".to_string()]
        );

        let beta = header(engine.store(), "Remote/Tasks/Beta.md");
        assert_eq!(beta.get_str("last-edited"), Some(T2));
        assert_eq!(beta.body, "new body\n");
        assert!(engine.store().get("Remote/Tasks/Delta.md").is_some());

        assert_eq!(
            drain(rx),
            vec![
                SyncProgress::Querying,
                SyncProgress::Diffing,
                SyncProgress::Detected { stale: 2, total: 4 },
                SyncProgress::Importing { current: 1, total: 2 },
                SyncProgress::Importing { current: 2, total: 2 },
                SyncProgress::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_local_timestamp_is_stale() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();

        let path = Path::new("Remote/Tasks/Gamma.md");
        let mut doc = header(engine.store(), "Remote/Tasks/Gamma.md");
        doc.header.remove("last-edited");
        engine.store().write(path, &doc.render().unwrap()).unwrap();

        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.updated, 1);
        assert_eq!(result.skipped, 2);
    }

    #[tokio::test]
    async fn test_removed_rows_are_flagged_once() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();

        api.set_records(vec![record("a", "Alpha", T1), record("b", "Beta", T1)]);

        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.removed, 1);
        assert_eq!(result.skipped, 2);

        let gamma_text = engine.store().get("Remote/Tasks/Gamma.md").unwrap();
        let gamma = FrontMatterDoc::parse(&gamma_text).unwrap();
        assert_eq!(gamma.get_bool("deleted"), Some(true));
        assert_eq!(gamma.get_str("remote-id"), Some("c"));

        let again = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(again.removed, 0);
        let text = engine.store().get("Remote/Tasks/Gamma.md").unwrap();
        assert_eq!(text, gamma_text);
        assert_eq!(text.matches("deleted:").count(), 1);
    }

    #[tokio::test]
    async fn test_deleted_flag_cleared_when_row_returns_edited() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();

        api.set_records(vec![record("a", "Alpha", T1), record("b", "Beta", T1)]);
        engine.refresh(&id(), ProgressSink::none()).await.unwrap();

        // Back with the same timestamp: still flagged
        api.set_records(vec![
            record("a", "Alpha", T1),
            record("b", "Beta", T1),
            record("c", "Gamma", T1),
        ]);
        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.skipped, 3);
        let gamma = header(engine.store(), "Remote/Tasks/Gamma.md");
        assert_eq!(gamma.get_bool("deleted"), Some(true));

        // Edited: rewritten without the flag
        api.set_records(vec![
            record("a", "Alpha", T1),
            record("b", "Beta", T1),
            record("c", "Gamma", T2),
        ]);
        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.updated, 1);
        let gamma = header(engine.store(), "Remote/Tasks/Gamma.md");
        assert_eq!(gamma.get_bool("deleted"), None);
    }

    #[tokio::test]
    async fn test_row_failure_does_not_abort_run() {
        let api = abc_api();
        api.break_node("b");
        let engine = engine(&api, MemoryStore::new());

        let result = engine.import(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.created, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("b: "), "{}", result.errors[0]);
        assert!(engine.store().get("Remote/Tasks/Alpha.md").is_some());
        assert!(engine.store().get("Remote/Tasks/Beta.md").is_none());
        assert!(engine.store().get("Remote/Tasks/Gamma.md").is_some());
    }

    #[tokio::test]
    async fn test_undecodable_row_is_recorded_not_flagged() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();

        let mut broken = record("b", "", T2);
        broken.decode_error = Some("Unexpected response: column 'Score': bad number".into());
        api.set_records(vec![record("a", "Alpha", T1), broken, record("c", "Gamma", T1)]);
        let (sink, rx) = ProgressSink::channel();

        let result = engine.refresh(&id(), sink).await.unwrap();
        assert_eq!(result.skipped, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.removed, 0);
        assert_eq!(
            result.errors,
            vec!["b: Unexpected response: column 'Score': bad number"]
        );
        assert!(drain(rx).contains(&SyncProgress::Detected { stale: 1, total: 3 }));

        let beta = header(engine.store(), "Remote/Tasks/Beta.md");
        assert_eq!(beta.get_bool("deleted"), None);
        assert_eq!(beta.get_str("last-edited"), Some(T1));
    }

    #[tokio::test]
    async fn test_undecodable_row_on_import_is_skipped() {
        let api = FakeApi::new();
        let mut broken = record("b", "", T1);
        broken.decode_error = Some("bad row".into());
        api.set_records(vec![record("a", "Alpha", T1), broken]);
        let engine = engine(&api, MemoryStore::new());

        let result = engine.import(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.created, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(api.call_targets("children"), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_same_title_collections_get_separate_folders() {
        let temp = TempDir::new().unwrap();
        let first_api = abc_api();
        let first = engine(&first_api, FsStore::new(temp.path()));
        first.import(&id(), ProgressSink::none()).await.unwrap();

        let other_id = CollectionId::parse("ffffffffffffffffffffffffffffffff").unwrap();
        let second_api = FakeApi::new();
        let mut schema = tasks_schema();
        schema.id = other_id.clone();
        second_api.set_schema(schema);
        second_api.set_records(vec![record("z", "Zeta", T1)]);
        let second = engine(&second_api, FsStore::new(temp.path()));
        second.import(&other_id, ProgressSink::none()).await.unwrap();

        let read = |path: &str| std::fs::read_to_string(temp.path().join(path)).unwrap();
        let descriptor = |path: &str| serde_yaml::from_str::<ViewDescriptor>(&read(path)).unwrap();

        assert!(descriptor("Remote/Tasks/Tasks.base").selects(&id()));
        assert!(descriptor("Remote/Tasks (ffffffff)/Tasks.base").selects(&other_id));
        assert!(read("Remote/Tasks (ffffffff)/Zeta.md").contains("remote-id: z\n"));

        // Refreshes keep each descriptor with its own collection
        second_api.set_records(Vec::new());
        second.refresh(&other_id, ProgressSink::none()).await.unwrap();
        first.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert!(descriptor("Remote/Tasks/Tasks.base").selects(&id()));
        assert!(descriptor("Remote/Tasks (ffffffff)/Tasks.base").selects(&other_id));
    }

    #[test]
    fn test_index_by_remote_id_keeps_first_duplicate() {
        let local = |path: &str, remote_id: &str| LocalRecord {
            path: PathBuf::from(path),
            remote_id: remote_id.to_string(),
            last_edited: Some(T1.to_string()),
            collection_id: Some(id().to_string()),
            deleted: false,
        };
        let locals = vec![
            local("Remote/Tasks/Alpha.md", "a"),
            local("Remote/Tasks/Beta.md", "b"),
            local("Archive/Alpha copy.md", "a"),
        ];

        let by_id = index_by_remote_id(&locals);
        assert_eq!(by_id.len(), 2);
        assert_eq!(by_id["a"].path, PathBuf::from("Remote/Tasks/Alpha.md"));
        assert_eq!(by_id["b"].path, PathBuf::from("Remote/Tasks/Beta.md"));
    }

    #[tokio::test]
    async fn test_rate_limited_row_is_retried() {
        let api = abc_api();
        api.fail_next("children", RemoteError::status(429, "rate limited"));
        let engine = engine(&api, MemoryStore::new());

        let result = engine.import(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.created, 3);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn test_setup_failures_abort() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());

        let other = CollectionId::parse("ffffffffffffffffffffffffffffffff").unwrap();
        let err = engine.import(&other, ProgressSink::none()).await.unwrap_err();
        assert!(matches!(err, SyncError::CollectionNotFound { .. }));

        api.fail_next("schema", RemoteError::status(403, "restricted"));
        let err = engine.refresh(&id(), ProgressSink::none()).await.unwrap_err();
        assert!(matches!(err, SyncError::CollectionInaccessible { .. }));

        let mut schema = tasks_schema();
        schema.columns.retain(|c| c.kind != ColumnType::Title);
        api.set_schema(schema);
        let err = engine.import(&id(), ProgressSink::none()).await.unwrap_err();
        assert!(matches!(err, SyncError::NoSchema { .. }));

        assert!(engine.store().paths().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_keeps_moved_records_in_place() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());
        engine.import(&id(), ProgressSink::none()).await.unwrap();

        let moved = engine.store().get("Remote/Tasks/Beta.md").unwrap();
        engine
            .store()
            .write(Path::new("Archive/Beta.md"), &moved)
            .unwrap();
        // Only the moved copy keeps the marker
        engine
            .store()
            .write(Path::new("Remote/Tasks/Beta.md"), "replaced by user")
            .unwrap();

        api.set_records(vec![
            record("a", "Alpha", T1),
            record("b", "Beta", T2),
            record("c", "Gamma", T1),
        ]);
        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.updated, 1);

        let beta = header(engine.store(), "Archive/Beta.md");
        assert_eq!(beta.get_str("last-edited"), Some(T2));
        assert!(engine.store().get("Archive/Tasks.base").is_none());
        assert_eq!(
            engine.store().get("Remote/Tasks/Beta.md").as_deref(),
            Some("replaced by user")
        );
    }

    #[tokio::test]
    async fn test_refresh_without_import_creates_folder() {
        let api = abc_api();
        let engine = engine(&api, MemoryStore::new());

        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.created, 3);
        assert!(engine.store().exists(Path::new("Remote/Tasks")));
        assert!(engine.store().get("Remote/Tasks/Tasks.base").is_some());
    }

    #[tokio::test]
    async fn test_import_and_refresh_on_disk() {
        let temp = TempDir::new().unwrap();
        let api = abc_api();
        api.set_children("a", vec![paragraph("p", "Hello from disk")]);
        let engine = engine(&api, FsStore::new(temp.path()));

        let result = engine.import(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.created, 3);

        let alpha = std::fs::read_to_string(temp.path().join("Remote/Tasks/Alpha.md")).unwrap();
        assert!(alpha.contains("remote-id: a\n"));
        assert!(alpha.ends_with("Hello from disk\n"));
        assert!(temp.path().join("Remote/Tasks/Tasks.base").is_file());

        api.set_records(vec![record("a", "Alpha", T1), record("b", "Beta", T1)]);
        let result = engine.refresh(&id(), ProgressSink::none()).await.unwrap();
        assert_eq!(result.skipped, 2);
        assert_eq!(result.removed, 1);

        let gamma = std::fs::read_to_string(temp.path().join("Remote/Tasks/Gamma.md")).unwrap();
        assert!(gamma.contains("deleted: true"));
    }
}
