//! Record writer
//!
//! Turns one remote row plus its converted body into a record file. The
//! header carries the mirror keys first, then one entry per mapped column
//! in schema order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_yaml::Value;
use tracing::debug;

use super::error::SyncError;
use crate::markup::Converter;
use crate::models::{CollectionSchema, RemoteRecord};
use crate::remote::{Fetcher, RemoteApi};
use crate::store::{keys, FrontMatterDoc, LocalRecord, RecordStore, StoreError};

/// File name used for records with an empty title
const UNTITLED: &str = "Untitled";

/// Longest file stem kept from a title, in characters
const MAX_STEM_CHARS: usize = 180;

/// Characters that cannot appear in a file name or a wiki link
const FORBIDDEN: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '#', '^', '[', ']'];

/// What `write_one` did with a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    /// The local copy already matched the row's last-edited time
    Unchanged,
}

/// Writes rows of one collection into one folder
pub struct RecordWriter<'a, A, S: ?Sized> {
    fetcher: &'a Fetcher<A>,
    store: &'a S,
    schema: &'a CollectionSchema,
    folder: &'a Path,
    frozen_at: Option<DateTime<Utc>>,
}

impl<'a, A: RemoteApi, S: RecordStore + ?Sized> RecordWriter<'a, A, S> {
    pub fn new(
        fetcher: &'a Fetcher<A>,
        store: &'a S,
        schema: &'a CollectionSchema,
        folder: &'a Path,
    ) -> Self {
        Self {
            fetcher,
            store,
            schema,
            folder,
            frozen_at: None,
        }
    }

    /// Stamp every write with a fixed `frozen-at` time
    pub fn frozen_at(mut self, at: DateTime<Utc>) -> Self {
        self.frozen_at = Some(at);
        self
    }

    /// Write a single row
    ///
    /// A row whose existing local copy carries the same last-edited time
    /// is left alone unless `force` is set. Otherwise the body is fetched
    /// and converted, and the file is created, or rewritten in place when
    /// `existing` is given.
    pub async fn write_one(
        &self,
        record: &RemoteRecord,
        existing: Option<&LocalRecord>,
        force: bool,
    ) -> Result<WriteOutcome, SyncError> {
        if let Some(local) = existing {
            if !force && local.last_edited.as_deref() == Some(record.last_edited.as_str()) {
                return Ok(WriteOutcome::Unchanged);
            }
        }

        let body = Converter::new(self.fetcher)
            .convert_record(&record.id)
            .await?;

        let path = match existing {
            Some(local) => local.path.clone(),
            None => self.new_path(record),
        };

        let frozen_at = self.frozen_at.unwrap_or_else(Utc::now);
        let doc = FrontMatterDoc::new(self.header(record, frozen_at), body);
        let contents = doc
            .render()
            .map_err(|e| StoreError::invalid_header(path.clone(), e))?;
        self.store.write(&path, &contents)?;

        debug!("Wrote {} to {:?}", record.id, path);
        Ok(match existing {
            Some(_) => WriteOutcome::Updated,
            None => WriteOutcome::Created,
        })
    }

    /// Header mapping for a row
    pub fn header(&self, record: &RemoteRecord, frozen_at: DateTime<Utc>) -> serde_yaml::Mapping {
        let mut doc = FrontMatterDoc::default();
        doc.set(keys::REMOTE_ID, record.id.as_str());
        doc.set(keys::REMOTE_URL, record.url.as_str());
        doc.set(
            keys::FROZEN_AT,
            frozen_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        doc.set(keys::LAST_EDITED, record.last_edited.as_str());
        doc.set(keys::COLLECTION_ID, self.schema.id.as_str());

        for column in self.schema.header_columns() {
            if keys::RESERVED.contains(&column.name.as_str()) {
                debug!("Column '{}' collides with a mirror key; skipped", column.name);
                continue;
            }
            let value = record
                .property(&column.name)
                .map(|v| v.to_yaml())
                .unwrap_or(Value::Null);
            doc.set(&column.name, value);
        }

        doc.header
    }

    /// First free file path for a new record
    ///
    /// Uses the title, then the title with a short id suffix, then with
    /// the full id.
    fn new_path(&self, record: &RemoteRecord) -> PathBuf {
        let stem = sanitize_file_name(&record.title);
        let compact: String = record.id.chars().filter(|c| *c != '-').collect();
        let short: String = compact.chars().take(8).collect();

        let candidates = [
            format!("{stem}.md"),
            format!("{stem} ({short}).md"),
            format!("{stem} ({compact}).md"),
        ];

        candidates
            .iter()
            .map(|name| self.folder.join(name))
            .find(|path| !self.store.exists(path))
            .unwrap_or_else(|| self.folder.join(&candidates[2]))
    }
}

/// Make a title usable as a file name
///
/// Strips characters that are illegal in file names or link syntax and
/// control characters, trims surrounding spaces and dots, and caps the
/// length. An empty result becomes `Untitled`.
pub fn sanitize_file_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !FORBIDDEN.contains(c) && !c.is_control())
        .take(MAX_STEM_CHARS)
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.');

    if cleaned.is_empty() {
        UNTITLED.to_string()
    } else {
        cleaned.to_string()
    }
}
