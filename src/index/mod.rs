//! Index store (spec §4.5): a per-watcher, on-disk Tantivy index with the
//! field contracts `md5Id`, `logStrTimestamp`, `logLongTimestamp`,
//! `logPath`, `content`.

use crate::error::LogwatchError;
use crate::model::IndexedEvent;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::schema::{Field, Schema, FAST, INDEXED, STORED, STRING, TEXT};
use tantivy::store::Compressor;
use tantivy::{doc, Index, IndexReader, IndexSettings, IndexWriter, Term};
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;

const DEFAULT_WRITER_HEAP_BYTES: usize = 512 * 1024 * 1024;

/// Field handles for [`WatcherIndex::schema`].
#[derive(Debug, Clone, Copy)]
pub struct Fields {
    pub md5_id: Field,
    pub log_str_timestamp: Field,
    pub log_long_timestamp: Field,
    pub log_path: Field,
    pub content: Field,
}

/// Recovers [`Fields`] handles from an already-open index's schema — used by
/// the search engine, which opens indexes read-only and never calls
/// [`build_schema`] itself.
pub fn fields_from_schema(schema: &Schema) -> Fields {
    Fields {
        md5_id: schema.get_field("md5_id").expect("schema built by build_schema"),
        log_str_timestamp: schema.get_field("log_str_timestamp").expect("schema built by build_schema"),
        log_long_timestamp: schema.get_field("log_long_timestamp").expect("schema built by build_schema"),
        log_path: schema.get_field("log_path").expect("schema built by build_schema"),
        content: schema.get_field("content").expect("schema built by build_schema"),
    }
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    // `content`/`logPath` are stored in original case; `TEXT`'s default
    // tokenizer lowercases at index time (spec §4.5 case-insensitivity), and
    // query-time lookups lowercase their input to match (see `search`).
    let md5_id = builder.add_text_field("md5_id", STRING | STORED);
    let log_str_timestamp = builder.add_text_field("log_str_timestamp", TEXT | STORED);
    let log_long_timestamp = builder.add_i64_field("log_long_timestamp", INDEXED | STORED | FAST);
    let log_path = builder.add_text_field("log_path", TEXT | STORED);
    let content = builder.add_text_field("content", TEXT | STORED);
    let schema = builder.build();
    (schema, Fields { md5_id, log_str_timestamp, log_long_timestamp, log_path, content })
}

/// A single watcher's index: writer + reader over one on-disk directory.
pub struct WatcherIndex {
    pub index: Index,
    pub fields: Fields,
    pub reader: IndexReader,
    writer: AsyncMutex<IndexWriter>,
}

impl WatcherIndex {
    /// `use_best_compression` selects the docstore codec for newly created
    /// indexes (spec §4.5 "Compression mode": best-compression codec when
    /// `true`, the Tantivy default otherwise). Has no effect on an index
    /// that already exists on disk — its codec was fixed at creation time.
    pub fn open_or_create(dir: &Path, writer_heap_bytes: usize, use_best_compression: bool) -> Result<Self, LogwatchError> {
        std::fs::create_dir_all(dir)?;
        let (schema, fields) = build_schema();

        let index = if dir.join("meta.json").exists() {
            Index::open_in_dir(dir)?
        } else {
            let docstore_compression = if use_best_compression { Compressor::Zstd(Default::default()) } else { Compressor::default() };
            let settings = IndexSettings { docstore_compression, ..Default::default() };
            Index::builder().schema(schema).settings(settings).create_in_dir(dir)?
        };

        let writer: IndexWriter = index.writer(writer_heap_bytes.max(15_000_000))?;
        let reader = index.reader()?;

        Ok(Self { index, fields, reader, writer: AsyncMutex::new(writer) })
    }

    /// `upsertByTerm("md5Id", newDoc)`: atomically replaces any prior
    /// document sharing `md5Id` (spec §4.5).
    pub async fn upsert_by_term(&self, event: &IndexedEvent) -> Result<(), LogwatchError> {
        let mut writer = self.writer.lock().await;
        let md5_term = Term::from_field_text(self.fields.md5_id, &event.md5_id);
        writer.delete_term(md5_term);
        writer.add_document(doc!(
            self.fields.md5_id => event.md5_id.clone(),
            self.fields.log_str_timestamp => event.log_str_timestamp.clone(),
            self.fields.log_long_timestamp => event.log_long_timestamp,
            self.fields.log_path => event.log_path.clone(),
            self.fields.content => event.content.clone(),
        ))?;
        Ok(())
    }

    pub async fn commit(&self) -> Result<(), LogwatchError> {
        let mut writer = self.writer.lock().await;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub async fn close(&self) -> Result<(), LogwatchError> {
        let mut writer = self.writer.lock().await;
        writer.commit()?;
        Ok(())
    }
}

/// Process-wide, concurrent index-writer registry keyed by watcher name
/// (spec §9): created lazily on first use, drained by the ingestion
/// pipeline at the end of a run. Owned by the ingestion pipeline instance,
/// never a global singleton.
pub struct IndexRegistry {
    root: PathBuf,
    writer_heap_bytes: usize,
    use_best_compression: bool,
    writers: DashMap<String, Arc<WatcherIndex>>,
}

impl IndexRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
            use_best_compression: false,
            writers: DashMap::new(),
        }
    }

    pub fn with_writer_heap_bytes(mut self, bytes: usize) -> Self {
        self.writer_heap_bytes = bytes;
        self
    }

    /// Selects the docstore codec for indexes created from here on (spec
    /// §6 `useDeflateCompression`).
    pub fn with_best_compression(mut self, use_best_compression: bool) -> Self {
        self.use_best_compression = use_best_compression;
        self
    }

    /// Returns the per-watcher directory, `indexDir/{watcherName}` (spec §6).
    pub fn dir_for(&self, watcher_name: &str) -> PathBuf {
        self.root.join(watcher_name)
    }

    /// Opens (creating if absent) the index writer for a watcher.
    pub fn acquire(&self, watcher_name: &str) -> Result<Arc<WatcherIndex>, LogwatchError> {
        if let Some(existing) = self.writers.get(watcher_name) {
            return Ok(existing.clone());
        }

        let dir = self.dir_for(watcher_name);
        let opened = Arc::new(WatcherIndex::open_or_create(&dir, self.writer_heap_bytes, self.use_best_compression)?);
        self.writers.insert(watcher_name.to_string(), opened.clone());
        Ok(opened)
    }

    /// Returns a handle to an already-open writer without creating one —
    /// used by the search engine, which must not open writers itself.
    pub fn existing(&self, watcher_name: &str) -> Option<Arc<WatcherIndex>> {
        self.writers.get(watcher_name).map(|e| e.clone())
    }

    /// Closes every open writer (spec §4.4 step 4: "after all watcher tasks
    /// complete, close all index writers").
    pub async fn close_all(&self) {
        for entry in self.writers.iter() {
            if let Err(e) = entry.value().close().await {
                tracing::error!(watcher = %entry.key(), error = %e, "failed to close index writer");
            } else {
                info!(watcher = %entry.key(), "closed index writer");
            }
        }
        self.writers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::open_reader_index;

    fn event(md5: &str, content: &str) -> IndexedEvent {
        IndexedEvent {
            md5_id: md5.into(),
            log_str_timestamp: "2025-07-30 12:00:00.000".into(),
            log_long_timestamp: 1_000,
            log_path: "/logs/app.log".into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn upsert_by_term_replaces_prior_document_with_same_md5() {
        let dir = tempfile::tempdir().unwrap();
        let idx = WatcherIndex::open_or_create(dir.path(), 15_000_000, false).unwrap();

        idx.upsert_by_term(&event("m1", "first")).await.unwrap();
        idx.commit().await.unwrap();
        idx.upsert_by_term(&event("m1", "second")).await.unwrap();
        idx.commit().await.unwrap();

        let searcher = idx.reader.searcher();
        assert_eq!(searcher.num_docs(), 1);
    }

    #[test]
    fn open_reader_index_opens_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        {
            let idx = WatcherIndex::open_or_create(dir.path(), 15_000_000, false).unwrap();
            drop(idx);
        }
        assert!(open_reader_index(dir.path()).unwrap().is_some());
    }
}

/// Opens a read-only view of an existing index directory, or `None` if it
/// doesn't exist yet (used by the search engine, spec §4.6 step 1).
pub fn open_reader_index(dir: &Path) -> Result<Option<Index>, LogwatchError> {
    if !dir.join("meta.json").exists() {
        return Ok(None);
    }
    Ok(Some(Index::open_in_dir(dir)?))
}
