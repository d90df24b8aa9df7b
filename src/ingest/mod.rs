//! Ingestion pipeline (spec §4.4): streams NEW `DiscoveryRecord`s, splits
//! them into timestamped events, and writes them into the per-watcher index.

pub mod splitter;

use crate::config::AppConfig;
use crate::error::LogwatchError;
use crate::index::IndexRegistry;
use crate::model::{compute_md5_id, ConsumptionStatus, DiscoveryRecord, IndexedEvent, SshConfig, Watcher};
use crate::ssh::SshTransport;
use crate::store::{ColumnFilter, ColumnValue, MetadataStore, StoreError};
use async_compression::tokio::bufread::GzipDecoder;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestReport {
    pub indexed_records: u32,
    pub errored_records: u32,
    pub indexed_documents: u64,
}

/// Implements `ingestRecords()` (spec §4.4): groups NEW records by watcher,
/// runs one supervised task per watcher group, and bounds per-record
/// concurrency within a group.
pub async fn ingest_records(
    watcher_store: Arc<dyn MetadataStore<Watcher>>,
    ssh_config_store: Arc<dyn MetadataStore<SshConfig>>,
    record_store: Arc<dyn MetadataStore<DiscoveryRecord>>,
    ssh: Arc<dyn SshTransport>,
    index_registry: Arc<IndexRegistry>,
    cfg: &AppConfig,
) -> IngestReport {
    let mut new_records_filter = ColumnFilter::new();
    new_records_filter.insert("consumptionStatus", ColumnValue::Text("NEW".into()));
    let new_records = match record_store.find_by_column_values(&new_records_filter).await {
        Ok(r) => r,
        Err(e) => {
            error!("failed to load NEW discovery records: {e}");
            return IngestReport::default();
        }
    };

    let mut by_watcher: HashMap<String, Vec<DiscoveryRecord>> = HashMap::new();
    for record in new_records {
        by_watcher.entry(record.ssh_log_watcher_name.clone()).or_default().push(record);
    }

    let max_parallelism = cfg.max_worker_parallelism;
    let mut join_set = tokio::task::JoinSet::new();

    for (watcher_name, records) in by_watcher {
        let watcher_store = watcher_store.clone();
        let ssh_config_store = ssh_config_store.clone();
        let record_store = record_store.clone();
        let ssh = ssh.clone();
        let index_registry = index_registry.clone();

        join_set.spawn(async move {
            ingest_watcher_group(
                &watcher_name,
                records,
                watcher_store,
                ssh_config_store,
                record_store,
                ssh,
                index_registry,
                max_parallelism,
            )
            .await
        });
    }

    let mut report = IngestReport::default();
    // Supervisor semantics (spec §4.4 step 2, §9): join every watcher task,
    // collect but never re-raise a peer's failure.
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(partial) => {
                report.indexed_records += partial.indexed_records;
                report.errored_records += partial.errored_records;
                report.indexed_documents += partial.indexed_documents;
            }
            Err(e) => error!("watcher ingestion task panicked: {e}"),
        }
    }

    index_registry.close_all().await;
    report
}

#[allow(clippy::too_many_arguments)]
async fn ingest_watcher_group(
    watcher_name: &str,
    records: Vec<DiscoveryRecord>,
    watcher_store: Arc<dyn MetadataStore<Watcher>>,
    ssh_config_store: Arc<dyn MetadataStore<SshConfig>>,
    record_store: Arc<dyn MetadataStore<DiscoveryRecord>>,
    ssh: Arc<dyn SshTransport>,
    index_registry: Arc<IndexRegistry>,
    max_parallelism: usize,
) -> IngestReport {
    let mut report = IngestReport::default();

    let watcher = match watcher_store.find_by_primary_key(&ColumnValue::Text(watcher_name.to_string())).await {
        Ok(Some(w)) => w,
        Ok(None) => {
            warn!(watcher = watcher_name, "watcher not found, marking records ERROR");
            mark_all_error(record_store.as_ref(), records).await;
            report.errored_records += 1;
            return report;
        }
        Err(e) => {
            error!(watcher = watcher_name, error = %e, "failed to load watcher");
            mark_all_error(record_store.as_ref(), records).await;
            return report;
        }
    };

    let cfg = match ssh_config_store.find_by_primary_key(&ColumnValue::Text(watcher.ssh_config_name.clone())).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            warn!(watcher = watcher_name, "ssh config not found, marking records ERROR");
            mark_all_error(record_store.as_ref(), records).await;
            return report;
        }
        Err(e) => {
            error!(watcher = watcher_name, error = %e, "failed to load ssh config");
            mark_all_error(record_store.as_ref(), records).await;
            return report;
        }
    };

    let Ok(zone) = watcher.time_zone() else {
        error!(watcher = watcher_name, "invalid time zone id, marking records ERROR");
        mark_all_error(record_store.as_ref(), records).await;
        return report;
    };

    let index = match index_registry.acquire(watcher_name) {
        Ok(i) => i,
        Err(e) => {
            error!(watcher = watcher_name, error = %e, "failed to acquire index writer");
            mark_all_error(record_store.as_ref(), records).await;
            return report;
        }
    };

    let worker_count = records.len().min(max_parallelism).max(1);
    let semaphore = Arc::new(Semaphore::new(worker_count));
    let mut join_set = tokio::task::JoinSet::new();
    let watcher = Arc::new(watcher);
    let cfg = Arc::new(cfg);

    for record in records {
        let permit = semaphore.clone();
        let watcher = watcher.clone();
        let cfg = cfg.clone();
        let record_store = record_store.clone();
        let ssh = ssh.clone();
        let index = index.clone();
        join_set.spawn(async move {
            let _permit = permit.acquire_owned().await.expect("semaphore never closed");
            ingest_one_record(record, &watcher, &cfg, zone, ssh.as_ref(), record_store.as_ref(), index.as_ref()).await
        });
    }

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Ok(doc_count)) => {
                report.indexed_records += 1;
                report.indexed_documents += doc_count;
            }
            Ok(Err(_)) => report.errored_records += 1,
            Err(e) => error!(watcher = watcher_name, error = %e, "record ingestion task panicked"),
        }
    }

    report
}

async fn mark_all_error(record_store: &dyn MetadataStore<DiscoveryRecord>, records: Vec<DiscoveryRecord>) {
    let updated: Vec<DiscoveryRecord> = records
        .into_iter()
        .map(|mut r| {
            r.consumption_status = ConsumptionStatus::Error;
            r.no_of_indexed_documents = Some(0);
            r.updated_time = Utc::now();
            r
        })
        .collect();
    if let Err(e) = record_store.update(updated).await {
        error!("failed to mark records ERROR: {e}");
    }
}

/// Ingests a single record: stream, split, upsert each event, commit, and
/// update the record's status (spec §4.4 step 3). Returns the number of
/// documents indexed on success.
async fn ingest_one_record(
    record: DiscoveryRecord,
    watcher: &Watcher,
    cfg: &SshConfig,
    zone: chrono_tz::Tz,
    ssh: &dyn SshTransport,
    record_store: &dyn MetadataStore<DiscoveryRecord>,
    index: &crate::index::WatcherIndex,
) -> Result<u64, LogwatchError> {
    match ingest_record_body(&record, watcher, cfg, zone, ssh, index).await {
        Ok(count) => {
            let mut updated = record;
            updated.consumption_status = ConsumptionStatus::Indexed;
            updated.no_of_indexed_documents = Some(count);
            updated.updated_time = Utc::now();
            retry_once(record_store, updated).await?;
            Ok(count)
        }
        Err(e) => {
            error!(watcher = %watcher.name, path = %record.full_file_path, error = %e, "ingestion failed for record");
            let mut updated = record;
            updated.consumption_status = ConsumptionStatus::Error;
            updated.no_of_indexed_documents = Some(0);
            updated.updated_time = Utc::now();
            let _ = retry_once(record_store, updated).await;
            Err(e)
        }
    }
}

/// Per-record update failures are logged and retried once (spec §7).
async fn retry_once(store: &dyn MetadataStore<DiscoveryRecord>, record: DiscoveryRecord) -> Result<(), StoreError> {
    match store.update(vec![record.clone()]).await {
        Ok(()) => Ok(()),
        Err(first_err) => {
            warn!(error = %first_err, "record status update failed, retrying once");
            store.update(vec![record]).await
        }
    }
}

async fn ingest_record_body(
    record: &DiscoveryRecord,
    watcher: &Watcher,
    cfg: &SshConfig,
    zone: chrono_tz::Tz,
    ssh: &dyn SshTransport,
    index: &crate::index::WatcherIndex,
) -> Result<u64, LogwatchError> {
    let session = ssh.open_session(cfg).await?;
    let raw_stream = session.open_file_stream(&record.full_file_path).await?;

    let text = if record.full_file_path.ends_with(".gz") {
        read_gzip_to_string(raw_stream).await?
    } else {
        read_plain_to_string(raw_stream).await?
    };

    let raw_events = splitter::split_events(&text);
    let file_name = record.file_name.clone().unwrap_or_else(|| record.full_file_path.clone());

    let mut parsed = 0u64;
    let mut parse_failures = 0u64;

    for raw in raw_events {
        let Ok(epoch_ms) = splitter::parse_log_timestamp(&raw.timestamp, zone) else {
            parse_failures += 1;
            warn!(watcher = %watcher.name, path = %record.full_file_path, timestamp = %raw.timestamp, "skipping event with unparseable timestamp");
            continue;
        };

        let md5_id = compute_md5_id(&cfg.server_host, &cfg.name, &file_name, &raw.content, &raw.timestamp);
        // Stored in original case (spec §4.5); the `TEXT` field's default
        // tokenizer lowercases at index time, so case-insensitive matching
        // doesn't require lowercasing the stored value.
        let event = IndexedEvent {
            md5_id,
            log_str_timestamp: raw.timestamp,
            log_long_timestamp: epoch_ms,
            log_path: record.full_file_path.clone(),
            content: raw.content,
        };

        index.upsert_by_term(&event).await?;
        parsed += 1;
    }

    index.commit().await?;

    if parsed == 0 && parse_failures > 0 {
        return Err(LogwatchError::Parse(format!(
            "all {parse_failures} events in {} failed to parse",
            record.full_file_path
        )));
    }

    debug!(watcher = %watcher.name, path = %record.full_file_path, parsed, parse_failures, "record ingested");
    Ok(parsed)
}

async fn read_plain_to_string(mut stream: Box<dyn tokio::io::AsyncRead + Unpin + Send>) -> Result<String, LogwatchError> {
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

async fn read_gzip_to_string(stream: Box<dyn tokio::io::AsyncRead + Unpin + Send>) -> Result<String, LogwatchError> {
    let mut decoder = GzipDecoder::new(BufReader::new(stream));
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
