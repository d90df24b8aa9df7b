//! Discovery engine (spec §4.3): lists remote files matching a watcher's
//! glob and reconciles them against stored [`DiscoveryRecord`] rows.

use crate::model::{ConsumptionStatus, DiscoveryRecord, Instant, SshConfig, Watcher};
use crate::ssh::SshTransport;
use crate::store::{ColumnFilter, ColumnValue, MetadataStore, StoreError};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, error, info, warn};

/// One remote file observation returned by a directory listing.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub path: String,
    pub size: u64,
    pub ctime: Instant,
}

/// Per-watcher outcome counts for one `process_watchers` run (ambient:
/// lets the scheduler/CLI log a one-line summary).
#[derive(Debug, Default, Clone, Copy)]
pub struct WatcherDiscoveryCounts {
    pub new: u32,
    pub duplicated: u32,
    pub unchanged: u32,
}

#[derive(Debug, Default, Clone)]
pub struct DiscoveryReport {
    pub per_watcher: Vec<(String, WatcherDiscoveryCounts)>,
    pub errored_watchers: Vec<String>,
}

/// `DiscoveryRecord.fileHash = H(watcherName ‖ fileName ‖ '-' ‖ size ‖ '-' ‖
/// cTime)` (spec §3 invariant). `H` is xxh3_64, matching the non-cryptographic
/// content-identity hash the teacher already uses for its own file cache.
pub fn compute_file_hash(watcher_name: &str, file_name: &str, size: u64, ctime: Instant) -> String {
    let input = format!("{watcher_name}{file_name}-{size}-{}", ctime.timestamp_millis());
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(input.as_bytes()))
}

fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

static NEXT_RECORD_ID: AtomicI64 = AtomicI64::new(1);

/// Allocates a fresh `DiscoveryRecord.id`. A real deployment's metadata
/// store owns auto-increment primary keys; this reference sequence stands
/// in for that since the store trait itself never hands back generated
/// keys (spec §4.2 describes insert as fire-and-forget batch insert).
fn next_record_id() -> i64 {
    NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed)
}

/// Lists files under `watcher.watch_dir` matching the assembled glob,
/// bounded by `watcher.recur_depth`, via a `find`-style remote listing
/// (spec §4.3 step 2c).
pub async fn list_remote_files(
    ssh: &dyn SshTransport,
    cfg: &SshConfig,
    watcher: &Watcher,
) -> Result<Vec<RemoteFile>, crate::error::LogwatchError> {
    let session = ssh.open_session(cfg).await?;
    let command = format!(
        "find {} -maxdepth {} -type f -printf '%p\\t%s\\t%C@\\n'",
        crate::ssh::shell_quote(&watcher.watch_dir),
        watcher.recur_depth
    );
    let output = session.exec_capture(&command).await?;
    if output.exit_code != 0 {
        return Err(crate::error::LogwatchError::Io(format!(
            "listing {} failed: {}",
            watcher.watch_dir,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let glob = globset::Glob::new(&watcher.glob_pattern())
        .map_err(|e| crate::error::LogwatchError::Config(e.to_string()))?
        .compile_matcher();

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut files = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(3, '\t');
        let (Some(path), Some(size), Some(ctime_secs)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        if !glob.is_match(file_name_of(path)) {
            continue;
        }
        let Ok(size) = size.parse::<u64>() else { continue };
        let Ok(ctime_secs) = ctime_secs.parse::<f64>() else { continue };
        let ctime = seconds_to_instant(ctime_secs);
        files.push(RemoteFile { path: path.to_string(), size, ctime });
    }

    Ok(files)
}

fn seconds_to_instant(secs: f64) -> Instant {
    let whole = secs.trunc() as i64;
    let nanos = ((secs.fract()) * 1_000_000_000.0) as u32;
    Utc.timestamp_opt(whole, nanos).single().unwrap_or_else(Utc::now)
}

/// Implements `processWatchers()` (spec §4.3): per enabled watcher, lists
/// files and reconciles them into NEW / DUPLICATED / unchanged
/// `DiscoveryRecord` rows. Per-watcher failures are caught and logged; no
/// watcher's failure affects another's.
pub async fn process_watchers(
    watcher_store: &dyn MetadataStore<Watcher>,
    ssh_config_store: &dyn MetadataStore<SshConfig>,
    record_store: &dyn MetadataStore<DiscoveryRecord>,
    ssh: &dyn SshTransport,
) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();

    let watchers = match watcher_store.find_all().await {
        Ok(w) => w,
        Err(e) => {
            error!("failed to load watchers: {e}");
            return report;
        }
    };

    for watcher in watchers.into_iter().filter(|w| w.enabled) {
        match process_one_watcher(watcher_store, ssh_config_store, record_store, ssh, &watcher).await {
            Ok(counts) => report.per_watcher.push((watcher.name.clone(), counts)),
            Err(e) => {
                error!(watcher = %watcher.name, error = %e, "discovery failed for watcher");
                report.errored_watchers.push(watcher.name.clone());
            }
        }
    }

    report
}

async fn process_one_watcher(
    _watcher_store: &dyn MetadataStore<Watcher>,
    ssh_config_store: &dyn MetadataStore<SshConfig>,
    record_store: &dyn MetadataStore<DiscoveryRecord>,
    ssh: &dyn SshTransport,
    watcher: &Watcher,
) -> Result<WatcherDiscoveryCounts, crate::error::LogwatchError> {
    let Some(cfg) = ssh_config_store
        .find_by_primary_key(&ColumnValue::Text(watcher.ssh_config_name.clone()))
        .await
        .map_err(store_err)?
    else {
        warn!(watcher = %watcher.name, ssh_config = %watcher.ssh_config_name, "ssh config not found, skipping watcher");
        return Ok(WatcherDiscoveryCounts::default());
    };

    let files = list_remote_files(ssh, &cfg, watcher).await?;
    let mut counts = WatcherDiscoveryCounts::default();

    for file in files {
        let file_name = file_name_of(&file.path).to_string();
        let hash = compute_file_hash(&watcher.name, &file_name, file.size, file.ctime);

        let mut filter = ColumnFilter::new();
        filter.insert("sshLogWatcherName", ColumnValue::Text(watcher.name.clone()));
        filter.insert("fileHash", ColumnValue::Text(hash.clone()));
        let existing = record_store.find_by_column_values(&filter).await.map_err(store_err)?;

        if let Some(same_path) = existing.iter().find(|r| r.full_file_path == file.path) {
            let mut bumped = same_path.clone();
            bumped.updated_time = Utc::now();
            record_store.update(vec![bumped]).await.map_err(store_err)?;
            counts.unchanged += 1;
            debug!(watcher = %watcher.name, path = %file.path, "unchanged, bumped updatedTime");
            continue;
        }

        if let Some(first_seen) = existing.first() {
            insert_record(
                record_store,
                watcher,
                &file,
                &file_name,
                hash,
                ConsumptionStatus::Duplicated,
                Some(first_seen.full_file_path.clone()),
            )
            .await?;
            counts.duplicated += 1;
            info!(watcher = %watcher.name, path = %file.path, duplicate_of = %first_seen.full_file_path, "discovered duplicate");
            continue;
        }

        insert_record(record_store, watcher, &file, &file_name, hash, ConsumptionStatus::New, None).await?;
        counts.new += 1;
        debug!(watcher = %watcher.name, path = %file.path, "discovered new file");
    }

    Ok(counts)
}

#[allow(clippy::too_many_arguments)]
async fn insert_record(
    record_store: &dyn MetadataStore<DiscoveryRecord>,
    watcher: &Watcher,
    file: &RemoteFile,
    file_name: &str,
    hash: String,
    status: ConsumptionStatus,
    duplicated_file: Option<String>,
) -> Result<(), crate::error::LogwatchError> {
    let now: DateTime<Utc> = Utc::now();
    let record = DiscoveryRecord {
        id: next_record_id(),
        ssh_log_watcher_name: watcher.name.clone(),
        full_file_path: file.path.clone(),
        file_size: file.size,
        c_time: file.ctime,
        file_hash: hash,
        created_time: now,
        updated_time: now,
        consumption_status: status,
        duplicated_file,
        file_name: Some(file_name.to_string()),
        no_of_indexed_documents: None,
    };
    record_store.insert(vec![record]).await.map_err(store_err)
}

fn store_err(e: StoreError) -> crate::error::LogwatchError {
    crate::error::LogwatchError::Store(e.to_string())
}
