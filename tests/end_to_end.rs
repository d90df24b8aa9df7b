//! End-to-end scenarios wiring discovery, ingestion, and search together
//! (spec §8) against in-memory metadata stores and a fake SSH transport.

use async_trait::async_trait;
use logwatchd::config::AppConfig;
use logwatchd::discovery::process_watchers;
use logwatchd::index::IndexRegistry;
use logwatchd::ingest::ingest_records;
use logwatchd::model::{SshConfig, Watcher};
use logwatchd::search::{search, Operator, SearchRequest};
use logwatchd::ssh::{ExecOutput, SshError, SshSession, SshTransport};
use logwatchd::store::memory::InMemoryMetadataStore;
use logwatchd::store::MetadataStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Per-`SshConfig.name` fixture: the `find` listing line(s) and the content
/// behind each listed path. An empty listing with `fail_exec: true` models a
/// watcher whose remote host is unreachable.
#[derive(Default, Clone)]
struct HostFixture {
    listing: String,
    files: HashMap<String, Vec<u8>>,
    fail_exec: bool,
}

struct FakeSession {
    fixture: HostFixture,
}

#[async_trait]
impl SshSession for FakeSession {
    async fn exec_capture(&self, _command: &str) -> Result<ExecOutput, SshError> {
        if self.fixture.fail_exec {
            return Ok(ExecOutput { stdout: vec![], stderr: b"connection reset".to_vec(), exit_code: 1 });
        }
        Ok(ExecOutput { stdout: self.fixture.listing.clone().into_bytes(), stderr: vec![], exit_code: 0 })
    }

    async fn open_file_stream(&self, path: &str) -> Result<Box<dyn AsyncRead + Unpin + Send>, SshError> {
        let bytes = self.fixture.files.get(path).cloned().ok_or_else(|| SshError::NotFound(path.to_string()))?;
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }

    async fn open_file_stream_range(
        &self,
        path: &str,
        _offset: u64,
        _max_bytes: u64,
    ) -> Result<Box<dyn AsyncRead + Unpin + Send>, SshError> {
        self.open_file_stream(path).await
    }
}

struct FakeTransport {
    by_host: HashMap<String, HostFixture>,
}

#[async_trait]
impl SshTransport for FakeTransport {
    async fn open_session(&self, cfg: &SshConfig) -> Result<Box<dyn SshSession>, SshError> {
        let fixture = self.by_host.get(&cfg.name).cloned().unwrap_or_default();
        Ok(Box::new(FakeSession { fixture }))
    }
}

fn ssh_cfg(name: &str) -> SshConfig {
    SshConfig {
        name: name.into(),
        server_host: format!("{name}.internal"),
        port: 22,
        username: "harvester".into(),
        password: "secret".into(),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

fn watcher(name: &str, ssh_config_name: &str) -> Watcher {
    Watcher {
        name: name.into(),
        ssh_config_name: ssh_config_name.into(),
        watch_dir: "/var/log/app".into(),
        recur_depth: 2,
        file_prefix: "app-".into(),
        file_contains: String::new(),
        file_postfix: String::new(),
        archived_logs: false,
        enabled: true,
        java_time_zone_id: "UTC".into(),
    }
}

struct Harness {
    watcher_store: Arc<InMemoryMetadataStore<Watcher>>,
    ssh_config_store: Arc<InMemoryMetadataStore<SshConfig>>,
    record_store: Arc<InMemoryMetadataStore<logwatchd::model::DiscoveryRecord>>,
    ssh: Arc<FakeTransport>,
    index_registry: Arc<IndexRegistry>,
    cfg: AppConfig,
}

impl Harness {
    async fn new(watchers: Vec<Watcher>, configs: Vec<SshConfig>, by_host: HashMap<String, HostFixture>) -> Self {
        let watcher_store = InMemoryMetadataStore::new();
        watcher_store.insert(watchers).await.unwrap();
        let ssh_config_store = InMemoryMetadataStore::new();
        ssh_config_store.insert(configs).await.unwrap();

        let mut cfg = AppConfig::default();
        cfg.index_dir = tempfile::tempdir().unwrap().into_path();

        Self {
            watcher_store: Arc::new(watcher_store),
            ssh_config_store: Arc::new(ssh_config_store),
            record_store: Arc::new(InMemoryMetadataStore::new()),
            ssh: Arc::new(FakeTransport { by_host }),
            index_registry: Arc::new(IndexRegistry::new(cfg.index_dir.clone())),
            cfg,
        }
    }

    async fn discover(&self) -> logwatchd::discovery::DiscoveryReport {
        process_watchers(self.watcher_store.as_ref(), self.ssh_config_store.as_ref(), self.record_store.as_ref(), self.ssh.as_ref()).await
    }

    async fn ingest(&self) -> logwatchd::ingest::IngestReport {
        ingest_records(
            self.watcher_store.clone(),
            self.ssh_config_store.clone(),
            self.record_store.clone(),
            self.ssh.clone(),
            self.index_registry.clone(),
            &self.cfg,
        )
        .await
    }
}

/// Scenario A (spec §8): discovery finds a new file, ingestion splits and
/// indexes its events, and a free-text search turns up a matching event.
#[tokio::test]
async fn scenario_a_happy_path_discover_ingest_search() {
    let text = "2025-07-30 09:00:00.000 [main] INFO service started\n\
2025-07-30 09:00:01.500 [worker] ERROR connection refused\n";
    let mut files = HashMap::new();
    files.insert("/var/log/app/app-1.log".to_string(), text.as_bytes().to_vec());
    let fixture = HostFixture {
        listing: "/var/log/app/app-1.log\t123\t1753862400.0\n".into(),
        files,
        fail_exec: false,
    };

    let harness = Harness::new(
        vec![watcher("w1", "s1")],
        vec![ssh_cfg("s1")],
        HashMap::from([("s1".to_string(), fixture)]),
    )
    .await;

    let discovery_report = harness.discover().await;
    assert_eq!(discovery_report.per_watcher[0].1.new, 1);

    let ingest_report = harness.ingest().await;
    assert_eq!(ingest_report.indexed_records, 1);
    assert_eq!(ingest_report.indexed_documents, 2);

    let req = SearchRequest { content_q: Some("connection refused".into()), page: 1, page_size: 10, ..Default::default() };
    let (total, results) = search(&harness.index_registry, "w1", &req).unwrap();
    assert_eq!(total, 1);
    assert_eq!(results[0].file_path, "/var/log/app/app-1.log");
}

/// Scenario B (spec §8): a second path with identical content-identity hash
/// is marked DUPLICATED at discovery time and is never picked up by
/// ingestion (which only consumes NEW records).
#[tokio::test]
async fn scenario_b_duplicate_file_is_not_ingested() {
    let text = "2025-07-30 09:00:00.000 [main] INFO service started\n";
    let mut files = HashMap::new();
    files.insert("/var/log/app/app-1.log".to_string(), text.as_bytes().to_vec());
    files.insert("/var/log/app/archive/app-1.log".to_string(), text.as_bytes().to_vec());
    let fixture = HostFixture {
        listing: "/var/log/app/app-1.log\t50\t1753862400.0\n/var/log/app/archive/app-1.log\t50\t1753862400.0\n".into(),
        files,
        fail_exec: false,
    };

    let harness = Harness::new(
        vec![watcher("w1", "s1")],
        vec![ssh_cfg("s1")],
        HashMap::from([("s1".to_string(), fixture)]),
    )
    .await;

    let discovery_report = harness.discover().await;
    assert_eq!(discovery_report.per_watcher[0].1.new, 1);
    assert_eq!(discovery_report.per_watcher[0].1.duplicated, 1);

    let ingest_report = harness.ingest().await;
    assert_eq!(ingest_report.indexed_records, 1);

    let records = harness.record_store.find_all().await.unwrap();
    let duplicate = records.iter().find(|r| r.full_file_path == "/var/log/app/archive/app-1.log").unwrap();
    assert_eq!(duplicate.consumption_status, logwatchd::model::ConsumptionStatus::Duplicated);
}

/// Scenario C (spec §8): a multi-line stack trace is carried as one event
/// with the introducing line's timestamp, and is searchable as a whole.
#[tokio::test]
async fn scenario_c_multiline_event_is_indexed_as_one_document() {
    let text = "2025-07-30 09:00:00.000 [main] ERROR unhandled exception\n\
java.lang.RuntimeException: boom\n\
\tat com.example.Service.run(Service.java:42)\n\
2025-07-30 09:00:01.000 [main] INFO recovered\n";
    let mut files = HashMap::new();
    files.insert("/var/log/app/app-1.log".to_string(), text.as_bytes().to_vec());
    let fixture = HostFixture {
        listing: "/var/log/app/app-1.log\t200\t1753862400.0\n".into(),
        files,
        fail_exec: false,
    };

    let harness = Harness::new(
        vec![watcher("w1", "s1")],
        vec![ssh_cfg("s1")],
        HashMap::from([("s1".to_string(), fixture)]),
    )
    .await;

    harness.discover().await;
    let ingest_report = harness.ingest().await;
    assert_eq!(ingest_report.indexed_documents, 2);

    let req = SearchRequest { content_q: Some("Service.java:42".into()), page: 1, page_size: 10, ..Default::default() };
    let (total, results) = search(&harness.index_registry, "w1", &req).unwrap();
    assert_eq!(total, 1);
    assert!(results[0].content.contains("RuntimeException"));
}

/// Scenario D (spec §8): a `.gz` file is transparently decompressed before
/// splitting.
#[tokio::test]
async fn scenario_d_gzipped_log_is_decompressed_before_splitting() {
    use tokio::io::AsyncWriteExt;

    let text = "2025-07-30 09:00:00.000 [main] INFO gzipped entry\n";
    let mut encoder = async_compression::tokio::write::GzipEncoder::new(Vec::new());
    encoder.write_all(text.as_bytes()).await.unwrap();
    encoder.shutdown().await.unwrap();
    let gz_bytes = encoder.into_inner();

    let mut files = HashMap::new();
    files.insert("/var/log/app/app-1.log.gz".to_string(), gz_bytes);
    let fixture = HostFixture {
        listing: "/var/log/app/app-1.log.gz\t80\t1753862400.0\n".into(),
        files,
        fail_exec: false,
    };

    let mut w = watcher("w1", "s1");
    w.file_postfix = ".log.gz".into();
    let harness = Harness::new(vec![w], vec![ssh_cfg("s1")], HashMap::from([("s1".to_string(), fixture)])).await;

    harness.discover().await;
    let ingest_report = harness.ingest().await;
    assert_eq!(ingest_report.indexed_records, 1);
    assert_eq!(ingest_report.indexed_documents, 1);

    let req = SearchRequest { content_q: Some("gzipped entry".into()), page: 1, page_size: 10, ..Default::default() };
    let (total, _) = search(&harness.index_registry, "w1", &req).unwrap();
    assert_eq!(total, 1);
}

/// Scenario F (spec §8, §9): a discovery/ingestion failure against one
/// watcher never prevents another watcher's data from being processed.
#[tokio::test]
async fn scenario_f_one_watchers_failure_does_not_affect_another() {
    let good_text = "2025-07-30 09:00:00.000 [main] INFO all is well\n";
    let mut good_files = HashMap::new();
    good_files.insert("/var/log/app/app-1.log".to_string(), good_text.as_bytes().to_vec());
    let good_fixture = HostFixture {
        listing: "/var/log/app/app-1.log\t60\t1753862400.0\n".into(),
        files: good_files,
        fail_exec: false,
    };
    let broken_fixture = HostFixture { fail_exec: true, ..Default::default() };

    let harness = Harness::new(
        vec![watcher("good", "s-good"), watcher("broken", "s-broken")],
        vec![ssh_cfg("s-good"), ssh_cfg("s-broken")],
        HashMap::from([("s-good".to_string(), good_fixture), ("s-broken".to_string(), broken_fixture)]),
    )
    .await;

    let discovery_report = harness.discover().await;
    assert!(discovery_report.errored_watchers.contains(&"broken".to_string()));
    let good_counts = discovery_report.per_watcher.iter().find(|(name, _)| name == "good").unwrap().1;
    assert_eq!(good_counts.new, 1);

    let ingest_report = harness.ingest().await;
    assert_eq!(ingest_report.indexed_records, 1);
    assert_eq!(ingest_report.errored_records, 0);

    let req = SearchRequest { content_q: Some("all is well".into()), page: 1, page_size: 10, ..Default::default() };
    let (total, _) = search(&harness.index_registry, "good", &req).unwrap();
    assert_eq!(total, 1);
}
