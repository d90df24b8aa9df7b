//! Scheduler shell (spec §4.7): runs discovery and ingestion on independent
//! cadences, skipping a tick if the previous run of that phase is still in
//! flight rather than piling up overlapping runs.

use crate::config::AppConfig;
use crate::discovery::DiscoveryReport;
use crate::index::IndexRegistry;
use crate::ingest::IngestReport;
use crate::model::{DiscoveryRecord, SshConfig, Watcher};
use crate::ssh::SshTransport;
use crate::store::MetadataStore;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Long-lived process shell: ticks discovery and ingestion on their own
/// cadences (spec §4.7, §5 "no explicit cancellation... partial-failure
/// semantics rely on supervisor-style isolation").
pub struct Scheduler {
    watcher_store: Arc<dyn MetadataStore<Watcher>>,
    ssh_config_store: Arc<dyn MetadataStore<SshConfig>>,
    record_store: Arc<dyn MetadataStore<DiscoveryRecord>>,
    ssh: Arc<dyn SshTransport>,
    index_registry: Arc<IndexRegistry>,
    cfg: AppConfig,
    discovery_running: Mutex<()>,
    ingestion_running: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        watcher_store: Arc<dyn MetadataStore<Watcher>>,
        ssh_config_store: Arc<dyn MetadataStore<SshConfig>>,
        record_store: Arc<dyn MetadataStore<DiscoveryRecord>>,
        ssh: Arc<dyn SshTransport>,
        index_registry: Arc<IndexRegistry>,
        cfg: AppConfig,
    ) -> Self {
        Self {
            watcher_store,
            ssh_config_store,
            record_store,
            ssh,
            index_registry,
            cfg,
            discovery_running: Mutex::new(()),
            ingestion_running: Mutex::new(()),
        }
    }

    /// Runs discovery and ingestion loops concurrently until cancelled.
    /// Each loop ticks on its own cadence and skips a tick rather than
    /// queueing when the previous run of that phase hasn't finished.
    pub async fn run(self: Arc<Self>) {
        let discovery = {
            let this = self.clone();
            tokio::spawn(async move { this.discovery_loop().await })
        };
        let ingestion = {
            let this = self.clone();
            tokio::spawn(async move { this.ingestion_loop().await })
        };

        let _ = tokio::join!(discovery, ingestion);
    }

    async fn discovery_loop(&self) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(self.cfg.discovery_cadence_minutes * 60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Ok(_guard) = self.discovery_running.try_lock() else {
                warn!("skipping discovery tick: previous run still in progress");
                continue;
            };
            info!("discovery tick starting");
            let report: DiscoveryReport =
                crate::discovery::process_watchers(self.watcher_store.as_ref(), self.ssh_config_store.as_ref(), self.record_store.as_ref(), self.ssh.as_ref())
                    .await;
            info!(?report, "discovery tick complete");
        }
    }

    async fn ingestion_loop(&self) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(self.cfg.ingestion_cadence_minutes * 60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Ok(_guard) = self.ingestion_running.try_lock() else {
                warn!("skipping ingestion tick: previous run still in progress");
                continue;
            };
            info!("ingestion tick starting");
            let report: IngestReport = crate::ingest::ingest_records(
                self.watcher_store.clone(),
                self.ssh_config_store.clone(),
                self.record_store.clone(),
                self.ssh.clone(),
                self.index_registry.clone(),
                &self.cfg,
            )
            .await;
            info!(?report, "ingestion tick complete");
        }
    }
}
