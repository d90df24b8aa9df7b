use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use logwatchd::config::AppConfig;
use logwatchd::index::IndexRegistry;
use logwatchd::model::{DiscoveryRecord, SshConfig, Watcher};
use logwatchd::scheduler::Scheduler;
use logwatchd::ssh::async_ssh2_transport::AsyncSsh2Transport;
use logwatchd::ssh::session_cache::SessionCache;
use logwatchd::ssh::SshTransport;
use logwatchd::store::{MetadataStore, memory::InMemoryMetadataStore};
use logwatchd::{discovery, ingest, logging, search};
use tracing::error;

#[derive(Parser)]
#[command(name = "logwatchd")]
#[command(about = "Remote log collection and search daemon")]
struct Cli {
    /// Path to a TOML config file (spec §6 "Configuration inputs").
    #[arg(long, default_value = "logwatchd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one discovery pass over all enabled watchers.
    Discover,
    /// Run one ingestion pass over NEW discovery records.
    Ingest,
    /// Run a one-shot search against a watcher's index.
    Search {
        watcher_name: String,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        timestamp: Option<String>,
        #[arg(long = "log-path")]
        log_path: Option<String>,
        #[arg(long)]
        file_path: Option<String>,
        #[arg(long, value_enum, default_value = "and")]
        operator: OperatorArg,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Run the scheduler shell: discovery and ingestion on their own
    /// cadences until interrupted.
    Serve,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OperatorArg {
    And,
    Or,
}

/// Wires up the in-memory reference metadata stores this binary ships with
/// (spec §1: the real relational store is an external collaborator).
struct Stores {
    watcher_store: Arc<dyn MetadataStore<Watcher>>,
    ssh_config_store: Arc<dyn MetadataStore<SshConfig>>,
    record_store: Arc<dyn MetadataStore<DiscoveryRecord>>,
    ssh: Arc<dyn SshTransport>,
    index_registry: Arc<IndexRegistry>,
}

fn wire_up(cfg: &AppConfig) -> Stores {
    let ssh: Arc<dyn SshTransport> = if cfg.ssh_session_cache {
        Arc::new(SessionCache::new(AsyncSsh2Transport::new()))
    } else {
        Arc::new(AsyncSsh2Transport::new())
    };

    Stores {
        watcher_store: Arc::new(InMemoryMetadataStore::<Watcher>::new()),
        ssh_config_store: Arc::new(InMemoryMetadataStore::<SshConfig>::new()),
        record_store: Arc::new(InMemoryMetadataStore::<DiscoveryRecord>::new()),
        ssh,
        index_registry: Arc::new(
            IndexRegistry::new(cfg.index_dir.clone()).with_best_compression(cfg.use_deflate_compression),
        ),
    }
}

#[tokio::main]
async fn main() {
    logging::init();

    let cli = Cli::parse();
    let cfg = match AppConfig::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {e}");
            return;
        }
    };

    let stores = wire_up(&cfg);

    match cli.command {
        Commands::Discover => {
            let report = discovery::process_watchers(
                stores.watcher_store.as_ref(),
                stores.ssh_config_store.as_ref(),
                stores.record_store.as_ref(),
                stores.ssh.as_ref(),
            )
            .await;
            println!("{report:#?}");
        }
        Commands::Ingest => {
            let report = ingest::ingest_records(
                stores.watcher_store,
                stores.ssh_config_store,
                stores.record_store,
                stores.ssh,
                stores.index_registry,
                &cfg,
            )
            .await;
            println!("{report:#?}");
        }
        Commands::Search { watcher_name, content, timestamp, log_path, file_path, operator, page, page_size } => {
            let req = search::SearchRequest {
                file_path,
                content_q: content,
                timestamp_q: timestamp,
                log_path_q: log_path,
                operator: Some(match operator {
                    OperatorArg::And => search::Operator::And,
                    OperatorArg::Or => search::Operator::Or,
                }),
                start_date_ms: None,
                end_date_ms: None,
                page,
                page_size,
            };
            match search::search(&stores.index_registry, &watcher_name, &req) {
                Ok((total_hits, results)) => {
                    println!("totalHits = {total_hits}");
                    for r in results {
                        println!("[{}] {}: {}", r.timestamp, r.file_path, r.content);
                    }
                }
                Err(e) => error!("search failed: {e}"),
            }
        }
        Commands::Serve => {
            let scheduler = Arc::new(Scheduler::new(
                stores.watcher_store,
                stores.ssh_config_store,
                stores.record_store,
                stores.ssh,
                stores.index_registry,
                cfg,
            ));
            scheduler.run().await;
        }
    }
}
