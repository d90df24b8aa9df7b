use serde::{Deserialize, Serialize};

/// A Lucene-style document in a per-watcher index (spec §3). Lives only in
/// its watcher's Tantivy index, never behind [`crate::store::MetadataStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEvent {
    pub md5_id: String,
    pub log_str_timestamp: String,
    pub log_long_timestamp: i64,
    pub log_path: String,
    pub content: String,
}

/// `IndexedEvent.md5Id = MD5(serverHost ‖ "|" ‖ sshConfigName ‖ fileName ‖
/// content ‖ "|" ‖ logStrTimestamp ‖ "|")` (spec §3 invariant).
pub fn compute_md5_id(
    server_host: &str,
    ssh_config_name: &str,
    file_name: &str,
    content: &str,
    log_str_timestamp: &str,
) -> String {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(server_host.as_bytes());
    hasher.update(b"|");
    hasher.update(ssh_config_name.as_bytes());
    hasher.update(file_name.as_bytes());
    hasher.update(content.as_bytes());
    hasher.update(b"|");
    hasher.update(log_str_timestamp.as_bytes());
    hasher.update(b"|");
    format!("{:x}", hasher.finalize())
}
