use crate::model::Instant;
use crate::store::{ColumnValue, Entity};
use serde::{Deserialize, Serialize};

/// Processing state of a [`DiscoveryRecord`] (spec §3 glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsumptionStatus {
    New,
    Indexed,
    Duplicated,
    Error,
}

impl ConsumptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumptionStatus::New => "NEW",
            ConsumptionStatus::Indexed => "INDEXED",
            ConsumptionStatus::Duplicated => "DUPLICATED",
            ConsumptionStatus::Error => "ERROR",
        }
    }
}

/// One row per (watcher, discovered file path) observation (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRecord {
    pub id: i64,
    pub ssh_log_watcher_name: String,
    pub full_file_path: String,
    pub file_size: u64,
    pub c_time: Instant,
    pub file_hash: String,
    pub created_time: Instant,
    pub updated_time: Instant,
    pub consumption_status: ConsumptionStatus,
    pub duplicated_file: Option<String>,
    pub file_name: Option<String>,
    pub no_of_indexed_documents: Option<u64>,
}

impl Entity for DiscoveryRecord {
    const TABLE: &'static str = "SSHLogWatcherRecord";

    fn primary_key(&self) -> ColumnValue {
        ColumnValue::Int(self.id)
    }

    fn column(&self, name: &str) -> Option<ColumnValue> {
        match name {
            "id" => Some(ColumnValue::Int(self.id)),
            "sshLogWatcherName" => Some(ColumnValue::Text(self.ssh_log_watcher_name.clone())),
            "fullFilePath" => Some(ColumnValue::Text(self.full_file_path.clone())),
            "fileHash" => Some(ColumnValue::Text(self.file_hash.clone())),
            "consumptionStatus" => Some(ColumnValue::Text(self.consumption_status.as_str().to_string())),
            _ => None,
        }
    }
}
