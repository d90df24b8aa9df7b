use crate::model::Instant;
use crate::store::{ColumnValue, Entity};
use serde::{Deserialize, Serialize};

/// Connection descriptor (spec §3). Immutable during a run; created,
/// updated, and destroyed by the admin layer — read-only from the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SshConfig {
    pub name: String,
    pub server_host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub created_at: Instant,
    pub updated_at: Instant,
}

impl Entity for SshConfig {
    const TABLE: &'static str = "sshConfig";

    fn primary_key(&self) -> ColumnValue {
        ColumnValue::Text(self.name.clone())
    }

    fn column(&self, name: &str) -> Option<ColumnValue> {
        match name {
            "name" => Some(ColumnValue::Text(self.name.clone())),
            "serverHost" => Some(ColumnValue::Text(self.server_host.clone())),
            "port" => Some(ColumnValue::Int(self.port as i64)),
            "username" => Some(ColumnValue::Text(self.username.clone())),
            _ => None,
        }
    }
}
