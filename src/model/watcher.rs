use crate::store::{ColumnValue, Entity};
use serde::{Deserialize, Serialize};

/// A harvesting rule bound to a single SshConfig (spec §3). Created,
/// updated, and destroyed by the admin layer — read-only from the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watcher {
    pub name: String,
    pub ssh_config_name: String,
    pub watch_dir: String,
    pub recur_depth: u32,
    pub file_prefix: String,
    pub file_contains: String,
    pub file_postfix: String,
    pub archived_logs: bool,
    pub enabled: bool,
    pub java_time_zone_id: String,
}

impl Watcher {
    /// Assembles `{prefix}*{contains}*{postfix}` per spec §3, substituting
    /// `*` for any empty component.
    pub fn glob_pattern(&self) -> String {
        let part = |s: &str| if s.is_empty() { "*".to_string() } else { s.to_string() };
        format!("{}*{}*{}", part(&self.file_prefix), part(&self.file_contains), part(&self.file_postfix))
    }

    pub fn time_zone(&self) -> Result<chrono_tz::Tz, String> {
        self.java_time_zone_id
            .parse()
            .map_err(|_| format!("unrecognized IANA zone id: {}", self.java_time_zone_id))
    }
}

impl Entity for Watcher {
    const TABLE: &'static str = "SSHLogWatcher";

    fn primary_key(&self) -> ColumnValue {
        ColumnValue::Text(self.name.clone())
    }

    fn column(&self, name: &str) -> Option<ColumnValue> {
        match name {
            "name" => Some(ColumnValue::Text(self.name.clone())),
            "sshConfigName" => Some(ColumnValue::Text(self.ssh_config_name.clone())),
            "watchDir" => Some(ColumnValue::Text(self.watch_dir.clone())),
            "enabled" => Some(ColumnValue::Bool(self.enabled)),
            _ => None,
        }
    }
}
