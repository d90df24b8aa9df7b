//! SSH transport (spec §4.1): authenticated sessions, captured command
//! execution, and streaming remote file reads.

pub mod async_ssh2_transport;
pub mod session_cache;

use crate::model::SshConfig;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncRead;

/// Transport-level timeout applied to session open and exec/stream setup
/// (spec §5: "enforce a transport-level timeout... 30-60s is reasonable").
pub const SSH_TIMEOUT: Duration = Duration::from_secs(45);

#[derive(thiserror::Error, Debug, Clone)]
pub enum SshError {
    #[error("authentication rejected for {0}")]
    Auth(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("remote file not found: {0}")]
    NotFound(String),

    #[error("command failed (exit {exit_code}): {stderr}")]
    Command { exit_code: i32, stderr: String },

    #[error("io error: {0}")]
    Io(String),
}

impl From<SshError> for crate::error::LogwatchError {
    fn from(e: SshError) -> Self {
        match e {
            SshError::Auth(m) => crate::error::LogwatchError::Auth(m),
            SshError::Network(m) => crate::error::LogwatchError::Network(m),
            SshError::NotFound(m) => crate::error::LogwatchError::NotFound(m),
            SshError::Command { exit_code, stderr } => {
                crate::error::LogwatchError::Io(format!("exit {exit_code}: {stderr}"))
            }
            SshError::Io(m) => crate::error::LogwatchError::Io(m),
        }
    }
}

/// Result of [`SshSession::exec_capture`].
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// An authenticated connection, owned by the caller for its lifetime.
#[async_trait]
pub trait SshSession: Send + Sync {
    async fn exec_capture(&self, command: &str) -> Result<ExecOutput, SshError>;

    async fn open_file_stream(
        &self,
        path: &str,
    ) -> Result<Box<dyn AsyncRead + Unpin + Send>, SshError>;

    async fn open_file_stream_range(
        &self,
        path: &str,
        offset: u64,
        max_bytes: u64,
    ) -> Result<Box<dyn AsyncRead + Unpin + Send>, SshError>;
}

/// Opens authenticated sessions for a given [`SshConfig`].
#[async_trait]
pub trait SshTransport: Send + Sync {
    async fn open_session(&self, cfg: &SshConfig) -> Result<Box<dyn SshSession>, SshError>;
}

/// Shell-quotes a path for safe interpolation into `find`/`cat`/`tail`
/// command lines (single-quote, escaping embedded single quotes).
pub fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}
