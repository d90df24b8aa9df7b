//! [`SshTransport`] implementation over `async-ssh2-tokio` (password auth).

use super::{ExecOutput, SshError, SshSession, SshTransport, SSH_TIMEOUT};
use crate::model::SshConfig;
use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use async_trait::async_trait;
use std::io::Cursor;
use tokio::io::AsyncRead;

pub struct AsyncSsh2Transport;

impl AsyncSsh2Transport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AsyncSsh2Transport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SshTransport for AsyncSsh2Transport {
    async fn open_session(&self, cfg: &SshConfig) -> Result<Box<dyn SshSession>, SshError> {
        let auth = AuthMethod::with_password(&cfg.password);
        let connect = Client::connect_with_config(
            (cfg.server_host.as_str(), cfg.port),
            &cfg.username,
            auth,
            ServerCheckMethod::NoCheck,
            Config::default(),
        );

        let client = tokio::time::timeout(SSH_TIMEOUT, connect)
            .await
            .map_err(|_| SshError::Network(format!("connect to {} timed out", cfg.server_host)))?
            .map_err(|e| classify_connect_error(&cfg.server_host, e))?;

        Ok(Box::new(ClientSession { client }))
    }
}

fn classify_connect_error(host: &str, e: async_ssh2_tokio::Error) -> SshError {
    let message = e.to_string();
    if message.to_lowercase().contains("auth") {
        SshError::Auth(format!("{host}: {message}"))
    } else {
        SshError::Network(format!("{host}: {message}"))
    }
}

struct ClientSession {
    client: Client,
}

#[async_trait]
impl SshSession for ClientSession {
    async fn exec_capture(&self, command: &str) -> Result<ExecOutput, SshError> {
        let run = self.client.execute(command);
        let result = tokio::time::timeout(SSH_TIMEOUT, run)
            .await
            .map_err(|_| SshError::Network("command timed out".into()))?
            .map_err(|e| SshError::Io(e.to_string()))?;

        Ok(ExecOutput {
            stdout: result.stdout.into_bytes(),
            stderr: result.stderr.into_bytes(),
            exit_code: result.exit_status as i32,
        })
    }

    async fn open_file_stream(
        &self,
        path: &str,
    ) -> Result<Box<dyn AsyncRead + Unpin + Send>, SshError> {
        let command = format!("cat -- {}", super::shell_quote(path));
        let out = self.exec_capture(&command).await?;
        if out.exit_code != 0 {
            return Err(SshError::NotFound(path.to_string()));
        }
        Ok(Box::new(Cursor::new(out.stdout)))
    }

    async fn open_file_stream_range(
        &self,
        path: &str,
        offset: u64,
        max_bytes: u64,
    ) -> Result<Box<dyn AsyncRead + Unpin + Send>, SshError> {
        let command = format!(
            "tail -c +{} -- {} | head -c {}",
            offset + 1,
            super::shell_quote(path),
            max_bytes
        );
        let out = self.exec_capture(&command).await?;
        if out.exit_code != 0 {
            return Err(SshError::NotFound(path.to_string()));
        }
        Ok(Box::new(Cursor::new(out.stdout)))
    }
}
