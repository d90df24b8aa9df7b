//! Optional SSH session cache keyed by `SshConfig.name` (spec §9: "may be
//! cached per SshConfig for reuse; if cached, eviction on authentication or
//! I/O failure is required").

use super::{SshError, SshSession, SshTransport};
use crate::model::SshConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Wraps an [`SshTransport`], caching opened sessions by config name and
/// evicting an entry whenever an operation against it observes an auth or
/// I/O failure.
pub struct SessionCache<T: SshTransport> {
    inner: T,
    sessions: DashMap<String, Arc<dyn SshSession>>,
}

impl<T: SshTransport> SessionCache<T> {
    pub fn new(inner: T) -> Self {
        Self { inner, sessions: DashMap::new() }
    }

    pub async fn session(&self, cfg: &SshConfig) -> Result<Arc<dyn SshSession>, SshError> {
        if let Some(existing) = self.sessions.get(&cfg.name) {
            return Ok(existing.clone());
        }

        let opened: Arc<dyn SshSession> = Arc::from(self.inner.open_session(cfg).await?);
        self.sessions.insert(cfg.name.clone(), opened.clone());
        Ok(opened)
    }

    /// Drops a cached session so the next call to [`Self::session`]
    /// re-establishes it. Call this after observing an auth or I/O error
    /// against a session obtained from the cache.
    pub fn evict(&self, config_name: &str) {
        self.sessions.remove(config_name);
    }
}

/// Adapts a cached [`Arc<dyn SshSession>`] back to the owned-`Box` shape
/// [`SshTransport::open_session`] returns.
struct SharedSession(Arc<dyn SshSession>);

#[async_trait]
impl SshSession for SharedSession {
    async fn exec_capture(&self, command: &str) -> Result<super::ExecOutput, SshError> {
        self.0.exec_capture(command).await
    }

    async fn open_file_stream(
        &self,
        path: &str,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Unpin + Send>, SshError> {
        self.0.open_file_stream(path).await
    }

    async fn open_file_stream_range(
        &self,
        path: &str,
        offset: u64,
        max_bytes: u64,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Unpin + Send>, SshError> {
        self.0.open_file_stream_range(path, offset, max_bytes).await
    }
}

/// Lets [`SessionCache`] itself be used wherever an [`SshTransport`] is
/// expected: `open_session` returns a cached session when available instead
/// of always opening a fresh one.
#[async_trait]
impl<T: SshTransport> SshTransport for SessionCache<T> {
    async fn open_session(&self, cfg: &SshConfig) -> Result<Box<dyn SshSession>, SshError> {
        Ok(Box::new(SharedSession(self.session(cfg).await?)))
    }
}
