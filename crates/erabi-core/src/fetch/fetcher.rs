use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::runtime::Handle;
use tracing::info;

use super::request::RequestCell;
use super::session::MediaFetchSession;
use super::source::MediaSourceInstance;
use crate::config::AppConfig;
use crate::error::ErabiError;
use crate::models::MediaFetchRequest;

/// Tuning shared by every session of a fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherConfig {
    /// How long a session keeps its queries alive after the last observer
    /// of its merged results leaves.
    pub stop_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&AppConfig> for FetcherConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            stop_timeout: Duration::from_secs(config.fetch.stop_timeout_secs),
        }
    }
}

/// Creates fetch sessions over a fixed set of sources.
pub struct MediaFetcher {
    sources: Vec<MediaSourceInstance>,
    config: FetcherConfig,
    runtime: Handle,
}

impl MediaFetcher {
    /// Bind to the current Tokio runtime.
    pub fn new(sources: Vec<MediaSourceInstance>, config: FetcherConfig) -> Result<Self, ErabiError> {
        let runtime = Handle::try_current()?;
        Ok(Self::with_runtime(sources, config, runtime))
    }

    pub fn with_runtime(sources: Vec<MediaSourceInstance>, config: FetcherConfig, runtime: Handle) -> Self {
        info!(
            sources = sources.len(),
            enabled = sources.iter().filter(|s| s.enabled).count(),
            "media fetcher ready"
        );
        Self {
            sources,
            config,
            runtime,
        }
    }

    /// A session bound to `request`. No query starts until results are observed.
    pub fn new_session(&self, request: MediaFetchRequest) -> MediaFetchSession {
        info!(subject = %request.subject_id, episode = %request.episode_id, "new fetch session");
        let cell = Arc::new(RequestCell::ready(request));
        MediaFetchSession::new(
            &self.sources,
            cell,
            None,
            self.config.stop_timeout,
            self.runtime.clone(),
        )
    }

    /// A session bound to the first request `requests` yields; the rest are ignored.
    /// If the stream ends empty, sources end `Abandoned` without querying.
    pub fn new_session_lazy<S>(&self, requests: S) -> MediaFetchSession
    where
        S: Stream<Item = MediaFetchRequest> + Send + 'static,
    {
        let cell = Arc::new(RequestCell::pending());
        let feeder = self.runtime.spawn(Arc::clone(&cell).feed_from(requests));
        MediaFetchSession::new(
            &self.sources,
            cell,
            Some(feeder),
            self.config.stop_timeout,
            self.runtime.clone(),
        )
    }
}
