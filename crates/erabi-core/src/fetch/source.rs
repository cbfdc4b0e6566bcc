use std::fmt;
use std::sync::Arc;

use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::models::{Media, MediaFetchRequest, MediaSourceKind};

/// One page of results per item; an `Err` ends the query for this generation.
pub type PagedSource = BoxStream<'static, Result<Vec<Media>, SourceError>>;

/// Display metadata for a media source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSourceInfo {
    pub display_name: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
}

impl MediaSourceInfo {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }
}

/// A provider of candidate media items.
///
/// Implementations may be slow or fail; retries, if any, happen inside
/// `fetch`. The returned stream should be cancel-safe: it is dropped when
/// the session tears the query down.
pub trait MediaSource: Send + Sync {
    /// Unique among the sources of one fetcher.
    fn id(&self) -> &str;

    fn kind(&self) -> MediaSourceKind;

    fn info(&self) -> MediaSourceInfo {
        MediaSourceInfo::named(self.id())
    }

    /// Start a paginated query.
    fn fetch(&self, request: Arc<MediaFetchRequest>) -> PagedSource;
}

/// A source together with its administrative on/off switch.
#[derive(Clone)]
pub struct MediaSourceInstance {
    pub source: Arc<dyn MediaSource>,
    /// Disabled sources still get a fetch result, starting in `Disabled`.
    pub enabled: bool,
}

impl MediaSourceInstance {
    pub fn new(source: Arc<dyn MediaSource>, enabled: bool) -> Self {
        Self { source, enabled }
    }
}

impl fmt::Debug for MediaSourceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaSourceInstance")
            .field("id", &self.source.id())
            .field("kind", &self.source.kind())
            .field("enabled", &self.enabled)
            .finish()
    }
}
