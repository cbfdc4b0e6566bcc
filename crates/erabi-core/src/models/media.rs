use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::episode::EpisodeRange;

/// Category of a media source. Completion is tracked per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaSourceKind {
    #[serde(rename = "web")]
    Web,
    #[serde(rename = "bittorrent")]
    BitTorrent,
    #[serde(rename = "local_cache")]
    LocalCache,
}

impl MediaSourceKind {
    pub const ALL: [MediaSourceKind; 3] = [Self::Web, Self::BitTorrent, Self::LocalCache];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::BitTorrent => "bittorrent",
            Self::LocalCache => "local_cache",
        }
    }
}

impl fmt::Display for MediaSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bytes of a media item live, relative to this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSourceLocation {
    #[default]
    Online,
    Lan,
    Local,
}

impl MediaSourceLocation {
    /// Lower is cheaper. Used to rank otherwise equal candidates.
    pub fn cost_for_download(self) -> u8 {
        match self {
            Self::Local => 0,
            Self::Lan => 1,
            Self::Online => 2,
        }
    }
}

/// How subtitles are delivered with a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleKind {
    /// Burned into the video stream.
    Embedded,
    /// Muxed into the container as selectable tracks.
    Closed,
    /// Separate files provided by the source itself.
    ExternalProvided,
    /// Separate files that the player has to discover next to the video.
    ExternalDiscover,
    /// Either closed tracks or discoverable external files; the title does not say which.
    ClosedOrExternalDiscover,
}

impl SubtitleKind {
    pub const ALL: [SubtitleKind; 5] = [
        Self::Embedded,
        Self::Closed,
        Self::ExternalProvided,
        Self::ExternalDiscover,
        Self::ClosedOrExternalDiscover,
    ];
}

/// An external subtitle file shipped alongside a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    pub language_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaExtraFiles {
    pub subtitles: Vec<Subtitle>,
}

/// Tags extracted from a release title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProperties {
    pub subtitle_language_ids: Vec<String>,
    /// Empty when unknown.
    pub resolution: String,
    /// Empty when unknown.
    pub alliance: String,
    pub size: Option<u64>,
    pub subtitle_kind: Option<SubtitleKind>,
}

/// One discoverable item, produced by a media source and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Stable identity, unique across sources.
    pub media_id: String,
    pub media_source_id: String,
    pub original_url: String,
    pub original_title: String,
    pub published_time: DateTime<Utc>,
    pub properties: MediaProperties,
    pub episode_range: Option<EpisodeRange>,
    pub extra_files: MediaExtraFiles,
    pub location: MediaSourceLocation,
    pub kind: MediaSourceKind,
}

impl Media {
    pub fn is_local_cache(&self) -> bool {
        self.kind == MediaSourceKind::LocalCache
    }

    pub fn cost_for_download(&self) -> u8 {
        self.location.cost_for_download()
    }

    /// Whether this item can be watched with subtitles at all.
    pub fn has_subtitles(&self) -> bool {
        !self.properties.subtitle_language_ids.is_empty() || !self.extra_files.subtitles.is_empty()
    }
}

/// An immutable snapshot of media items; cloning shares the allocation.
pub type MediaList = Arc<[Media]>;

/// An empty list, used before any source has produced a page.
pub fn empty_media_list() -> MediaList {
    Arc::from(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_location_wire_names() {
        assert_eq!(serde_json::to_string(&MediaSourceKind::BitTorrent).unwrap(), "\"bittorrent\"");
        assert_eq!(
            serde_json::from_str::<MediaSourceKind>("\"local_cache\"").unwrap(),
            MediaSourceKind::LocalCache
        );
        assert_eq!(serde_json::to_string(&MediaSourceLocation::Lan).unwrap(), "\"lan\"");
        assert_eq!(
            serde_json::to_string(&SubtitleKind::ClosedOrExternalDiscover).unwrap(),
            "\"closed_or_external_discover\""
        );
    }

    #[test]
    fn test_download_cost_ordering() {
        assert!(MediaSourceLocation::Local.cost_for_download() < MediaSourceLocation::Lan.cost_for_download());
        assert!(MediaSourceLocation::Lan.cost_for_download() < MediaSourceLocation::Online.cost_for_download());
    }
}
