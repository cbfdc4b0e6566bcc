use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Subtitle languages found in a release title.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Languages: u8 {
        /// Simplified Chinese.
        const CHS = 1 << 0;
        /// Traditional Chinese.
        const CHT = 1 << 1;
        const JPN = 1 << 2;
        const ENG = 1 << 3;
    }
}

impl Default for Languages {
    fn default() -> Self {
        Self::empty()
    }
}

impl Languages {
    /// Stable language ids, in a fixed order (CHS, CHT, JPN, ENG).
    pub fn ids(self) -> Vec<&'static str> {
        [
            (Self::CHS, "CHS"),
            (Self::CHT, "CHT"),
            (Self::JPN, "JPN"),
            (Self::ENG, "ENG"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, id)| id)
        .collect()
    }

    /// Number of languages other than Japanese.
    pub fn foreign_count(self) -> u32 {
        (self - Self::JPN).bits().count_ones()
    }
}

/// How a release ships its subtitles, when the title says so explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubtitleMarker {
    /// Burned into the video (内嵌).
    Embedded,
    /// Muxed as selectable tracks (内封).
    Closed,
    /// Shipped as separate files next to the video (外挂).
    External,
}

/// The episode coverage a release title claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodeSpan {
    /// One numbered episode.
    Single(u32),
    /// A named special such as `SP`, `OVA2` or `特别篇`.
    Special(String),
    /// An inclusive run of episodes, e.g. `01-12`.
    Range { start: u32, end: u32 },
    /// A whole season; `None` when the season number is unknown.
    Season(Option<u32>),
}

/// Parsed elements extracted from a release title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Elements {
    /// Release group, e.g. "LoliHouse".
    pub alliance: Option<String>,
    /// Normalised resolution, e.g. "1080P" or "4K".
    pub resolution: Option<String>,
    /// Media source tag such as "WebRip" or "BDRip".
    pub source: Option<String>,
    pub episode: Option<EpisodeSpan>,
    pub languages: Languages,
    pub subtitle_marker: Option<SubtitleMarker>,
}
