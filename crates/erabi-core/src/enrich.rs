//! Build [`Media`] from raw source listings using the title parser.

use chrono::{DateTime, Utc};
use erabi_parse::{EpisodeSpan, SubtitleMarker};

use crate::models::{
    EpisodeRange, EpisodeSort, Media, MediaExtraFiles, MediaProperties, MediaSourceKind,
    MediaSourceLocation, Subtitle, SubtitleKind,
};

/// Properties recovered from a release title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enriched {
    pub properties: MediaProperties,
    pub episode_range: Option<EpisodeRange>,
}

/// Parse `raw_title`. Unknown parts are left empty.
pub fn enrich_title(raw_title: &str) -> Enriched {
    let elements = erabi_parse::parse(raw_title);

    let subtitle_kind = match elements.subtitle_marker {
        Some(SubtitleMarker::Embedded) => Some(SubtitleKind::Embedded),
        Some(SubtitleMarker::Closed) => Some(SubtitleKind::Closed),
        Some(SubtitleMarker::External) => Some(SubtitleKind::ExternalDiscover),
        // Several subtitle languages rarely fit in one burned-in track.
        None if elements.languages.foreign_count() >= 2 => Some(SubtitleKind::Closed),
        None => None,
    };

    Enriched {
        properties: MediaProperties {
            subtitle_language_ids: elements
                .languages
                .ids()
                .into_iter()
                .map(String::from)
                .collect(),
            resolution: elements.resolution.unwrap_or_default(),
            alliance: elements.alliance.unwrap_or_default(),
            size: None,
            subtitle_kind,
        },
        episode_range: elements.episode.map(episode_range),
    }
}

fn episode_range(span: EpisodeSpan) -> EpisodeRange {
    match span {
        EpisodeSpan::Single(n) => EpisodeRange::Single(EpisodeSort::Normal(n)),
        EpisodeSpan::Special(label) => EpisodeRange::Single(EpisodeSort::Special(label)),
        EpisodeSpan::Range { start, end } => EpisodeRange::Range { start, end },
        EpisodeSpan::Season(number) => EpisodeRange::Season(number),
    }
}

/// One listing as a source adapter receives it, before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawItem {
    pub media_id: String,
    pub original_title: String,
    pub original_url: String,
    pub published_time: DateTime<Utc>,
    pub size: Option<u64>,
    pub subtitles: Vec<Subtitle>,
}

/// Turn a raw listing from `source_id` into a [`Media`].
pub fn enrich(
    item: RawItem,
    source_id: &str,
    kind: MediaSourceKind,
    location: MediaSourceLocation,
) -> Media {
    let Enriched {
        mut properties,
        episode_range,
    } = enrich_title(&item.original_title);
    properties.size = item.size;
    if !item.subtitles.is_empty() && properties.subtitle_kind.is_none() {
        properties.subtitle_kind = Some(SubtitleKind::ExternalProvided);
    }

    Media {
        media_id: item.media_id,
        media_source_id: source_id.to_string(),
        original_url: item.original_url,
        original_title: item.original_title,
        published_time: item.published_time,
        properties,
        episode_range,
        extra_files: MediaExtraFiles {
            subtitles: item.subtitles,
        },
        location,
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_typical_title() {
        let enriched =
            enrich_title("[LoliHouse] Sousou no Frieren - 05 [WebRip 1080p HEVC-10bit AAC][简繁内封字幕]");
        assert_eq!(enriched.properties.alliance, "LoliHouse");
        assert_eq!(enriched.properties.resolution, "1080P");
        assert_eq!(enriched.properties.subtitle_language_ids, vec!["CHS", "CHT"]);
        assert_eq!(enriched.properties.subtitle_kind, Some(SubtitleKind::Closed));
        assert_eq!(
            enriched.episode_range,
            Some(EpisodeRange::Single(EpisodeSort::Normal(5)))
        );
    }

    #[test]
    fn test_two_foreign_languages_imply_closed() {
        let enriched = enrich_title("【喵萌奶茶屋】[葬送的芙莉莲][05][1080p][简繁日]");
        assert_eq!(enriched.properties.subtitle_kind, Some(SubtitleKind::Closed));

        let single = enrich_title("【喵萌奶茶屋】[葬送的芙莉莲][05][1080p][简日双语]");
        assert_eq!(single.properties.subtitle_language_ids, vec!["CHS", "JPN"]);
        assert_eq!(single.properties.subtitle_kind, None);
    }

    #[test]
    fn test_unknown_title_degrades() {
        let enriched = enrich_title("no tags here");
        assert_eq!(enriched, Enriched::default());
    }

    #[test]
    fn test_enrich_raw_item() {
        let item = RawItem {
            media_id: "dmhy.1".into(),
            original_title: "[VCB-Studio] Sousou no Frieren [Ma10p_1080p][BDRip]".into(),
            original_url: "https://example.org/1".into(),
            published_time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            size: Some(42),
            subtitles: vec![Subtitle {
                language_id: Some("CHS".into()),
                url: "https://example.org/1.ass".into(),
            }],
        };
        let media = enrich(item, "dmhy", MediaSourceKind::BitTorrent, MediaSourceLocation::Online);
        assert_eq!(media.media_source_id, "dmhy");
        assert_eq!(media.properties.alliance, "VCB-Studio");
        assert_eq!(media.properties.size, Some(42));
        assert_eq!(media.properties.subtitle_kind, Some(SubtitleKind::ExternalProvided));
        assert_eq!(media.episode_range, Some(EpisodeRange::Season(None)));
        assert!(media.has_subtitles());
    }
}
