//! Hard filter, candidate filter and ordering over a media list.
//!
//! The hard filter applies settings the user cannot override per subject
//! (hiding raw releases, single episodes of finished subjects, hidden
//! subtitle kinds). The candidate filter applies the merged preference.
//! Local cache items pass both so default selection can still prefer them.

use std::cmp::Ordering;

use crate::models::resolution::resolution_rank;
use crate::models::{Media, MediaPreference, MediaSourceKind};

use super::settings::{MediaSelectorContext, MediaSelectorSettings, SubtitleKindPreference};

/// Drop items the settings hide. Order is preserved.
pub fn filter_media_list(
    list: &[Media],
    preference: &MediaPreference,
    settings: &MediaSelectorSettings,
    context: &MediaSelectorContext,
) -> Vec<Media> {
    list.iter()
        .filter(|media| passes_hard_filter(media, preference, settings, context))
        .cloned()
        .collect()
}

fn passes_hard_filter(
    media: &Media,
    preference: &MediaPreference,
    settings: &MediaSelectorSettings,
    context: &MediaSelectorContext,
) -> bool {
    if media.is_local_cache() {
        return true;
    }

    // Unknown completion shows everything until the subject is loaded.
    if settings.hide_single_episode_for_completed
        && context.subject_finished == Some(true)
        && media.kind == MediaSourceKind::BitTorrent
    {
        match &media.episode_range {
            Some(range) if !range.is_single_episode() => {}
            _ => return false,
        }
    }

    if !preference.show_without_subtitle && !media.has_subtitles() {
        return false;
    }

    context.subtitle_preference(media.properties.subtitle_kind) != SubtitleKindPreference::Hide
}

/// Stable sort: low-priority subtitle kinds last, then cheapest download,
/// then newest first.
pub fn sort_media(list: &mut [Media], context: &MediaSelectorContext) {
    let low_priority = |media: &Media| {
        context.subtitle_preference(media.properties.subtitle_kind)
            == SubtitleKindPreference::LowPriority
    };
    list.sort_by(|a, b| {
        low_priority(a)
            .cmp(&low_priority(b))
            .then_with(|| a.cost_for_download().cmp(&b.cost_for_download()))
            .then_with(|| b.published_time.cmp(&a.published_time))
    });
}

/// Keep items matching every set dimension of `merged`. An unset dimension
/// matches anything.
pub fn filter_candidates(list: &[Media], merged: &MediaPreference) -> Vec<Media> {
    list.iter()
        .filter(|media| is_candidate(media, merged))
        .cloned()
        .collect()
}

fn is_candidate(media: &Media, merged: &MediaPreference) -> bool {
    if media.is_local_cache() {
        return true;
    }
    let props = &media.properties;
    matches(merged.alliance.as_deref(), &props.alliance)
        && matches(merged.resolution.as_deref(), &props.resolution)
        && merged
            .subtitle_language_id
            .as_deref()
            .map_or(true, |id| props.subtitle_language_ids.iter().any(|l| l == id))
        && matches(merged.media_source_id.as_deref(), &media.media_source_id)
}

fn matches(preferred: Option<&str>, actual: &str) -> bool {
    preferred.map_or(true, |p| p == actual)
}

/// Compare two resolution labels best-first; equal ranks keep their order.
pub(crate) fn by_resolution_desc(a: &str, b: &str) -> Ordering {
    resolution_rank(b).cmp(&resolution_rank(a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EpisodeRange, MediaSourceLocation, Subtitle, SubtitleKind};
    use crate::selector::settings::SubtitleKindPreferences;
    use crate::testing::MediaBuilder;

    fn finished_context() -> MediaSelectorContext {
        MediaSelectorContext {
            subject_finished: Some(true),
            media_source_precedence: Some(vec![]),
            subtitle_preferences: Some(SubtitleKindPreferences::for_platform(false)),
        }
    }

    fn ids(list: &[Media]) -> Vec<&str> {
        list.iter().map(|m| m.media_id.as_str()).collect()
    }

    #[test]
    fn test_hides_single_episode_torrents_for_finished_subject() {
        let list = vec![
            MediaBuilder::new("single").kind(MediaSourceKind::BitTorrent).build(),
            MediaBuilder::new("unknown")
                .kind(MediaSourceKind::BitTorrent)
                .episode(None)
                .build(),
            MediaBuilder::new("pack")
                .kind(MediaSourceKind::BitTorrent)
                .episode(Some(EpisodeRange::Range { start: 1, end: 12 }))
                .build(),
            MediaBuilder::new("web-single").build(),
            MediaBuilder::new("cached")
                .kind(MediaSourceKind::LocalCache)
                .episode(None)
                .build(),
        ];
        let settings = MediaSelectorSettings::default();
        let pref = MediaPreference::default();

        let filtered = filter_media_list(&list, &pref, &settings, &finished_context());
        assert_eq!(ids(&filtered), vec!["pack", "web-single", "cached"]);

        let airing = MediaSelectorContext {
            subject_finished: Some(false),
            ..finished_context()
        };
        assert_eq!(filter_media_list(&list, &pref, &settings, &airing).len(), 5);

        let unloaded = MediaSelectorContext::default();
        assert_eq!(filter_media_list(&list, &pref, &settings, &unloaded).len(), 5);
    }

    #[test]
    fn test_hides_items_without_subtitles() {
        let mut with_file = MediaBuilder::new("file").languages(&[]).build();
        with_file.extra_files.subtitles.push(Subtitle {
            language_id: None,
            url: "https://example.org/file.ass".into(),
        });
        let list = vec![
            MediaBuilder::new("raw").languages(&[]).build(),
            with_file,
            MediaBuilder::new("raw-cached")
                .languages(&[])
                .kind(MediaSourceKind::LocalCache)
                .build(),
        ];
        let settings = MediaSelectorSettings::default();
        let context = finished_context();

        let filtered = filter_media_list(&list, &MediaPreference::default(), &settings, &context);
        assert_eq!(ids(&filtered), vec!["file", "raw-cached"]);

        let show_all = MediaPreference {
            show_without_subtitle: true,
            ..Default::default()
        };
        assert_eq!(filter_media_list(&list, &show_all, &settings, &context).len(), 3);
    }

    #[test]
    fn test_hides_subtitle_kind() {
        let list = vec![
            MediaBuilder::new("discover")
                .subtitle_kind(SubtitleKind::ExternalDiscover)
                .build(),
            MediaBuilder::new("closed").subtitle_kind(SubtitleKind::Closed).build(),
        ];
        let filtered = filter_media_list(
            &list,
            &MediaPreference::default(),
            &MediaSelectorSettings::default(),
            &finished_context(),
        );
        assert_eq!(ids(&filtered), vec!["closed"]);
    }

    #[test]
    fn test_sort_order() {
        let mut list = vec![
            MediaBuilder::new("old-online").published(0).build(),
            MediaBuilder::new("low-priority")
                .subtitle_kind(SubtitleKind::ClosedOrExternalDiscover)
                .location(MediaSourceLocation::Local)
                .published(500)
                .build(),
            MediaBuilder::new("new-online").published(100).build(),
            MediaBuilder::new("lan").location(MediaSourceLocation::Lan).build(),
            MediaBuilder::new("local").kind(MediaSourceKind::LocalCache).build(),
        ];
        sort_media(&mut list, &finished_context());
        assert_eq!(
            ids(&list),
            vec!["local", "lan", "new-online", "old-online", "low-priority"]
        );
    }

    #[test]
    fn test_candidates_match_merged_preference() {
        let list = vec![
            MediaBuilder::new("a-1080").build(),
            MediaBuilder::new("b-1080").alliance("B").build(),
            MediaBuilder::new("a-720").resolution("720P").build(),
            MediaBuilder::new("a-cht").languages(&["CHT", "JPN"]).build(),
            MediaBuilder::new("cached")
                .alliance("Z")
                .kind(MediaSourceKind::LocalCache)
                .build(),
        ];
        let merged = MediaPreference {
            alliance: Some("A".into()),
            resolution: Some("1080P".into()),
            subtitle_language_id: Some("CHS".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_candidates(&list, &merged)), vec!["a-1080", "cached"]);

        let any = MediaPreference::default();
        assert_eq!(filter_candidates(&list, &any).len(), 5);

        let cht = MediaPreference {
            subtitle_language_id: Some("CHT".into()),
            media_source_id: Some("web".into()),
            ..Default::default()
        };
        assert_eq!(ids(&filter_candidates(&list, &cht)), vec!["a-cht", "cached"]);
    }
}
