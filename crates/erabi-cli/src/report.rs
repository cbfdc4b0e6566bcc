use std::fmt;

use erabi_core::enrich::enrich_title;
use erabi_core::fetch::MediaFetchSession;
use erabi_core::models::{EpisodeRange, Media, MediaPreference, MediaProperties, MediaSourceKind};
use erabi_core::selector::MediaSelector;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub id: String,
    pub kind: MediaSourceKind,
    pub state: String,
    pub generation: u64,
    pub items: usize,
}

/// Outcome of one fetch-and-select run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub sources: Vec<SourceReport>,
    pub preference: MediaPreference,
    pub candidates: Vec<Media>,
    pub selected: Option<Media>,
}

impl Report {
    pub fn new(session: &MediaFetchSession, selector: &MediaSelector) -> Self {
        Self {
            sources: session
                .results_per_source()
                .iter()
                .map(|result| SourceReport {
                    id: result.source_id().to_string(),
                    kind: result.kind(),
                    state: result.state_now().to_string(),
                    generation: result.generation(),
                    items: result.latest().len(),
                })
                .collect(),
            preference: selector.merged_preference(),
            candidates: selector.filtered_candidates_now(),
            selected: selector.selected_now(),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sources:")?;
        for s in &self.sources {
            writeln!(f, "  {:<16} {:<12} {:>4} items  {}", s.id, s.kind.as_str(), s.items, s.state)?;
        }
        writeln!(f, "candidates: {}", self.candidates.len())?;
        for media in &self.candidates {
            let marker = match &self.selected {
                Some(selected) if selected.media_id == media.media_id => '*',
                _ => ' ',
            };
            writeln!(f, "  {marker} [{}] {}", media.media_source_id, media.original_title)?;
        }
        match &self.selected {
            Some(media) => writeln!(f, "selected: {} ({})", media.media_id, media.original_url),
            None => writeln!(f, "selected: none"),
        }
    }
}

/// What the parser recognized in one title.
#[derive(Debug, Serialize)]
pub struct TitleReport {
    pub title: String,
    pub properties: MediaProperties,
    pub episode_range: Option<EpisodeRange>,
}

impl TitleReport {
    pub fn new(title: &str) -> Self {
        let enriched = enrich_title(title);
        Self {
            title: title.to_string(),
            properties: enriched.properties,
            episode_range: enriched.episode_range,
        }
    }
}

impl fmt::Display for TitleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.properties;
        writeln!(f, "{}", self.title)?;
        writeln!(f, "  alliance:   {}", p.alliance)?;
        writeln!(f, "  resolution: {}", p.resolution)?;
        writeln!(f, "  languages:  {}", p.subtitle_language_ids.join(", "))?;
        writeln!(f, "  subtitles:  {:?}", p.subtitle_kind)?;
        writeln!(f, "  episodes:   {:?}", self.episode_range)
    }
}
