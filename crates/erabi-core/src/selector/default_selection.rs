//! Preference-driven choice of one candidate without user interaction.
//!
//! Dimensions are tried in priority order: resolution, subtitle language,
//! alliance, media source. A higher dimension is never relaxed to satisfy a
//! lower one. When no alliance matches at a given resolution and language,
//! the alliance dimension is skipped instead of trying a worse language.

use regex::Regex;
use tracing::{debug, warn};

use crate::models::{Media, MediaPreference};

use super::settings::{MediaSelectorContext, MediaSelectorSettings};

/// Everything the algorithm reads. `candidates` must already be filtered
/// and sorted.
#[derive(Debug, Clone, Copy)]
pub struct DefaultSelectionInput<'a> {
    pub candidates: &'a [Media],
    pub merged: &'a MediaPreference,
    /// Alliances in discovery order, matched against `alliance_patterns`.
    pub available_alliances: &'a [String],
    pub settings: &'a MediaSelectorSettings,
    pub context: &'a MediaSelectorContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Criterion<'a> {
    Any,
    Value(&'a str),
}

impl<'a> Criterion<'a> {
    fn narrow<'m>(self, list: &[&'m Media], field: impl Fn(&Media, &str) -> bool) -> Vec<&'m Media> {
        match self {
            Criterion::Any => list.to_vec(),
            Criterion::Value(value) => list.iter().copied().filter(|m| field(*m, value)).collect(),
        }
    }
}

/// Selected value alone, else the fallback list. Without either nothing
/// matches, and selection ends at the first candidate.
fn preferred_or_fallback<'a>(
    selected: Option<&'a String>,
    fallback: Option<&'a Vec<String>>,
) -> Vec<Criterion<'a>> {
    match selected {
        Some(value) => vec![Criterion::Value(value.as_str())],
        None => fallback
            .into_iter()
            .flatten()
            .map(|v| Criterion::Value(v.as_str()))
            .collect(),
    }
}

struct Plan<'a> {
    resolutions: Vec<Criterion<'a>>,
    languages: Vec<Criterion<'a>>,
    alliance: Option<&'a str>,
    alliance_patterns: Vec<Regex>,
    available_alliances: &'a [String],
    sources: Vec<Criterion<'a>>,
    prefer_seasons: bool,
}

impl<'a> Plan<'a> {
    fn new(input: &DefaultSelectionInput<'a>) -> Self {
        let merged = input.merged;
        let alliance_patterns = merged
            .alliance_patterns
            .iter()
            .flatten()
            .filter_map(|pattern| match Regex::new(pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "skipping invalid alliance pattern");
                    None
                }
            })
            .collect();

        let sources = match &merged.media_source_id {
            Some(id) => vec![Criterion::Value(id.as_str())],
            None => input
                .context
                .media_source_precedence
                .iter()
                .flatten()
                .map(|id| Criterion::Value(id.as_str()))
                .chain(std::iter::once(Criterion::Any))
                .collect(),
        };

        Self {
            resolutions: preferred_or_fallback(
                merged.resolution.as_ref(),
                merged.fallback_resolutions.as_ref(),
            ),
            languages: preferred_or_fallback(
                merged.subtitle_language_id.as_ref(),
                merged.fallback_subtitle_language_ids.as_ref(),
            ),
            alliance: merged.alliance.as_deref(),
            alliance_patterns,
            available_alliances: input.available_alliances,
            sources,
            prefer_seasons: input.context.subject_finished == Some(true)
                && input.settings.prefer_seasons,
        }
    }

    /// Matched lazily on every call: patterns in order, then discovery order.
    fn alliances(&self) -> Box<dyn Iterator<Item = Criterion<'a>> + '_> {
        if let Some(alliance) = self.alliance {
            return Box::new(std::iter::once(Criterion::Value(alliance)));
        }
        if self.alliance_patterns.is_empty() {
            return Box::new(std::iter::once(Criterion::Any));
        }
        let available = self.available_alliances;
        Box::new(self.alliance_patterns.iter().flat_map(move |regex| {
            available
                .iter()
                .filter(move |alliance| regex.is_match(alliance))
                .map(|alliance| Criterion::Value(alliance.as_str()))
        }))
    }

    fn pick<'m>(&self, list: &[&'m Media]) -> Option<&'m Media> {
        if self.prefer_seasons {
            // A precise single-episode match beats a bulk download.
            if let Some(media) = list.iter().find(|m| !is_season_pack(m)) {
                return Some(*media);
            }
        }
        list.first().copied()
    }

    fn pick_by_source<'m>(&self, list: &[&'m Media]) -> Option<&'m Media> {
        self.sources.iter().find_map(|source| {
            let narrowed = source.narrow(list, |m, id| m.media_source_id == id);
            self.pick(&narrowed)
        })
    }

    fn select(&self, candidates: &[&'a Media]) -> Option<&'a Media> {
        for resolution in &self.resolutions {
            let by_resolution = resolution.narrow(candidates, |m, r| m.properties.resolution == r);
            if by_resolution.is_empty() {
                continue;
            }

            for language in &self.languages {
                let by_language = language.narrow(&by_resolution, |m, l| {
                    m.properties.subtitle_language_ids.iter().any(|id| id == l)
                });
                if by_language.is_empty() {
                    continue;
                }

                for alliance in self.alliances() {
                    let by_alliance = alliance.narrow(&by_language, |m, a| m.properties.alliance == a);
                    if by_alliance.is_empty() {
                        continue;
                    }
                    if let Some(media) = self.pick_by_source(&by_alliance) {
                        return Some(media);
                    }
                }

                // No alliance matched; keep this language rather than trying a worse one.
                if let Some(media) = self.pick_by_source(&by_language) {
                    return Some(media);
                }
            }
        }
        None
    }
}

fn is_season_pack(media: &Media) -> bool {
    media.episode_range.as_ref().is_some_and(|r| r.has_season())
}

/// Choose one item from `input.candidates`, or `None` when there are none.
pub fn select_default(input: &DefaultSelectionInput<'_>) -> Option<Media> {
    let plan = Plan::new(input);
    let all: Vec<&Media> = input.candidates.iter().collect();

    if let Some(kind) = input.settings.prefer_kind {
        let of_kind: Vec<&Media> = all.iter().copied().filter(|m| m.kind == kind).collect();
        if let Some(media) = plan.select(&of_kind) {
            debug!(media = %media.media_id, %kind, "default selection matched preferred kind");
            return Some(media.clone());
        }
    }

    if plan.prefer_seasons {
        let seasons: Vec<&Media> = all.iter().copied().filter(|m| is_season_pack(m)).collect();
        if let Some(media) = plan.select(&seasons) {
            debug!(media = %media.media_id, "default selection matched season pack");
            return Some(media.clone());
        }
    }

    if let Some(media) = plan.select(&all) {
        debug!(media = %media.media_id, "default selection matched preference");
        return Some(media.clone());
    }

    let fallback = plan.pick(&all)?;
    debug!(media = %fallback.media_id, "default selection fell back to first candidate");
    Some(fallback.clone())
}
