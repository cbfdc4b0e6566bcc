//! Scripted media sources loaded from a TOML file.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use erabi_core::enrich::{enrich, RawItem};
use erabi_core::fetch::{MediaSource, MediaSourceInfo, MediaSourceInstance, PagedSource};
use erabi_core::models::{
    Media, MediaFetchRequest, MediaSourceKind, MediaSourceLocation, Subtitle,
};
use erabi_core::SourceError;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::error::CliError;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    /// Shown in the request; defaults to the subject id.
    pub subject_name: Option<String>,
    /// Whether the subject has finished airing.
    #[serde(default)]
    pub subject_finished: bool,
    #[serde(default)]
    pub sources: Vec<SourceFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceFixture {
    pub id: String,
    pub kind: MediaSourceKind,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub location: MediaSourceLocation,
    pub description: Option<String>,
    /// Delay before each page, in milliseconds.
    #[serde(default)]
    pub delay_ms: u64,
    /// Items per page; everything on one page when unset.
    pub page_size: Option<usize>,
    /// Fail with a network error after the last page.
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub items: Vec<ItemFixture>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemFixture {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub published: DateTime<Utc>,
    pub size: Option<u64>,
    #[serde(default)]
    pub subtitles: Vec<SubtitleFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleFixture {
    pub language: Option<String>,
    pub url: String,
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let content = std::fs::read_to_string(path).map_err(|source| CliError::FixtureIo {
            path: path.to_path_buf(),
            source,
        })?;
        let fixture: Fixture = toml::from_str(&content).map_err(|source| CliError::FixtureParse {
            path: path.to_path_buf(),
            source,
        })?;

        let mut seen = HashSet::new();
        for source in &fixture.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(CliError::DuplicateSource {
                    path: path.to_path_buf(),
                    id: source.id.clone(),
                });
            }
        }
        debug!(path = %path.display(), sources = fixture.sources.len(), "fixture loaded");
        Ok(fixture)
    }

    /// Source ids in file order.
    pub fn precedence(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.id.clone()).collect()
    }

    pub fn instances(&self) -> Vec<MediaSourceInstance> {
        self.sources
            .iter()
            .map(|source| {
                let enabled = source.enabled;
                let source: Arc<dyn MediaSource> = Arc::new(FixtureSource(source.clone()));
                MediaSourceInstance::new(source, enabled)
            })
            .collect()
    }
}

/// Serves the items of one [`SourceFixture`] that cover the requested episode.
struct FixtureSource(SourceFixture);

impl FixtureSource {
    fn media(&self, item: &ItemFixture) -> Media {
        let raw = RawItem {
            media_id: item.id.clone(),
            original_title: item.title.clone(),
            original_url: item
                .url
                .clone()
                .unwrap_or_else(|| format!("fixture://{}/{}", self.0.id, item.id)),
            published_time: item.published,
            size: item.size,
            subtitles: item
                .subtitles
                .iter()
                .map(|s| Subtitle {
                    language_id: s.language.clone(),
                    url: s.url.clone(),
                })
                .collect(),
        };
        enrich(raw, &self.0.id, self.0.kind, self.0.location)
    }
}

impl MediaSource for FixtureSource {
    fn id(&self) -> &str {
        &self.0.id
    }

    fn kind(&self) -> MediaSourceKind {
        self.0.kind
    }

    fn info(&self) -> MediaSourceInfo {
        MediaSourceInfo {
            description: self.0.description.clone(),
            ..MediaSourceInfo::named(&self.0.id)
        }
    }

    fn fetch(&self, request: Arc<MediaFetchRequest>) -> PagedSource {
        let matching: Vec<Media> = self
            .0
            .items
            .iter()
            .map(|item| self.media(item))
            .filter(|media| {
                media
                    .episode_range
                    .as_ref()
                    .map_or(true, |range| range.contains(&request.episode_sort))
            })
            .collect();
        let page_size = self.0.page_size.unwrap_or(matching.len()).max(1);
        let mut pages: Vec<Result<Vec<Media>, SourceError>> =
            matching.chunks(page_size).map(|page| Ok(page.to_vec())).collect();
        if self.0.fail {
            pages.push(Err(SourceError::Network(format!(
                "{}: connection reset",
                self.0.id
            ))));
        }

        let delay = Duration::from_millis(self.0.delay_ms);
        stream::iter(pages)
            .then(move |page| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                page
            })
            .boxed()
    }
}
