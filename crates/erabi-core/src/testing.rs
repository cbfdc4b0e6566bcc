//! Fixtures shared by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use crate::error::SourceError;
use crate::fetch::{MediaSource, PagedSource};
use crate::models::{
    EpisodeRange, EpisodeSort, Media, MediaExtraFiles, MediaFetchRequest, MediaProperties,
    MediaSourceKind, MediaSourceLocation, SubtitleKind,
};

pub(crate) fn request(subject_id: &str, episode_id: &str) -> MediaFetchRequest {
    MediaFetchRequest {
        subject_id: subject_id.into(),
        episode_id: episode_id.into(),
        subject_primary_name: "Sousou no Frieren".into(),
        subject_names: vec!["Sousou no Frieren".into(), "葬送的芙莉莲".into()],
        episode_sort: EpisodeSort::Normal(5),
        episode_ep: None,
        episode_name: "Phantoms of the Dead".into(),
    }
}

/// A 1080P, CHS, alliance "A" item on a web source.
pub(crate) fn media(id: &str, source: &str) -> Media {
    MediaBuilder::new(id).source(source).build()
}

pub(crate) struct MediaBuilder(Media);

impl MediaBuilder {
    pub(crate) fn new(id: &str) -> Self {
        Self(Media {
            media_id: id.into(),
            media_source_id: "web".into(),
            original_url: format!("https://example.org/{id}"),
            original_title: format!("[A] Sousou no Frieren - 05 [{id}]"),
            published_time: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            properties: MediaProperties {
                subtitle_language_ids: vec!["CHS".into()],
                resolution: "1080P".into(),
                alliance: "A".into(),
                size: None,
                subtitle_kind: None,
            },
            episode_range: Some(EpisodeRange::Single(EpisodeSort::Normal(5))),
            extra_files: MediaExtraFiles::default(),
            location: MediaSourceLocation::Online,
            kind: MediaSourceKind::Web,
        })
    }

    pub(crate) fn source(mut self, source: &str) -> Self {
        self.0.media_source_id = source.into();
        self
    }

    pub(crate) fn kind(mut self, kind: MediaSourceKind) -> Self {
        self.0.kind = kind;
        if kind == MediaSourceKind::LocalCache {
            self.0.location = MediaSourceLocation::Local;
        }
        self
    }

    pub(crate) fn resolution(mut self, resolution: &str) -> Self {
        self.0.properties.resolution = resolution.into();
        self
    }

    pub(crate) fn languages(mut self, languages: &[&str]) -> Self {
        self.0.properties.subtitle_language_ids = languages.iter().map(|l| l.to_string()).collect();
        self
    }

    pub(crate) fn alliance(mut self, alliance: &str) -> Self {
        self.0.properties.alliance = alliance.into();
        self
    }

    pub(crate) fn episode(mut self, range: Option<EpisodeRange>) -> Self {
        self.0.episode_range = range;
        self
    }

    pub(crate) fn subtitle_kind(mut self, kind: SubtitleKind) -> Self {
        self.0.properties.subtitle_kind = Some(kind);
        self
    }

    pub(crate) fn location(mut self, location: MediaSourceLocation) -> Self {
        self.0.location = location;
        self
    }

    /// Seconds after the default publish time.
    pub(crate) fn published(mut self, offset_secs: i64) -> Self {
        self.0.published_time = DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap();
        self
    }

    pub(crate) fn build(self) -> Media {
        self.0
    }
}

/// A scripted source that counts its invocations.
pub(crate) struct TestSource {
    id: String,
    kind: MediaSourceKind,
    pages: Vec<Vec<Media>>,
    fail: bool,
    gate: watch::Sender<bool>,
    calls: AtomicUsize,
}

impl TestSource {
    pub(crate) fn new(id: &str, kind: MediaSourceKind, pages: Vec<Vec<Media>>) -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            id: id.into(),
            kind,
            pages,
            fail: false,
            gate,
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn web(id: &str, pages: Vec<Vec<Media>>) -> Arc<Self> {
        Self::new(id, MediaSourceKind::Web, pages)
    }

    pub(crate) fn failing(id: &str) -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            id: id.into(),
            kind: MediaSourceKind::Web,
            pages: vec![vec![media(&format!("{id}-partial"), id)]],
            fail: true,
            gate,
            calls: AtomicUsize::new(0),
        })
    }

    /// Hold every query until [`open_gate`](Self::open_gate).
    pub(crate) fn gated(self: Arc<Self>) -> Arc<Self> {
        self.gate.send_replace(false);
        self
    }

    pub(crate) fn open_gate(&self) {
        self.gate.send_replace(true);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MediaSource for TestSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> MediaSourceKind {
        self.kind
    }

    fn fetch(&self, _request: Arc<MediaFetchRequest>) -> PagedSource {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut gate = self.gate.subscribe();
        let mut pages: Vec<Result<Vec<Media>, SourceError>> =
            self.pages.iter().cloned().map(Ok).collect();
        if self.fail {
            pages.push(Err(SourceError::Network("connection reset".into())));
        }
        stream::once(async move {
            let _ = gate.wait_for(|open| *open).await;
            stream::iter(pages)
        })
        .flatten()
        .boxed()
    }
}
