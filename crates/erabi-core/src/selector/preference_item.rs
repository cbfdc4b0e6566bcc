use std::fmt;

use crate::models::{Media, MediaPreference, OptionalPreference};

use super::filter::by_resolution_desc;
use super::MediaSelector;

/// One selectable dimension of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceDimension {
    Alliance,
    Resolution,
    SubtitleLanguage,
    MediaSource,
}

impl PreferenceDimension {
    /// Also the order in which preferences are relaxed.
    pub const ALL: [PreferenceDimension; 4] = [
        Self::Alliance,
        Self::Resolution,
        Self::SubtitleLanguage,
        Self::MediaSource,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Alliance => 0,
            Self::Resolution => 1,
            Self::SubtitleLanguage => 2,
            Self::MediaSource => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Alliance => "alliance",
            Self::Resolution => "resolution",
            Self::SubtitleLanguage => "subtitle_language",
            Self::MediaSource => "media_source",
        }
    }

    pub(crate) fn field(self, preference: &MediaPreference) -> Option<&String> {
        match self {
            Self::Alliance => preference.alliance.as_ref(),
            Self::Resolution => preference.resolution.as_ref(),
            Self::SubtitleLanguage => preference.subtitle_language_id.as_ref(),
            Self::MediaSource => preference.media_source_id.as_ref(),
        }
    }

    pub(crate) fn set_field(self, preference: &mut MediaPreference, value: Option<String>) {
        match self {
            Self::Alliance => preference.alliance = value,
            Self::Resolution => preference.resolution = value,
            Self::SubtitleLanguage => preference.subtitle_language_id = value,
            Self::MediaSource => preference.media_source_id = value,
        }
    }

    /// Distinct non-empty values in discovery order; resolutions best first.
    pub(crate) fn available_in(self, list: &[Media]) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        let mut push = |value: &str| {
            if !value.is_empty() && !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        };
        for media in list {
            match self {
                Self::Alliance => push(&media.properties.alliance),
                Self::Resolution => push(&media.properties.resolution),
                Self::SubtitleLanguage => media
                    .properties
                    .subtitle_language_ids
                    .iter()
                    .for_each(|id| push(id)),
                Self::MediaSource => push(&media.media_source_id),
            }
        }
        if self == Self::Resolution {
            values.sort_by(|a, b| by_resolution_desc(a, b));
        }
        values
    }
}

impl fmt::Display for PreferenceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A view of one dimension of a [`MediaSelector`].
///
/// Three layers are merged: the in-memory override set through this handle,
/// the saved user preference for the subject, and the saved default.
#[derive(Clone, Copy)]
pub struct MediaPreferenceItem<'a> {
    selector: &'a MediaSelector,
    dimension: PreferenceDimension,
}

impl<'a> MediaPreferenceItem<'a> {
    pub(crate) fn new(selector: &'a MediaSelector, dimension: PreferenceDimension) -> Self {
        Self { selector, dimension }
    }

    pub fn dimension(&self) -> PreferenceDimension {
        self.dimension
    }

    /// Values present in the current media list.
    pub fn available(&self) -> Vec<String> {
        self.dimension.available_in(&self.selector.media_list())
    }

    /// The override if set, else the saved user preference.
    pub fn user_selected(&self) -> OptionalPreference<String> {
        self.selector.inputs.user_selected(self.dimension)
    }

    pub fn default_selected(&self) -> Option<String> {
        self.selector.inputs.default_selected(self.dimension)
    }

    /// Effective value. Not necessarily one of [`available`](Self::available).
    pub fn final_selected(&self) -> Option<String> {
        self.selector.inputs.final_selected(self.dimension)
    }

    pub fn prefer(&self, value: impl Into<String>) {
        self.prefer_without_broadcast(value.into());
        self.selector.broadcast_change_preference();
    }

    /// Prefer "any value", hiding older saved choices for this dimension.
    pub fn remove_preference(&self) {
        self.set_override(OptionalPreference::PreferNoValue);
        self.selector.broadcast_change_preference();
    }

    pub(crate) fn prefer_without_broadcast(&self, value: String) {
        self.set_override(OptionalPreference::PreferValue(value));
    }

    fn set_override(&self, value: OptionalPreference<String>) {
        self.selector.overrides[self.dimension.index()].send_replace(value);
    }
}

impl fmt::Debug for MediaPreferenceItem<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPreferenceItem")
            .field("dimension", &self.dimension)
            .field("final_selected", &self.final_selected())
            .finish()
    }
}
