use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{MediaSourceKind, SubtitleKind};

/// User settings that shape the hard filter and default selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSelectorSettings {
    /// For finished subjects, hide BitTorrent items covering a single episode.
    pub hide_single_episode_for_completed: bool,
    /// For finished subjects, try season packs first when selecting by default.
    pub prefer_seasons: bool,
    /// Try this kind first when selecting by default.
    pub prefer_kind: Option<MediaSourceKind>,
}

impl Default for MediaSelectorSettings {
    fn default() -> Self {
        Self {
            hide_single_episode_for_completed: true,
            prefer_seasons: true,
            prefer_kind: None,
        }
    }
}

/// How items with a given subtitle kind are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleKindPreference {
    #[default]
    Normal,
    /// Shown, but sorted after everything else.
    LowPriority,
    /// Removed by the hard filter.
    Hide,
}

/// Display rule per subtitle kind; unlisted kinds are `Normal`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleKindPreferences {
    rules: HashMap<SubtitleKind, SubtitleKindPreference>,
}

impl SubtitleKindPreferences {
    /// Rules for the platform this binary was built for.
    pub fn platform_default() -> Self {
        Self::for_platform(cfg!(target_os = "macos"))
    }

    /// The macOS player cannot load subtitle files supplied by the source.
    pub fn for_platform(macos: bool) -> Self {
        let external_provided = if macos {
            SubtitleKindPreference::Hide
        } else {
            SubtitleKindPreference::Normal
        };
        Self::default()
            .with(SubtitleKind::ExternalDiscover, SubtitleKindPreference::Hide)
            .with(SubtitleKind::ClosedOrExternalDiscover, SubtitleKindPreference::LowPriority)
            .with(SubtitleKind::ExternalProvided, external_provided)
    }

    pub fn with(mut self, kind: SubtitleKind, preference: SubtitleKindPreference) -> Self {
        self.rules.insert(kind, preference);
        self
    }

    pub fn get(&self, kind: SubtitleKind) -> SubtitleKindPreference {
        self.rules.get(&kind).copied().unwrap_or_default()
    }
}

/// Per-subject facts the selector needs. `None` fields are not loaded yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSelectorContext {
    /// Whether the subject has finished airing.
    pub subject_finished: Option<bool>,
    /// Source ids in tie-break order for default selection.
    pub media_source_precedence: Option<Vec<String>>,
    pub subtitle_preferences: Option<SubtitleKindPreferences>,
}

impl MediaSelectorContext {
    pub fn all_fields_loaded(&self) -> bool {
        self.subject_finished.is_some()
            && self.media_source_precedence.is_some()
            && self.subtitle_preferences.is_some()
    }

    /// Rule for `kind`, or `Normal` when none apply.
    pub fn subtitle_preference(&self, kind: Option<SubtitleKind>) -> SubtitleKindPreference {
        match (&self.subtitle_preferences, kind) {
            (Some(prefs), Some(kind)) => prefs.get(kind),
            _ => SubtitleKindPreference::Normal,
        }
    }
}
