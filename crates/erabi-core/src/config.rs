use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ErabiError;
use crate::models::{MediaPreference, SubtitleKind};
use crate::selector::{MediaSelectorSettings, SubtitleKindPreference, SubtitleKindPreferences};

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub selector: MediaSelectorSettings,
    /// The global default media preference.
    pub preference: MediaPreference,
    #[serde(default)]
    pub subtitles: SubtitleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Cooldown before unobserved queries are torn down. 0 tears down immediately.
    pub stop_timeout_secs: u64,
}

/// Per-kind overrides of the platform's subtitle display rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub embedded: Option<SubtitleKindPreference>,
    pub closed: Option<SubtitleKindPreference>,
    pub external_provided: Option<SubtitleKindPreference>,
    pub external_discover: Option<SubtitleKindPreference>,
    pub closed_or_external_discover: Option<SubtitleKindPreference>,
}

impl SubtitleConfig {
    /// Platform defaults with the configured overrides applied.
    pub fn preferences(&self) -> SubtitleKindPreferences {
        let overrides = [
            (SubtitleKind::Embedded, self.embedded),
            (SubtitleKind::Closed, self.closed),
            (SubtitleKind::ExternalProvided, self.external_provided),
            (SubtitleKind::ExternalDiscover, self.external_discover),
            (SubtitleKind::ClosedOrExternalDiscover, self.closed_or_external_discover),
        ];
        overrides
            .into_iter()
            .fold(SubtitleKindPreferences::platform_default(), |prefs, (kind, pref)| match pref {
                Some(pref) => prefs.with(kind, pref),
                None => prefs,
            })
    }
}

impl AppConfig {
    /// Load config: user file (if exists) over built-in defaults.
    pub fn load() -> Result<Self, ErabiError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            Self::load_from(&user_path)
        } else {
            toml::from_str(DEFAULT_CONFIG).map_err(|e| ErabiError::Config(e.to_string()))
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ErabiError> {
        debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ErabiError::Config(format!("{}: {e}", path.display())))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), ErabiError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ErabiError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| ErabiError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "erabi")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaSourceKind;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert_eq!(config.fetch.stop_timeout_secs, 5);
        assert!(config.selector.hide_single_episode_for_completed);
        assert!(config.selector.prefer_seasons);
        assert_eq!(config.selector.prefer_kind, None);
        assert_eq!(
            config.preference.fallback_resolutions.as_deref(),
            Some(&["2160P".to_string(), "1440P".into(), "1080P".into(), "720P".into()][..])
        );
        assert!(!config.preference.show_without_subtitle);
    }

    #[test]
    fn test_roundtrip() {
        let mut config = AppConfig::default();
        config.selector.prefer_kind = Some(MediaSourceKind::BitTorrent);
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.selector.prefer_kind, Some(MediaSourceKind::BitTorrent));
        assert_eq!(deserialized.fetch.stop_timeout_secs, config.fetch.stop_timeout_secs);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.fetch.stop_timeout_secs = 0;
        config.subtitles.closed = Some(SubtitleKindPreference::LowPriority);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.fetch.stop_timeout_secs, 0);
        assert_eq!(
            loaded.subtitles.preferences().get(SubtitleKind::Closed),
            SubtitleKindPreference::LowPriority
        );
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[fetch]\nstop_timeout_secs = \"soon\"\n").unwrap();
        match AppConfig::load_from(&path) {
            Err(ErabiError::Config(msg)) => assert!(msg.contains("config.toml")),
            other => panic!("Expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn test_subtitle_overrides() {
        let config = SubtitleConfig {
            external_discover: Some(SubtitleKindPreference::Normal),
            ..Default::default()
        };
        let prefs = config.preferences();
        assert_eq!(prefs.get(SubtitleKind::ExternalDiscover), SubtitleKindPreference::Normal);
        assert_eq!(
            prefs.get(SubtitleKind::ClosedOrExternalDiscover),
            SubtitleKindPreference::LowPriority
        );
    }
}
