use serde::{Deserialize, Serialize};

/// Preferred values for each selectable dimension, plus ordered fallbacks.
///
/// Two copies are persisted: the global default and the per-subject saved
/// user preference. `None` means "no preference" for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaPreference {
    pub alliance: Option<String>,
    /// Regular expressions tried in order against the available alliances
    /// when no alliance is selected.
    pub alliance_patterns: Option<Vec<String>>,
    pub resolution: Option<String>,
    /// Most preferred first.
    pub fallback_resolutions: Option<Vec<String>>,
    pub subtitle_language_id: Option<String>,
    pub fallback_subtitle_language_ids: Option<Vec<String>>,
    pub media_source_id: Option<String>,
    pub show_without_subtitle: bool,
}

/// A tri-state preference: unset, a concrete value, or explicitly "any".
///
/// `PreferNoValue` is distinct from `NoPreference`: it stops the lookup from
/// falling back to an older saved value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OptionalPreference<T> {
    #[default]
    NoPreference,
    PreferValue(T),
    PreferNoValue,
}

impl<T> OptionalPreference<T> {
    /// `PreferValue` when `value` is present, otherwise `NoPreference`.
    pub fn prefer_if_some(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::PreferValue(v),
            None => Self::NoPreference,
        }
    }

    /// Keep `self` unless it is `NoPreference`.
    pub fn or_else_preference(self, f: impl FnOnce() -> Self) -> Self {
        match self {
            Self::NoPreference => f(),
            other => other,
        }
    }

    /// Resolve to a concrete value, consulting `default` only when unset.
    pub fn or_default_value(self, default: impl FnOnce() -> Option<T>) -> Option<T> {
        match self {
            Self::PreferValue(v) => Some(v),
            Self::PreferNoValue => None,
            Self::NoPreference => default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_preference_resolution() {
        let unset: OptionalPreference<&str> = OptionalPreference::NoPreference;
        assert_eq!(unset.or_default_value(|| Some("d")), Some("d"));
        assert_eq!(
            OptionalPreference::PreferValue("v").or_default_value(|| Some("d")),
            Some("v")
        );
        assert_eq!(
            OptionalPreference::<&str>::PreferNoValue.or_default_value(|| Some("d")),
            None
        );
        let fallen = OptionalPreference::NoPreference
            .or_else_preference(|| OptionalPreference::prefer_if_some(Some("saved")));
        assert_eq!(fallen, OptionalPreference::PreferValue("saved"));
    }

    #[test]
    fn test_preference_toml_roundtrip() {
        let pref = MediaPreference {
            fallback_resolutions: Some(vec!["1080P".into(), "720P".into()]),
            alliance_patterns: Some(vec!["^LoliHouse$".into()]),
            ..Default::default()
        };
        let text = toml::to_string(&pref).unwrap();
        let back: MediaPreference = toml::from_str(&text).unwrap();
        assert_eq!(back, pref);
    }
}
