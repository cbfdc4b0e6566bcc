use std::sync::LazyLock;

use phf::phf_map;
use regex::Regex;

use crate::elements::{Languages, SubtitleMarker};

/// The category a keyword belongs to, determining which element it populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordKind {
    Resolution,
    Source,
    /// The title covers a whole season or collection.
    Batch,
    VideoTerm,
    AudioTerm,
    Language(Languages),
    Subtitles(SubtitleMarker),
}

/// Compile-time keyword lookup table.
/// All keys are UPPERCASE for case-insensitive matching.
pub static KEYWORDS: phf::Map<&'static str, KeywordKind> = phf_map! {
    // Resolution
    "360P" => KeywordKind::Resolution,
    "480P" => KeywordKind::Resolution,
    "720P" => KeywordKind::Resolution,
    "1080P" => KeywordKind::Resolution,
    "1440P" => KeywordKind::Resolution,
    "2160P" => KeywordKind::Resolution,
    "4320P" => KeywordKind::Resolution,
    "2K" => KeywordKind::Resolution,
    "4K" => KeywordKind::Resolution,
    "8K" => KeywordKind::Resolution,

    // Source
    "BD" => KeywordKind::Source,
    "BDRIP" => KeywordKind::Source,
    "BDREMUX" => KeywordKind::Source,
    "BLURAY" => KeywordKind::Source,
    "BLU-RAY" => KeywordKind::Source,
    "WEB" => KeywordKind::Source,
    "WEBRIP" => KeywordKind::Source,
    "WEB-DL" => KeywordKind::Source,
    "WEBDL" => KeywordKind::Source,
    "TVRIP" => KeywordKind::Source,
    "DVDRIP" => KeywordKind::Source,

    // Collections
    "BATCH" => KeywordKind::Batch,
    "COMPLETE" => KeywordKind::Batch,
    "FIN" => KeywordKind::Batch,
    "合集" => KeywordKind::Batch,
    "全集" => KeywordKind::Batch,

    // Video / audio terms
    "HEVC" => KeywordKind::VideoTerm,
    "AVC" => KeywordKind::VideoTerm,
    "X264" => KeywordKind::VideoTerm,
    "X265" => KeywordKind::VideoTerm,
    "10BIT" => KeywordKind::VideoTerm,
    "HDR" => KeywordKind::VideoTerm,
    "AAC" => KeywordKind::AudioTerm,
    "FLAC" => KeywordKind::AudioTerm,
    "OPUS" => KeywordKind::AudioTerm,

    // Languages
    "CHS" => KeywordKind::Language(Languages::CHS),
    "SC" => KeywordKind::Language(Languages::CHS),
    "GB" => KeywordKind::Language(Languages::CHS),
    "简" => KeywordKind::Language(Languages::CHS),
    "简体" => KeywordKind::Language(Languages::CHS),
    "简中" => KeywordKind::Language(Languages::CHS),
    "CHT" => KeywordKind::Language(Languages::CHT),
    "TC" => KeywordKind::Language(Languages::CHT),
    "BIG5" => KeywordKind::Language(Languages::CHT),
    "繁" => KeywordKind::Language(Languages::CHT),
    "繁体" => KeywordKind::Language(Languages::CHT),
    "繁體" => KeywordKind::Language(Languages::CHT),
    "繁中" => KeywordKind::Language(Languages::CHT),
    "JP" => KeywordKind::Language(Languages::JPN),
    "JPN" => KeywordKind::Language(Languages::JPN),
    "JPSC" => KeywordKind::Language(Languages::JPN.union(Languages::CHS)),
    "JPTC" => KeywordKind::Language(Languages::JPN.union(Languages::CHT)),
    "日" => KeywordKind::Language(Languages::JPN),
    "日语" => KeywordKind::Language(Languages::JPN),
    "ENG" => KeywordKind::Language(Languages::ENG),
    "ENGLISH" => KeywordKind::Language(Languages::ENG),
    "英" => KeywordKind::Language(Languages::ENG),

    // Subtitle delivery
    "内嵌" => KeywordKind::Subtitles(SubtitleMarker::Embedded),
    "內嵌" => KeywordKind::Subtitles(SubtitleMarker::Embedded),
    "内封" => KeywordKind::Subtitles(SubtitleMarker::Closed),
    "內封" => KeywordKind::Subtitles(SubtitleMarker::Closed),
    "外挂" => KeywordKind::Subtitles(SubtitleMarker::External),
    "外掛" => KeywordKind::Subtitles(SubtitleMarker::External),
};

/// Look up a keyword (case-insensitive).
pub fn lookup(s: &str) -> Option<KeywordKind> {
    KEYWORDS.get(s.to_uppercase().as_str()).copied()
}

/// A compact label made only of language and subtitle-delivery markers,
/// e.g. `简繁内封`, `CHS&JPN`, `简日双语`.
static RE_LANGUAGE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:简体|繁體|繁体|简中|繁中|简|繁|日语|日文|日|英|中文|中|双语|雙語|字幕|内嵌|內嵌|内封|內封|外挂|外掛|CHS|CHT|JPSC|JPTC|JPN|JP|ENG|SC|TC|GB|BIG5|[&+_,])+$",
    )
    .unwrap()
});

static RE_LANGUAGE_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)简体|繁體|繁体|简中|繁中|简|繁|日语|日|英|内嵌|內嵌|内封|內封|外挂|外掛|CHS|CHT|JPSC|JPTC|JPN|JP|ENG|SC|TC|GB|BIG5",
    )
    .unwrap()
});

/// Scan a language label. Returns `None` unless the whole text is such a label.
pub fn scan_language_label(text: &str) -> Option<(Languages, Option<SubtitleMarker>)> {
    if !RE_LANGUAGE_LABEL.is_match(text) {
        return None;
    }
    let mut languages = Languages::empty();
    let mut marker = None;
    for part in RE_LANGUAGE_PART.find_iter(text) {
        match lookup(part.as_str()) {
            Some(KeywordKind::Language(found)) => languages |= found,
            Some(KeywordKind::Subtitles(found)) => marker = marker.or(Some(found)),
            _ => {}
        }
    }
    if languages.is_empty() && marker.is_none() {
        return None;
    }
    Some((languages, marker))
}
