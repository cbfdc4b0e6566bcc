use std::sync::LazyLock;

use regex::Regex;

use crate::elements::EpisodeSpan;

/// What a single token says about episode coverage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extracted {
    /// An explicit episode marker: `第05话`, `S01E05`, `01-12`, `SP2`.
    Episode(EpisodeSpan),
    /// A bare number that may or may not be an episode.
    Plain(u32),
    /// A season marker: `S2`, `第二季`.
    Season(u32),
}

static RE_SEASON_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^S(\d{1,2})E(\d{1,4})(?:v\d)?$").unwrap());

static RE_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^S(\d{1,2})$").unwrap());

static RE_CJK_SEASON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^第([0-9一二三四五六七八九十]{1,3})[季期]$").unwrap());

static RE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{1,4})\s*[-~]\s*(\d{1,4})(?:\s*(?:FIN|END|合集|全集|\+.*))?$").unwrap()
});

static RE_MARKED_SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:第\s*(\d{1,4})\s*[话話集]?|(?:EP?|#)\s*(\d{1,4})|(\d{1,4})(?:v\d)?\s*(?:[话話集]|END|完))$")
        .unwrap()
});

static RE_PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d{1,4})(?:\.5)?(?:v\d)?$").unwrap());

static RE_SPECIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(SP|OVA|OAD|ONA|特别篇|特別篇|番外)\s*(\d{0,2})$").unwrap()
});

/// Classify one token, returning `None` when it says nothing about episodes.
pub fn try_extract(text: &str) -> Option<Extracted> {
    let text = text.trim();
    if text.is_empty() || is_year_like(text) {
        return None;
    }

    if let Some(caps) = RE_SEASON_EPISODE.captures(text) {
        let episode = caps[2].parse().ok()?;
        return Some(Extracted::Episode(EpisodeSpan::Single(episode)));
    }
    if let Some(caps) = RE_SEASON.captures(text) {
        return caps[1].parse().ok().map(Extracted::Season);
    }
    if let Some(caps) = RE_CJK_SEASON.captures(text) {
        return cjk_number(&caps[1]).map(Extracted::Season);
    }
    if let Some(caps) = RE_RANGE.captures(text) {
        let start: u32 = caps[1].parse().ok()?;
        let end: u32 = caps[2].parse().ok()?;
        return range(start, end).map(Extracted::Episode);
    }
    if let Some(caps) = RE_MARKED_SINGLE.captures(text) {
        let number = caps
            .iter()
            .skip(1)
            .flatten()
            .next()
            .and_then(|m| m.as_str().parse().ok())?;
        return Some(Extracted::Episode(EpisodeSpan::Single(number)));
    }
    if let Some(caps) = RE_SPECIAL.captures(text) {
        let label = format!("{}{}", caps[1].to_uppercase(), &caps[2]);
        return Some(Extracted::Episode(EpisodeSpan::Special(label)));
    }
    if let Some(caps) = RE_PLAIN.captures(text) {
        return caps[1].parse().ok().map(Extracted::Plain);
    }
    None
}

/// Build a range span; a degenerate `05-05` collapses to a single episode.
pub fn range(start: u32, end: u32) -> Option<EpisodeSpan> {
    match start.cmp(&end) {
        std::cmp::Ordering::Less => Some(EpisodeSpan::Range { start, end }),
        std::cmp::Ordering::Equal => Some(EpisodeSpan::Single(start)),
        std::cmp::Ordering::Greater => None,
    }
}

fn is_year_like(s: &str) -> bool {
    s.len() == 4 && (s.starts_with("19") || s.starts_with("20")) && s.parse::<u32>().is_ok()
}

fn cjk_number(s: &str) -> Option<u32> {
    if let Ok(n) = s.parse() {
        return Some(n);
    }
    const DIGITS: [char; 9] = ['一', '二', '三', '四', '五', '六', '七', '八', '九'];
    let digit = |c: char| DIGITS.iter().position(|d| *d == c).map(|p| p as u32 + 1);
    let chars: Vec<char> = s.chars().collect();
    match chars.as_slice() {
        ['十'] => Some(10),
        [d] => digit(*d),
        ['十', d] => digit(*d).map(|n| 10 + n),
        [d, '十'] => digit(*d).map(|n| n * 10),
        [d, '十', e] => Some(digit(*d)? * 10 + digit(*e)?),
        _ => None,
    }
}
