mod episode;

use crate::elements::{Elements, EpisodeSpan};
use crate::keyword::{self, KeywordKind};
use crate::tokenizer::{self, Token, TokenKind};

use self::episode::Extracted;

/// Parse a release title into its component elements.
///
/// # Example
/// ```
/// let result = erabi_parse::parse("[LoliHouse] Sousou no Frieren - 05 [WebRip 1080p HEVC-10bit AAC][简繁内封字幕]");
/// assert_eq!(result.alliance.as_deref(), Some("LoliHouse"));
/// assert_eq!(result.resolution.as_deref(), Some("1080P"));
/// assert_eq!(result.episode, Some(erabi_parse::EpisodeSpan::Single(5)));
/// assert_eq!(result.languages.ids(), vec!["CHS", "CHT"]);
/// ```
pub fn parse(title: &str) -> Elements {
    let (tokens, _extension) = tokenizer::tokenize(title);
    let mut elements = Elements::default();
    let mut identified = vec![false; tokens.len()];
    let mut batch = false;

    // Pass 1: Tags inside brackets.
    identify_tags(&tokens, TokenKind::Bracketed, &mut elements, &mut identified, &mut batch);

    // Pass 2: Alliance (first unclaimed bracket before any free text).
    extract_alliance(&tokens, &mut elements, &mut identified);

    // Pass 3: Tags in free text.
    identify_tags(&tokens, TokenKind::FreeText, &mut elements, &mut identified, &mut batch);

    // Pass 4: Episode coverage.
    extract_episode(&tokens, &mut elements, &mut identified);

    // Pass 5: Batches and disc rips without an episode cover a whole season.
    if elements.episode.is_none() && (batch || is_disc_source(elements.source.as_deref())) {
        elements.episode = Some(EpisodeSpan::Season(None));
    }

    elements
}

fn identify_tags(
    tokens: &[Token],
    kind: TokenKind,
    elements: &mut Elements,
    identified: &mut [bool],
    batch: &mut bool,
) {
    for (i, token) in tokens.iter().enumerate() {
        if token.kind != kind || identified[i] {
            continue;
        }
        // "[01-12 Fin]" is episode coverage, not a batch tag.
        if episode::try_extract(&token.text).is_some() {
            continue;
        }
        let mut matched = false;
        // "[WebRip 1080p HEVC-10bit AAC]" carries several tags in one bracket.
        for word in token.text.split_whitespace() {
            matched |= apply_word(word, elements, batch);
        }
        if !matched && token.text.contains(char::is_whitespace) {
            matched = apply_word(&token.text, elements, batch);
        }
        identified[i] = matched;
    }
}

fn apply_word(word: &str, elements: &mut Elements, batch: &mut bool) -> bool {
    if let Some(kind) = keyword::lookup(word) {
        apply_keyword(kind, word, elements, batch);
        return true;
    }
    if let Some(resolution) = parse_resolution(word) {
        elements.resolution.get_or_insert(resolution);
        return true;
    }
    if let Some((languages, marker)) = keyword::scan_language_label(word) {
        elements.languages |= languages;
        if elements.subtitle_marker.is_none() {
            elements.subtitle_marker = marker;
        }
        return true;
    }
    false
}

fn apply_keyword(kind: KeywordKind, text: &str, elements: &mut Elements, batch: &mut bool) {
    match kind {
        KeywordKind::Resolution => {
            elements.resolution.get_or_insert_with(|| text.to_uppercase());
        }
        KeywordKind::Source => {
            elements.source.get_or_insert_with(|| text.to_string());
        }
        KeywordKind::Batch => *batch = true,
        KeywordKind::Language(languages) => elements.languages |= languages,
        KeywordKind::Subtitles(marker) => {
            elements.subtitle_marker.get_or_insert(marker);
        }
        KeywordKind::VideoTerm | KeywordKind::AudioTerm => {}
    }
}

/// Try to parse a resolution string.
/// Handles: "1920x1080", "1920X1080", "1080p", "720P".
fn parse_resolution(s: &str) -> Option<String> {
    let upper = s.to_uppercase();

    if let Some((width, height)) = upper.split_once('X') {
        if width.parse::<u32>().is_ok() && height.parse::<u32>().is_ok() {
            return Some(format!("{height}P"));
        }
    }

    let digits = upper.strip_suffix('P')?;
    match digits.parse::<u32>() {
        Ok(n) if (240..=4320).contains(&n) => Some(upper),
        _ => None,
    }
}

fn extract_alliance(tokens: &[Token], elements: &mut Elements, identified: &mut [bool]) {
    for (i, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Bracketed if !identified[i] => {
                if episode::try_extract(&token.text).is_some() {
                    return;
                }
                elements.alliance = Some(token.text.clone());
                identified[i] = true;
                return;
            }
            TokenKind::FreeText => return,
            _ => {}
        }
    }
}

fn extract_episode(tokens: &[Token], elements: &mut Elements, identified: &mut [bool]) {
    let mut season = None;
    let mut saw_text = false;

    for i in 0..tokens.len() {
        if identified[i] || tokens[i].kind == TokenKind::Delimiter {
            continue;
        }
        let token = &tokens[i];

        // "01 - 12" and "Title - 05" split around a dash token.
        if token.kind == TokenKind::FreeText && token.text == "-" {
            identified[i] = true;
            let next = next_free_text(tokens, identified, i);
            let next_number = next.and_then(|n| plain_number(&tokens[n].text));
            let prev_number = prev_free_text(tokens, i).and_then(|p| plain_number(&tokens[p].text));
            match (prev_number, next_number) {
                (Some(start), Some(end)) => {
                    elements.episode = episode::range(start, end);
                    return;
                }
                (None, Some(number)) => {
                    elements.episode = Some(EpisodeSpan::Single(number));
                    return;
                }
                _ => continue,
            }
        }

        match episode::try_extract(&token.text) {
            Some(Extracted::Episode(span)) => {
                elements.episode = Some(span);
                identified[i] = true;
                return;
            }
            Some(Extracted::Season(number)) => {
                season = Some(number);
                identified[i] = true;
            }
            Some(Extracted::Plain(number)) => {
                // A bare number in free text only counts once the title has started.
                let followed_by_dash = next_non_delimiter(tokens, i)
                    .is_some_and(|n| tokens[n].text == "-");
                if (token.kind == TokenKind::Bracketed || saw_text) && !followed_by_dash {
                    elements.episode = Some(EpisodeSpan::Single(number));
                    identified[i] = true;
                    return;
                }
            }
            None => saw_text |= token.kind == TokenKind::FreeText,
        }
    }

    if let Some(number) = season {
        elements.episode = Some(EpisodeSpan::Season(Some(number)));
    }
}

fn plain_number(text: &str) -> Option<u32> {
    match episode::try_extract(text) {
        Some(Extracted::Plain(number)) => Some(number),
        _ => None,
    }
}

fn next_non_delimiter(tokens: &[Token], start: usize) -> Option<usize> {
    (start + 1..tokens.len()).find(|&i| tokens[i].kind != TokenKind::Delimiter)
}

fn next_free_text(tokens: &[Token], identified: &[bool], start: usize) -> Option<usize> {
    let i = next_non_delimiter(tokens, start)?;
    (tokens[i].kind == TokenKind::FreeText && !identified[i]).then_some(i)
}

fn prev_free_text(tokens: &[Token], start: usize) -> Option<usize> {
    let i = (0..start)
        .rev()
        .find(|&i| tokens[i].kind != TokenKind::Delimiter)?;
    (tokens[i].kind == TokenKind::FreeText).then_some(i)
}

fn is_disc_source(source: Option<&str>) -> bool {
    source.is_some_and(|s| {
        let upper = s.to_uppercase();
        upper.starts_with("BD") || upper.starts_with("BLU")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Languages, SubtitleMarker};

    #[test]
    fn test_typical_english_release() {
        let r = parse("[SubsPlease] Sousou no Frieren - 05 (1080p) [ABCD1234].mkv");
        assert_eq!(r.alliance.as_deref(), Some("SubsPlease"));
        assert_eq!(r.resolution.as_deref(), Some("1080P"));
        assert_eq!(r.episode, Some(EpisodeSpan::Single(5)));
        assert!(r.languages.is_empty());
    }

    #[test]
    fn test_chinese_bracket_chain() {
        let r = parse("【喵萌奶茶屋】★10月新番★[葬送的芙莉莲 / Sousou no Frieren][05][1080p][简日双语]");
        assert_eq!(r.alliance.as_deref(), Some("喵萌奶茶屋"));
        assert_eq!(r.episode, Some(EpisodeSpan::Single(5)));
        assert_eq!(r.resolution.as_deref(), Some("1080P"));
        assert_eq!(r.languages, Languages::CHS | Languages::JPN);
        assert_eq!(r.subtitle_marker, None);
    }

    #[test]
    fn test_multi_tag_bracket() {
        let r = parse("[LoliHouse] Frieren - 05 [WebRip 1920x1080 HEVC-10bit AAC][简繁内封字幕]");
        assert_eq!(r.resolution.as_deref(), Some("1080P"));
        assert_eq!(r.source.as_deref(), Some("WebRip"));
        assert_eq!(r.languages, Languages::CHS | Languages::CHT);
        assert_eq!(r.subtitle_marker, Some(SubtitleMarker::Closed));
    }

    #[test]
    fn test_collection_range() {
        let r = parse("[Group] Frieren [01-28 Fin][BDRip 1080p][CHS_JP]");
        assert_eq!(r.episode, Some(EpisodeSpan::Range { start: 1, end: 28 }));
        let r = parse("Frieren 01 - 12 [720p]");
        assert_eq!(r.episode, Some(EpisodeSpan::Range { start: 1, end: 12 }));
    }

    #[test]
    fn test_disc_rip_without_episode_is_season() {
        let r = parse("[VCB-Studio] Sousou no Frieren [Ma10p_1080p][BDRip]");
        assert_eq!(r.alliance.as_deref(), Some("VCB-Studio"));
        assert_eq!(r.episode, Some(EpisodeSpan::Season(None)));
    }

    #[test]
    fn test_season_marker() {
        let r = parse("[Group] Title S2 [1080p][Batch]");
        assert_eq!(r.episode, Some(EpisodeSpan::Season(Some(2))));
        let r = parse("[Group] Title S2 - 05 [1080p]");
        assert_eq!(r.episode, Some(EpisodeSpan::Single(5)));
    }

    #[test]
    fn test_unknown_title_degrades() {
        let r = parse("completely unstructured words");
        assert_eq!(r, Elements::default());
        assert_eq!(parse(""), Elements::default());
    }
}
