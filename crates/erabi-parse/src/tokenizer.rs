#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Inside a bracket pair: `[LoliHouse]`, `【1080P】`.
    Bracketed,
    /// A word outside brackets, or a normalized dash.
    FreeText,
    /// A run of spaces, underscores, dots or slashes.
    Delimiter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Bracket pairs recognized around tags, ASCII and full-width.
const BRACKETS: [(char, char); 7] = [
    ('[', ']'),
    ('(', ')'),
    ('{', '}'),
    ('\u{3010}', '\u{3011}'),
    ('\u{300C}', '\u{300D}'),
    ('\u{300E}', '\u{300F}'),
    ('\u{FF08}', '\u{FF09}'),
];

const VIDEO_EXTENSIONS: [&str; 9] = ["mkv", "mp4", "avi", "webm", "m4v", "ts", "mov", "rmvb", "m2ts"];

fn is_soft_delimiter(c: char) -> bool {
    // '/' separates alternate names on Chinese indices; stars decorate season banners.
    matches!(c, ' ' | '_' | '.' | '/' | '|' | '\u{3000}' | '\u{2605}' | '\u{2606}')
}

fn is_dash(c: char) -> bool {
    matches!(c, '-' | '~' | '\u{2013}' | '\u{2014}')
}

fn closing_bracket(open: char) -> Option<char> {
    BRACKETS.iter().find(|(o, _)| *o == open).map(|(_, close)| *close)
}

/// Split a release title into tokens.
///
/// Returns the tokens and the video file extension, if the title ends in
/// one; local cache entries are often named after the downloaded file.
pub fn tokenize(input: &str) -> (Vec<Token>, Option<String>) {
    let (input, extension) = strip_extension(input.trim());
    let tokens = Tokenizer { rest: input }.collect();
    (tokens, extension.map(str::to_string))
}

struct Tokenizer<'a> {
    rest: &'a str,
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let c = self.rest.chars().next()?;
            let after = &self.rest[c.len_utf8()..];

            if let Some(close) = closing_bracket(c) {
                // An unterminated bracket swallows the rest of the title.
                let (body, rest) = match after.find(close) {
                    Some(end) => (&after[..end], &after[end + close.len_utf8()..]),
                    None => (after, ""),
                };
                self.rest = rest;
                match body.trim() {
                    "" => continue,
                    body => return Some(Token::new(TokenKind::Bracketed, body)),
                }
            }

            // Every dash reads as "-" so that "- 05" and "01~12" look alike.
            if is_dash(c) {
                self.rest = after.trim_start_matches(is_soft_delimiter);
                return Some(Token::new(TokenKind::FreeText, "-"));
            }

            if is_soft_delimiter(c) {
                self.rest = self.rest.trim_start_matches(is_soft_delimiter);
                return Some(Token::new(TokenKind::Delimiter, " "));
            }

            let (word, rest) = self.rest.split_at(word_len(self.rest));
            self.rest = rest;
            return Some(Token::new(TokenKind::FreeText, word));
        }
    }
}

/// Byte length of the word at the start of `s`. A dot between two digits
/// ("07.5", "AAC5.1") does not end the word.
fn word_len(s: &str) -> usize {
    let mut prev: Option<char> = None;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        let decimal_point = c == '.'
            && prev.is_some_and(|p| p.is_ascii_digit())
            && chars.peek().is_some_and(|(_, next)| next.is_ascii_digit());
        let ends_word = is_dash(c)
            || closing_bracket(c).is_some()
            || (is_soft_delimiter(c) && !decimal_point);
        if ends_word {
            return i;
        }
        prev = Some(c);
    }
    s.len()
}

fn strip_extension(input: &str) -> (&str, Option<&'static str>) {
    let known = input.rsplit_once('.').and_then(|(base, ext)| {
        VIDEO_EXTENSIONS
            .iter()
            .find(|known| known.eq_ignore_ascii_case(ext))
            .map(|known| (base, *known))
    });
    match known {
        Some((base, ext)) => (base, Some(ext)),
        None => (input, None),
    }
}
