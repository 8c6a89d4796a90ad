//! Character-addressable input with whitespace/comment skipping, literal and
//! regex matching, and `O(log lines)` line/column lookup.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

/// One entry in the line cache: the byte offset a line starts at, and that
/// line's zero-based number. Sentinels at `-1` (modelled as `0` paired with
/// line `0`, see [`Buffer::new`]) and `text.len()` bound binary search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineStart {
    offset: usize,
    line: usize,
}

/// The result of [`Buffer::line_info`]: human-facing position plus the
/// source line's own text, ready to render under a `file:line:col` error.
#[derive(Debug, Clone)]
pub struct LineInfo {
    pub line: usize,
    pub column: usize,
    pub line_start: usize,
    pub text: Arc<str>,
}

/// Buffered input text plus the matching configuration (whitespace set,
/// comment pattern, case sensitivity, name-guard) that every `match`/`matchre`
/// call consults.
pub struct Buffer {
    text: Arc<str>,
    pos: usize,
    whitespace: Vec<char>,
    comments_re: Option<Regex>,
    ignorecase: bool,
    nameguard: bool,
    line_cache: Vec<LineStart>,
    regex_cache: RefCell<HashMap<String, Regex>>,
}

impl Buffer {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let line_cache = build_line_cache(&text);
        Self {
            text,
            pos: 0,
            whitespace: vec![' ', '\t', '\r', '\n', '\x0b', '\x0c'],
            comments_re: None,
            ignorecase: false,
            nameguard: true,
            line_cache,
            regex_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_whitespace(mut self, whitespace: impl IntoIterator<Item = char>) -> Self {
        self.whitespace = whitespace.into_iter().collect();
        self
    }

    pub fn with_comments(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.comments_re = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn with_ignorecase(mut self, ignorecase: bool) -> Self {
        self.ignorecase = ignorecase;
        self
    }

    pub fn with_nameguard(mut self, nameguard: bool) -> Self {
        self.nameguard = nameguard;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn atend(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn ateol(&self) -> bool {
        matches!(self.current(), None | Some('\n'))
    }

    pub fn current(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    pub fn next(&mut self) -> Option<char> {
        let c = self.current()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Clamp `p` into `[0, len]`. A position mid-character is not re-aligned;
    /// callers only ever pass positions obtained from this buffer itself.
    pub fn goto(&mut self, p: usize) {
        self.pos = p.min(self.text.len());
    }

    pub fn move_by(&mut self, n: usize) {
        self.goto(self.pos + n);
    }

    pub fn eat_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if self.whitespace.contains(&c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    pub fn eat_comments(&mut self) {
        let Some(re) = self.comments_re.clone() else {
            return;
        };
        while let Some(m) = re.find(&self.text[self.pos..]) {
            if m.start() != 0 {
                break;
            }
            self.pos += m.end();
        }
    }

    /// Fixed point of `eat_whitespace . eat_comments`: whitespace can appear
    /// after a comment and vice versa, so keep alternating until neither
    /// makes progress.
    pub fn next_token(&mut self) {
        loop {
            let before = self.pos;
            self.eat_whitespace();
            self.eat_comments();
            if self.pos == before {
                break;
            }
        }
    }

    /// Match a literal token at the current position, skipping leading
    /// whitespace/comments first. On success advances past the match and
    /// returns the (original-case) matched text; on failure the position is
    /// left unchanged.
    pub fn match_literal(&mut self, token: &str) -> Option<String> {
        self.next_token();
        let start = self.pos;
        let rest = &self.text[start..];
        let matched = if self.ignorecase {
            rest.len() >= token.len() && rest[..token.len()].eq_ignore_ascii_case(token)
        } else {
            rest.starts_with(token)
        };
        if !matched {
            return None;
        }
        let end = start + token.len();
        if self.nameguard && is_name_guarded(token, &self.text, end) {
            return None;
        }
        self.pos = end;
        Some(self.text[start..end].to_string())
    }

    /// Anchored regex match: no whitespace/comment skipping, matches only at
    /// the current position. A small per-buffer cache avoids recompiling the
    /// same pattern string on every call.
    pub fn match_regex(&mut self, pattern: &str) -> Result<Option<String>, regex::Error> {
        {
            let mut cache = self.regex_cache.borrow_mut();
            if !cache.contains_key(pattern) {
                let anchored = format!("\\A(?:{pattern})");
                cache.insert(pattern.to_string(), Regex::new(&anchored)?);
            }
        }
        let cache = self.regex_cache.borrow();
        let re = &cache[pattern];
        match re.find(&self.text[self.pos..]) {
            Some(m) => {
                let text = m.as_str().to_string();
                self.pos += m.end();
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Binary-search the line cache for `pos`, returning its line, column,
    /// the offset the line starts at, and the line's own text.
    pub fn line_info(&self, pos: usize) -> LineInfo {
        let pos = pos.min(self.text.len());
        let idx = match self.line_cache.binary_search_by(|ls| ls.offset.cmp(&pos)) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let start = self.line_cache[idx];
        let next_offset = self
            .line_cache
            .get(idx + 1)
            .map(|ls| ls.offset)
            .unwrap_or(self.text.len());
        let line_text_raw = &self.text[start.offset..next_offset];
        let line_text = line_text_raw.trim_end_matches('\n').trim_end_matches('\r');
        LineInfo {
            line: start.line,
            column: pos - start.offset,
            line_start: start.offset,
            text: Arc::from(line_text),
        }
    }

    pub fn get_line(&self, n: usize) -> Option<&str> {
        let start = self.line_cache.iter().find(|ls| ls.line == n)?;
        let next_offset = self
            .line_cache
            .iter()
            .find(|ls| ls.line == n + 1)
            .map(|ls| ls.offset)
            .unwrap_or(self.text.len());
        Some(self.text[start.offset..next_offset].trim_end_matches(['\n', '\r']))
    }
}

fn build_line_cache(text: &str) -> Vec<LineStart> {
    let mut cache = vec![LineStart { offset: 0, line: 0 }];
    let mut line = 0;
    for (i, c) in text.char_indices() {
        if c == '\n' {
            line += 1;
            cache.push(LineStart {
                offset: i + 1,
                line,
            });
        }
    }
    cache
}

/// Name-guard: an alphanumeric literal must not be immediately followed by
/// another alphanumeric character, so `'if'` does not match the prefix of
/// `ifoo`.
fn is_name_guarded(token: &str, text: &str, end: usize) -> bool {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let token_is_word = token.chars().next().map(is_word).unwrap_or(false)
        && token.chars().last().map(is_word).unwrap_or(false);
    if !token_is_word {
        return false;
    }
    text[end..].chars().next().map(is_word).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_info_round_trips_through_text() {
        let buf = Buffer::new("abc\ndef\nghi");
        let info = buf.line_info(5); // 'e' on line 1
        assert_eq!(info.line, 1);
        assert_eq!(info.column, 1);
        assert_eq!(&*info.text, "def");
    }

    #[test]
    fn name_guard_rejects_prefix_match() {
        let mut buf = Buffer::new("ifoo");
        assert_eq!(buf.match_literal("if"), None);
        assert_eq!(buf.pos(), 0);
    }

    #[test]
    fn name_guard_disabled_allows_prefix_match() {
        let mut buf = Buffer::new("ifoo").with_nameguard(false);
        assert_eq!(buf.match_literal("if"), Some("if".to_string()));
        assert_eq!(buf.pos(), 2);
    }

    #[test]
    fn match_skips_whitespace_and_comments() {
        let mut buf = Buffer::new("  # hi\n  token")
            .with_comments(r"#[^\n]*")
            .unwrap();
        assert_eq!(buf.match_literal("token"), Some("token".to_string()));
    }

    #[test]
    fn match_regex_is_anchored() {
        let mut buf = Buffer::new("12ab");
        assert_eq!(buf.match_regex(r"[a-z]+").unwrap(), None);
        assert_eq!(buf.match_regex(r"\d+").unwrap(), Some("12".to_string()));
        assert_eq!(buf.match_regex(r"[a-z]+").unwrap(), Some("ab".to_string()));
    }

    #[test]
    fn ignorecase_matches_either_case() {
        let mut buf = Buffer::new("IF x").with_ignorecase(true);
        assert_eq!(buf.match_literal("if"), Some("IF".to_string()));
    }
}
