//! Text normalization shared by extraction and matching.
//!
//! Extraction joins trimmed fragments with single spaces. Matching compares
//! folded text: lowercase with whitespace runs collapsed.

use regex::Regex;
use std::sync::LazyLock;

/// Regex to collapse any run of whitespace (including newlines) into one space.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Default number of characters kept in a match excerpt.
pub const EXCERPT_CHARS: usize = 200;

/// Marker appended to truncated excerpts.
pub const ELLIPSIS: &str = "...";

/// Fold text for case-insensitive comparison.
///
/// Lowercases, collapses whitespace runs to a single space and trims.
pub fn fold(text: &str) -> String {
    let lowered = text.to_lowercase();
    WHITESPACE_COLLAPSE_REGEX
        .replace_all(&lowered, " ")
        .trim()
        .to_string()
}

/// Truncate `text` to at most `max_chars` characters, appending `...` if cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Accumulates trimmed text fragments separated by single spaces.
#[derive(Debug, Clone, Default)]
pub struct Fragments {
    buf: String,
}

impl Fragments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Empty and whitespace-only fragments are dropped.
    pub fn push(&mut self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        if !self.buf.is_empty() {
            self.buf.push(' ');
        }
        self.buf.push_str(fragment);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
