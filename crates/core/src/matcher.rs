//! Keyword matching against slide text.
//!
//! Three modes are supported: exact substring, phrase boundary and fuzzy
//! partial similarity. Both sides are folded (see [`normalize::fold`]) before
//! comparison, so every mode is case-insensitive.

use crate::aggregate::SlideRecord;
use crate::error::{Error, Result};
use crate::normalize::{self, EXCERPT_CHARS};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Score reported by the exact and phrase modes.
pub const FULL_SCORE: u8 = 100;

/// Default similarity threshold for fuzzy matching.
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 85;

/// How a keyword is compared with slide text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive containment.
    #[default]
    Exact,

    /// Containment not embedded in a longer word.
    Phrase,

    /// Partial similarity of at least `threshold` (0 to 100).
    Fuzzy { threshold: u8 },
}

impl MatchMode {
    pub fn validate(&self) -> Result<()> {
        match self {
            MatchMode::Fuzzy { threshold } if *threshold > FULL_SCORE => {
                Err(Error::InvalidConfigError(format!(
                    "fuzzy threshold must be within 0..=100, got {}",
                    threshold
                )))
            }
            _ => Ok(()),
        }
    }
}

/// A keyword found on a slide.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRecord {
    /// Display name of the document.
    pub source_document: String,

    /// Path the document was loaded from. Decks in different folders may share
    /// a display name.
    #[serde(skip)]
    pub source_path: PathBuf,

    pub slide_index: usize,

    /// Keyword as the caller supplied it (trimmed).
    pub keyword: String,

    /// 100 for exact and phrase matches, the computed similarity otherwise.
    pub similarity_score: u8,

    /// Slide text cut to 200 characters, with `...` when truncated.
    pub excerpt: String,

    pub full_text: Arc<str>,

    pub matched_title: String,

    #[serde(skip)]
    pub images: Vec<Arc<[u8]>>,
}

/// One keyword prepared for repeated matching under one mode.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keyword: String,
    folded: String,
    folded_chars: Vec<char>,
    mode: MatchMode,
    phrase: Option<Regex>,
}

impl KeywordMatcher {
    /// Prepare `keyword` for matching. Blank keywords and out-of-range
    /// thresholds are rejected.
    pub fn new(keyword: &str, mode: MatchMode) -> Result<Self> {
        mode.validate()?;

        let keyword = keyword.trim();
        let folded = normalize::fold(keyword);
        if folded.is_empty() {
            return Err(Error::InvalidConfigError(
                "keywords must not be empty".to_string(),
            ));
        }

        let phrase = match mode {
            MatchMode::Phrase => Some(phrase_regex(&folded)?),
            _ => None,
        };

        Ok(Self {
            keyword: keyword.to_string(),
            folded_chars: folded.chars().collect(),
            folded,
            mode,
            phrase,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Score already-folded text. `None` means no match.
    pub fn score_folded(&self, folded_text: &str) -> Option<u8> {
        if folded_text.is_empty() {
            return None;
        }

        match self.mode {
            MatchMode::Exact => folded_text.contains(&self.folded).then_some(FULL_SCORE),
            MatchMode::Phrase => self
                .phrase
                .as_ref()
                .filter(|re| re.is_match(folded_text))
                .map(|_| FULL_SCORE),
            MatchMode::Fuzzy { threshold } => {
                let score = if folded_text.contains(&self.folded) {
                    FULL_SCORE
                } else {
                    partial_ratio(&self.folded_chars, folded_text)
                };
                (score >= threshold).then_some(score)
            }
        }
    }

    /// Evaluate one slide. Folds the slide text on every call; use
    /// [`KeywordMatcher::evaluate_folded`] when checking several keywords.
    pub fn evaluate(&self, document: &str, slide: &SlideRecord) -> Option<MatchRecord> {
        let folded = normalize::fold(&slide.normalized_text);
        self.evaluate_folded(document, slide, &folded)
    }

    /// Evaluate one slide whose text has already been folded.
    pub fn evaluate_folded(
        &self,
        document: &str,
        slide: &SlideRecord,
        folded_text: &str,
    ) -> Option<MatchRecord> {
        let similarity_score = self.score_folded(folded_text)?;

        Some(MatchRecord {
            source_document: document.to_string(),
            source_path: PathBuf::from(document),
            slide_index: slide.slide_index,
            keyword: self.keyword.clone(),
            similarity_score,
            excerpt: normalize::excerpt(&slide.normalized_text, EXCERPT_CHARS),
            full_text: Arc::clone(&slide.normalized_text),
            matched_title: slide.title.clone(),
            images: slide.extracted_images.clone(),
        })
    }
}

/// Match a single keyword against a single slide.
pub fn match_slide(
    document: &str,
    slide: &SlideRecord,
    keyword: &str,
    mode: MatchMode,
) -> Result<Option<MatchRecord>> {
    Ok(KeywordMatcher::new(keyword, mode)?.evaluate(document, slide))
}

/// Keyword not preceded by a word character and followed by whitespace,
/// `- : ) ]` or the end of the text.
fn phrase_regex(folded_keyword: &str) -> Result<Regex> {
    let pattern = format!(
        r"(?i)(?:^|\W){}(?:[\s\-:)\]]|$)",
        regex::escape(folded_keyword)
    );
    Regex::new(&pattern).map_err(|e| Error::InvalidConfigError(format!("keyword pattern: {}", e)))
}

/// Best similarity (0 to 100) between `needle` and any region of `haystack`
/// of the same length, including regions clipped at either end.
pub fn partial_ratio(needle: &[char], haystack: &str) -> u8 {
    let text: Vec<char> = haystack.chars().collect();
    if needle.is_empty() || text.is_empty() {
        return 0;
    }

    let width = needle.len();
    if width >= text.len() {
        return to_score(rapidfuzz::fuzz::ratio(
            needle.iter().copied(),
            text.iter().copied(),
        ));
    }

    let len = text.len() as isize;
    let mut best = 0.0f64;
    for start in (1 - width as isize)..len {
        let lo = start.max(0) as usize;
        let hi = (start + width as isize).min(len) as usize;
        let score = rapidfuzz::fuzz::ratio(needle.iter().copied(), text[lo..hi].iter().copied());
        if score > best {
            best = score;
            if best >= 1.0 {
                break;
            }
        }
    }
    to_score(best)
}

fn to_score(ratio: f64) -> u8 {
    (ratio * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide(text: &str) -> SlideRecord {
        SlideRecord::new(1, text).with_title("Title")
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_exact_end_to_end() {
        let record = match_slide(
            "deck.pptx",
            &slide("Q3 Revenue Growth by Region"),
            "revenue",
            MatchMode::Exact,
        )
        .unwrap()
        .unwrap();

        assert_eq!(record.slide_index, 1);
        assert_eq!(record.similarity_score, 100);
        assert!(record.excerpt.contains("Q3 Revenue Growth by Region"));
        assert_eq!(&*record.full_text, "Q3 Revenue Growth by Region");
        assert_eq!(record.source_document, "deck.pptx");
        assert_eq!(record.matched_title, "Title");
    }

    #[test]
    fn test_exact_substring_always_scores_full() {
        let text = "Market SHARE and shareholder value";
        for keyword in ["share", "SHARE", "holder", "t sha", "value"] {
            let matcher = KeywordMatcher::new(keyword, MatchMode::Exact).unwrap();
            let record = matcher.evaluate("d", &slide(text)).unwrap();
            assert_eq!(record.similarity_score, 100, "keyword {}", keyword);
        }
    }

    #[test]
    fn test_multi_keyword_independence() {
        let record = slide("Alpha launch plan");
        let hits: Vec<_> = ["Alpha", "Beta"]
            .iter()
            .filter_map(|k| match_slide("d", &record, k, MatchMode::Exact).unwrap())
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].keyword, "Alpha");
    }

    #[test]
    fn test_empty_text_never_matches() {
        let empty = SlideRecord::new(3, "");
        for mode in [
            MatchMode::Exact,
            MatchMode::Phrase,
            MatchMode::Fuzzy { threshold: 0 },
            MatchMode::Fuzzy { threshold: 100 },
        ] {
            assert!(match_slide("d", &empty, "revenue", mode).unwrap().is_none());
        }
    }

    #[test]
    fn test_phrase_boundaries() {
        let matcher = KeywordMatcher::new("Revenue", MatchMode::Phrase).unwrap();
        let hit = |text: &str| matcher.score_folded(&normalize::fold(text)).is_some();

        assert!(hit("Q3 revenue growth"));
        assert!(hit("revenue"));
        assert!(hit("Total REVENUE"));
        assert!(hit("- Revenue: up 4%"));
        assert!(hit("(revenue) by region"));
        assert!(hit("• revenue] note"));
        assert!(hit("net revenue-adjusted"));

        assert!(!hit("revenues grew"));
        assert!(!hit("prerevenue stage"));
        assert!(!hit("revenue_total"));
    }

    #[test]
    fn test_phrase_keyword_with_regex_metacharacters() {
        let matcher = KeywordMatcher::new("c++", MatchMode::Phrase).unwrap();
        assert_eq!(matcher.score_folded("we use c++ daily"), Some(100));
        assert_eq!(matcher.score_folded("we use c daily"), None);
    }

    #[test]
    fn test_fuzzy_tolerates_typos() {
        let matcher = KeywordMatcher::new("reveneu", MatchMode::Fuzzy { threshold: 80 }).unwrap();
        let score = matcher
            .score_folded(&normalize::fold("Q3 Revenue Growth by Region"))
            .unwrap();
        assert!((80..100).contains(&score), "score {}", score);
    }

    #[test]
    fn test_fuzzy_containment_scores_full() {
        let matcher = KeywordMatcher::new("growth", MatchMode::Fuzzy { threshold: 95 }).unwrap();
        assert_eq!(matcher.score_folded("q3 revenue growth"), Some(100));
    }

    #[test]
    fn test_fuzzy_monotonicity() {
        let slides = [
            "q3 revenue growth by region",
            "revnue outlook",
            "headcount plan",
            "rev",
            "quarterly review of revenues",
        ];
        let mut previous = usize::MAX;
        for threshold in (0..=100).step_by(5) {
            let matcher =
                KeywordMatcher::new("revenue", MatchMode::Fuzzy { threshold }).unwrap();
            let count = slides
                .iter()
                .filter(|s| matcher.score_folded(s).is_some())
                .count();
            assert!(count <= previous, "threshold {} increased matches", threshold);
            previous = count;
        }
    }

    #[test]
    fn test_partial_ratio_bounds() {
        assert_eq!(partial_ratio(&chars("abc"), ""), 0);
        assert_eq!(partial_ratio(&chars("abc"), "abc"), 100);
        assert_eq!(partial_ratio(&chars("abc"), "xxabcxx"), 100);
        assert_eq!(partial_ratio(&chars("xyz"), "abcdef"), 0);
        assert_eq!(partial_ratio(&chars("longer keyword"), "key"), 35);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            KeywordMatcher::new("   ", MatchMode::Exact),
            Err(Error::InvalidConfigError(_))
        ));
        assert!(matches!(
            KeywordMatcher::new("revenue", MatchMode::Fuzzy { threshold: 101 }),
            Err(Error::InvalidConfigError(_))
        ));
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let text = format!("revenue {}", "x".repeat(300));
        let record = match_slide("d", &slide(&text), "revenue", MatchMode::Exact)
            .unwrap()
            .unwrap();
        assert!(record.excerpt.ends_with("..."));
        assert_eq!(record.excerpt.chars().count(), 203);
        assert_eq!(record.full_text.len(), text.len());
    }
}
