//! Slide title inference from shape position and font size.
//!
//! The topmost shape wins; among shapes at the same height the one with the
//! largest run font wins. Explicit title placeholders are not required.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Vertical position used for shapes whose position is unknown. Sorts below
/// every shape with a position, however tall the slide.
pub const UNKNOWN_POSITION: i64 = i64::MAX;

/// A shape that might hold the slide title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleCandidate {
    /// Smaller is higher on the slide.
    pub vertical_position: i64,

    /// Largest run font size in points, 0.0 if unknown.
    pub max_font_size_pt: f64,

    pub text: String,
}

impl TitleCandidate {
    pub fn new(vertical_position: i64, max_font_size_pt: f64, text: impl Into<String>) -> Self {
        Self {
            vertical_position,
            max_font_size_pt,
            text: text.into(),
        }
    }
}

/// Pick the title text from `candidates`, or an empty string if there are none.
///
/// Sort key is (vertical_position ascending, max_font_size_pt descending).
/// The sort is stable, so exact ties keep shape order.
pub fn infer_title(candidates: &[TitleCandidate]) -> String {
    let mut ranked: Vec<&TitleCandidate> = candidates.iter().collect();
    ranked.sort_by(|a, b| compare(a, b));
    ranked
        .first()
        .map(|c| c.text.clone())
        .unwrap_or_default()
}

fn compare(a: &TitleCandidate, b: &TitleCandidate) -> Ordering {
    a.vertical_position
        .cmp(&b.vertical_position)
        .then_with(|| b.max_font_size_pt.total_cmp(&a.max_font_size_pt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_candidates() {
        assert_eq!(infer_title(&[]), "");
    }

    #[test]
    fn test_tie_broken_by_larger_font() {
        let candidates = vec![
            TitleCandidate::new(50, 12.0, "Overview"),
            TitleCandidate::new(50, 18.0, "Q3 Results"),
            TitleCandidate::new(120, 24.0, "Footer"),
        ];
        assert_eq!(infer_title(&candidates), "Q3 Results");
    }

    #[test]
    fn test_topmost_beats_larger_font() {
        let candidates = vec![
            TitleCandidate::new(400, 44.0, "Big body text"),
            TitleCandidate::new(10, 0.0, "Header"),
        ];
        assert_eq!(infer_title(&candidates), "Header");
    }

    #[test]
    fn test_exact_tie_keeps_shape_order() {
        let candidates = vec![
            TitleCandidate::new(0, 20.0, "First"),
            TitleCandidate::new(0, 20.0, "Second"),
        ];
        assert_eq!(infer_title(&candidates), "First");
    }

    #[test]
    fn test_unknown_position_sorts_last() {
        let candidates = vec![
            TitleCandidate::new(UNKNOWN_POSITION, 40.0, "Floating"),
            TitleCandidate::new(6_000_000, 10.0, "Placed"),
        ];
        assert_eq!(infer_title(&candidates), "Placed");
    }

    #[test]
    fn test_unknown_position_below_tall_slide_shapes() {
        // Near the bottom of an A4 portrait slide (10,692,000 EMU tall).
        let candidates = vec![
            TitleCandidate::new(UNKNOWN_POSITION, 40.0, "Floating"),
            TitleCandidate::new(10_500_000, 10.0, "Footer"),
        ];
        assert_eq!(infer_title(&candidates), "Footer");
    }
}
