//! Per-slide text aggregation.

use crate::error::ExtractionIssue;
use crate::extract::ShapeTextExtractor;
use crate::normalize::Fragments;
use crate::title::{infer_title, TitleCandidate, UNKNOWN_POSITION};
use crate::types::{Presentation, Slide};
use serde::Serialize;
use std::sync::Arc;

/// Flattened, searchable content of one slide.
#[derive(Debug, Clone, Serialize)]
pub struct SlideRecord {
    /// 1-based, in document order.
    pub slide_index: usize,

    /// Inferred title, possibly empty.
    pub title: String,

    pub normalized_text: Arc<str>,

    #[serde(skip)]
    pub extracted_images: Vec<Arc<[u8]>>,

    pub issues: Vec<ExtractionIssue>,
}

impl SlideRecord {
    /// Slide record with the given text and no title, images or issues.
    pub fn new(slide_index: usize, normalized_text: &str) -> Self {
        Self {
            slide_index,
            title: String::new(),
            normalized_text: Arc::from(normalized_text),
            extracted_images: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn has_text(&self) -> bool {
        !self.normalized_text.trim().is_empty()
    }
}

/// Drives a [`ShapeTextExtractor`] over every slide of a presentation.
#[derive(Clone, Copy, Default)]
pub struct SlideTextAggregator<'a> {
    extractor: ShapeTextExtractor<'a>,
}

impl<'a> SlideTextAggregator<'a> {
    pub fn new(extractor: ShapeTextExtractor<'a>) -> Self {
        Self { extractor }
    }

    /// One record per slide, in document order. Slides without text are kept.
    pub fn aggregate(&self, presentation: &Presentation) -> Vec<SlideRecord> {
        presentation
            .slides
            .iter()
            .enumerate()
            .map(|(idx, slide)| self.aggregate_slide(idx + 1, slide))
            .collect()
    }

    /// Build the record for a single slide.
    pub fn aggregate_slide(&self, slide_index: usize, slide: &Slide) -> SlideRecord {
        let mut text = Fragments::new();
        let mut candidates = Vec::new();
        let mut images = Vec::new();
        let mut issues = Vec::new();

        for shape in &slide.shapes {
            let extraction = self.extractor.extract(shape);

            if !extraction.text.is_empty() {
                text.push(&extraction.text);
                candidates.push(TitleCandidate::new(
                    shape.top.unwrap_or(UNKNOWN_POSITION),
                    shape.max_font_size_pt(),
                    extraction.text,
                ));
            }

            images.extend(extraction.images);
            issues.extend(extraction.issues);
        }

        SlideRecord {
            slide_index,
            title: infer_title(&candidates),
            normalized_text: Arc::from(text.into_string()),
            extracted_images: images,
            issues,
        }
    }
}
