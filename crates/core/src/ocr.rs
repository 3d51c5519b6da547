//! Optical character recognition seam.
//!
//! The core only decodes picture payloads; recognizing text is delegated to
//! a [`TextRecognizer`] supplied by the caller.

use crate::error::{Feature, IssueFeature, ExtractionIssue, Result};
use image::DynamicImage;

/// Turns decoded image pixels into text.
///
/// Implementations are shared across scan worker threads and must tolerate
/// concurrent calls (or serialize internally).
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Decode `payload` and run `recognizer` over it.
pub fn recognize_payload(recognizer: &dyn TextRecognizer, payload: &[u8]) -> Feature<String> {
    let image = image::load_from_memory(payload)
        .map_err(|e| ExtractionIssue::new(IssueFeature::ImageDecode, e.to_string()))?;

    recognizer
        .recognize(&image)
        .map_err(|e| ExtractionIssue::new(IssueFeature::Recognition, e.to_string()))
}
