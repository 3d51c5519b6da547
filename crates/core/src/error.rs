//! Error types for slide text extraction and keyword scanning.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop an operation.
///
/// Only document-open failures and configuration problems are surfaced this
/// way. Problems inside a single shape are reported as [`ExtractionIssue`].
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read the input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The file format is not supported or could not be detected.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// Failed to parse the PPTX package structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// Invalid or corrupted file.
    #[error("Invalid or corrupted file: {0}")]
    CorruptedFile(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// Scan configuration rejected before any work was attempted.
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),

    /// The text recognizer could not process an image.
    #[error("Text recognition error: {0}")]
    RecognitionError(String),

    /// Results could not be rendered.
    #[error("Export error: {0}")]
    ExportError(String),
}

/// The part of a shape an [`ExtractionIssue`] was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueFeature {
    ChartPart,
    ChartTitle,
    CategoryAxisTitle,
    ValueAxisTitle,
    Legend,
    DataLabels,
    PicturePayload,
    ImageDecode,
    Recognition,
}

impl fmt::Display for IssueFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssueFeature::ChartPart => "chart part",
            IssueFeature::ChartTitle => "chart title",
            IssueFeature::CategoryAxisTitle => "category axis title",
            IssueFeature::ValueAxisTitle => "value axis title",
            IssueFeature::Legend => "legend",
            IssueFeature::DataLabels => "data labels",
            IssueFeature::PicturePayload => "picture payload",
            IssueFeature::ImageDecode => "image decode",
            IssueFeature::Recognition => "text recognition",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem found while reading one shape or sub-feature.
///
/// The affected piece contributes no text; everything else on the slide is
/// still extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{feature}: {message}")]
pub struct ExtractionIssue {
    pub feature: IssueFeature,
    pub message: String,
}

impl ExtractionIssue {
    pub fn new(feature: IssueFeature, message: impl Into<String>) -> Self {
        Self {
            feature,
            message: message.into(),
        }
    }
}

/// A value read from the source document that may be malformed.
pub type Feature<T> = std::result::Result<T, ExtractionIssue>;
