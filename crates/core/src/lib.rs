//! Core slide model, text extraction, keyword matching and corpus scanning
//! for presentation keyword search.

pub mod aggregate;
pub mod error;
pub mod export;
pub mod extract;
pub mod matcher;
pub mod normalize;
pub mod ocr;
pub mod scan;
pub mod title;
pub mod types;

pub use aggregate::{SlideRecord, SlideTextAggregator};
pub use error::{Error, ExtractionIssue, Feature, IssueFeature, Result};
pub use export::{ExportFormat, MatchRow, ReportFormatter};
pub use extract::{Extraction, ShapeTextExtractor};
pub use matcher::{match_slide, KeywordMatcher, MatchMode, MatchRecord};
pub use ocr::TextRecognizer;
pub use scan::{
    CancelFlag, CorpusScanner, NullObserver, ScanObserver, ScanOptions, ScanProgress, ScanReport,
    ScanWarning,
};
pub use title::{infer_title, TitleCandidate};
pub use types::{
    Chart, ChartSeries, DataLabel, Legend, Paragraph, Picture, PlaceholderRef, Presentation,
    PresentationFormat, PresentationLoader, Shape, ShapeKind, Slide, Table, TableRow, TextBody,
    TextRun,
};
