//! Multi-document keyword scanning.
//!
//! A scan opens every document through a [`PresentationLoader`], aggregates
//! its slides and runs each keyword over every slide. Documents that fail to
//! open become [`ScanWarning`]s; the scan itself only fails on invalid
//! configuration.

use crate::aggregate::{SlideRecord, SlideTextAggregator};
use crate::error::{Error, Result};
use crate::extract::ShapeTextExtractor;
use crate::matcher::{KeywordMatcher, MatchMode, MatchRecord};
use crate::normalize;
use crate::ocr::TextRecognizer;
use crate::types::PresentationLoader;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// What to look for and how.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanOptions {
    pub keywords: Vec<String>,

    #[serde(default)]
    pub mode: MatchMode,

    /// Attach picture payloads to match records.
    #[serde(default)]
    pub collect_images: bool,

    /// Process documents on the rayon thread pool.
    #[serde(default)]
    pub parallel: bool,
}

impl ScanOptions {
    pub fn new<S: Into<String>>(keywords: impl IntoIterator<Item = S>, mode: MatchMode) -> Self {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            mode,
            ..Default::default()
        }
    }

    pub fn with_images(mut self, collect: bool) -> Self {
        self.collect_images = collect;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check the options and prepare one matcher per keyword, in order.
    pub fn matchers(&self) -> Result<Vec<KeywordMatcher>> {
        if self.keywords.is_empty() {
            return Err(Error::InvalidConfigError(
                "at least one keyword is required".to_string(),
            ));
        }
        self.keywords
            .iter()
            .map(|k| KeywordMatcher::new(k, self.mode))
            .collect()
    }
}

/// Documents finished so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
}

impl ScanProgress {
    /// Completed share in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// A document skipped because it could not be opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanWarning {
    pub document: String,
    pub path: PathBuf,
    pub message: String,
}

/// Receives progress and warnings while a scan runs.
///
/// In parallel mode callbacks arrive from worker threads.
pub trait ScanObserver: Sync {
    fn on_progress(&self, _progress: ScanProgress) {}

    fn on_warning(&self, _warning: &ScanWarning) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ScanObserver for NullObserver {}

/// Shared stop signal, checked before each document.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of one scan, owned by the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// In (document, slide, keyword) order.
    pub matches: Vec<MatchRecord>,

    pub warnings: Vec<ScanWarning>,

    pub documents_total: usize,

    /// Documents opened and searched.
    pub documents_scanned: usize,

    /// Non-fatal problems inside shapes, summed over all documents.
    pub extraction_issues: usize,

    /// Set when the scan stopped before every document was processed.
    pub cancelled: bool,
}

impl ScanReport {
    /// Sort matches by descending score. Equal scores keep scan order.
    pub fn sort_by_score(&mut self) {
        self.matches
            .sort_by(|a, b| b.similarity_score.cmp(&a.similarity_score));
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

enum Outcome {
    Scanned {
        matches: Vec<MatchRecord>,
        issues: usize,
    },
    Failed(ScanWarning),
    Skipped,
}

/// Drives loading, aggregation and matching over a list of documents.
pub struct CorpusScanner<'a> {
    loader: &'a dyn PresentationLoader,
    recognizer: Option<&'a dyn TextRecognizer>,
    cancel: CancelFlag,
}

impl<'a> CorpusScanner<'a> {
    pub fn new(loader: &'a dyn PresentationLoader) -> Self {
        Self {
            loader,
            recognizer: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Run OCR on pictures with `recognizer`.
    pub fn with_recognizer(mut self, recognizer: &'a dyn TextRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Scan `paths` in order.
    ///
    /// Returns `Err` only for invalid configuration; unreadable documents are
    /// reported through the observer and the report's warnings.
    pub fn scan(
        &self,
        paths: &[PathBuf],
        options: &ScanOptions,
        observer: &dyn ScanObserver,
    ) -> Result<ScanReport> {
        if paths.is_empty() {
            return Err(Error::InvalidConfigError(
                "no documents to scan".to_string(),
            ));
        }
        let matchers = options.matchers()?;

        let mut extractor = ShapeTextExtractor::new().with_image_collection(options.collect_images);
        if let Some(recognizer) = self.recognizer {
            extractor = extractor.with_recognizer(recognizer);
        }
        let aggregator = SlideTextAggregator::new(extractor);

        let total = paths.len();
        let completed = AtomicUsize::new(0);
        let run = |path: &PathBuf| -> Outcome {
            if self.cancel.is_cancelled() {
                return Outcome::Skipped;
            }
            let outcome = self.scan_document(path, &aggregator, &matchers);
            if let Outcome::Failed(warning) = &outcome {
                observer.on_warning(warning);
            }
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            observer.on_progress(ScanProgress {
                completed: done,
                total,
            });
            outcome
        };

        let outcomes: Vec<Outcome> = if options.parallel {
            paths.par_iter().map(run).collect()
        } else {
            paths.iter().map(run).collect()
        };

        let mut report = ScanReport {
            documents_total: total,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                Outcome::Scanned { matches, issues } => {
                    report.documents_scanned += 1;
                    report.extraction_issues += issues;
                    report.matches.extend(matches);
                }
                Outcome::Failed(warning) => report.warnings.push(warning),
                Outcome::Skipped => report.cancelled = true,
            }
        }

        log::debug!(
            "Scanned {}/{} documents, {} matches",
            report.documents_scanned,
            total,
            report.matches.len()
        );
        Ok(report)
    }

    fn scan_document(
        &self,
        path: &Path,
        aggregator: &SlideTextAggregator<'_>,
        matchers: &[KeywordMatcher],
    ) -> Outcome {
        let document = display_name(path);

        let presentation = match self.loader.load(path) {
            Ok(presentation) => presentation,
            Err(e) => {
                log::warn!("Skipping {}: {}", path.display(), e);
                return Outcome::Failed(ScanWarning {
                    document,
                    path: path.to_path_buf(),
                    message: e.to_string(),
                });
            }
        };

        let slides = aggregator.aggregate(&presentation);
        log::debug!("{}: {} slides", document, slides.len());

        let mut issues = 0;
        let mut matches = Vec::new();
        for slide in &slides {
            issues += report_issues(&document, slide);
            let folded = normalize::fold(&slide.normalized_text);
            matches.extend(
                matchers
                    .iter()
                    .filter_map(|m| m.evaluate_folded(&document, slide, &folded))
                    .map(|mut record| {
                        record.source_path = path.to_path_buf();
                        record
                    }),
            );
        }

        Outcome::Scanned { matches, issues }
    }
}

fn report_issues(document: &str, slide: &SlideRecord) -> usize {
    for issue in &slide.issues {
        log::warn!("{} slide {}: {}", document, slide.slide_index, issue);
    }
    slide.issues.len()
}

/// File name shown in results, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
