//! Recursive shape text extraction.
//!
//! Flattens one shape and its descendants into a single space-separated text
//! plus any collected picture payloads. Nothing in here fails: malformed
//! pieces contribute no text and are reported as [`ExtractionIssue`]s.

use crate::error::{ExtractionIssue, Feature};
use crate::normalize::Fragments;
use crate::ocr::{self, TextRecognizer};
use crate::types::{Chart, Picture, Shape, ShapeKind, Table};
use std::sync::Arc;

/// Output of extracting one shape subtree.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Trimmed text; fragments separated by single spaces.
    pub text: String,

    /// Picture payloads in tree order (only when image collection is on).
    pub images: Vec<Arc<[u8]>>,

    pub issues: Vec<ExtractionIssue>,
}

/// Converts shapes into searchable text.
#[derive(Clone, Copy, Default)]
pub struct ShapeTextExtractor<'a> {
    recognizer: Option<&'a dyn TextRecognizer>,
    collect_images: bool,
}

impl<'a> ShapeTextExtractor<'a> {
    /// Create an extractor with OCR and image collection disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `recognizer` over every picture payload.
    pub fn with_recognizer(mut self, recognizer: &'a dyn TextRecognizer) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    /// Return raw picture payloads alongside the text.
    pub fn with_image_collection(mut self, collect: bool) -> Self {
        self.collect_images = collect;
        self
    }

    /// Extract text (and images) from `shape` and all of its descendants.
    pub fn extract(&self, shape: &Shape) -> Extraction {
        let mut sink = Sink::default();
        self.walk(shape, &mut sink);
        sink.finish()
    }

    fn walk(&self, shape: &Shape, sink: &mut Sink) {
        match &shape.kind {
            ShapeKind::Group(children) => {
                for child in children {
                    self.walk(child, sink);
                }
            }
            ShapeKind::Table(table) => extract_table(table, sink),
            ShapeKind::Chart(chart) => match chart {
                Ok(chart) => extract_chart(chart, sink),
                Err(issue) => sink.issue(issue.clone()),
            },
            ShapeKind::Picture(picture) => self.extract_picture(picture, sink),
            ShapeKind::Text(body) => sink.text(&body.text()),
            ShapeKind::Unknown => {}
        }
    }

    fn extract_picture(&self, picture: &Picture, sink: &mut Sink) {
        let payload = match &picture.payload {
            Ok(payload) => payload,
            Err(issue) => {
                sink.issue(issue.clone());
                return;
            }
        };

        if let Some(recognizer) = self.recognizer {
            sink.feature(ocr::recognize_payload(recognizer, payload));
        }

        if self.collect_images {
            sink.images.push(Arc::clone(payload));
        }
    }
}

fn extract_table(table: &Table, sink: &mut Sink) {
    for row in &table.rows {
        for cell in &row.cells {
            sink.text(&cell.text());
        }
    }
}

fn extract_chart(chart: &Chart, sink: &mut Sink) {
    for part in [
        &chart.title,
        &chart.category_axis_title,
        &chart.value_axis_title,
    ] {
        if let Some(feature) = part {
            sink.feature(feature.clone());
        }
    }

    match chart.legend_entries() {
        Some(Ok(entries)) => {
            for entry in &entries {
                sink.text(entry);
            }
        }
        Some(Err(issue)) => sink.issue(issue),
        None => {}
    }

    for series in &chart.series {
        match &series.data_labels {
            Some(Ok(labels)) => {
                for label in labels {
                    sink.text(&label.text);
                }
            }
            Some(Err(issue)) => sink.issue(issue.clone()),
            None => {}
        }
    }
}

#[derive(Default)]
struct Sink {
    fragments: Fragments,
    images: Vec<Arc<[u8]>>,
    issues: Vec<ExtractionIssue>,
}

impl Sink {
    fn text(&mut self, text: &str) {
        self.fragments.push(text);
    }

    fn issue(&mut self, issue: ExtractionIssue) {
        log::debug!("Skipping unreadable {}", issue);
        self.issues.push(issue);
    }

    fn feature(&mut self, feature: Feature<String>) {
        match feature {
            Ok(text) => self.text(&text),
            Err(issue) => self.issue(issue),
        }
    }

    fn finish(self) -> Extraction {
        Extraction {
            text: self.fragments.into_string(),
            images: self.images,
            issues: self.issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IssueFeature;
    use crate::ocr::tests::{png_bytes, FailingRecognizer, SizeRecognizer};
    use crate::types::{ChartSeries, DataLabel, Legend};

    fn chart_shape(chart: Chart) -> Shape {
        Shape::new(ShapeKind::Chart(Ok(chart)))
    }

    fn picture_shape(bytes: Vec<u8>) -> Shape {
        Shape::new(ShapeKind::Picture(Picture::new(bytes)))
    }

    #[test]
    fn test_plain_text_is_trimmed() {
        let extraction = ShapeTextExtractor::new().extract(&Shape::text("  Q3 Revenue  "));
        assert_eq!(extraction.text, "Q3 Revenue");
        assert!(extraction.images.is_empty());
        assert!(extraction.issues.is_empty());
    }

    #[test]
    fn test_group_flattening() {
        let extractor = ShapeTextExtractor::new();
        let children = vec![
            Shape::text("Alpha"),
            Shape::text(""),
            Shape::group(vec![Shape::text("Beta"), Shape::text("Gamma")]),
        ];
        let expected = children
            .iter()
            .map(|c| extractor.extract(c).text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let extraction = extractor.extract(&Shape::group(children));
        assert_eq!(extraction.text, expected);
        assert_eq!(extraction.text, "Alpha Beta Gamma");
    }

    #[test]
    fn test_table_row_major_skips_empty_cells() {
        let table = Table::from_cells(&[
            vec!["Region", "Q3", ""],
            vec!["North", " 12 ", "up"],
        ]);
        let extraction = ShapeTextExtractor::new().extract(&Shape::new(ShapeKind::Table(table)));
        assert_eq!(extraction.text, "Region Q3 North 12 up");
    }

    #[test]
    fn test_chart_fixed_order() {
        let chart = Chart {
            title: Some(Ok("Revenue".to_string())),
            category_axis_title: Some(Ok("Quarter".to_string())),
            value_axis_title: Some(Ok("USD".to_string())),
            legend: Some(Ok(Legend::default())),
            series: vec![
                ChartSeries {
                    index: 0,
                    name: Some("North".to_string()),
                    data_labels: Some(Ok(vec![
                        DataLabel {
                            index: 0,
                            text: "Peak".to_string(),
                        },
                        DataLabel {
                            index: 2,
                            text: "".to_string(),
                        },
                    ])),
                    ..Default::default()
                },
                ChartSeries {
                    index: 1,
                    name: Some("South".to_string()),
                    data_labels: Some(Ok(vec![DataLabel {
                        index: 1,
                        text: "Dip".to_string(),
                    }])),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let extraction = ShapeTextExtractor::new().extract(&chart_shape(chart));
        assert_eq!(extraction.text, "Revenue Quarter USD North South Peak Dip");
        assert!(extraction.issues.is_empty());
    }

    #[test]
    fn test_chart_graceful_degradation() {
        let extraction = ShapeTextExtractor::new().extract(&chart_shape(Chart::default()));
        assert_eq!(extraction.text, "");
        assert!(extraction.issues.is_empty());
    }

    #[test]
    fn test_chart_broken_features_are_issues() {
        let chart = Chart {
            title: Some(Err(ExtractionIssue::new(IssueFeature::ChartTitle, "truncated"))),
            value_axis_title: Some(Ok("USD".to_string())),
            series: vec![ChartSeries {
                data_labels: Some(Err(ExtractionIssue::new(
                    IssueFeature::DataLabels,
                    "truncated",
                ))),
                ..Default::default()
            }],
            ..Default::default()
        };

        let extraction = ShapeTextExtractor::new().extract(&chart_shape(chart));
        assert_eq!(extraction.text, "USD");
        let features: Vec<_> = extraction.issues.iter().map(|i| i.feature).collect();
        assert_eq!(
            features,
            vec![IssueFeature::ChartTitle, IssueFeature::DataLabels]
        );
    }

    #[test]
    fn test_missing_chart_part_contributes_nothing() {
        let shape = Shape::group(vec![
            Shape::text("Before"),
            Shape::new(ShapeKind::Chart(Err(ExtractionIssue::new(
                IssueFeature::ChartPart,
                "ppt/charts/chart9.xml not found",
            )))),
            Shape::text("After"),
        ]);
        let extraction = ShapeTextExtractor::new().extract(&shape);
        assert_eq!(extraction.text, "Before After");
        assert_eq!(extraction.issues.len(), 1);
    }

    #[test]
    fn test_picture_without_ocr_has_no_text() {
        let extraction = ShapeTextExtractor::new().extract(&picture_shape(png_bytes(2, 2)));
        assert_eq!(extraction.text, "");
        assert!(extraction.images.is_empty());
    }

    #[test]
    fn test_picture_collection_independent_of_ocr() {
        let bytes = b"opaque emf bytes".to_vec();
        let extraction = ShapeTextExtractor::new()
            .with_image_collection(true)
            .extract(&picture_shape(bytes.clone()));
        assert_eq!(extraction.images.len(), 1);
        assert_eq!(&extraction.images[0][..], &bytes[..]);
    }

    #[test]
    fn test_picture_ocr_appends_text() {
        let recognizer = SizeRecognizer;
        let shape = Shape::group(vec![Shape::text("Caption"), picture_shape(png_bytes(4, 5))]);
        let extraction = ShapeTextExtractor::new()
            .with_recognizer(&recognizer)
            .with_image_collection(true)
            .extract(&shape);
        assert_eq!(extraction.text, "Caption scan 4x5");
        assert_eq!(extraction.images.len(), 1);
    }

    #[test]
    fn test_ocr_failure_keeps_image_and_records_issue() {
        let recognizer = FailingRecognizer;
        let extraction = ShapeTextExtractor::new()
            .with_recognizer(&recognizer)
            .with_image_collection(true)
            .extract(&picture_shape(png_bytes(1, 1)));
        assert_eq!(extraction.text, "");
        assert_eq!(extraction.images.len(), 1);
        assert_eq!(extraction.issues[0].feature, IssueFeature::Recognition);
    }

    #[test]
    fn test_unknown_shape_is_empty() {
        let extraction = ShapeTextExtractor::new().extract(&Shape::new(ShapeKind::Unknown));
        assert_eq!(extraction.text, "");
    }
}
