//! Document model: the read-only shape tree a loader hands to the extractor.

use crate::error::{Feature, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A presentation opened by a [`PresentationLoader`].
#[derive(Debug, Clone)]
pub struct Presentation {
    /// Original filename (without path).
    pub filename: String,

    /// Detected format of the source file.
    pub format: PresentationFormat,

    /// Slides in presentation order.
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// Create a new presentation with the given filename and format.
    pub fn new(filename: impl Into<String>, format: PresentationFormat) -> Self {
        Self {
            filename: filename.into(),
            format,
            slides: Vec::new(),
        }
    }

    /// Add a slide to the presentation.
    pub fn add_slide(&mut self, slide: Slide) {
        self.slides.push(slide);
    }
}

/// The format of the source presentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
    /// Legacy PPT (OLE/CFB binary).
    Ppt,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" | "pptm" | "ppsx" => Some(Self::Pptx),
            "ppt" | "pps" => Some(Self::Ppt),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        // PPT is an OLE/CFB file (D0 CF 11 E0 A1 B1 1A E1)
        if bytes.len() >= 8
            && bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1])
        {
            return Some(Self::Ppt);
        }

        None
    }
}

/// The document-opening capability the scanner depends on.
pub trait PresentationLoader: Send + Sync {
    /// Open the document at `path` and return its shape tree.
    fn load(&self, path: &Path) -> Result<Presentation>;
}

/// One slide and its top-level shapes in z-order.
#[derive(Debug, Clone, Default)]
pub struct Slide {
    /// 1-based slide number.
    pub number: usize,

    pub shapes: Vec<Shape>,
}

impl Slide {
    /// Create a new slide with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            shapes: Vec::new(),
        }
    }

    /// Add a top-level shape.
    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}

/// A node of a slide's shape tree.
#[derive(Debug, Clone)]
pub struct Shape {
    pub id: Option<u32>,
    pub name: String,

    /// Distance from the top edge of the slide in EMU. None if unknown.
    pub top: Option<i64>,

    /// Set when the shape fills a layout placeholder.
    pub placeholder: Option<PlaceholderRef>,

    pub kind: ShapeKind,
}

impl Shape {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            id: None,
            name: String::new(),
            top: None,
            placeholder: None,
            kind,
        }
    }

    /// Plain text-carrier shape built from lines of text, one paragraph each.
    pub fn text(text: &str) -> Self {
        Self::new(ShapeKind::Text(TextBody::from_text(text)))
    }

    pub fn group(children: Vec<Shape>) -> Self {
        Self::new(ShapeKind::Group(children))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_top(mut self, top: i64) -> Self {
        self.top = Some(top);
        self
    }

    /// Largest run font size (points) directly owned by this shape.
    ///
    /// Only the shape's own text body counts; children of a group and
    /// table cells are not consulted. Returns 0.0 when no run is sized.
    pub fn max_font_size_pt(&self) -> f64 {
        match &self.kind {
            ShapeKind::Text(body) => body
                .runs()
                .filter_map(|run| run.font_size_pt)
                .fold(0.0, f64::max),
            _ => 0.0,
        }
    }
}

/// Placeholder identity used to inherit geometry from the slide layout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaceholderRef {
    /// Placeholder type (`title`, `body`, `ctrTitle`, ...). None means `obj`.
    pub kind: Option<String>,
    pub idx: Option<u32>,
}

/// What a shape is. One handler per variant in the extractor.
#[derive(Debug, Clone)]
pub enum ShapeKind {
    Group(Vec<Shape>),
    Table(Table),
    Chart(Feature<Chart>),
    Picture(Picture),
    Text(TextBody),
    /// Connectors, SmartArt, OLE frames and anything else without searchable text.
    Unknown,
}

/// Rich text owned by a shape or table cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBody {
    pub paragraphs: Vec<Paragraph>,
}

impl TextBody {
    /// Build an unformatted body, one paragraph per line.
    pub fn from_text(text: &str) -> Self {
        Self {
            paragraphs: text
                .lines()
                .map(|line| Paragraph {
                    runs: vec![TextRun::new(line)],
                })
                .collect(),
        }
    }

    /// Paragraph texts joined with newlines.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.paragraphs.iter().flat_map(|p| p.runs.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font_size_pt: Option<f64>,
}

impl TextRun {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_size_pt: None,
        }
    }

    pub fn sized(text: impl Into<String>, font_size_pt: f64) -> Self {
        Self {
            text: text.into(),
            font_size_pt: Some(font_size_pt),
        }
    }
}

/// A table in row-major order.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Build a table of unformatted cells.
    pub fn from_cells<S: AsRef<str>>(rows: &[Vec<S>]) -> Self {
        Self {
            rows: rows
                .iter()
                .map(|row| TableRow {
                    cells: row
                        .iter()
                        .map(|cell| TextBody::from_text(cell.as_ref()))
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableRow {
    pub cells: Vec<TextBody>,
}

/// A picture and its raw image bytes.
#[derive(Debug, Clone)]
pub struct Picture {
    pub payload: Feature<Arc<[u8]>>,
}

impl Picture {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            payload: Ok(bytes.into()),
        }
    }
}

/// Text-bearing parts of an embedded chart.
///
/// `None` means the part is absent from the chart; `Some(Err(_))` means it
/// was present but could not be read.
#[derive(Debug, Clone, Default)]
pub struct Chart {
    pub title: Option<Feature<String>>,
    pub category_axis_title: Option<Feature<String>>,
    pub value_axis_title: Option<Feature<String>>,
    pub legend: Option<Feature<Legend>>,

    /// Series in display order.
    pub series: Vec<ChartSeries>,

    /// Pie-family charts label legend entries by category instead of series.
    pub varies_by_category: bool,
}

impl Chart {
    /// Legend entry texts in legend order, or None if the chart has no legend.
    pub fn legend_entries(&self) -> Option<Feature<Vec<String>>> {
        let legend = match self.legend.as_ref()? {
            Ok(legend) => legend,
            Err(issue) => return Some(Err(issue.clone())),
        };

        let entries = if self.varies_by_category {
            self.series
                .first()
                .map(|s| {
                    s.categories
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| !legend.is_deleted(*i as u32))
                        .map(|(_, c)| c.clone())
                        .collect()
                })
                .unwrap_or_default()
        } else {
            self.series
                .iter()
                .filter(|s| !legend.is_deleted(s.index))
                .filter_map(|s| s.name.clone())
                .collect()
        };

        Some(Ok(entries))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Legend {
    /// Entry indices the author removed from the legend.
    pub deleted_entries: Vec<u32>,
}

impl Legend {
    pub fn is_deleted(&self, idx: u32) -> bool {
        self.deleted_entries.contains(&idx)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChartSeries {
    pub index: u32,
    pub order: u32,
    pub name: Option<String>,
    pub categories: Vec<String>,

    /// Present when the series declares data labels; labels in point order.
    pub data_labels: Option<Feature<Vec<DataLabel>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLabel {
    /// Point index within the series.
    pub index: u32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionIssue, IssueFeature};

    #[test]
    fn test_format_from_magic() {
        assert_eq!(
            PresentationFormat::from_magic(b"PK\x03\x04rest"),
            Some(PresentationFormat::Pptx)
        );
        assert_eq!(
            PresentationFormat::from_magic(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            Some(PresentationFormat::Ppt)
        );
        assert_eq!(PresentationFormat::from_magic(b"%PDF-1.7"), None);
        assert_eq!(PresentationFormat::from_magic(b"PK"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            PresentationFormat::from_extension("PPTX"),
            Some(PresentationFormat::Pptx)
        );
        assert_eq!(
            PresentationFormat::from_extension("ppt"),
            Some(PresentationFormat::Ppt)
        );
        assert_eq!(PresentationFormat::from_extension("docx"), None);
    }

    #[test]
    fn test_text_body_joins_paragraphs() {
        let body = TextBody {
            paragraphs: vec![
                Paragraph {
                    runs: vec![TextRun::new("Q3 "), TextRun::new("Revenue")],
                },
                Paragraph {
                    runs: vec![TextRun::new("by Region")],
                },
            ],
        };
        assert_eq!(body.text(), "Q3 Revenue\nby Region");
    }

    #[test]
    fn test_max_font_size_only_counts_own_runs() {
        let mut shape = Shape::text("plain");
        assert_eq!(shape.max_font_size_pt(), 0.0);

        if let ShapeKind::Text(body) = &mut shape.kind {
            body.paragraphs[0].runs.push(TextRun::sized("big", 28.0));
            body.paragraphs[0].runs.push(TextRun::sized("small", 12.0));
        }
        assert_eq!(shape.max_font_size_pt(), 28.0);

        let group = Shape::group(vec![shape]);
        assert_eq!(group.max_font_size_pt(), 0.0);
    }

    #[test]
    fn test_legend_entries_from_series_names() {
        let chart = Chart {
            legend: Some(Ok(Legend {
                deleted_entries: vec![1],
            })),
            series: vec![
                ChartSeries {
                    index: 0,
                    name: Some("North".to_string()),
                    ..Default::default()
                },
                ChartSeries {
                    index: 1,
                    name: Some("South".to_string()),
                    ..Default::default()
                },
                ChartSeries {
                    index: 2,
                    name: Some("West".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let entries = chart.legend_entries().unwrap().unwrap();
        assert_eq!(entries, vec!["North", "West"]);
    }

    #[test]
    fn test_legend_entries_from_categories_for_pie() {
        let chart = Chart {
            legend: Some(Ok(Legend::default())),
            varies_by_category: true,
            series: vec![ChartSeries {
                categories: vec!["Apples".to_string(), "Pears".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };

        let entries = chart.legend_entries().unwrap().unwrap();
        assert_eq!(entries, vec!["Apples", "Pears"]);
    }

    #[test]
    fn test_legend_entries_absent_or_broken() {
        let chart = Chart::default();
        assert!(chart.legend_entries().is_none());

        let chart = Chart {
            legend: Some(Err(ExtractionIssue::new(IssueFeature::Legend, "bad"))),
            ..Default::default()
        };
        assert!(matches!(chart.legend_entries(), Some(Err(_))));
    }
}
