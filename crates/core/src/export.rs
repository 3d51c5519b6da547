//! Tabular projection of match records and report output.
//!
//! One [`MatchRow`] per match, rendered as CSV, JSON or a plain-text listing
//! grouped by document.

use crate::error::{Error, Result};
use crate::matcher::MatchRecord;
use serde::Serialize;
use std::fmt::Write as _;

/// CSV column headers, in column order.
pub const CSV_HEADERS: [&str; 6] = [
    "PPT Title",
    "PPT Slide No",
    "Keyword",
    "Similarity",
    "Visualization Title",
    "Excerpt",
];

const FULL_TEXT_HEADER: &str = "Full Text";
const IMAGES_HEADER: &str = "Images";

/// One exported row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRow {
    pub document: String,
    pub slide: usize,
    pub keyword: String,
    pub score: u8,
    pub title: String,
    pub excerpt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,

    /// Number of images attached to the match.
    pub images: usize,
}

impl MatchRow {
    pub fn from_record(record: &MatchRecord, include_full_text: bool) -> Self {
        Self {
            document: record.source_document.clone(),
            slide: record.slide_index,
            keyword: record.keyword.clone(),
            score: record.similarity_score,
            title: record.matched_title.clone(),
            excerpt: record.excerpt.clone(),
            full_text: include_full_text.then(|| record.full_text.to_string()),
            images: record.images.len(),
        }
    }
}

/// Output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Text,
}

impl ExportFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "txt" | "text" => Some(ExportFormat::Text),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
        }
    }
}

/// Renders match records in one [`ExportFormat`].
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    format: ExportFormat,
    include_full_text: bool,
}

impl ReportFormatter {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            include_full_text: false,
        }
    }

    /// Add the full slide text column.
    pub fn with_full_text(mut self, include: bool) -> Self {
        self.include_full_text = include;
        self
    }

    pub fn rows(&self, records: &[MatchRecord]) -> Vec<MatchRow> {
        records
            .iter()
            .map(|r| MatchRow::from_record(r, self.include_full_text))
            .collect()
    }

    /// Render `records`, ending with a trailing newline.
    pub fn format(&self, records: &[MatchRecord]) -> Result<String> {
        let rows = self.rows(records);
        match self.format {
            ExportFormat::Csv => Ok(self.format_csv(&rows)),
            ExportFormat::Json => serde_json::to_string_pretty(&rows)
                .map(|json| format!("{}\n", json))
                .map_err(|e| Error::ExportError(format!("JSON: {}", e))),
            ExportFormat::Text => Ok(format_text(&rows)),
        }
    }

    fn format_csv(&self, rows: &[MatchRow]) -> String {
        let mut headers: Vec<&str> = CSV_HEADERS.to_vec();
        if self.include_full_text {
            headers.push(FULL_TEXT_HEADER);
        }
        headers.push(IMAGES_HEADER);

        let mut out = csv_line(headers.iter().map(|h| h.to_string()));
        for row in rows {
            let mut fields = vec![
                row.document.clone(),
                row.slide.to_string(),
                row.keyword.clone(),
                row.score.to_string(),
                row.title.clone(),
                row.excerpt.clone(),
            ];
            if let Some(text) = &row.full_text {
                fields.push(text.clone());
            }
            fields.push(row.images.to_string());
            out.push_str(&csv_line(fields));
        }
        out
    }
}

fn csv_line(fields: impl IntoIterator<Item = String>) -> String {
    let quoted: Vec<String> = fields.into_iter().map(|f| csv_escape(&f)).collect();
    format!("{}\r\n", quoted.join(","))
}

/// Quote a CSV field when it contains a delimiter, quote or line break.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Listing grouped by document, documents in first-seen order.
fn format_text(rows: &[MatchRow]) -> String {
    let mut groups: Vec<(&str, Vec<&MatchRow>)> = Vec::new();
    for row in rows {
        match groups.iter_mut().find(|(doc, _)| *doc == row.document) {
            Some((_, members)) => members.push(row),
            None => groups.push((row.document.as_str(), vec![row])),
        }
    }

    let mut out = String::new();
    for (i, (document, members)) in groups.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}:", document);
        for row in members {
            let title = if row.title.is_empty() {
                "(untitled)"
            } else {
                row.title.as_str()
            };
            let _ = writeln!(
                out,
                "   - Slide {}: {} [{} {}%]",
                row.slide, title, row.keyword, row.score
            );
        }
    }
    out
}
