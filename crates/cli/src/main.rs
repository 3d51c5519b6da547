//! CLI tool for searching keywords across PowerPoint decks.

mod ocr;
mod output;
mod progress;
mod resolve;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use deckscan_core::matcher::DEFAULT_FUZZY_THRESHOLD;
use deckscan_core::{CorpusScanner, ExportFormat, MatchMode, ReportFormatter, ScanOptions, ScanReport};
use deckscan_pptx::PptxParser;
use ocr::CommandRecognizer;
use progress::ProgressObserver;
use std::path::{Path, PathBuf};

/// Search PowerPoint decks for keywords and list the matching slides.
#[derive(Parser, Debug)]
#[command(name = "deckscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input decks, folders or ZIP archives
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Keyword(s) to search for, comma separated
    #[arg(short, long = "keyword", value_delimiter = ',', required = true)]
    keywords: Vec<String>,

    /// How keywords are matched
    #[arg(short, long, value_enum, default_value_t = Mode::Exact)]
    mode: Mode,

    /// Minimum similarity (0-100) for fuzzy matching
    #[arg(short, long, default_value_t = DEFAULT_FUZZY_THRESHOLD,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    threshold: u8,

    /// OCR command that reads a PNG on stdin and prints text, e.g. "tesseract stdin stdout"
    #[arg(long)]
    ocr_command: Option<String>,

    /// Output file (default: <input folder>/OUTPUT RESULT/deckscan_results.<ext>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (default: from the output extension, else csv)
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Include the full slide text in the output
    #[arg(long)]
    full_text: bool,

    /// Save pictures of matched slides into this directory
    #[arg(long, value_name = "DIR")]
    images: Option<PathBuf>,

    /// Scan one deck at a time
    #[arg(long)]
    sequential: bool,

    /// Folder name skipped while walking inputs
    #[arg(long, default_value = "OUTPUT RESULT")]
    exclude_dir: String,

    /// Delete files left in the results folder by earlier runs
    #[arg(long)]
    clean: bool,

    /// Order results by similarity instead of by deck and slide
    #[arg(long)]
    sort_by_score: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Exact,
    Phrase,
    Fuzzy,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Csv,
    Json,
    Text,
}

impl Args {
    fn match_mode(&self) -> MatchMode {
        match self.mode {
            Mode::Exact => MatchMode::Exact,
            Mode::Phrase => MatchMode::Phrase,
            Mode::Fuzzy => MatchMode::Fuzzy {
                threshold: self.threshold,
            },
        }
    }

    fn keywords(&self) -> Vec<String> {
        self.keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    }

    fn export_format(&self) -> ExportFormat {
        match self.format {
            Some(Format::Csv) => ExportFormat::Csv,
            Some(Format::Json) => ExportFormat::Json,
            Some(Format::Text) => ExportFormat::Text,
            None => self
                .output
                .as_deref()
                .and_then(Path::extension)
                .and_then(|e| e.to_str())
                .and_then(ExportFormat::from_extension)
                .unwrap_or_default(),
        }
    }

    fn output_path(&self, format: ExportFormat) -> PathBuf {
        match (&self.output, self.input.first()) {
            (Some(path), _) => path.clone(),
            (None, Some(first)) => output::default_output_path(first, &self.exclude_dir, format),
            (None, None) => PathBuf::from(format!("deckscan_results.{}", format.extension())),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let keywords = args.keywords();
    if keywords.is_empty() {
        bail!("Please enter at least one keyword");
    }

    let resolved = resolve::resolve_inputs(&args.input, &args.exclude_dir)?;
    if resolved.files.is_empty() {
        bail!("No PowerPoint files found in the given inputs");
    }

    let format = args.export_format();
    let output_path = args.output_path(format);
    output::prepare_output_dir(&output_path, &args.exclude_dir, args.clean)?;

    let options = ScanOptions::new(keywords, args.match_mode())
        .with_images(args.images.is_some())
        .with_parallel(!args.sequential);

    let recognizer = args
        .ocr_command
        .as_deref()
        .map(CommandRecognizer::parse)
        .transpose()?;

    let parser = PptxParser::new();
    let mut scanner = CorpusScanner::new(&parser);
    if let Some(recognizer) = &recognizer {
        scanner = scanner.with_recognizer(recognizer);
    }

    let progress = ProgressObserver::new(resolved.files.len(), !args.verbose);
    let report = scanner.scan(&resolved.files, &options, &progress);
    progress.finish();
    let mut report = report.context("Scan failed")?;

    if args.sort_by_score {
        report.sort_by_score();
    }

    print_summary(&report)?;

    if report.matches.is_empty() {
        return Ok(());
    }

    let content = ReportFormatter::new(format)
        .with_full_text(args.full_text)
        .format(&report.matches)?;
    output::write_output(&output_path, &content)?;
    println!("Results saved to {}", output_path.display());

    if let Some(dir) = &args.images {
        let written = output::write_images(dir, &report.matches)?;
        println!("Saved {} pictures to {}", written, dir.display());
    }

    Ok(())
}

fn print_summary(report: &ScanReport) -> Result<()> {
    if report.matches.is_empty() {
        println!("No matches found.");
    } else {
        print!(
            "{}",
            ReportFormatter::new(ExportFormat::Text).format(&report.matches)?
        );
    }

    println!(
        "\nScanned {}/{} decks: {} matches, {} skipped, {} extraction issues",
        report.documents_scanned,
        report.documents_total,
        report.matches.len(),
        report.warnings.len(),
        report.extraction_issues
    );
    Ok(())
}
