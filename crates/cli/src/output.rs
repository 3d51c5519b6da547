//! Where results go on disk.

use anyhow::{Context, Result};
use deckscan_core::{ExportFormat, MatchRecord};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const RESULTS_STEM: &str = "deckscan_results";

/// `<dir of first input>/<output_dir>/deckscan_results.<ext>`.
pub fn default_output_path(first_input: &Path, output_dir: &str, format: ExportFormat) -> PathBuf {
    let base = if first_input.is_dir() {
        first_input.to_path_buf()
    } else {
        match first_input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    };
    base.join(output_dir)
        .join(format!("{}.{}", RESULTS_STEM, format.extension()))
}

/// Write `content` to `path`, creating parent directories.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;

    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to {}", path.display()))?;

    Ok(())
}

/// Regular files directly inside `dir`. A missing directory has none.
pub fn existing_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", dir.display())),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read {}", dir.display()))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Get the folder of `output_path` ready for a new run.
///
/// With `clean`, files left by earlier runs are deleted, but only when the
/// folder is the dedicated results folder named `results_dir`; subfolders are
/// kept. Without it, leftover files are only reported. Returns the number of
/// files removed.
pub fn prepare_output_dir(output_path: &Path, results_dir: &str, clean: bool) -> Result<usize> {
    let Some(dir) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(0);
    };
    let existing = existing_files(dir)?;
    if existing.is_empty() {
        return Ok(0);
    }

    if !clean {
        log::warn!(
            "{} already holds {} files from earlier runs; pass --clean to remove them",
            dir.display(),
            existing.len()
        );
        return Ok(0);
    }

    if dir.file_name().map_or(true, |name| name != results_dir) {
        log::warn!(
            "Not cleaning {}: only a \"{}\" folder is cleaned",
            dir.display(),
            results_dir
        );
        return Ok(0);
    }

    for file in &existing {
        std::fs::remove_file(file)
            .with_context(|| format!("Failed to remove {}", file.display()))?;
        log::debug!("Removed {}", file.display());
    }
    log::info!("Removed {} old files from {}", existing.len(), dir.display());
    Ok(existing.len())
}

/// File stem per source document. The first deck with a given stem keeps it,
/// later decks with the same stem get `-2`, `-3` and so on.
#[derive(Default)]
struct DocumentStems<'a> {
    assigned: HashMap<&'a Path, String>,
    used: HashSet<String>,
}

impl<'a> DocumentStems<'a> {
    fn stem_for(&mut self, record: &'a MatchRecord) -> String {
        if let Some(stem) = self.assigned.get(record.source_path.as_path()) {
            return stem.clone();
        }

        let base = Path::new(&record.source_document)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.source_document.clone());
        let mut stem = base.clone();
        let mut n = 1;
        while self.used.contains(&stem) {
            n += 1;
            stem = format!("{}-{}", base, n);
        }

        self.used.insert(stem.clone());
        self.assigned.insert(record.source_path.as_path(), stem.clone());
        stem
    }
}

/// Save the pictures of every matched slide once, named
/// `<document stem>_slide<N>_<i>.<ext>`. Returns the number of files written.
pub fn write_images(dir: &Path, matches: &[MatchRecord]) -> Result<usize> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create image directory: {}", dir.display()))?;

    let mut seen = HashSet::new();
    let mut stems = DocumentStems::default();
    let mut written = 0;
    for record in matches {
        if !seen.insert((record.source_path.as_path(), record.slide_index)) {
            continue;
        }
        let stem = stems.stem_for(record);

        for (i, bytes) in record.images.iter().enumerate() {
            let ext = image::guess_format(bytes)
                .ok()
                .and_then(|f| f.extensions_str().first().copied())
                .unwrap_or("bin");
            let path = dir.join(format!("{}_slide{}_{}.{}", stem, record.slide_index, i + 1, ext));
            std::fs::write(&path, bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written += 1;
        }
    }

    Ok(written)
}
