//! Turning command-line inputs into the list of decks to scan.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Decks found in the inputs. Decks unpacked from ZIP archives live in
/// temporary directories that are removed when this is dropped.
#[derive(Debug, Default)]
pub struct ResolvedInputs {
    pub files: Vec<PathBuf>,
    extracted: Vec<TempDir>,
}

/// Expand files, directories and `.zip` archives into presentation paths.
///
/// Directories are walked recursively in name order, skipping any directory
/// named `exclude_dir` and Office lock files (`~$...`).
pub fn resolve_inputs(inputs: &[PathBuf], exclude_dir: &str) -> Result<ResolvedInputs> {
    let mut resolved = ResolvedInputs::default();

    for input in inputs {
        if input.is_dir() {
            walk(input, exclude_dir, &mut resolved.files)
                .with_context(|| format!("Failed to read directory {}", input.display()))?;
        } else if input.is_file() {
            if has_extension(input, "zip") {
                let dir = extract_archive(input, &mut resolved.files)?;
                resolved.extracted.push(dir);
            } else if is_presentation(input) {
                resolved.files.push(input.clone());
            } else {
                log::warn!("Ignoring {}: not a PowerPoint file", input.display());
            }
        } else {
            bail!("Input not found: {}", input.display());
        }
    }

    log::debug!("Resolved {} presentations", resolved.files.len());
    Ok(resolved)
}

fn walk(dir: &Path, exclude_dir: &str, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            if path.file_name().is_some_and(|name| name == exclude_dir) {
                log::debug!("Skipping output directory {}", path.display());
                continue;
            }
            walk(&path, exclude_dir, files)?;
        } else if is_presentation(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Unpack the presentations inside a ZIP archive into a new temporary
/// directory. Each entry gets its own subdirectory so its file name, which is
/// what results show, survives unchanged.
fn extract_archive(archive_path: &Path, files: &mut Vec<PathBuf>) -> Result<TempDir> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to open ZIP {}", archive_path.display()))?;
    let dir = tempfile::tempdir().context("Failed to create temporary directory")?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read entry {} of {}", i, archive_path.display()))?;

        // Entries escaping the archive root are skipped
        let Some(name) = entry.enclosed_name().map(Path::to_path_buf) else {
            continue;
        };
        if entry.is_dir() || name.to_string_lossy().contains("__MACOSX") || !is_presentation(&name) {
            continue;
        }
        let Some(basename) = name.file_name() else {
            continue;
        };

        let entry_dir = dir.path().join(i.to_string());
        std::fs::create_dir_all(&entry_dir)?;
        let out_path = entry_dir.join(basename);

        let mut buf = Vec::new();
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to extract {}", name.display()))?;
        File::create(&out_path)
            .and_then(|mut f| f.write_all(&buf))
            .with_context(|| format!("Failed to write {}", out_path.display()))?;

        files.push(out_path);
    }

    Ok(dir)
}

fn is_presentation(path: &Path) -> bool {
    let is_lock_file = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with("~$"));
    !is_lock_file && (has_extension(path, "pptx") || has_extension(path, "ppt"))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
