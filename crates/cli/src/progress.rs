//! Terminal progress for a running scan.

use deckscan_core::{ScanObserver, ScanProgress, ScanWarning};
use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{spinner:.green} Scanning [{bar:40.green/dim}] {pos}/{len} decks ({eta})";

/// Progress bar over documents. Skipped documents are reported above the bar.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new(total: usize, visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::with_template(TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    #[cfg(test)]
    fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl ScanObserver for ProgressObserver {
    fn on_progress(&self, progress: ScanProgress) {
        self.bar.set_length(progress.total as u64);
        self.bar.set_position(progress.completed as u64);
    }

    fn on_warning(&self, warning: &ScanWarning) {
        self.bar
            .suspend(|| eprintln!("Skipped {}: {}", warning.document, warning.message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_tracks_completed_documents() {
        let observer = ProgressObserver::new(3, false);
        observer.on_progress(ScanProgress {
            completed: 2,
            total: 3,
        });
        assert_eq!(observer.position(), 2);

        observer.on_warning(&ScanWarning {
            document: "broken.pptx".to_string(),
            path: PathBuf::from("broken.pptx"),
            message: "ZIP error".to_string(),
        });
        observer.finish();
    }
}
