// Progress bar management using indicatif.
// One byte-based bar over the input file; the message carries rows and chunks.

use crate::driver::{ProgressEvent, ProgressObserver, RunSummary};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;

pub struct ProgressManager {
    bar: Option<ProgressBar>,
}

impl ProgressManager {
    // Create a manager. If enabled=false, no bar is drawn.
    pub fn new(enabled: bool, path: &str, label: &str) -> Self {
        let bar = enabled.then(|| {
            let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            let bar = ProgressBar::new(size);
            if let Ok(style) = progress_style() {
                bar.set_style(style.progress_chars("█ "));
            }
            bar.set_prefix(label.to_string());
            bar
        });
        Self { bar }
    }

    pub fn disabled() -> Self {
        Self { bar: None }
    }
}

impl ProgressObserver for ProgressManager {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(bar) = &self.bar {
            bar.set_position(event.bytes);
            bar.set_message(format!(
                "{} rows, {} chunks, line {}",
                event.rows, event.chunks, event.line
            ));
        }
    }

    fn on_finish(&self, summary: &RunSummary) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(format!(
                "{} rows in {} chunks",
                summary.rows_written,
                summary.chunks.len()
            ));
        }
    }
}

fn progress_style() -> Result<ProgressStyle, indicatif::style::TemplateError> {
    ProgressStyle::with_template(
        "{prefix:20} {bytes:>10}/{total_bytes:<10} [{bar:40}] {percent:>3}% {msg}",
    )
}
