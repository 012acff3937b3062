//! Terminal progress reporting.

use std::io::{self, Write};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use normalmap::batch::{BatchObserver, FileOutcome};

const TEMPLATE: &str = "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}";

/// Drives an `indicatif` bar from batch notifications.
pub struct ProgressObserver {
    bar: ProgressBar,
    /// Merge mode counts folded inputs rather than finished files.
    merge: bool,
}

impl ProgressObserver {
    pub fn new(total: usize, merge: bool, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        let style = ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        Self { bar, merge }
    }

    /// Returns a log writer that clears the bar around each write.
    pub fn log_writer(&self) -> ProgressWriter<io::Stderr> {
        ProgressWriter::new(self.bar.clone(), io::stderr())
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl BatchObserver for ProgressObserver {
    fn on_file_finished(&self, outcome: &FileOutcome) {
        if let FileOutcome::Failed(err) = outcome {
            self.bar.println(format!("failed: {}", err.input().display()));
        }
        if !self.merge {
            self.bar.set_message(file_name(outcome.input()));
            self.bar.inc(1);
        }
    }

    fn on_input_merged(&self, input: &Path) {
        self.bar.set_message(file_name(input));
        self.bar.inc(1);
    }
}

/// Writes through to `inner` with the progress bar suspended, so log lines
/// land above the bar instead of through it.
#[derive(Debug, Clone)]
pub struct ProgressWriter<W> {
    bar: ProgressBar,
    inner: W,
}

impl<W: Write> ProgressWriter<W> {
    pub fn new(bar: ProgressBar, inner: W) -> Self {
        Self { bar, inner }
    }
}

impl<W: Write> Write for ProgressWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = &mut self.inner;
        self.bar.suspend(|| inner.write(buf))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let inner = &mut self.inner;
        self.bar.suspend(|| inner.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
