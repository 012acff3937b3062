//! Per-file outcomes and the aggregate batch report.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::FileError;

/// What happened to one input.
#[derive(Debug)]
pub enum FileOutcome {
    /// The normal map was written. In merge mode, the input contributed to
    /// the single merged `output`.
    Written { input: PathBuf, output: PathBuf },

    /// Processing failed.
    Failed(FileError),

    /// The input was never started (fail-fast abort or cancellation).
    Skipped { input: PathBuf },
}

impl FileOutcome {
    /// Returns the input path this outcome belongs to.
    pub fn input(&self) -> &Path {
        match self {
            FileOutcome::Written { input, .. } | FileOutcome::Skipped { input } => input,
            FileOutcome::Failed(err) => err.input(),
        }
    }

    pub fn is_written(&self) -> bool {
        matches!(self, FileOutcome::Written { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileOutcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FileOutcome::Skipped { .. })
    }
}

/// Result of a whole batch run.
///
/// Outcomes are kept in input order regardless of the order in which
/// workers finished.
#[derive(Debug)]
pub struct BatchReport {
    outcomes: Vec<FileOutcome>,
    outputs: Vec<PathBuf>,
    aborted: bool,
    elapsed: Duration,
}

impl BatchReport {
    pub(crate) fn new(
        outcomes: Vec<FileOutcome>,
        outputs: Vec<PathBuf>,
        aborted: bool,
        elapsed: Duration,
    ) -> Self {
        Self {
            outcomes,
            outputs,
            aborted,
            elapsed,
        }
    }

    /// Per-input outcomes, in input order.
    pub fn outcomes(&self) -> &[FileOutcome] {
        &self.outcomes
    }

    /// Every file written by the run.
    ///
    /// In per-file modes this has one entry per written input; in merge
    /// mode it holds the single merged output.
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Failures, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &FileError> {
        self.outcomes.iter().filter_map(|o| match o {
            FileOutcome::Failed(err) => Some(err),
            _ => None,
        })
    }

    pub fn written_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_written()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_skipped()).count()
    }

    /// True if the run stopped early (fail-fast or cancellation).
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// True if every input succeeded and the run was not aborted.
    pub fn is_success(&self) -> bool {
        !self.aborted && self.failed_count() == 0 && self.skipped_count() == 0
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}
