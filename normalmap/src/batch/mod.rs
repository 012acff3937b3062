//! Batch execution of heightmap → normal map conversions.
//!
//! The [`BatchExecutor`] takes a list of input paths and a [`BatchConfig`]
//! and runs one of three dispatch strategies:
//!
//! - **Sequential**: decode → generate → encode, one file at a time.
//! - **Parallel**: the same pipeline, one pool task per file.
//! - **Merge**: average every input into one heightmap and write a single
//!   normal map.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        BatchExecutor                         │
//! │                                                              │
//! │  inputs ──► plan outputs ──► create output dir ──► dispatch  │
//! │                                                     │        │
//! │        ┌────────────────────┬───────────────────────┤        │
//! │        ▼                    ▼                       ▼        │
//! │   Sequential           Parallel                  Merge       │
//! │   (caller thread)      WorkerPool ──► outcomes   probe all   │
//! │                        channel  ◄── FileOutcome  fold, write │
//! │                          │                                   │
//! │                          └─► first failure + FailFast        │
//! │                              ──► cancel pending tasks        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers never abort the process. Every task reports a [`FileOutcome`]
//! back to the orchestrator, which decides whether the batch continues
//! according to its [`ErrorPolicy`].
//!
//! # Example
//!
//! ```no_run
//! use normalmap::batch::{BatchConfig, BatchExecutor, DispatchMode};
//! use normalmap::codec::PngCodec;
//! use std::sync::Arc;
//!
//! let config = BatchConfig::new("out").with_mode(DispatchMode::Parallel { workers: 4 });
//! let executor = BatchExecutor::new(config, Arc::new(PngCodec::new()));
//!
//! let report = executor.run(&["rock.png", "sand.png"]).unwrap();
//! println!("wrote {} normal maps", report.written_count());
//! ```

mod config;
mod error;
mod merge;
mod naming;
mod policy;
mod report;

pub use config::{BatchConfig, DispatchMode, DEFAULT_OUTPUT_SUFFIX, DEFAULT_SCALE};
pub use error::{BatchError, FileError};
pub use merge::{DimensionMismatch, HeightAccumulator};
pub use naming::{duplicate_outputs, file_stem, output_path};
pub use policy::{AveragingMode, ErrorPolicy};
pub use report::{BatchReport, FileOutcome};

use std::error::Error;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::channel;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::ImageCodec;
use crate::normal::NormalMapGenerator;
use crate::pool::WorkerPool;

/// Receives progress notifications from a running batch.
///
/// Callbacks run on the orchestrating thread, never on pool workers.
pub trait BatchObserver: Send + Sync {
    /// Called once per input with its final outcome.
    fn on_file_finished(&self, _outcome: &FileOutcome) {}

    /// Called in merge mode after each input is folded into the average.
    fn on_input_merged(&self, _input: &Path) {}
}

/// One planned per-file conversion.
#[derive(Debug, Clone)]
struct FileJob {
    input: PathBuf,
    output: PathBuf,
}

/// Raw result of a dispatch strategy, before timing is attached.
struct RunOutput {
    outcomes: Vec<FileOutcome>,
    outputs: Vec<PathBuf>,
    aborted: bool,
}

/// Orchestrates normal map generation across many inputs.
pub struct BatchExecutor {
    config: BatchConfig,
    codec: Arc<dyn ImageCodec>,
    cancel: CancellationToken,
    observer: Option<Arc<dyn BatchObserver>>,
}

impl BatchExecutor {
    /// Creates an executor for `config` using `codec` for all file I/O.
    pub fn new(config: BatchConfig, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            config,
            codec,
            cancel: CancellationToken::new(),
            observer: None,
        }
    }

    /// Uses `token` to cancel the run from outside (e.g. on Ctrl-C).
    ///
    /// Inputs not yet started when the token fires are reported as
    /// skipped; files in flight finish normally.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attaches a progress observer.
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Returns a handle to the executor's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the batch over `inputs`.
    ///
    /// Per-file failures do not make this return `Err`; they are recorded in
    /// the [`BatchReport`]. Check [`BatchReport::is_success`].
    ///
    /// # Errors
    ///
    /// Returns [`BatchError`] for problems that prevent the batch from
    /// running at all: no inputs, an input without an extension, invalid
    /// configuration, an uncreatable output directory, or (in merge mode) a
    /// dimension mismatch or failed input.
    pub fn run<P: AsRef<Path>>(&self, inputs: &[P]) -> Result<BatchReport, BatchError> {
        let inputs: Vec<PathBuf> = inputs.iter().map(|p| p.as_ref().to_path_buf()).collect();
        if inputs.is_empty() {
            return Err(BatchError::NoInputs);
        }
        self.config.validate().map_err(BatchError::InvalidConfig)?;

        let started = Instant::now();
        info!(
            mode = self.config.mode.name(),
            inputs = inputs.len(),
            scale = self.config.scale,
            output_dir = %self.config.output_dir.display(),
            codec = self.codec.name(),
            "Starting batch"
        );

        let output = match &self.config.mode {
            DispatchMode::Sequential => {
                let jobs = self.plan(&inputs)?;
                self.prepare_output_dir()?;
                self.run_sequential(jobs)
            }
            DispatchMode::Parallel { workers } => {
                let jobs = self.plan(&inputs)?;
                self.prepare_output_dir()?;
                self.run_parallel(jobs, *workers)?
            }
            DispatchMode::Merge { output_name } => {
                self.prepare_output_dir()?;
                self.run_merge(&inputs, output_name)?
            }
        };

        let report = BatchReport::new(
            output.outcomes,
            output.outputs,
            output.aborted,
            started.elapsed(),
        );

        info!(
            written = report.written_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            aborted = report.is_aborted(),
            elapsed_ms = report.elapsed().as_millis() as u64,
            "Batch finished"
        );
        Ok(report)
    }

    fn generator(&self) -> NormalMapGenerator {
        NormalMapGenerator::new(self.config.scale)
    }

    fn notify(&self, outcome: &FileOutcome) {
        if let Some(observer) = &self.observer {
            observer.on_file_finished(outcome);
        }
    }

    /// Derives every output path up front so naming errors surface before
    /// any file is touched.
    fn plan(&self, inputs: &[PathBuf]) -> Result<Vec<FileJob>, BatchError> {
        let jobs = inputs
            .iter()
            .map(|input| {
                let output =
                    output_path(input, &self.config.output_dir, &self.config.output_suffix)
                        .ok_or_else(|| BatchError::NoExtension {
                            path: input.clone(),
                        })?;
                Ok(FileJob {
                    input: input.clone(),
                    output,
                })
            })
            .collect::<Result<Vec<_>, BatchError>>()?;

        for output in duplicate_outputs(jobs.iter().map(|job| job.output.as_path())) {
            warn!(
                output = %output.display(),
                "Several inputs write the same output; the last one written wins"
            );
        }

        Ok(jobs)
    }

    fn prepare_output_dir(&self) -> Result<(), BatchError> {
        let dir = &self.config.output_dir;
        fs::create_dir_all(dir).map_err(|source| BatchError::CreateOutputDir {
            path: dir.clone(),
            source,
        })
    }

    // =========================================================================
    // Sequential
    // =========================================================================

    fn run_sequential(&self, jobs: Vec<FileJob>) -> RunOutput {
        let generator = self.generator();
        let continue_on_error = self.config.error_policy.continues_after_failure();

        let mut outcomes = Vec::with_capacity(jobs.len());
        let mut outputs = Vec::new();
        let mut aborted = false;

        for job in jobs {
            if aborted || self.cancel.is_cancelled() {
                aborted = true;
                let outcome = FileOutcome::Skipped { input: job.input };
                self.notify(&outcome);
                outcomes.push(outcome);
                continue;
            }

            let outcome = process_file_guarded(self.codec.as_ref(), generator, job);
            match &outcome {
                FileOutcome::Written { output, .. } => outputs.push(output.clone()),
                FileOutcome::Failed(err) => {
                    warn!(input = %err.input().display(), error = err as &dyn Error, "File failed");
                    if !continue_on_error {
                        warn!("Aborting batch after failure");
                        aborted = true;
                    }
                }
                FileOutcome::Skipped { .. } => {}
            }
            self.notify(&outcome);
            outcomes.push(outcome);
        }

        RunOutput {
            outcomes,
            outputs,
            aborted,
        }
    }

    // =========================================================================
    // Parallel
    // =========================================================================

    fn run_parallel(&self, jobs: Vec<FileJob>, workers: usize) -> Result<RunOutput, BatchError> {
        let generator = self.generator();
        let continue_on_error = self.config.error_policy.continues_after_failure();
        let pool = WorkerPool::with_order(workers, self.config.queue_order)?;

        // Child token: fail-fast cancels this batch only, while a cancelled
        // parent still reaches every task.
        let token = self.cancel.child_token();
        let (tx, rx) = channel::unbounded::<(usize, FileOutcome)>();
        let inputs: Vec<PathBuf> = jobs.iter().map(|job| job.input.clone()).collect();

        for (index, job) in jobs.into_iter().enumerate() {
            let codec = Arc::clone(&self.codec);
            let token = token.clone();
            let tx = tx.clone();
            let name = job.input.display().to_string();

            pool.add_named(name, move || {
                let outcome = if token.is_cancelled() {
                    FileOutcome::Skipped { input: job.input }
                } else {
                    process_file_guarded(codec.as_ref(), generator, job)
                };
                // The orchestrator holds the receiver until every sender is
                // gone, so this only fails if it has itself panicked.
                let _ = tx.send((index, outcome));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<FileOutcome>> = inputs.iter().map(|_| None).collect();
        let mut aborted = false;

        // Ends once every task has run (or panicked) and dropped its sender.
        for (index, outcome) in rx.iter() {
            match &outcome {
                FileOutcome::Failed(err) => {
                    warn!(input = %err.input().display(), error = err as &dyn Error, "File failed");
                    if !continue_on_error && !aborted {
                        warn!("Aborting batch after failure, cancelling pending files");
                        aborted = true;
                        token.cancel();
                    }
                }
                FileOutcome::Skipped { .. } => aborted = true,
                FileOutcome::Written { .. } => {}
            }
            self.notify(&outcome);
            slots[index] = Some(outcome);
        }

        let stats = pool.join();
        debug!(
            completed = stats.completed,
            panicked = stats.panicked,
            "Worker pool drained"
        );

        let mut outputs = Vec::new();
        let outcomes: Vec<FileOutcome> = slots
            .into_iter()
            .zip(inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| {
                    let outcome = FileOutcome::Failed(FileError::Panicked { input });
                    self.notify(&outcome);
                    outcome
                })
            })
            .inspect(|outcome| {
                if let FileOutcome::Written { output, .. } = outcome {
                    outputs.push(output.clone());
                }
            })
            .collect();

        if !continue_on_error && outcomes.iter().any(FileOutcome::is_failed) {
            aborted = true;
        }

        Ok(RunOutput {
            outcomes,
            outputs,
            aborted,
        })
    }

    // =========================================================================
    // Merge
    // =========================================================================

    fn run_merge(&self, inputs: &[PathBuf], output_name: &str) -> Result<RunOutput, BatchError> {
        let continue_on_error = self.config.error_policy.continues_after_failure();
        let mut slots: Vec<Option<FileOutcome>> = inputs.iter().map(|_| None).collect();
        let mut accepted: Vec<usize> = Vec::with_capacity(inputs.len());
        let mut expected: Option<(u32, u32)> = None;

        // Every size is checked before any pixel is accumulated.
        for (index, input) in inputs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(BatchError::Cancelled);
            }

            match self.codec.probe(input) {
                Ok(dims) => {
                    match expected {
                        None => expected = Some(dims),
                        Some(first) if first != dims => {
                            return Err(BatchError::DimensionMismatch {
                                path: input.clone(),
                                expected: first,
                                actual: dims,
                            });
                        }
                        Some(_) => {}
                    }
                    accepted.push(index);
                }
                Err(source) => {
                    let err = FileError::Decode {
                        input: input.clone(),
                        source,
                    };
                    if !continue_on_error {
                        return Err(BatchError::Input(err));
                    }
                    warn!(input = %input.display(), error = &err as &dyn Error, "Excluding input from merge");
                    slots[index] = Some(FileOutcome::Failed(err));
                }
            }
        }

        let output = self.config.output_dir.join(output_name);
        let mut outputs = Vec::new();

        if let Some((width, height)) = expected {
            let mut accumulator = HeightAccumulator::new(
                width,
                height,
                accepted.len() as u32,
                self.config.averaging,
            );

            for &index in &accepted {
                if self.cancel.is_cancelled() {
                    return Err(BatchError::Cancelled);
                }

                let input = &inputs[index];
                let heightmap = self.codec.decode(input).map_err(|source| {
                    BatchError::Input(FileError::Decode {
                        input: input.clone(),
                        source,
                    })
                })?;
                accumulator
                    .fold(&heightmap)
                    .map_err(|m| BatchError::DimensionMismatch {
                        path: input.clone(),
                        expected: m.expected,
                        actual: m.actual,
                    })?;

                debug!(input = %input.display(), folded = accumulator.folded(), "Merged input");
                if let Some(observer) = &self.observer {
                    observer.on_input_merged(input);
                }
            }

            let normals = self.generator().generate(&accumulator.finish());
            self.codec
                .encode(&output, &normals)
                .map_err(BatchError::Output)?;
            info!(output = %output.display(), inputs = accepted.len(), averaging = %self.config.averaging, "Wrote merged normal map");

            for &index in &accepted {
                slots[index] = Some(FileOutcome::Written {
                    input: inputs[index].clone(),
                    output: output.clone(),
                });
            }
            outputs.push(output);
        } else {
            warn!("No readable inputs to merge");
        }

        let outcomes: Vec<FileOutcome> = slots
            .into_iter()
            .zip(inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| FileOutcome::Skipped {
                    input: input.clone(),
                })
            })
            .collect();
        for outcome in &outcomes {
            self.notify(outcome);
        }

        Ok(RunOutput {
            outcomes,
            outputs,
            aborted: false,
        })
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("config", &self.config)
            .field("codec", &self.codec.name())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Runs [`process_file`], turning a panic into a `Panicked` failure so the
/// orchestrator applies its error policy to it like any other failure.
fn process_file_guarded(
    codec: &dyn ImageCodec,
    generator: NormalMapGenerator,
    job: FileJob,
) -> FileOutcome {
    let input = job.input.clone();
    panic::catch_unwind(AssertUnwindSafe(|| process_file(codec, generator, job))).unwrap_or_else(
        |_| {
            warn!(input = %input.display(), "Processing panicked");
            FileOutcome::Failed(FileError::Panicked { input })
        },
    )
}

/// Runs the full decode → generate → encode pipeline for one file.
fn process_file(codec: &dyn ImageCodec, generator: NormalMapGenerator, job: FileJob) -> FileOutcome {
    let heightmap = match codec.decode(&job.input) {
        Ok(heightmap) => heightmap,
        Err(source) => {
            return FileOutcome::Failed(FileError::Decode {
                input: job.input,
                source,
            })
        }
    };

    let normals = generator.generate(&heightmap);
    drop(heightmap);

    if let Err(source) = codec.encode(&job.output, &normals) {
        return FileOutcome::Failed(FileError::Encode {
            input: job.input,
            source,
        });
    }

    debug!(
        input = %job.input.display(),
        output = %job.output.display(),
        width = normals.width(),
        height = normals.height(),
        "Wrote normal map"
    );
    FileOutcome::Written {
        input: job.input,
        output: job.output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;
    use crate::heightmap::Heightmap;
    use crate::normal::NormalMap;
    use parking_lot::{Condvar, Mutex};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// In-memory codec: decodes from a fixed table, records encodes.
    #[derive(Default)]
    struct MockCodec {
        inputs: HashMap<PathBuf, Heightmap>,
        written: Mutex<HashMap<PathBuf, NormalMap>>,
        decodes: AtomicUsize,
        fail_encode: bool,
        /// Decoding this path panics.
        panic_on: Option<PathBuf>,
        /// Header dimensions that disagree with the stored map.
        header_dims: HashMap<PathBuf, (u32, u32)>,
        /// Other decodes wait here until the gate opens.
        gate: Option<Arc<Gate>>,
    }

    /// One-shot latch with a timeout so a missed `open` fails instead of
    /// hanging the test.
    #[derive(Default)]
    struct Gate {
        open: Mutex<bool>,
        opened: Condvar,
    }

    impl Gate {
        fn open(&self) {
            *self.open.lock() = true;
            self.opened.notify_all();
        }

        fn wait(&self) {
            let mut open = self.open.lock();
            if !*open {
                self.opened.wait_for(&mut open, Duration::from_secs(5));
            }
        }
    }

    impl MockCodec {
        fn with_inputs(inputs: Vec<(&str, Heightmap)>) -> Self {
            Self {
                inputs: inputs
                    .into_iter()
                    .map(|(p, h)| (PathBuf::from(p), h))
                    .collect(),
                ..Self::default()
            }
        }

        fn written(&self, path: &Path) -> Option<NormalMap> {
            self.written.lock().get(path).cloned()
        }

        fn written_count(&self) -> usize {
            self.written.lock().len()
        }
    }

    impl ImageCodec for MockCodec {
        fn decode(&self, path: &Path) -> Result<Heightmap, CodecError> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            if self.panic_on.as_deref() == Some(path) {
                panic!("corrupt decoder state for {}", path.display());
            }
            if let Some(gate) = &self.gate {
                gate.wait();
            }
            self.inputs
                .get(path)
                .cloned()
                .ok_or_else(|| CodecError::NotFound {
                    path: path.to_path_buf(),
                })
        }

        fn probe(&self, path: &Path) -> Result<(u32, u32), CodecError> {
            if let Some(&dims) = self.header_dims.get(path) {
                return Ok(dims);
            }
            self.inputs
                .get(path)
                .map(Heightmap::dimensions)
                .ok_or_else(|| CodecError::NotFound {
                    path: path.to_path_buf(),
                })
        }

        fn encode(&self, path: &Path, normals: &NormalMap) -> Result<(), CodecError> {
            if self.fail_encode {
                return Err(CodecError::Encode {
                    path: path.to_path_buf(),
                    reason: "read-only".to_string(),
                });
            }
            self.written
                .lock()
                .insert(path.to_path_buf(), normals.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        finished: AtomicUsize,
        merged: AtomicUsize,
    }

    impl BatchObserver for CountingObserver {
        fn on_file_finished(&self, _outcome: &FileOutcome) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }

        fn on_input_merged(&self, _input: &Path) {
            self.merged.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn ramp(width: u32, height: u32, seed: u8) -> Heightmap {
        let samples = (0..width * height)
            .map(|i| (i as u8).wrapping_mul(37).wrapping_add(seed))
            .collect();
        Heightmap::new(width, height, samples).unwrap()
    }

    fn many_inputs(count: usize) -> (Vec<String>, MockCodec) {
        let names: Vec<String> = (0..count).map(|i| format!("in/h{:02}.png", i)).collect();
        let codec = MockCodec::with_inputs(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.as_str(), ramp(8, 6, i as u8)))
                .collect(),
        );
        (names, codec)
    }

    fn executor(config: BatchConfig, codec: &Arc<MockCodec>) -> BatchExecutor {
        BatchExecutor::new(config, Arc::clone(codec) as Arc<dyn ImageCodec>)
    }

    #[test]
    fn test_sequential_writes_every_input() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("maps/a.png", ramp(4, 4, 0)),
            ("maps/b.tga", ramp(4, 4, 9)),
        ]));

        let report = executor(BatchConfig::new(temp.path()), &codec)
            .run(&["maps/a.png", "maps/b.tga"])
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.written_count(), 2);
        assert_eq!(
            report.outputs(),
            &[
                temp.path().join("a_normals.png"),
                temp.path().join("b_normals.png")
            ]
        );
        let expected = NormalMapGenerator::new(DEFAULT_SCALE).generate(&ramp(4, 4, 9));
        assert_eq!(codec.written(&temp.path().join("b_normals.png")), Some(expected));
    }

    #[test]
    fn test_no_inputs() {
        let codec = Arc::new(MockCodec::default());
        let inputs: [&str; 0] = [];
        let err = executor(BatchConfig::default(), &codec)
            .run(&inputs)
            .unwrap_err();
        assert!(matches!(err, BatchError::NoInputs));
    }

    #[test]
    fn test_missing_extension_fails_before_any_work() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("out");
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a.png", ramp(2, 2, 0)),
            ("noext", ramp(2, 2, 0)),
        ]));

        let err = executor(BatchConfig::new(&out), &codec)
            .run(&["a.png", "noext"])
            .unwrap_err();

        assert!(matches!(err, BatchError::NoExtension { ref path } if path == Path::new("noext")));
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
        assert!(!out.exists());
    }

    #[test]
    fn test_creates_nested_output_dir() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("deep").join("er");
        let codec = Arc::new(MockCodec::with_inputs(vec![("a.png", ramp(2, 2, 0))]));

        executor(BatchConfig::new(&out), &codec)
            .run(&["a.png"])
            .unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_sequential_fail_fast_stops_at_first_failure() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a.png", ramp(3, 3, 0)),
            ("c.png", ramp(3, 3, 1)),
        ]));

        let report = executor(BatchConfig::new(temp.path()), &codec)
            .run(&["a.png", "missing.png", "c.png"])
            .unwrap();

        assert!(report.is_aborted());
        assert!(report.outcomes()[0].is_written());
        assert!(report.outcomes()[1].is_failed());
        assert!(report.outcomes()[2].is_skipped());
        // Earlier output stays on disk.
        assert_eq!(codec.written_count(), 1);
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sequential_continue_on_error() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a.png", ramp(3, 3, 0)),
            ("c.png", ramp(3, 3, 1)),
        ]));
        let config =
            BatchConfig::new(temp.path()).with_error_policy(ErrorPolicy::ContinueOnError);

        let report = executor(config, &codec)
            .run(&["a.png", "missing.png", "c.png"])
            .unwrap();

        assert!(!report.is_aborted());
        assert!(!report.is_success());
        assert_eq!(report.written_count(), 2);
        assert_eq!(report.failed_count(), 1);
        let failure = report.failures().next().unwrap();
        assert!(matches!(failure, FileError::Decode { source, .. } if source.is_not_found()));
    }

    #[test]
    fn test_encode_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec {
            fail_encode: true,
            ..MockCodec::with_inputs(vec![("a.png", ramp(2, 2, 0))])
        });

        let report = executor(BatchConfig::new(temp.path()), &codec)
            .run(&["a.png"])
            .unwrap();
        assert!(matches!(
            report.failures().next(),
            Some(FileError::Encode { .. })
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let (names, codec) = many_inputs(24);
        let codec = Arc::new(codec);
        let seq_dir = TempDir::new().unwrap();
        let par_dir = TempDir::new().unwrap();

        let sequential = executor(BatchConfig::new(seq_dir.path()), &codec)
            .run(&names)
            .unwrap();
        let parallel = executor(
            BatchConfig::new(par_dir.path()).with_mode(DispatchMode::Parallel { workers: 4 }),
            &codec,
        )
        .run(&names)
        .unwrap();

        assert!(sequential.is_success());
        assert!(parallel.is_success());
        assert_eq!(parallel.written_count(), 24);
        for (seq, par) in sequential.outputs().iter().zip(parallel.outputs()) {
            assert_eq!(seq.file_name(), par.file_name());
            assert_eq!(codec.written(seq), codec.written(par));
        }
        // Outcomes stay in input order.
        for (outcome, name) in parallel.outcomes().iter().zip(&names) {
            assert_eq!(outcome.input(), Path::new(name));
        }
    }

    #[test]
    fn test_parallel_lifo_processes_everything() {
        let (names, codec) = many_inputs(10);
        let codec = Arc::new(codec);
        let temp = TempDir::new().unwrap();
        let config = BatchConfig::new(temp.path())
            .with_mode(DispatchMode::Parallel { workers: 2 })
            .with_queue_order(crate::pool::QueueOrder::Lifo);

        let report = executor(config, &codec).run(&names).unwrap();
        assert_eq!(report.written_count(), 10);
        assert_eq!(codec.written_count(), 10);
    }

    #[test]
    fn test_parallel_fail_fast_aborts() {
        let (mut names, codec) = many_inputs(12);
        names.insert(3, "in/missing.png".to_string());
        let codec = Arc::new(codec);
        let temp = TempDir::new().unwrap();
        let config =
            BatchConfig::new(temp.path()).with_mode(DispatchMode::Parallel { workers: 1 });

        let report = executor(config, &codec).run(&names).unwrap();

        assert!(report.is_aborted());
        assert_eq!(report.failed_count(), 1);
        assert!(report.outcomes()[3].is_failed());
        // FIFO on one worker: everything before the failure was written.
        assert!(report.outcomes()[..3].iter().all(FileOutcome::is_written));
        assert_eq!(
            report.written_count() + report.failed_count() + report.skipped_count(),
            names.len()
        );
    }

    #[test]
    fn test_parallel_continue_on_error() {
        let (mut names, codec) = many_inputs(8);
        names.push("in/missing.png".to_string());
        let codec = Arc::new(codec);
        let temp = TempDir::new().unwrap();
        let config = BatchConfig::new(temp.path())
            .with_mode(DispatchMode::Parallel { workers: 3 })
            .with_error_policy(ErrorPolicy::ContinueOnError);

        let report = executor(config, &codec).run(&names).unwrap();
        assert!(!report.is_aborted());
        assert_eq!(report.written_count(), 8);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.skipped_count(), 0);
    }

    #[test]
    fn test_cancelled_before_start_skips_everything() {
        for mode in [
            DispatchMode::Sequential,
            DispatchMode::Parallel { workers: 2 },
        ] {
            let (names, codec) = many_inputs(5);
            let codec = Arc::new(codec);
            let temp = TempDir::new().unwrap();
            let token = CancellationToken::new();
            token.cancel();

            let report = executor(BatchConfig::new(temp.path()).with_mode(mode), &codec)
                .with_cancellation(token)
                .run(&names)
                .unwrap();

            assert!(report.is_aborted());
            assert_eq!(report.skipped_count(), 5);
            assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_parallel_zero_workers_is_invalid() {
        let codec = Arc::new(MockCodec::with_inputs(vec![("a.png", ramp(2, 2, 0))]));
        let config = BatchConfig::default().with_mode(DispatchMode::Parallel { workers: 0 });
        let err = executor(config, &codec).run(&["a.png"]).unwrap_err();
        assert!(matches!(err, BatchError::InvalidConfig(_)));
    }

    fn merge_config(dir: &Path) -> BatchConfig {
        BatchConfig::new(dir).with_mode(DispatchMode::Merge {
            output_name: "merged.png".to_string(),
        })
    }

    #[test]
    fn test_merge_identical_inputs_matches_direct() {
        let temp = TempDir::new().unwrap();
        let source = ramp(7, 5, 3);
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a.png", source.clone()),
            ("b.png", source.clone()),
            ("c.png", source.clone()),
        ]));

        let report = executor(merge_config(temp.path()), &codec)
            .run(&["a.png", "b.png", "c.png"])
            .unwrap();

        let merged_path = temp.path().join("merged.png");
        assert!(report.is_success());
        assert_eq!(report.outputs(), &[merged_path.clone()]);
        assert_eq!(codec.written_count(), 1);

        let direct = NormalMapGenerator::new(DEFAULT_SCALE).generate(&source);
        assert_eq!(codec.written(&merged_path), Some(direct));
    }

    #[test]
    fn test_merge_legacy_averaging_within_tolerance() {
        let temp = TempDir::new().unwrap();
        let source = ramp(6, 6, 11);
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a.png", source.clone()),
            ("b.png", source.clone()),
            ("c.png", source.clone()),
        ]));
        let config = merge_config(temp.path()).with_averaging(AveragingMode::LegacyTruncated);

        executor(config, &codec)
            .run(&["a.png", "b.png", "c.png"])
            .unwrap();

        let mut legacy = HeightAccumulator::new(6, 6, 3, AveragingMode::LegacyTruncated);
        for _ in 0..3 {
            legacy.fold(&source).unwrap();
        }
        let merged = legacy.finish();
        for (m, s) in merged.samples().iter().zip(source.samples()) {
            assert!(s - m <= 2, "legacy average {} drifted from {}", m, s);
        }
        let expected = NormalMapGenerator::new(DEFAULT_SCALE).generate(&merged);
        assert_eq!(
            codec.written(&temp.path().join("merged.png")),
            Some(expected)
        );
    }

    #[test]
    fn test_merge_dimension_mismatch_is_typed_error() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a.png", ramp(4, 4, 0)),
            ("b.png", ramp(4, 3, 0)),
        ]));

        let err = executor(merge_config(temp.path()), &codec)
            .run(&["a.png", "b.png"])
            .unwrap_err();

        match err {
            BatchError::DimensionMismatch {
                path,
                expected,
                actual,
            } => {
                assert_eq!(path, PathBuf::from("b.png"));
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (4, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Nothing was decoded or written.
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
        assert_eq!(codec.written_count(), 0);
    }

    #[test]
    fn test_merge_missing_input_fail_fast() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::with_inputs(vec![("a.png", ramp(4, 4, 0))]));

        let err = executor(merge_config(temp.path()), &codec)
            .run(&["a.png", "gone.png"])
            .unwrap_err();
        assert!(matches!(err, BatchError::Input(FileError::Decode { .. })));
        assert_eq!(codec.written_count(), 0);
    }

    #[test]
    fn test_merge_continue_on_error_averages_remaining() {
        let temp = TempDir::new().unwrap();
        let source = ramp(4, 4, 5);
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a.png", source.clone()),
            ("b.png", source.clone()),
        ]));
        let config = merge_config(temp.path()).with_error_policy(ErrorPolicy::ContinueOnError);

        let report = executor(config, &codec)
            .run(&["a.png", "gone.png", "b.png"])
            .unwrap();

        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.written_count(), 2);
        let direct = NormalMapGenerator::new(DEFAULT_SCALE).generate(&source);
        assert_eq!(
            codec.written(&temp.path().join("merged.png")),
            Some(direct)
        );
    }

    #[test]
    fn test_merge_accepts_inputs_without_extension() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::with_inputs(vec![("raw", ramp(2, 2, 0))]));
        let report = executor(merge_config(temp.path()), &codec)
            .run(&["raw"])
            .unwrap();
        assert!(report.is_success());
    }

    #[test]
    fn test_observer_sees_every_file() {
        let temp = TempDir::new().unwrap();
        let (names, codec) = many_inputs(6);
        let codec = Arc::new(codec);
        let observer = Arc::new(CountingObserver::default());

        executor(
            BatchConfig::new(temp.path()).with_mode(DispatchMode::Parallel { workers: 3 }),
            &codec,
        )
        .with_observer(Arc::clone(&observer) as Arc<dyn BatchObserver>)
        .run(&names)
        .unwrap();
        assert_eq!(observer.finished.load(Ordering::SeqCst), 6);

        let merge_observer = Arc::new(CountingObserver::default());
        executor(merge_config(temp.path()), &codec)
            .with_observer(Arc::clone(&merge_observer) as Arc<dyn BatchObserver>)
            .run(&names)
            .unwrap();
        assert_eq!(merge_observer.merged.load(Ordering::SeqCst), 6);
        assert_eq!(merge_observer.finished.load(Ordering::SeqCst), 6);
    }

    /// Opens the codec gate once the orchestrator has seen a failure.
    struct OpenGateOnFailure(Arc<Gate>);

    impl BatchObserver for OpenGateOnFailure {
        fn on_file_finished(&self, outcome: &FileOutcome) {
            if outcome.is_failed() {
                self.0.open();
            }
        }
    }

    /// Cancels the run after the first input is merged.
    struct CancelAfterFirstMerge(CancellationToken);

    impl BatchObserver for CancelAfterFirstMerge {
        fn on_input_merged(&self, _input: &Path) {
            self.0.cancel();
        }
    }

    #[test]
    fn test_sequential_panic_is_a_failure() {
        let temp = TempDir::new().unwrap();
        let (names, codec) = many_inputs(3);
        let codec = Arc::new(MockCodec {
            panic_on: Some(PathBuf::from(&names[0])),
            ..codec
        });

        let report = executor(BatchConfig::new(temp.path()), &codec)
            .run(&names)
            .unwrap();

        assert!(report.is_aborted());
        assert!(matches!(
            report.outcomes()[0],
            FileOutcome::Failed(FileError::Panicked { .. })
        ));
        assert!(report.outcomes()[1..].iter().all(FileOutcome::is_skipped));
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequential_panic_continue_on_error() {
        let temp = TempDir::new().unwrap();
        let (names, codec) = many_inputs(3);
        let codec = Arc::new(MockCodec {
            panic_on: Some(PathBuf::from(&names[1])),
            ..codec
        });
        let config =
            BatchConfig::new(temp.path()).with_error_policy(ErrorPolicy::ContinueOnError);

        let report = executor(config, &codec).run(&names).unwrap();

        assert_eq!(report.written_count(), 2);
        assert!(matches!(
            report.failures().next(),
            Some(FileError::Panicked { input }) if input == Path::new(&names[1])
        ));
    }

    #[test]
    fn test_parallel_panic_triggers_fail_fast() {
        let temp = TempDir::new().unwrap();
        let (names, codec) = many_inputs(9);
        let gate = Arc::new(Gate::default());
        let codec = Arc::new(MockCodec {
            panic_on: Some(PathBuf::from(&names[0])),
            gate: Some(Arc::clone(&gate)),
            ..codec
        });
        let config =
            BatchConfig::new(temp.path()).with_mode(DispatchMode::Parallel { workers: 1 });

        let report = executor(config, &codec)
            .with_observer(Arc::new(OpenGateOnFailure(gate)))
            .run(&names)
            .unwrap();

        assert!(report.is_aborted());
        assert!(matches!(
            report.outcomes()[0],
            FileOutcome::Failed(FileError::Panicked { .. })
        ));
        assert_eq!(report.failed_count(), 1);
        // At most one file was already in flight when the batch was cancelled.
        assert!(report.skipped_count() >= 7, "skipped {}", report.skipped_count());
        assert!(codec.decodes.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_merge_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let (names, codec) = many_inputs(3);
        let codec = Arc::new(codec);
        let token = CancellationToken::new();
        token.cancel();

        let err = executor(merge_config(temp.path()), &codec)
            .with_cancellation(token)
            .run(&names)
            .unwrap_err();

        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 0);
        assert_eq!(codec.written_count(), 0);
    }

    #[test]
    fn test_merge_cancelled_while_folding() {
        let temp = TempDir::new().unwrap();
        let (names, codec) = many_inputs(3);
        let codec = Arc::new(codec);
        let token = CancellationToken::new();

        let err = executor(merge_config(temp.path()), &codec)
            .with_cancellation(token.clone())
            .with_observer(Arc::new(CancelAfterFirstMerge(token)))
            .run(&names)
            .unwrap_err();

        assert!(matches!(err, BatchError::Cancelled));
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 1);
        assert_eq!(codec.written_count(), 0);
    }

    #[test]
    fn test_merge_decoded_size_differs_from_header() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec {
            header_dims: HashMap::from([(PathBuf::from("b.png"), (4, 4))]),
            ..MockCodec::with_inputs(vec![("a.png", ramp(4, 4, 0)), ("b.png", ramp(4, 3, 0))])
        });

        let err = executor(merge_config(temp.path()), &codec)
            .run(&["a.png", "b.png"])
            .unwrap_err();

        match err {
            BatchError::DimensionMismatch {
                path,
                expected,
                actual,
            } => {
                assert_eq!(path, PathBuf::from("b.png"));
                assert_eq!(expected, (4, 4));
                assert_eq!(actual, (4, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(codec.decodes.load(Ordering::SeqCst), 2);
        assert_eq!(codec.written_count(), 0);
    }

    #[test]
    fn test_colliding_outputs_still_run() {
        let temp = TempDir::new().unwrap();
        let codec = Arc::new(MockCodec::with_inputs(vec![
            ("a/rock.png", ramp(2, 2, 0)),
            ("b/rock.png", ramp(2, 2, 1)),
        ]));

        let report = executor(BatchConfig::new(temp.path()), &codec)
            .run(&["a/rock.png", "b/rock.png"])
            .unwrap();

        assert_eq!(report.written_count(), 2);
        let rock = temp.path().join("rock_normals.png");
        let last = NormalMapGenerator::new(DEFAULT_SCALE).generate(&ramp(2, 2, 1));
        assert_eq!(codec.written(&rock), Some(last));
        assert_eq!(
            duplicate_outputs(report.outputs().iter().map(PathBuf::as_path)),
            vec![rock.as_path()]
        );
    }
}
