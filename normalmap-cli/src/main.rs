//! normalmap CLI - Convert heightmaps into normal maps
//!
//! Thin front end over the `normalmap` library: parses flags, layers them
//! over the config file, runs the batch and maps the result to an exit code.

mod args;
mod error;
mod progress;

use std::num::NonZeroUsize;
use std::process;
use std::sync::Arc;

use clap::error::ErrorKind;
use clap::Parser;
use normalmap::batch::{BatchExecutor, DispatchMode};
use normalmap::codec::PngCodec;
use normalmap::config::ConfigFile;
use normalmap::logging::init_logging_with_writer;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use args::Cli;
use error::{error_chain, CliError};
use progress::ProgressObserver;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("error: {}", error_chain(&e));
        process::exit(e.exit_code());
    }
}

fn hardware_threads() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn run(cli: Cli) -> Result<(), CliError> {
    let file = match &cli.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };

    let config = cli.batch_config(&file, hardware_threads())?;
    let merge = matches!(config.mode, DispatchMode::Merge { .. });

    let progress = Arc::new(ProgressObserver::new(cli.inputs.len(), merge, cli.quiet));
    let log_progress = Arc::clone(&progress);
    let _logging = init_logging_with_writer(&cli.logging_config(&file), move || {
        log_progress.log_writer()
    })?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupted, finishing files in progress");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    let executor = BatchExecutor::new(config, Arc::new(PngCodec::new()))
        .with_cancellation(cancel)
        .with_observer(progress.clone());

    let result = executor.run(&cli.inputs);
    progress.finish();
    let report = result?;

    for failure in report.failures() {
        eprintln!("error: {}", error_chain(failure));
    }

    if !cli.quiet {
        for output in report.outputs() {
            println!("{}", output.display());
        }
    }
    info!(
        written = report.written_count(),
        elapsed_ms = report.elapsed().as_millis() as u64,
        "Done"
    );

    if report.is_success() {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            failed: report.failed_count(),
            skipped: report.skipped_count(),
        })
    }
}
