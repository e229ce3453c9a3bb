//! Parallel test execution.
//!
//! One sender thread feeds `(index, path)` jobs through a bounded channel
//! to a pool of worker threads. Each worker builds its own single-threaded
//! tokio runtime and engine instance and runs tests to completion, sending
//! `(index, result)` back. The collector on the calling thread keeps live
//! counters, echoes progress, appends to the JSONL log and finally
//! reassembles results in submission order, so reports are deterministic
//! no matter how completion interleaved.
//!
//! On abort the sender still feeds every remaining path; workers drain
//! them without launching engines, so every discovered test is accounted
//! for in the final report.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use colored::Colorize;
use crossbeam_channel::bounded;
use indicatif::ProgressBar;

use crate::abort::{AbortHandle, AbortSignal};
use crate::engine::Engine;
use crate::report::RunSummary;
use crate::runner::{TestResult, TestRunner};
use crate::verdict::Verdict;

/// How much the collector prints while tests run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Nothing but failures pushed through the progress bar.
    Quiet,
    /// One character per test.
    #[default]
    Dots,
    /// One line per test.
    Lines,
}

/// Knobs for [`run_parallel`].
#[derive(Default)]
pub struct ParallelOptions {
    /// Worker thread count; clamped to at least 1.
    pub workers: usize,
    pub verbosity: Verbosity,
    /// When present, per-test echo goes through the bar instead of stdout.
    pub progress: Option<ProgressBar>,
    /// Append one JSON object per finished test to this file.
    pub log_path: Option<PathBuf>,
    /// Abort the run once this many tests have failed or errored.
    pub max_failures: Option<usize>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParallelError {
    #[error("result log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("worker thread panicked")]
    WorkerPanic,
    #[error("run lost {missing} results")]
    Incomplete { missing: usize },
}

/// Run `paths` across a pool of workers, one engine per worker.
///
/// Results come back in submission order. The abort handle is triggered
/// internally when the failure cap is hit; callers can also trigger it
/// from the outside, typically from a Ctrl-C handler.
pub fn run_parallel<E, F>(
    runner: Arc<TestRunner>,
    paths: Vec<PathBuf>,
    engine_factory: F,
    abort: AbortHandle,
    options: ParallelOptions,
) -> Result<Vec<TestResult>, ParallelError>
where
    E: Engine + 'static,
    F: Fn(usize) -> E + Send + Sync + 'static,
{
    let total = paths.len();
    let workers = options.workers.max(1);
    let factory = Arc::new(engine_factory);

    let mut log = match &options.log_path {
        Some(path) => {
            let file = std::fs::File::create(path).map_err(|source| ParallelError::Log {
                path: path.clone(),
                source,
            })?;
            Some(io::BufWriter::new(file))
        }
        None => None,
    };

    let (job_tx, job_rx) = bounded::<(usize, PathBuf)>(workers * 2);
    let (result_tx, result_rx) = bounded::<(usize, TestResult)>(workers * 2);

    let sender = thread::spawn(move || {
        for job in paths.into_iter().enumerate() {
            if job_tx.send(job).is_err() {
                break;
            }
        }
    });

    let mut handles = Vec::with_capacity(workers);
    for id in 0..workers {
        let runner = Arc::clone(&runner);
        let factory = Arc::clone(&factory);
        let jobs = job_rx.clone();
        let results = result_tx.clone();
        let signal = abort.signal();
        handles.push(thread::spawn(move || {
            worker_main(id, &runner, factory(id), jobs, results, signal);
        }));
    }
    drop(job_rx);
    drop(result_tx);

    let mut by_index: Vec<Option<TestResult>> = (0..total).map(|_| None).collect();
    let mut summary = RunSummary::new(options.max_failures);
    let mut capped = false;

    for (index, result) in result_rx.iter() {
        echo(&result, &options);
        if let Some(writer) = log.as_mut()
            && let Ok(line) = serde_json::to_string(&result)
            && writeln!(writer, "{line}").is_err()
        {
            tracing::warn!("result log write failed, logging disabled");
            log = None;
        }
        summary.record(result.verdict);
        if !capped && summary.hit_failure_cap() {
            capped = true;
            tracing::warn!(failures = summary.failures(), "failure cap hit, aborting run");
            abort.trigger();
        }
        by_index[index] = Some(result);
    }

    if let Some(writer) = log.as_mut()
        && let Err(err) = writer.flush()
    {
        tracing::warn!("result log flush failed: {err}");
    }

    let mut panicked = false;
    for handle in handles.into_iter().chain(std::iter::once(sender)) {
        if let Err(panic) = handle.join() {
            panicked = true;
            let message = panic
                .downcast_ref::<&str>()
                .copied()
                .map(str::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("worker panicked: {message}");
        }
    }
    if panicked {
        return Err(ParallelError::WorkerPanic);
    }

    let results: Vec<TestResult> = by_index.into_iter().flatten().collect();
    if results.len() != total {
        return Err(ParallelError::Incomplete {
            missing: total - results.len(),
        });
    }
    Ok(results)
}

fn worker_main<E: Engine>(
    id: usize,
    runner: &TestRunner,
    mut engine: E,
    jobs: crossbeam_channel::Receiver<(usize, PathBuf)>,
    results: crossbeam_channel::Sender<(usize, TestResult)>,
    signal: AbortSignal,
) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build worker runtime");
    tracing::debug!(worker = id, "worker started");

    while let Ok((index, path)) = jobs.recv() {
        let result = rt.block_on(runner.run_single(&mut engine, &path, &signal));
        if results.send((index, result)).is_err() {
            break;
        }
    }
    tracing::debug!(worker = id, "worker done");
}

fn echo(result: &TestResult, options: &ParallelOptions) {
    if let Some(bar) = &options.progress {
        bar.inc(1);
        if result.verdict.is_failure() {
            bar.println(result_line(result));
        }
        return;
    }
    match options.verbosity {
        Verbosity::Quiet => {}
        Verbosity::Dots => {
            let dot = result.verdict.dot().to_string();
            let dot = match result.verdict {
                Verdict::Fail | Verdict::Error => dot.red().to_string(),
                Verdict::Skip => dot.yellow().to_string(),
                Verdict::ExpectedDivergence => dot.cyan().to_string(),
                Verdict::Pass => dot,
            };
            print!("{dot}");
            let _ = io::stdout().flush();
        }
        Verbosity::Lines => println!("{}", result_line(result)),
    }
}

fn result_line(result: &TestResult) -> String {
    let label = match result.verdict {
        Verdict::Pass => "PASS".green().to_string(),
        Verdict::Fail => "FAIL".red().to_string(),
        Verdict::Error => "ERROR".red().bold().to_string(),
        Verdict::Skip => "SKIP".yellow().to_string(),
        Verdict::ExpectedDivergence => "DIVERGE".cyan().to_string(),
    };
    let note = result
        .detail
        .as_ref()
        .filter(|_| result.verdict != Verdict::Pass)
        .map(|detail| format!(" ({})", detail.summary()))
        .unwrap_or_default();
    format!(
        "{label} {} [{} ms]{note}",
        result.path.display(),
        result.duration_ms
    )
}
