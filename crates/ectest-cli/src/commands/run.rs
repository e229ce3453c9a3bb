use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use ectest_harness::{
    AbortHandle, EngineCmd, EngineRole, HarnessConfig, MetadataFlag, ParallelOptions,
    PersistedReport, ProcessEngine, TestFilter, TestReport, TestRunner, Verbosity, abort_pair,
    run_parallel,
};
use indicatif::{ProgressBar, ProgressStyle};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

#[derive(Args)]
pub struct RunArgs {
    /// Test files or directories; defaults to the configured corpus dir.
    pub paths: Vec<PathBuf>,

    /// Engine command line, e.g. "duk --strict".
    #[arg(long, value_name = "CMD")]
    pub engine: Option<String>,

    /// Treat the engine as the reference implementation.
    #[arg(long)]
    pub reference: bool,

    /// Worker threads; 0 picks one per logical CPU.
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Only run tests whose path contains this substring.
    #[arg(short, long, value_name = "SUBSTRING")]
    pub filter: Option<String>,

    /// Exclude tests flagged slow.
    #[arg(long)]
    pub exclude_slow: bool,

    /// Run only tests flagged custom.
    #[arg(long, conflicts_with = "only_nonstandard")]
    pub only_custom: bool,

    /// Run only tests flagged nonstandard.
    #[arg(long)]
    pub only_nonstandard: bool,

    /// Per-test timeout in seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Stop the run after this many failures.
    #[arg(long, value_name = "N")]
    pub max_failures: Option<usize>,

    /// Run at most this many tests.
    #[arg(short = 'n', long, value_name = "N")]
    pub max_tests: Option<usize>,

    /// Echo one line per test instead of dots.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// No per-test echo, summary only.
    #[arg(short, long)]
    pub quiet: bool,

    /// Show a progress bar instead of dots.
    #[arg(long)]
    pub progress: bool,

    /// Append per-test results to this file as JSON Lines.
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Save the full run report for later comparison.
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,

    /// Print the summary as JSON instead of text.
    #[arg(long)]
    pub json: bool,

    /// How many failures to list after the summary.
    #[arg(long, default_value_t = 20, value_name = "N")]
    pub show_failures: usize,

    /// Report process memory use after the run.
    #[arg(long)]
    pub memory_stats: bool,
}

pub fn execute(args: RunArgs, config: &HarnessConfig) -> Result<i32> {
    let Some(engine_spec) = args.engine.clone().or_else(|| config.engine.cmd.clone()) else {
        bail!("no engine configured; pass --engine or set [engine] cmd in the config file");
    };
    let Some(engine_cmd) = EngineCmd::parse(&engine_spec) else {
        bail!("engine command line is empty");
    };

    let role = if args.reference {
        EngineRole::Reference
    } else {
        config.engine.role
    };

    let mut budgets = config.budgets();
    if let Some(secs) = args.timeout {
        budgets.normal = Duration::from_secs(secs);
        if budgets.slow < budgets.normal {
            budgets.slow = budgets.normal;
        }
    }

    let filter = TestFilter {
        exclude_slow: args.exclude_slow,
        only: if args.only_custom {
            Some(MetadataFlag::Custom)
        } else if args.only_nonstandard {
            Some(MetadataFlag::Nonstandard)
        } else {
            None
        },
        name: args.filter.clone(),
    };

    let runner = TestRunner::new(role, budgets)
        .with_filter(filter)
        .with_include_dirs(config.corpus.include_dirs.clone())
        .with_ignores(config.corpus.ignore.clone());

    let mut paths = gather_paths(&args, config, &runner)?;
    if let Some(max) = args.max_tests {
        paths.truncate(max);
    }
    if paths.is_empty() {
        println!("{}", "No tests found.".yellow());
        return Ok(0);
    }

    let workers = resolve_workers(args.workers, config.run.workers);
    let max_failures = args.max_failures.or_else(|| config.max_failures());

    if !args.json {
        println!(
            "Running {} tests with {} worker(s) on `{}`",
            paths.len().to_string().bold(),
            workers,
            engine_spec
        );
    }

    let progress = if args.progress {
        let bar = ProgressBar::new(paths.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
            )?
            .progress_chars("##-"),
        );
        Some(bar)
    } else {
        None
    };
    let verbosity = if args.quiet || args.json {
        Verbosity::Quiet
    } else if args.verbose {
        Verbosity::Lines
    } else {
        Verbosity::Dots
    };

    let (abort, _signal) = abort_pair();
    spawn_ctrl_c_listener(abort.clone());

    let options = ParallelOptions {
        workers,
        verbosity,
        progress: progress.clone(),
        log_path: args.log.clone(),
        max_failures,
    };

    let started = Instant::now();
    let worker_cmd = engine_cmd.clone();
    let results = run_parallel(
        Arc::new(runner),
        paths,
        move |_| ProcessEngine::new(worker_cmd.clone()),
        abort.clone(),
        options,
    )?;

    if let Some(bar) = progress {
        bar.finish_and_clear();
    } else if verbosity == Verbosity::Dots {
        println!();
    }
    if abort.is_triggered() && !args.json {
        println!("{}", "Run aborted before completion.".yellow().bold());
    }

    let report = TestReport::from_results(&results);
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        report.print_summary();
        println!("  Wall time: {:.1}s", started.elapsed().as_secs_f64());
        if args.memory_stats && let Some(mb) = memory_mb() {
            println!("  Memory:   {mb:.1} MB");
        }
        report.print_failures(args.show_failures);
    }

    if let Some(path) = &args.save {
        PersistedReport::new(engine_spec, role, results).save(path)?;
        if !args.json {
            println!("Report saved to {}", path.display());
        }
    }

    Ok(if report.has_failures() { 1 } else { 0 })
}

fn gather_paths(
    args: &RunArgs,
    config: &HarnessConfig,
    runner: &TestRunner,
) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if args.paths.is_empty() {
        let Some(root) = &config.corpus.dir else {
            bail!("no test paths given and no [corpus] dir configured");
        };
        paths.extend(runner.collect_tests(root));
    } else {
        for path in &args.paths {
            if path.is_dir() {
                paths.extend(runner.collect_tests(path));
            } else if path.is_file() {
                // Explicitly named files run even if filters would drop them.
                paths.push(path.clone());
            } else {
                bail!("no such test path: {}", path.display());
            }
        }
    }
    Ok(paths)
}

fn resolve_workers(flag: Option<usize>, configured: usize) -> usize {
    match flag.unwrap_or(configured) {
        0 => num_cpus::get(),
        workers => workers,
    }
}

/// Ctrl-C triggers the abort instead of killing the process, so the run
/// drains and still prints an accurate summary.
fn spawn_ctrl_c_listener(abort: AbortHandle) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(err) => {
                tracing::warn!("ctrl-c handler unavailable: {err}");
                return;
            }
        };
        if rt.block_on(tokio::signal::ctrl_c()).is_ok() {
            tracing::warn!("interrupt received, aborting run");
            abort.trigger();
        }
    });
}

fn memory_mb() -> Option<f64> {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::everything(),
    );
    let process = system.process(pid)?;
    Some(process.memory() as f64 / (1024.0 * 1024.0))
}
