//! Run summaries, terminal reporting and the saved report artifact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::runner::TestResult;
use crate::verdict::{Detail, EngineRole, Verdict};

/// Live counters kept while a run is in flight.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub diverged: usize,
    max_failures: Option<usize>,
}

impl RunSummary {
    pub fn new(max_failures: Option<usize>) -> Self {
        Self {
            max_failures,
            ..Default::default()
        }
    }

    pub fn record(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Pass => self.passed += 1,
            Verdict::Fail => self.failed += 1,
            Verdict::Error => self.errors += 1,
            Verdict::Skip => self.skipped += 1,
            Verdict::ExpectedDivergence => self.diverged += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errors + self.skipped + self.diverged
    }

    pub fn failures(&self) -> usize {
        self.failed + self.errors
    }

    /// True once enough failures have accumulated to stop the run early.
    pub fn hit_failure_cap(&self) -> bool {
        self.max_failures
            .is_some_and(|cap| self.failures() >= cap)
    }
}

/// Aggregate view of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    /// Error attribution: engine crashes.
    pub crashes: usize,
    /// Error attribution: budget overruns.
    pub timeouts: usize,
    /// Error attribution: broken fixtures.
    pub corpus_errors: usize,
    /// Error attribution: tests drained after an abort.
    pub aborted: usize,
    pub skipped: usize,
    pub diverged: usize,
    /// Failures whose test is annotated with a known issue.
    pub known_issue_failures: usize,
    pub duration_ms: u64,
    /// Every FAIL and ERROR result, in submission order.
    pub failures: Vec<TestResult>,
}

impl TestReport {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut report = Self {
            total: results.len(),
            passed: 0,
            failed: 0,
            errors: 0,
            crashes: 0,
            timeouts: 0,
            corpus_errors: 0,
            aborted: 0,
            skipped: 0,
            diverged: 0,
            known_issue_failures: 0,
            duration_ms: 0,
            failures: Vec::new(),
        };
        for result in results {
            report.duration_ms += result.duration_ms;
            match result.verdict {
                Verdict::Pass => report.passed += 1,
                Verdict::Fail => report.failed += 1,
                Verdict::Error => {
                    report.errors += 1;
                    match &result.detail {
                        Some(Detail::Crash { .. }) => report.crashes += 1,
                        Some(Detail::Timeout { .. }) => report.timeouts += 1,
                        Some(Detail::Corpus { .. }) => report.corpus_errors += 1,
                        Some(Detail::Aborted) => report.aborted += 1,
                        _ => {}
                    }
                }
                Verdict::Skip => report.skipped += 1,
                Verdict::ExpectedDivergence => report.diverged += 1,
            }
            if result.verdict.is_failure() {
                if result.knownissue.is_some() {
                    report.known_issue_failures += 1;
                }
                report.failures.push(result.clone());
            }
        }
        report
    }

    /// Pass rate over executed tests; skips do not count against it.
    pub fn pass_rate(&self) -> f64 {
        let executed = self.total - self.skipped;
        if executed == 0 {
            return 100.0;
        }
        self.passed as f64 / executed as f64 * 100.0
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", "=== Test Summary ===".bold());
        println!("  Total:    {}", self.total);
        println!(
            "  Passed:   {} ({:.1}%)",
            self.passed.to_string().green(),
            self.pass_rate()
        );
        let failed = self.failed.to_string();
        println!(
            "  Failed:   {}",
            if self.failed > 0 {
                failed.red().to_string()
            } else {
                failed
            }
        );
        let errors = self.errors.to_string();
        println!(
            "  Errors:   {}",
            if self.errors > 0 {
                errors.red().to_string()
            } else {
                errors
            }
        );
        if self.errors > 0 {
            println!(
                "    crash {} / timeout {} / corpus {} / aborted {}",
                self.crashes, self.timeouts, self.corpus_errors, self.aborted
            );
        }
        println!("  Skipped:  {}", self.skipped.to_string().yellow());
        if self.diverged > 0 {
            println!("  Diverged: {}", self.diverged.to_string().cyan());
        }
        if self.known_issue_failures > 0 {
            println!(
                "  Known issues among failures: {}",
                self.known_issue_failures.to_string().yellow()
            );
        }
        // Summed per-test time; wall time is lower on parallel runs.
        println!("  Test time: {:.1}s", self.duration_ms as f64 / 1000.0);
    }

    /// List failing tests, at most `limit` of them.
    pub fn print_failures(&self, limit: usize) {
        if self.failures.is_empty() {
            return;
        }
        println!();
        println!("{}", "Failures:".bold());
        for result in self.failures.iter().take(limit) {
            let label = match result.verdict {
                Verdict::Error => "ERROR".red().bold(),
                _ => "FAIL".red(),
            };
            let note = result
                .detail
                .as_ref()
                .map(|detail| format!(" ({})", detail.summary()))
                .unwrap_or_default();
            let issue = result
                .knownissue
                .as_deref()
                .map(|id| format!(" [known issue: {id}]").yellow().to_string())
                .unwrap_or_default();
            println!("  {label} {}{note}{issue}", result.path.display());
            if let Some(Detail::Mismatch {
                expected, actual, ..
            }) = &result.detail
            {
                print_excerpt("expected", expected);
                print_excerpt("actual", actual);
            }
        }
        if self.failures.len() > limit {
            println!("  ... and {} more", self.failures.len() - limit);
        }
    }
}

fn print_excerpt(label: &str, text: &str) {
    const MAX_LINES: usize = 8;
    if text.is_empty() {
        println!("    {label}: (empty)");
        return;
    }
    println!("    {label}:");
    let lines: Vec<&str> = text.lines().collect();
    for line in lines.iter().take(MAX_LINES) {
        println!("      {line}");
    }
    if lines.len() > MAX_LINES {
        println!("      ... {} more lines", lines.len() - MAX_LINES);
    }
}

/// Report format written by `--save` and consumed by run comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedReport {
    pub created_at: DateTime<Utc>,
    /// Engine command line the run used.
    pub engine: String,
    pub role: EngineRole,
    pub results: Vec<TestResult>,
}

impl PersistedReport {
    pub fn new(engine: String, role: EngineRole, results: Vec<TestResult>) -> Self {
        Self {
            created_at: Utc::now(),
            engine,
            role,
            results,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_vec_pretty(self).map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let bytes = fs::read(path).map_err(|source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ReportError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Reading or writing a report file went wrong.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("report {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
