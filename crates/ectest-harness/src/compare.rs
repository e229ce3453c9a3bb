//! Run-to-run comparison of saved reports.
//!
//! Answers the question that matters after an engine change: which tests
//! did it fix, which did it break, and which mismatches turned into
//! crashes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::report::PersistedReport;
use crate::verdict::Verdict;

/// Differences between an older and a newer run over the same corpus.
#[derive(Debug, Clone, Default)]
pub struct RunComparison {
    /// Failing before, passing now.
    pub fixed: Vec<PathBuf>,
    /// Passing before, failing now.
    pub regressed: Vec<PathBuf>,
    /// Plain mismatches before, crashes or timeouts now.
    pub new_errors: Vec<PathBuf>,
    /// Only present in the newer run.
    pub added: Vec<PathBuf>,
    /// Only present in the older run.
    pub removed: Vec<PathBuf>,
}

impl RunComparison {
    pub fn between(old: &PersistedReport, new: &PersistedReport) -> Self {
        let old_verdicts: HashMap<&Path, Verdict> = old
            .results
            .iter()
            .map(|r| (r.path.as_path(), r.verdict))
            .collect();
        let new_verdicts: HashMap<&Path, Verdict> = new
            .results
            .iter()
            .map(|r| (r.path.as_path(), r.verdict))
            .collect();

        let mut comparison = Self::default();
        for (path, new_verdict) in &new_verdicts {
            match old_verdicts.get(path) {
                None => comparison.added.push(path.to_path_buf()),
                Some(old_verdict) => {
                    if old_verdict.is_failure() && *new_verdict == Verdict::Pass {
                        comparison.fixed.push(path.to_path_buf());
                    } else if *old_verdict == Verdict::Pass && new_verdict.is_failure() {
                        comparison.regressed.push(path.to_path_buf());
                    } else if *old_verdict == Verdict::Fail && *new_verdict == Verdict::Error {
                        comparison.new_errors.push(path.to_path_buf());
                    }
                }
            }
        }
        for path in old_verdicts.keys() {
            if !new_verdicts.contains_key(path) {
                comparison.removed.push(path.to_path_buf());
            }
        }

        comparison.fixed.sort();
        comparison.regressed.sort();
        comparison.new_errors.sort();
        comparison.added.sort();
        comparison.removed.sort();
        comparison
    }

    /// True when the newer run introduced no regressions.
    pub fn is_clean(&self) -> bool {
        self.regressed.is_empty() && self.new_errors.is_empty()
    }

    pub fn print(&self) {
        println!("{}", "=== Run Comparison ===".bold());

        section(
            &format!("Fixed ({})", self.fixed.len()).green().to_string(),
            &self.fixed,
        );
        section(
            &format!("Regressed ({})", self.regressed.len())
                .red()
                .to_string(),
            &self.regressed,
        );
        section(
            &format!("Mismatch became error ({})", self.new_errors.len())
                .red()
                .bold()
                .to_string(),
            &self.new_errors,
        );
        section(
            &format!("Added tests ({})", self.added.len()),
            &self.added,
        );
        section(
            &format!("Removed tests ({})", self.removed.len()),
            &self.removed,
        );

        if self.is_clean() {
            println!("{}", "No regressions.".green());
        }
    }
}

fn section(heading: &str, paths: &[PathBuf]) {
    if paths.is_empty() {
        return;
    }
    println!("{heading}");
    for path in paths {
        println!("  {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::runner::TestResult;
    use crate::verdict::EngineRole;

    fn report(results: Vec<(&str, Verdict)>) -> PersistedReport {
        let results = results
            .into_iter()
            .map(|(name, verdict)| TestResult {
                path: PathBuf::from(name),
                verdict,
                duration_ms: 1,
                knownissue: None,
                detail: None,
            })
            .collect();
        PersistedReport::new("duk".to_string(), EngineRole::Target, results)
    }

    #[test]
    fn classifies_fixed_and_regressed() {
        let old = report(vec![
            ("a.js", Verdict::Fail),
            ("b.js", Verdict::Pass),
            ("c.js", Verdict::Pass),
        ]);
        let new = report(vec![
            ("a.js", Verdict::Pass),
            ("b.js", Verdict::Fail),
            ("c.js", Verdict::Pass),
        ]);

        let cmp = RunComparison::between(&old, &new);
        assert_eq!(cmp.fixed, vec![PathBuf::from("a.js")]);
        assert_eq!(cmp.regressed, vec![PathBuf::from("b.js")]);
        assert!(!cmp.is_clean());
    }

    #[test]
    fn mismatch_turning_into_error_is_flagged() {
        let old = report(vec![("a.js", Verdict::Fail)]);
        let new = report(vec![("a.js", Verdict::Error)]);

        let cmp = RunComparison::between(&old, &new);
        assert_eq!(cmp.new_errors, vec![PathBuf::from("a.js")]);
        assert!(cmp.regressed.is_empty());
        assert!(!cmp.is_clean());
    }

    #[test]
    fn error_fixed_to_pass_counts_as_fixed() {
        let old = report(vec![("a.js", Verdict::Error)]);
        let new = report(vec![("a.js", Verdict::Pass)]);

        let cmp = RunComparison::between(&old, &new);
        assert_eq!(cmp.fixed, vec![PathBuf::from("a.js")]);
        assert!(cmp.is_clean());
    }

    #[test]
    fn tracks_added_and_removed_tests() {
        let old = report(vec![("gone.js", Verdict::Pass)]);
        let new = report(vec![("fresh.js", Verdict::Pass)]);

        let cmp = RunComparison::between(&old, &new);
        assert_eq!(cmp.added, vec![PathBuf::from("fresh.js")]);
        assert_eq!(cmp.removed, vec![PathBuf::from("gone.js")]);
        assert!(cmp.is_clean());
    }

    #[test]
    fn identical_runs_compare_clean_and_empty() {
        let old = report(vec![("a.js", Verdict::Pass), ("b.js", Verdict::Fail)]);
        let new = report(vec![("a.js", Verdict::Pass), ("b.js", Verdict::Fail)]);

        let cmp = RunComparison::between(&old, &new);
        assert!(cmp.fixed.is_empty());
        assert!(cmp.regressed.is_empty());
        assert!(cmp.new_errors.is_empty());
        assert!(cmp.is_clean());
    }
}
