//! Test discovery and single-test execution.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::abort::AbortSignal;
use crate::driver::{self, Budgets};
use crate::engine::Engine;
use crate::includes::IncludeResolver;
use crate::testcase::TestCase;
use crate::verdict::{Detail, EngineRole, Verdict, classify};

/// Outcome of one test, as recorded in reports and the JSONL log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub path: PathBuf,
    pub verdict: Verdict,
    pub duration_ms: u64,
    /// Tracker reference from the metadata block, if any. Annotation
    /// only; it never changes the verdict.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub knownissue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<Detail>,
}

/// Which metadata flag a run is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFlag {
    Custom,
    Nonstandard,
}

/// Test selection applied on top of discovery.
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    /// Drop tests flagged `slow` instead of running them.
    pub exclude_slow: bool,
    /// Run only tests carrying the given flag.
    pub only: Option<MetadataFlag>,
    /// Substring a discovered path must contain.
    pub name: Option<String>,
}

/// Discovers, filters and executes individual tests.
#[derive(Debug)]
pub struct TestRunner {
    role: EngineRole,
    budgets: Budgets,
    filter: TestFilter,
    resolver: IncludeResolver,
    ignores: Vec<String>,
}

impl TestRunner {
    pub fn new(role: EngineRole, budgets: Budgets) -> Self {
        Self {
            role,
            budgets,
            filter: TestFilter::default(),
            resolver: IncludeResolver::default(),
            ignores: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: TestFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_include_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.resolver = IncludeResolver::new(dirs);
        self
    }

    /// Path substrings to skip, usually loaded from the config file.
    pub fn with_ignores(mut self, ignores: Vec<String>) -> Self {
        self.ignores = ignores;
        self
    }

    pub fn role(&self) -> EngineRole {
        self.role
    }

    pub fn budgets(&self) -> Budgets {
        self.budgets
    }

    /// Walk `root` for test files: every `.js` file except `util-*`
    /// helpers, narrowed by the name filter, in sorted order.
    pub fn collect_tests(&self, root: &Path) -> Vec<PathBuf> {
        let mut tests: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "js"))
            .filter(|entry| {
                !entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with("util-"))
            })
            .map(|entry| entry.into_path())
            .filter(|path| match &self.filter.name {
                Some(fragment) => path.to_string_lossy().contains(fragment.as_str()),
                None => true,
            })
            .collect();
        tests.sort();
        tests
    }

    /// Run one test file to a verdict. Never fails; anything that goes
    /// wrong becomes part of the result.
    pub async fn run_single<E: Engine>(
        &self,
        engine: &mut E,
        path: &Path,
        abort: &AbortSignal,
    ) -> TestResult {
        let started = Instant::now();

        if let Some(pattern) = self.ignored_by(path) {
            return skip(
                path,
                started,
                format!("ignored by configuration ({pattern})"),
            );
        }

        let case = match TestCase::load(path) {
            Ok(case) => case,
            Err(err) => {
                return TestResult {
                    path: path.to_path_buf(),
                    verdict: Verdict::Error,
                    duration_ms: elapsed_ms(started),
                    knownissue: None,
                    detail: Some(Detail::Corpus {
                        message: err.to_string(),
                    }),
                };
            }
        };

        if let Some(reason) = self.skip_reason(&case) {
            let mut result = skip(path, started, reason);
            result.knownissue = case.metadata.knownissue.clone();
            return result;
        }

        let outcome = match driver::assemble(&case, &self.resolver) {
            Ok(script) => {
                let budget = driver::budget_for(&case.metadata, self.budgets);
                driver::run_with_abort(engine, &script, budget, abort).await
            }
            Err(err) => {
                return TestResult {
                    path: path.to_path_buf(),
                    verdict: Verdict::Error,
                    duration_ms: elapsed_ms(started),
                    knownissue: case.metadata.knownissue.clone(),
                    detail: Some(Detail::Corpus {
                        message: err.to_string(),
                    }),
                };
            }
        };

        let (verdict, detail) = classify(&case, outcome, self.role);
        TestResult {
            path: path.to_path_buf(),
            verdict,
            duration_ms: elapsed_ms(started),
            knownissue: case.metadata.knownissue.clone(),
            detail,
        }
    }

    fn ignored_by(&self, path: &Path) -> Option<&str> {
        let path = path.to_string_lossy();
        self.ignores
            .iter()
            .find(|pattern| path.contains(pattern.as_str()))
            .map(String::as_str)
    }

    fn skip_reason(&self, case: &TestCase) -> Option<String> {
        let metadata = &case.metadata;
        if metadata.skip {
            return Some(metadata.skip_reason());
        }
        if self.filter.exclude_slow && metadata.slow {
            return Some("slow test excluded".to_string());
        }
        match self.filter.only {
            Some(MetadataFlag::Custom) if !metadata.custom => {
                Some("not flagged custom".to_string())
            }
            Some(MetadataFlag::Nonstandard) if !metadata.nonstandard => {
                Some("not flagged nonstandard".to_string())
            }
            _ => None,
        }
    }
}

fn skip(path: &Path, started: Instant, reason: String) -> TestResult {
    TestResult {
        path: path.to_path_buf(),
        verdict: Verdict::Skip,
        duration_ms: elapsed_ms(started),
        knownissue: None,
        detail: Some(Detail::Skip { reason }),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;
    use crate::abort::abort_pair;
    use crate::engine::{EngineOutput, ExecError};

    /// Engine that always prints the same canned output.
    struct CannedEngine {
        stdout: String,
    }

    impl Engine for CannedEngine {
        fn describe(&self) -> String {
            "canned".to_string()
        }

        async fn execute(
            &mut self,
            _source: &str,
            _budget: Duration,
        ) -> Result<EngineOutput, ExecError> {
            Ok(EngineOutput {
                stdout: self.stdout.clone(),
            })
        }
    }

    fn runner() -> TestRunner {
        TestRunner::new(EngineRole::Target, Budgets::default())
    }

    fn write_test(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn collect_finds_js_files_sorted_and_skips_helpers() {
        let dir = TempDir::new().unwrap();
        write_test(&dir, "b.js", "x;\n");
        write_test(&dir, "a.js", "x;\n");
        write_test(&dir, "util-base.js", "helper\n");
        write_test(&dir, "notes.txt", "not a test\n");

        let tests = runner().collect_tests(dir.path());
        let names: Vec<_> = tests
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }

    #[test]
    fn collect_applies_the_name_filter() {
        let dir = TempDir::new().unwrap();
        write_test(&dir, "string-concat.js", "x;\n");
        write_test(&dir, "number-add.js", "x;\n");

        let filter = TestFilter {
            name: Some("string".to_string()),
            ..Default::default()
        };
        let tests = runner().with_filter(filter).collect_tests(dir.path());
        assert_eq!(tests.len(), 1);
        assert!(tests[0].ends_with("string-concat.js"));
    }

    #[tokio::test]
    async fn matching_run_passes() {
        let dir = TempDir::new().unwrap();
        let path = write_test(&dir, "t.js", "/*===\nhello\n===*/\nprint('hello');\n");
        let (_handle, signal) = abort_pair();
        let mut engine = CannedEngine {
            stdout: "hello\n".to_string(),
        };

        let result = runner().run_single(&mut engine, &path, &signal).await;
        assert_eq!(result.verdict, Verdict::Pass);
        assert!(result.detail.is_none());
    }

    #[tokio::test]
    async fn skip_flag_wins_before_execution() {
        let dir = TempDir::new().unwrap();
        let path = write_test(&dir, "t.js", "/*---\n{ \"skip\": true }\n---*/\nprint(1);\n");
        let (_handle, signal) = abort_pair();
        let mut engine = CannedEngine {
            stdout: String::new(),
        };

        let result = runner().run_single(&mut engine, &path, &signal).await;
        assert_eq!(result.verdict, Verdict::Skip);
        assert!(matches!(result.detail, Some(Detail::Skip { .. })));
    }

    #[tokio::test]
    async fn exclude_slow_skips_with_reason() {
        let dir = TempDir::new().unwrap();
        let path = write_test(&dir, "t.js", "/*---\n{ \"slow\": true }\n---*/\n");
        let (_handle, signal) = abort_pair();
        let mut engine = CannedEngine {
            stdout: String::new(),
        };

        let filter = TestFilter {
            exclude_slow: true,
            ..Default::default()
        };
        let result = runner()
            .with_filter(filter)
            .run_single(&mut engine, &path, &signal)
            .await;
        assert_eq!(result.verdict, Verdict::Skip);
        match result.detail {
            Some(Detail::Skip { reason }) => assert_eq!(reason, "slow test excluded"),
            other => panic!("unexpected detail: {other:?}"),
        }
    }

    #[tokio::test]
    async fn only_custom_skips_standard_tests() {
        let dir = TempDir::new().unwrap();
        let standard = write_test(&dir, "std.js", "/*===\n1\n===*/\n");
        let custom = write_test(&dir, "cus.js", "/*---\n{ \"custom\": true }\n---*/\n/*===\n1\n===*/\n");
        let (_handle, signal) = abort_pair();
        let mut engine = CannedEngine {
            stdout: "1\n".to_string(),
        };

        let filter = TestFilter {
            only: Some(MetadataFlag::Custom),
            ..Default::default()
        };
        let runner = runner().with_filter(filter);
        let skipped = runner.run_single(&mut engine, &standard, &signal).await;
        assert_eq!(skipped.verdict, Verdict::Skip);
        let run = runner.run_single(&mut engine, &custom, &signal).await;
        assert_eq!(run.verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn configured_ignore_skips_by_path_substring() {
        let dir = TempDir::new().unwrap();
        let path = write_test(&dir, "regexp-deep.js", "/*===\n1\n===*/\n");
        let (_handle, signal) = abort_pair();
        let mut engine = CannedEngine {
            stdout: "1\n".to_string(),
        };

        let result = runner()
            .with_ignores(vec!["regexp-".to_string()])
            .run_single(&mut engine, &path, &signal)
            .await;
        assert_eq!(result.verdict, Verdict::Skip);
    }

    #[tokio::test]
    async fn unreadable_file_is_a_corpus_error() {
        let (_handle, signal) = abort_pair();
        let mut engine = CannedEngine {
            stdout: String::new(),
        };

        let result = runner()
            .run_single(&mut engine, Path::new("/nonexistent/t.js"), &signal)
            .await;
        assert_eq!(result.verdict, Verdict::Error);
        assert!(matches!(result.detail, Some(Detail::Corpus { .. })));
    }

    #[tokio::test]
    async fn knownissue_annotates_but_does_not_rescue_a_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_test(
            &dir,
            "t.js",
            "/*---\n{ \"knownissue\": \"bug #42\" }\n---*/\n/*===\n1\n===*/\n",
        );
        let (_handle, signal) = abort_pair();
        let mut engine = CannedEngine {
            stdout: "2\n".to_string(),
        };

        let result = runner().run_single(&mut engine, &path, &signal).await;
        assert_eq!(result.verdict, Verdict::Fail);
        assert_eq!(result.knownissue.as_deref(), Some("bug #42"));
    }
}
