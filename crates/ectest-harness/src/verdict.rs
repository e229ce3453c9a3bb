//! Verdicts and outcome classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineOutput, ExecError};
use crate::testcase::TestCase;

/// Final per-test verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
    Skip,
    Error,
    ExpectedDivergence,
}

impl Verdict {
    /// Whether this verdict should make the run exit nonzero.
    pub fn is_failure(self) -> bool {
        matches!(self, Verdict::Fail | Verdict::Error)
    }

    /// Single-character form for compact progress output.
    pub fn dot(self) -> char {
        match self {
            Verdict::Pass => '.',
            Verdict::Fail => 'F',
            Verdict::Skip => 's',
            Verdict::Error => 'E',
            Verdict::ExpectedDivergence => 'd',
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Skip => "SKIP",
            Verdict::Error => "ERROR",
            Verdict::ExpectedDivergence => "EXPECTED_DIVERGENCE",
        };
        f.write_str(label)
    }
}

/// Which side of a conformance comparison the engine under test is on.
///
/// Engine-specific tests that mismatch are normal when the harness runs a
/// reference engine; the same mismatch against the target engine is a
/// genuine failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineRole {
    #[default]
    Target,
    Reference,
}

/// Structured explanation attached to non-PASS verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detail {
    Mismatch {
        expected: String,
        actual: String,
        first_diff_line: usize,
    },
    Crash {
        message: String,
    },
    Timeout {
        budget_ms: u64,
    },
    Corpus {
        message: String,
    },
    Aborted,
    Skip {
        reason: String,
    },
}

impl Detail {
    /// One line suitable for progress output and failure listings.
    pub fn summary(&self) -> String {
        match self {
            Detail::Mismatch {
                first_diff_line, ..
            } => format!("output differs at line {first_diff_line}"),
            Detail::Crash { message } => message.clone(),
            Detail::Timeout { budget_ms } => format!("timed out after {budget_ms} ms"),
            Detail::Corpus { message } => message.clone(),
            Detail::Aborted => "aborted".to_string(),
            Detail::Skip { reason } => reason.clone(),
        }
    }
}

/// Turn an engine outcome into a verdict for `case`.
pub fn classify(
    case: &TestCase,
    outcome: Result<EngineOutput, ExecError>,
    role: EngineRole,
) -> (Verdict, Option<Detail>) {
    match outcome {
        Ok(output) => compare(case, &output.stdout, role),
        Err(ExecError::Crash { stdout, .. }) if case.metadata.intended_uncaught => {
            // The uncaught error is the point of the test; judge what was
            // printed before the engine died.
            compare(case, &stdout, role)
        }
        Err(ExecError::Crash { message, .. }) => (Verdict::Error, Some(Detail::Crash { message })),
        Err(ExecError::Timeout { budget }) => (
            Verdict::Error,
            Some(Detail::Timeout {
                budget_ms: budget.as_millis() as u64,
            }),
        ),
        Err(ExecError::Aborted) => (Verdict::Error, Some(Detail::Aborted)),
        Err(err @ ExecError::Spawn(_)) => (
            Verdict::Error,
            Some(Detail::Crash {
                message: err.to_string(),
            }),
        ),
    }
}

fn compare(case: &TestCase, actual: &str, role: EngineRole) -> (Verdict, Option<Detail>) {
    // Files without expectation blocks are stress tests: only a crash or
    // hang can fail them, whatever they print.
    if !case.has_expectations() {
        return (Verdict::Pass, None);
    }
    let expected = case.expected_output();
    if actual == expected {
        return (Verdict::Pass, None);
    }
    let detail = Detail::Mismatch {
        first_diff_line: first_diff_line(&expected, actual),
        expected,
        actual: actual.to_string(),
    };
    if role == EngineRole::Reference && case.metadata.is_engine_specific() {
        (Verdict::ExpectedDivergence, Some(detail))
    } else {
        (Verdict::Fail, Some(detail))
    }
}

/// 1-based number of the first line where two outputs differ.
pub fn first_diff_line(expected: &str, actual: &str) -> usize {
    let mut expected = expected.lines();
    let mut actual = actual.lines();
    let mut line = 1;
    loop {
        match (expected.next(), actual.next()) {
            (Some(e), Some(a)) if e == a => line += 1,
            _ => return line,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn case(source: &str) -> TestCase {
        TestCase::parse("t.js", source).unwrap()
    }

    fn clean(stdout: &str) -> Result<EngineOutput, ExecError> {
        Ok(EngineOutput {
            stdout: stdout.to_string(),
        })
    }

    #[test]
    fn matching_output_passes() {
        let case = case("/*===\nhello\n===*/\nprint('hello');\n");
        let (verdict, detail) = classify(&case, clean("hello\n"), EngineRole::Target);
        assert_eq!(verdict, Verdict::Pass);
        assert!(detail.is_none());
    }

    #[test]
    fn mismatch_fails_with_first_diff_line() {
        let case = case("/*===\na\nb\nc\n===*/\n");
        let (verdict, detail) = classify(&case, clean("a\nx\nc\n"), EngineRole::Target);
        assert_eq!(verdict, Verdict::Fail);
        match detail.unwrap() {
            Detail::Mismatch {
                first_diff_line, ..
            } => assert_eq!(first_diff_line, 2),
            other => panic!("unexpected detail: {other:?}"),
        }
    }

    #[test]
    fn missing_trailing_newline_is_a_mismatch() {
        let case = case("/*===\nhello\n===*/\n");
        let (verdict, _) = classify(&case, clean("hello"), EngineRole::Target);
        assert_eq!(verdict, Verdict::Fail);
    }

    #[test]
    fn no_expectations_passes_whatever_the_output() {
        let case = case("for (var i = 0; i < 3; i++) { print(i); }\n");
        let (verdict, _) = classify(&case, clean(""), EngineRole::Target);
        assert_eq!(verdict, Verdict::Pass);
        let (verdict, detail) = classify(&case, clean("0\n1\n2\n"), EngineRole::Target);
        assert_eq!(verdict, Verdict::Pass);
        assert!(detail.is_none());
    }

    #[test]
    fn empty_block_still_requires_empty_output() {
        let case = case("/*===\n===*/\nvoid 0;\n");
        let (verdict, _) = classify(&case, clean("noise\n"), EngineRole::Target);
        assert_eq!(verdict, Verdict::Fail);
        let (verdict, _) = classify(&case, clean(""), EngineRole::Target);
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn no_expectations_but_crash_is_an_error() {
        let case = case("null.x;\n");
        let outcome = Err(ExecError::Crash {
            stdout: String::new(),
            message: "exit status 1: TypeError".to_string(),
        });
        let (verdict, detail) = classify(&case, outcome, EngineRole::Target);
        assert_eq!(verdict, Verdict::Error);
        assert!(matches!(detail, Some(Detail::Crash { .. })));
    }

    #[test]
    fn engine_specific_mismatch_diverges_only_in_reference_role() {
        let src = "/*---\n{ \"custom\": true }\n---*/\n/*===\n1\n===*/\n";
        let case = case(src);
        let (target, _) = classify(&case, clean("2\n"), EngineRole::Target);
        assert_eq!(target, Verdict::Fail);
        let (reference, _) = classify(&case, clean("2\n"), EngineRole::Reference);
        assert_eq!(reference, Verdict::ExpectedDivergence);
    }

    #[test]
    fn standard_mismatch_fails_even_in_reference_role() {
        let case = case("/*===\n1\n===*/\n");
        let (verdict, _) = classify(&case, clean("2\n"), EngineRole::Reference);
        assert_eq!(verdict, Verdict::Fail);
    }

    #[test]
    fn intended_uncaught_crash_compares_partial_stdout() {
        let src = "/*---\n{ \"intended_uncaught\": true }\n---*/\n/*===\nbefore\n===*/\nprint('before');\nthrow new Error('boom');\n";
        let case = case(src);
        let outcome = Err(ExecError::Crash {
            stdout: "before\n".to_string(),
            message: "exit status 1: Error: boom".to_string(),
        });
        let (verdict, detail) = classify(&case, outcome, EngineRole::Target);
        assert_eq!(verdict, Verdict::Pass);
        assert!(detail.is_none());
    }

    #[test]
    fn intended_uncaught_with_wrong_partial_stdout_fails() {
        let src = "/*---\n{ \"intended_uncaught\": true }\n---*/\n/*===\nbefore\n===*/\n";
        let case = case(src);
        let outcome = Err(ExecError::Crash {
            stdout: "other\n".to_string(),
            message: "exit status 1".to_string(),
        });
        let (verdict, _) = classify(&case, outcome, EngineRole::Target);
        assert_eq!(verdict, Verdict::Fail);
    }

    #[test]
    fn timeout_is_an_error_with_budget() {
        let case = case("/*===\nx\n===*/\n");
        let outcome = Err(ExecError::Timeout {
            budget: std::time::Duration::from_secs(60),
        });
        let (verdict, detail) = classify(&case, outcome, EngineRole::Target);
        assert_eq!(verdict, Verdict::Error);
        assert_eq!(detail, Some(Detail::Timeout { budget_ms: 60_000 }));
    }

    #[test]
    fn verdict_serializes_screaming_snake() {
        let json = serde_json::to_string(&Verdict::ExpectedDivergence).unwrap();
        assert_eq!(json, "\"EXPECTED_DIVERGENCE\"");
    }

    #[test]
    fn first_diff_line_points_past_common_prefix() {
        assert_eq!(first_diff_line("a\nb\n", "a\nc\n"), 2);
        assert_eq!(first_diff_line("a\n", "a\nb\n"), 2);
        assert_eq!(first_diff_line("", "x\n"), 1);
    }
}
