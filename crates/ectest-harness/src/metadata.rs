//! Test metadata parsing.
//!
//! Metadata lives in a `/*--- ... ---*/` comment block whose interior is a
//! small JSON object. All keys are optional; unknown keys are tolerated and
//! ignored so the corpus can grow without breaking older harness builds.

use serde::{Deserialize, Serialize};

/// Per-file test annotations (from the JSON metadata block).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TestMetadata {
    /// Free-text annotation for human readers.
    #[serde(default)]
    pub comment: Option<String>,

    /// Test relies on engine-specific behavior; other engines are expected
    /// to produce different output.
    #[serde(default)]
    pub custom: bool,

    /// Test relies on behavior outside the standard (but shared by some
    /// engines); divergence on a reference engine is expected.
    #[serde(default)]
    pub nonstandard: bool,

    /// Do not execute this test at all.
    #[serde(default)]
    pub skip: bool,

    /// Test needs a materially larger wall-clock budget.
    #[serde(default)]
    pub slow: bool,

    /// Free-text pointer to a known engine defect this test documents.
    #[serde(default)]
    pub knownissue: Option<String>,

    /// Execute the whole compilation unit in strict mode.
    #[serde(default)]
    pub use_strict: bool,

    /// The test intentionally lets an error escape the top level; an
    /// abnormal engine exit is part of the expected behavior.
    #[serde(default)]
    pub intended_uncaught: bool,
}

impl TestMetadata {
    /// Parse a metadata block interior.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// True when the test documents engine-specific behavior, i.e. a
    /// mismatch against a reference engine is tolerable.
    pub fn is_engine_specific(&self) -> bool {
        self.custom || self.nonstandard
    }

    /// Human-readable reason used when the skip flag short-circuits a run.
    pub fn skip_reason(&self) -> String {
        match &self.knownissue {
            Some(issue) => format!("skip flag set (known issue: {issue})"),
            None => "skip flag set".to_string(),
        }
    }
}
