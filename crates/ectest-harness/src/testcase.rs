//! A loaded test file, ready to run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CorpusError;
use crate::extract::extract;
use crate::metadata::TestMetadata;

/// One test file after marker extraction.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Path the file was loaded from, used for reporting.
    pub path: PathBuf,
    /// Metadata, all defaults when the file carries no block.
    pub metadata: TestMetadata,
    /// Include names in declaration order.
    pub includes: Vec<String>,
    /// Expectation block interiors in file order.
    pub expected_blocks: Vec<String>,
    /// Executable source with marker lines removed.
    pub body: String,
}

impl TestCase {
    /// Build a test case from already-read source text.
    pub fn parse(path: impl Into<PathBuf>, source: &str) -> Result<Self, CorpusError> {
        let extracted = extract(source)?;
        Ok(Self {
            path: path.into(),
            metadata: extracted.metadata.unwrap_or_default(),
            includes: extracted.includes,
            expected_blocks: extracted.expected_blocks,
            body: extracted.body,
        })
    }

    /// Read and parse a test file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| CorpusError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &source)
    }

    /// Expected stdout: all expectation blocks joined in file order.
    pub fn expected_output(&self) -> String {
        self.expected_blocks.concat()
    }

    /// Whether the file declares any expectation blocks. A file without
    /// any passes as long as the engine does not crash.
    pub fn has_expectations(&self) -> bool {
        !self.expected_blocks.is_empty()
    }
}
