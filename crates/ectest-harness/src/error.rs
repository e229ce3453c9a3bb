//! Shared error types for the harness pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// A broken test fixture.
///
/// These errors indicate the corpus itself is malformed (an authoring bug),
/// not that the engine under test misbehaved. They are fatal for the
/// affected test case only and classified as `ERROR` verdicts.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// A marker opened but its closing delimiter never appeared.
    #[error("unterminated {marker} marker opened at line {line}")]
    UnterminatedMarker { marker: &'static str, line: usize },

    /// A file declared more than one metadata block.
    #[error("duplicate metadata block at line {line}")]
    DuplicateMetadata { line: usize },

    /// The metadata block interior is not valid JSON.
    #[error("malformed metadata JSON: {0}")]
    MalformedMetadata(#[from] serde_json::Error),

    /// An include directive names something other than a bare file name.
    #[error("include name {0:?} must be a bare file name")]
    InvalidIncludeName(String),

    /// An include name resolved to nothing in any search directory.
    #[error("include {name:?} not found (searched {searched:?})")]
    IncludeNotFound {
        name: String,
        searched: Vec<PathBuf>,
    },

    /// The test file (or an include file) could not be read.
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
