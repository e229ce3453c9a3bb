//! # ectest harness
//!
//! Expected-output conformance harness for embeddable ECMAScript engines.
//!
//! Test files carry their own expected stdout in comment-delimited blocks
//! (`/*=== ... ===*/`), optional JSON metadata (`/*--- ... ---*/`) and
//! include directives (`/*@include name@*/`). This crate extracts those
//! markers, assembles each file into a single compilation unit, runs it
//! against an engine binary, and compares the captured output byte for
//! byte against the concatenated expectation blocks.

#![warn(clippy::all)]

pub mod abort;
pub mod compare;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod extract;
pub mod includes;
pub mod metadata;
pub mod parallel;
pub mod report;
pub mod runner;
pub mod testcase;
pub mod verdict;

pub use abort::{AbortHandle, AbortSignal, abort_pair};
pub use compare::RunComparison;
pub use config::HarnessConfig;
pub use driver::Budgets;
pub use engine::{Engine, EngineCmd, EngineOutput, ExecError, ProcessEngine};
pub use error::CorpusError;
pub use metadata::TestMetadata;
pub use parallel::{ParallelOptions, Verbosity, run_parallel};
pub use report::{PersistedReport, ReportError, RunSummary, TestReport};
pub use runner::{MetadataFlag, TestFilter, TestResult, TestRunner};
pub use testcase::TestCase;
pub use verdict::{Detail, EngineRole, Verdict};
