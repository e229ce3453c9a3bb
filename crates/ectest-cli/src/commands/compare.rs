use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use ectest_harness::{PersistedReport, RunComparison};

#[derive(Args)]
pub struct CompareArgs {
    /// Baseline report, as written by `run --save`.
    pub old: PathBuf,
    /// Newer report to judge against the baseline.
    pub new: PathBuf,
}

pub fn execute(args: CompareArgs) -> Result<i32> {
    let old = PersistedReport::load(&args.old)?;
    let new = PersistedReport::load(&args.new)?;
    if old.engine != new.engine {
        tracing::warn!(old = %old.engine, new = %new.engine, "reports come from different engines");
    }

    let comparison = RunComparison::between(&old, &new);
    comparison.print();
    Ok(if comparison.is_clean() { 0 } else { 1 })
}
