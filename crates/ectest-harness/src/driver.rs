//! Script assembly and supervised execution of one test.

use std::path::Path;
use std::time::Duration;

use crate::abort::AbortSignal;
use crate::engine::{Engine, EngineOutput, ExecError};
use crate::error::CorpusError;
use crate::includes::IncludeResolver;
use crate::metadata::TestMetadata;
use crate::testcase::TestCase;

/// Wall-clock budgets for a single test.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub normal: Duration,
    pub slow: Duration,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            normal: Duration::from_secs(60),
            slow: Duration::from_secs(300),
        }
    }
}

/// Budget for one test: tests flagged `slow` get the larger allowance.
pub fn budget_for(metadata: &TestMetadata, budgets: Budgets) -> Duration {
    if metadata.slow {
        budgets.slow
    } else {
        budgets.normal
    }
}

/// Build the script the engine actually runs: strict-mode pragma first if
/// requested, then resolved includes in declaration order, then the body.
pub fn assemble(case: &TestCase, resolver: &IncludeResolver) -> Result<String, CorpusError> {
    let test_dir = case.path.parent().unwrap_or_else(|| Path::new("."));
    let includes = resolver.resolve_all(&case.includes, test_dir)?;

    let mut script = String::new();
    if case.metadata.use_strict {
        script.push_str("\"use strict\";\n");
    }
    for include in &includes {
        script.push_str(include);
        if !script.ends_with('\n') {
            script.push('\n');
        }
    }
    script.push_str(&case.body);
    Ok(script)
}

/// Run `script` on `engine`, racing the abort signal. A triggered abort
/// drops the engine future, which kills any subprocess behind it.
pub async fn run_with_abort<E: Engine>(
    engine: &mut E,
    script: &str,
    budget: Duration,
    abort: &AbortSignal,
) -> Result<EngineOutput, ExecError> {
    if abort.is_triggered() {
        return Err(ExecError::Aborted);
    }
    tokio::select! {
        outcome = engine.execute(script, budget) => outcome,
        _ = abort.aborted() => Err(ExecError::Aborted),
    }
}
