use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use ectest_harness::{Budgets, EngineRole, HarnessConfig, TestFilter, TestRunner};

#[derive(Args)]
pub struct ListArgs {
    /// Directories to scan; defaults to the configured corpus dir.
    pub paths: Vec<PathBuf>,

    /// Only list tests whose path contains this substring.
    #[arg(short, long, value_name = "SUBSTRING")]
    pub filter: Option<String>,

    /// Print only the count.
    #[arg(long)]
    pub count: bool,
}

pub fn execute(args: ListArgs, config: &HarnessConfig) -> Result<i32> {
    let filter = TestFilter {
        name: args.filter.clone(),
        ..Default::default()
    };
    let runner = TestRunner::new(EngineRole::Target, Budgets::default()).with_filter(filter);

    let mut roots = args.paths.clone();
    if roots.is_empty() {
        match &config.corpus.dir {
            Some(dir) => roots.push(dir.clone()),
            None => bail!("no paths given and no [corpus] dir configured"),
        }
    }

    let mut total = 0;
    for root in &roots {
        if !root.is_dir() {
            bail!("not a directory: {}", root.display());
        }
        let tests = runner.collect_tests(root);
        total += tests.len();
        if !args.count {
            for test in tests {
                println!("{}", test.display());
            }
        }
    }
    println!("{} tests", total.to_string().bold());
    Ok(0)
}
