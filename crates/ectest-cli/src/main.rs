use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use ectest_harness::HarnessConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "ectest",
    version,
    about = "Expected-output testcase runner for ECMAScript engines"
)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "ectest.toml", value_name = "FILE")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tests and report verdicts.
    Run(commands::run::RunArgs),
    /// List discovered tests without running them.
    List(commands::list::ListArgs),
    /// Compare two saved run reports.
    Compare(commands::compare::CompareArgs),
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_tracing() {
        eprintln!("{} {err:#}", "error:".red().bold());
        process::exit(2);
    }

    match dispatch(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            process::exit(2);
        }
    }
}

fn dispatch(cli: Cli) -> Result<i32> {
    let config = HarnessConfig::load_or_default(&cli.config);
    match cli.command {
        Commands::Run(args) => commands::run::execute(args, &config),
        Commands::List(args) => commands::list::execute(args, &config),
        Commands::Compare(args) => commands::compare::execute(args),
    }
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive("info".parse()?)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
