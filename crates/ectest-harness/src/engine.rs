//! Engine adapters.
//!
//! The harness talks to an engine through [`Engine`]; the stock
//! implementation is [`ProcessEngine`], which shells out to an external
//! interpreter binary per test. Embedders with an in-process engine can
//! implement the trait directly.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;

/// What a clean engine run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    /// Captured stdout, decoded lossily as UTF-8.
    pub stdout: String,
}

/// Why an engine run produced no clean output.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// The engine exited unsuccessfully. Whatever it printed before dying
    /// is kept so intended-crash tests can still be compared.
    #[error("engine crashed: {message}")]
    Crash { stdout: String, message: String },

    /// The engine was still running when the time budget elapsed.
    #[error("timed out after {budget:?}")]
    Timeout { budget: Duration },

    /// The engine process could not be launched at all.
    #[error("failed to launch engine: {0}")]
    Spawn(#[source] io::Error),

    /// The run was cancelled before the engine finished.
    #[error("run aborted")]
    Aborted,
}

/// An ECMAScript engine the harness can feed a script to.
pub trait Engine {
    /// Human-readable identification for logs and reports.
    fn describe(&self) -> String;

    /// Run `source` to completion, within `budget`.
    fn execute(
        &mut self,
        source: &str,
        budget: Duration,
    ) -> impl Future<Output = Result<EngineOutput, ExecError>>;
}

/// Command line an external engine is invoked with.
#[derive(Debug, Clone)]
pub struct EngineCmd {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl EngineCmd {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Split a whitespace-separated command line, e.g. `"duk --strict"`.
    pub fn parse(spec: &str) -> Option<Self> {
        let mut parts = spec.split_whitespace();
        let program = parts.next()?;
        Some(Self {
            program: PathBuf::from(program),
            args: parts.map(str::to_string).collect(),
        })
    }

    fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Runs each test in a fresh engine subprocess.
///
/// The script is written to a temporary `.js` file whose path is appended
/// to the configured argument list. The child is killed if the time budget
/// elapses or the run is dropped mid-flight.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    cmd: EngineCmd,
}

impl ProcessEngine {
    pub fn new(cmd: EngineCmd) -> Self {
        Self { cmd }
    }
}

impl Engine for ProcessEngine {
    fn describe(&self) -> String {
        self.cmd.display()
    }

    async fn execute(&mut self, source: &str, budget: Duration) -> Result<EngineOutput, ExecError> {
        let script = write_script(source).map_err(ExecError::Spawn)?;

        let mut command = Command::new(&self.cmd.program);
        command
            .args(&self.cmd.args)
            .arg(script.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(budget, command.output()).await {
            Ok(result) => result.map_err(ExecError::Spawn)?,
            // Dropping the output future kills the child.
            Err(_) => return Err(ExecError::Timeout { budget }),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(EngineOutput { stdout })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ExecError::Crash {
                stdout,
                message: crash_message(output.status, stderr.trim()),
            })
        }
    }
}

fn write_script(source: &str) -> io::Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("ectest-")
        .suffix(".js")
        .tempfile()?;
    file.write_all(source.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn crash_message(status: ExitStatus, stderr: &str) -> String {
    let status = match status.code() {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    };
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}
