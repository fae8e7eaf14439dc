//! External command execution.
//!
//! Every interaction with CUPS, udev and the device node goes through
//! [`CommandRunner`], so the parsing and orchestration above it can be driven
//! by canned output in tests.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::domain::{Result, ZebraError};

/// A command line plus its optional stdin payload and time limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// Start a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Pipe `input` to the command's stdin.
    #[must_use]
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    #[must_use]
    pub const fn timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Program and arguments joined by spaces, for logs and test matching.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when killed by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs OS commands.
pub trait CommandRunner {
    /// Run to completion (or until its timeout) and capture output.
    ///
    /// # Errors
    /// Returns error if the command cannot be spawned or times out. A
    /// non-zero exit is not an error.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run a batch of independent commands; results keep input order.
    fn run_all(&self, specs: &[CommandSpec]) -> Vec<Result<CommandOutput>> {
        specs.iter().map(|spec| self.run(spec)).collect()
    }

    /// Start a command without waiting for it.
    ///
    /// # Errors
    /// Returns error if the command cannot be spawned.
    fn spawn_detached(&self, spec: &CommandSpec) -> Result<()>;
}

/// Runs a command asynchronously, honouring its timeout.
///
/// # Errors
/// Returns error if the command cannot be spawned, its stdin cannot be
/// written, or it exceeds its timeout (the child is killed).
pub async fn run_async(spec: CommandSpec) -> Result<CommandOutput> {
    let line = spec.command_line();
    tracing::debug!(command = %line, "Running command");

    let mut command = tokio::process::Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| ZebraError::command(&line, e))?;

    // Feeding stdin and collecting output share one deadline; a child that
    // never drains its stdin must still time out.
    let stdin = child.stdin.take();
    let input = spec.stdin.unwrap_or_default();
    let interaction = async move {
        let feed = async move {
            if let Some(mut pipe) = stdin {
                pipe.write_all(input.as_bytes()).await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed?;
        output
    };

    let output = match spec.timeout {
        Some(limit) => tokio::time::timeout(limit, interaction)
            .await
            .map_err(|_| ZebraError::Timeout {
                command: line.clone(),
                secs: limit.as_secs(),
            })?,
        None => interaction.await,
    }
    .map_err(|e| ZebraError::command(&line, e))?;

    Ok(CommandOutput {
        status: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Real runner backed by a current-thread tokio runtime.
pub struct SystemRunner {
    runtime: tokio::runtime::Runtime,
}

impl SystemRunner {
    /// Create a runner with its own runtime.
    ///
    /// # Errors
    /// Returns error if the runtime cannot be built.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ZebraError::io("Failed to start async runtime", e))?;

        Ok(Self { runtime })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.runtime.block_on(run_async(spec.clone()))
    }

    fn run_all(&self, specs: &[CommandSpec]) -> Vec<Result<CommandOutput>> {
        self.runtime.block_on(async {
            let handles: Vec<_> = specs
                .iter()
                .cloned()
                .map(|spec| tokio::spawn(run_async(spec)))
                .collect();

            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                results.push(handle.await.unwrap_or_else(|e| {
                    Err(ZebraError::internal(format!("command task failed: {e}")))
                }));
            }
            results
        })
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> Result<()> {
        let line = spec.command_line();
        tracing::debug!(command = %line, "Spawning detached command");

        std::process::Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ZebraError::command(&line, e))?;

        Ok(())
    }
}
