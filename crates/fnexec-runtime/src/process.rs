//! Process runner - launch an entry point and capture its combined output

use fnexec_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;

/// A fully resolved command line.
#[derive(Clone, Debug, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added on top of the inherited environment.
    pub env: Vec<(String, String)>,
    /// Tag used when mirroring output into the service log.
    pub label: String,
}

/// How the process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitOutcome {
    /// `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitOutcome {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Runs a command with stdout and stderr appended to one log file.
///
/// Returns `Err` only when the process could not be launched or the log
/// could not be written; a non-zero exit is an `Ok` outcome.
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, log_path: &Path) -> Result<ExitOutcome>;
}

/// Real child processes via `tokio::process`.
#[derive(Clone, Debug, Default)]
pub struct CommandRunner {
    echo: bool,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self { echo: false }
    }

    /// Also emit every output line as a debug event.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        command
    }
}

#[async_trait::async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, spec: &CommandSpec, log_path: &Path) -> Result<ExitOutcome> {
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        let mut command = Self::command(spec);

        if !self.echo {
            command
                .stdout(Stdio::from(log.try_clone()?))
                .stderr(Stdio::from(log));
            let mut child = command
                .spawn()
                .map_err(|e| Error::process(format!("failed to spawn {}: {}", spec.program, e)))?;
            return Ok(child.wait().await?.into());
        }

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::process(format!("failed to spawn {}: {}", spec.program, e)))?;

        // Both pipes feed one writer so lines from stdout and stderr never interleave mid-line.
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut log = tokio::fs::File::from_std(log);
        while let Some(line) = rx.recv().await {
            debug!("({}): {}", spec.label, String::from_utf8_lossy(&line).trim_end());
            log.write_all(&line).await?;
            if !line.ends_with(b"\n") {
                log.write_all(b"\n").await?;
            }
        }
        log.flush().await?;

        Ok(child.wait().await?.into())
    }
}

/// Read raw lines from a child pipe until EOF.
async fn forward_lines(pipe: impl AsyncRead + Unpin, tx: mpsc::UnboundedSender<Vec<u8>>) {
    let mut reader = BufReader::new(pipe);
    loop {
        let mut line = Vec::new();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if tx.send(line).is_err() {
                    break;
                }
            }
        }
    }
}
