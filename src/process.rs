//! Bounded execution of external tools.
//!
//! Registry login and signature verification both shell out to the signing
//! tool. Every invocation has a deadline; a child still running at the
//! deadline is killed.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Failure to obtain an exit status from an external tool
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} did not finish within {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// Captured result of a finished external tool
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Diagnostic text: stderr and stdout, verbatim, plus the exit status
    pub fn diagnostics(&self) -> String {
        let mut text = String::new();
        for stream in [&self.stderr, &self.stdout] {
            let stream = stream.trim_end();
            if !stream.is_empty() {
                text.push_str(stream);
                text.push('\n');
            }
        }
        text.push_str(&self.status.to_string());
        text
    }
}

/// Program plus arguments for one invocation
#[derive(Clone)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Run to completion, feeding `stdin` if given, bounded by `deadline`
    pub async fn run(
        &self,
        stdin: Option<&[u8]>,
        deadline: Duration,
    ) -> Result<CommandOutput, CommandError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(invocation = ?self, "Running external tool");

        let mut child = command.spawn().map_err(|source| CommandError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Feeding stdin counts against the deadline: a child that never
        // drains the pipe must not stall the caller.
        let stdin_pipe = child.stdin.take();
        let exchange = async move {
            if let (Some(input), Some(mut pipe)) = (stdin, stdin_pipe) {
                pipe.write_all(input).await?;
                // Closing stdin signals end of input to the child.
                drop(pipe);
            }
            child.wait_with_output().await
        };

        let output = timeout(deadline, exchange)
            .await
            .map_err(|_| CommandError::TimedOut {
                program: self.program.clone(),
                after: deadline,
            })?
            .map_err(|source| CommandError::Io {
                program: self.program.clone(),
                source,
            })?;

        Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
