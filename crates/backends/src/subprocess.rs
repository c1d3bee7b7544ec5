// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::{Output, Stdio};
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

/// Default timeout for kill/cleanup commands.
pub const KILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for probing a backend binary.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{description} failed: {source}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{description} timed out after {}s", timeout.as_secs())]
    Timeout {
        description: String,
        timeout: Duration,
    },
}

impl SubprocessError {
    fn io(description: &str, source: std::io::Error) -> Self {
        Self::Io {
            description: description.to_string(),
            source,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`. The child is
/// killed automatically when the timeout elapses (tokio kills the child
/// on drop for `output()`).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(SubprocessError::io(description, io_err)),
        Err(_elapsed) => Err(SubprocessError::Timeout {
            description: description.to_string(),
            timeout,
        }),
    }
}

/// Run a subprocess with bytes piped to stdin, collecting stdout/stderr.
///
/// Stdin is written and closed concurrently with the output reads so a
/// child that streams output while consuming input cannot deadlock on a
/// full pipe. When the timeout elapses the child is killed immediately
/// and a `Timeout` error is returned.
pub async fn run_with_input(
    mut cmd: Command,
    input: &[u8],
    timeout: Duration,
    description: &str,
) -> Result<Output, SubprocessError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| SubprocessError::io(description, e))?;

    match tokio::time::timeout(timeout, drive(&mut child, input)).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => {
            let _ = child.kill().await;
            Err(SubprocessError::io(description, io_err))
        }
        Err(_elapsed) => {
            let _ = child.kill().await;
            Err(SubprocessError::Timeout {
                description: description.to_string(),
                timeout,
            })
        }
    }
}

async fn drive(child: &mut Child, input: &[u8]) -> Result<Output, std::io::Error> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| std::io::Error::other("stdin not captured"))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| std::io::Error::other("stdout not captured"))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| std::io::Error::other("stderr not captured"))?;

    let write = async {
        // A child may legitimately exit before draining stdin; its exit
        // status is the interesting signal then, not the broken pipe.
        match stdin.write_all(input).await {
            Ok(()) => {
                let _ = stdin.shutdown().await;
            }
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(err) => return Err(err),
        }
        drop(stdin);
        Ok::<_, std::io::Error>(())
    };

    let mut out = Vec::new();
    let mut err = Vec::new();
    let (wrote, read_out, read_err) = tokio::join!(
        write,
        stdout.read_to_end(&mut out),
        stderr.read_to_end(&mut err)
    );
    wrote?;
    read_out?;
    read_err?;

    let status = child.wait().await?;
    Ok(Output {
        status,
        stdout: out,
        stderr: err,
    })
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
