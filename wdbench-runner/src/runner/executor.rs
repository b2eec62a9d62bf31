// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs a single external command and classifies how it ended.

use crate::{
    command::{RunEnvironment, StageCommand},
    errors::ChildStartError,
    signal::{ShutdownEvent, SignalHandler},
    time::stopwatch,
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use std::{process::Stdio, sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Where a child's stdout and stderr go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Capture into memory, to be surfaced on the operator stream. Stdout comes first, then
    /// stderr.
    Operator,

    /// Write both streams to this file, truncating it first.
    LogFile(Utf8PathBuf),
}

/// How a child process ended.
#[derive(Clone, Debug)]
pub enum ExecutionStatus {
    /// The process exited with status 0.
    Success,

    /// The process exited with a non-zero status, or was killed by a signal.
    Failure {
        /// The exit code, if the process exited normally.
        exit_code: Option<i32>,
    },

    /// The process couldn't be started.
    SpawnError(ChildStartError),

    /// The process ran past the timeout and was killed.
    Timeout,
}

impl ExecutionStatus {
    /// Returns true if the process ran to completion, whatever its exit code.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Success | Self::Failure { .. })
    }
}

/// The result of running one command.
#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// How the process ended.
    pub status: ExecutionStatus,

    /// Captured output. Always empty for [`CaptureTarget::LogFile`].
    pub output: Vec<u8>,

    /// When the process was started.
    pub start_time: DateTime<Local>,

    /// Wall-clock time until the process ended or was killed.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Returns the start time and duration in the form used in log lines.
    pub fn display_timing(&self) -> String {
        format!(
            "started {}, ran {:.3}s",
            self.start_time.format("%H:%M:%S%.3f"),
            self.duration.as_secs_f64()
        )
    }
}

/// Runs `command`, killing it and its process group if `timeout` elapses.
///
/// If a shutdown signal arrives first, the process group is killed as well and the signal is
/// returned instead of a result.
pub(crate) async fn run(
    command: &StageCommand,
    env: &RunEnvironment,
    capture: &CaptureTarget,
    timeout: Option<Duration>,
    signal_handler: &mut SignalHandler,
) -> Result<ExecutionResult, ShutdownEvent> {
    let stopwatch = stopwatch();
    let finish = |status, output| {
        let snapshot = stopwatch.snapshot();
        ExecutionResult {
            status,
            output,
            start_time: snapshot.start_time,
            duration: snapshot.duration,
        }
    };

    let mut cmd = command.to_command(env);
    cmd.stdin(Stdio::null());
    super::os::set_process_group(&mut cmd);

    match capture {
        CaptureTarget::Operator => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        CaptureTarget::LogFile(path) => {
            let files = std::fs::File::create(path)
                .and_then(|file| Ok((file.try_clone()?, file)))
                .map_err(|error| ChildStartError::CreateLogFile {
                    path: path.clone(),
                    error: Arc::new(error),
                });
            match files {
                Ok((stdout, stderr)) => {
                    cmd.stdout(stdout).stderr(stderr);
                }
                Err(error) => return Ok(finish(ExecutionStatus::SpawnError(error), Vec::new())),
            }
        }
    }

    let mut cmd = tokio::process::Command::from(cmd);
    cmd.kill_on_drop(true);
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(error) => {
            return Ok(finish(
                ExecutionStatus::SpawnError(ChildStartError::Spawn(Arc::new(error))),
                Vec::new(),
            ));
        }
    };
    let pid = child.id();
    debug!(?pid, program = %command.program(), "spawned child");

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stopped = {
        let wait = async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_all(stdout), read_all(stderr));
            // Output read errors only lose diagnostics; the exit status is what matters.
            let mut output = stdout.unwrap_or_default();
            output.extend(stderr.unwrap_or_default());
            (status, output)
        };
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            (status, output) = wait => {
                return Ok(match status {
                    Ok(exit_status) if exit_status.success() => {
                        finish(ExecutionStatus::Success, output)
                    }
                    Ok(exit_status) => finish(
                        ExecutionStatus::Failure {
                            exit_code: exit_status.code(),
                        },
                        output,
                    ),
                    Err(error) => finish(
                        ExecutionStatus::SpawnError(ChildStartError::Wait(Arc::new(error))),
                        output,
                    ),
                });
            }
            () = deadline => None,
            Some(event) = signal_handler.recv() => Some(event),
        }
    };

    if let Some(pid) = pid {
        super::os::terminate_process_group(pid);
    }
    // Make sure the direct child is gone and reaped even if it left the process group.
    let _ = child.start_kill();
    let _ = child.wait().await;

    match stopped {
        None => {
            debug!(?pid, "killed child after timeout");
            Ok(finish(ExecutionStatus::Timeout, Vec::new()))
        }
        Some(event) => {
            debug!(?pid, %event, "killed child on shutdown signal");
            Err(event)
        }
    }
}

async fn read_all(reader: Option<impl AsyncRead + Unpin>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}
