// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::FromPathBufError;
use owo_colors::OwoColorize;
use std::{error::Error, time::Duration};
use thiserror::Error;
use tracing::error;
use wdbench_runner::{
    errors::{
        ConfigParseError, RunInterruptedError, RunnerBuildError, TestListReadError,
        TestListWriteError,
    },
    plural,
};

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `wdbench` failures.
///
/// Runs where individual cases crashed or timed out still exit with [`Self::OK`].
pub enum WdbenchExitCode {}

impl WdbenchExitCode {
    /// The run finished and the report was printed.
    pub const OK: i32 = 0;

    /// An error occurred before any case ran: bad config, unreadable list, or runner setup.
    pub const SETUP_ERROR: i32 = 96;

    /// A shutdown signal stopped the run before every case finished. No report was printed.
    pub const INTERRUPTED: i32 = 106;

    /// Writing the report to standard output failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}

// The #[error()] strings are placeholders -- errors are expected to be printed with
// display_to_stderr, which highlights paths.

/// An error that stops the run before or after the cases are processed.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed { error: std::io::Error },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { error: FromPathBufError },
    #[error("exactly one of --ifile and --examplefile must be given")]
    InputSelection,
    #[error("invalid timeout")]
    ZeroTimeout { timeout: Duration },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("test list read error")]
    TestListRead {
        #[from]
        err: TestListReadError,
    },
    #[error("test list write error")]
    TestListWrite {
        #[from]
        err: TestListWriteError,
    },
    #[error("runner build error")]
    RunnerBuild {
        #[from]
        err: RunnerBuildError,
    },
    #[error("run interrupted")]
    Interrupted {
        #[from]
        err: RunInterruptedError,
    },
    #[error("error writing report")]
    WriteReport { error: std::io::Error },
}

impl ExpectedError {
    pub(crate) fn write_report(error: std::io::Error) -> Self {
        Self::WriteReport { error }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::InputSelection
            | Self::ZeroTimeout { .. }
            | Self::ConfigParseError { .. }
            | Self::TestListRead { .. }
            | Self::TestListWrite { .. }
            | Self::RunnerBuild { .. } => WdbenchExitCode::SETUP_ERROR,
            Self::Interrupted { .. } => WdbenchExitCode::INTERRUPTED,
            Self::WriteReport { .. } => WdbenchExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr, followed by its chain of causes.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine the current directory");
                Some(error as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { error } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    error.as_path().display().style(styles.bold)
                );
                None
            }
            Self::InputSelection => {
                error!(
                    "exactly one of {} and {} must be given",
                    "--ifile".style(styles.bold),
                    "--examplefile".style(styles.bold)
                );
                None
            }
            Self::ZeroTimeout { timeout } => {
                error!(
                    "timeout must be greater than zero (got {})",
                    format!("{timeout:?}").style(styles.bold)
                );
                None
            }
            Self::ConfigParseError { err } => {
                match err.config_file() {
                    Some(file) => error!(
                        "failed to parse wdbench config at `{}`",
                        file.style(styles.bold)
                    ),
                    None => error!("failed to parse the default wdbench config"),
                }
                Some(err.kind() as &dyn Error)
            }
            Self::TestListRead { err } => {
                error!(
                    "failed to read test list from `{}`",
                    err.path().style(styles.bold)
                );
                err.source()
            }
            Self::TestListWrite { err } => {
                error!("{err}");
                err.source()
            }
            Self::RunnerBuild { err } => {
                error!("failed to set up the benchmark runner");
                Some(err as &dyn Error)
            }
            Self::Interrupted { err } => {
                error!(
                    "run interrupted by {} while processing `{}` ({} {} finished), no report written",
                    err.event(),
                    err.source_path().style(styles.bold),
                    err.finished(),
                    plural::cases_str(err.finished()),
                );
                None
            }
            Self::WriteReport { error } => {
                error!("failed to write report to standard output");
                Some(error as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
