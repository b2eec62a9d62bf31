// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by wdbench.

use crate::{command::Placeholder, reporter::StatsSide, signal::ShutdownEvent};
use camino::{Utf8Path, Utf8PathBuf};
use config::ConfigError;
use itertools::Itertools;
use std::{env::JoinPathsError, fmt, sync::Arc};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error(
    "failed to parse wdbench config{}",
    .config_file.as_ref().map(|file| format!(" at `{file}`")).unwrap_or_default()
)]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Option<Utf8PathBuf>,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: Option<&Utf8Path>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.map(|file| file.to_owned()),
            kind,
        }
    }

    /// Returns the config file that failed to parse, if a user file was involved.
    pub fn config_file(&self) -> Option<&Utf8Path> {
        self.config_file.as_deref()
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building or deserializing the layered config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// A tool's argument template referenced a placeholder that doesn't exist.
    #[error(
        "in arguments for `{tool}`, unknown placeholder `{{{placeholder}}}` (known placeholders: {})",
        Placeholder::ALL.iter().map(|p| format!("{{{}}}", p.name())).join(", ")
    )]
    UnknownPlaceholder {
        /// The tool whose arguments are invalid.
        tool: &'static str,

        /// The placeholder name, without braces.
        placeholder: String,
    },

    /// A tool's program path was empty.
    #[error("program for `{tool}` is empty")]
    EmptyProgram {
        /// The tool whose program is empty.
        tool: &'static str,
    },

    /// The analysis timeout was zero.
    #[error("analysis timeout must be greater than zero")]
    ZeroTimeout,
}

/// An error that occurred while reading a list of test cases.
#[derive(Debug, Error)]
#[error("failed to read test list from `{path}`")]
pub struct TestListReadError {
    path: Utf8PathBuf,
    #[source]
    error: std::io::Error,
}

impl TestListReadError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: std::io::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// Returns the path of the list that couldn't be read.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// An error that occurred while writing a single source file out as a one-entry test list.
#[derive(Debug, Error)]
#[error("failed to write test list for `{source_file}` to `{path}`")]
pub struct TestListWriteError {
    path: Utf8PathBuf,
    source_file: String,
    #[source]
    error: std::io::Error,
}

impl TestListWriteError {
    pub(crate) fn new(
        path: impl Into<Utf8PathBuf>,
        source_file: impl Into<String>,
        error: std::io::Error,
    ) -> Self {
        Self {
            path: path.into(),
            source_file: source_file.into(),
            error,
        }
    }
}

/// An error that occurred while building a [`BenchRunner`](crate::runner::BenchRunner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),

    /// The library directories could not be joined into a search path.
    #[error("failed to join library directories into `{var_name}`")]
    LibraryPathJoin {
        /// The environment variable that was being constructed.
        var_name: &'static str,

        /// The underlying error.
        #[source]
        error: JoinPathsError,
    },

    /// The install root could not be made absolute.
    #[error("failed to resolve install root `{install_root}`")]
    InstallRoot {
        /// The install root as provided.
        install_root: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Signal handlers could not be registered.
    #[error("error setting up signal handler")]
    SignalHandlerSetup(#[source] std::io::Error),
}

/// A signal ended the run before every case was processed.
///
/// The case that was running when the signal arrived is not reported.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("run interrupted by {event} while processing `{source_path}`")]
pub struct RunInterruptedError {
    event: ShutdownEvent,
    source_path: Utf8PathBuf,
    finished: usize,
}

impl RunInterruptedError {
    pub(crate) fn new(event: ShutdownEvent, source_path: Utf8PathBuf, finished: usize) -> Self {
        Self {
            event,
            source_path,
            finished,
        }
    }

    /// Returns the signal that ended the run.
    pub fn event(&self) -> ShutdownEvent {
        self.event
    }

    /// Returns the source of the case that was running.
    pub fn source_path(&self) -> &Utf8Path {
        &self.source_path
    }

    /// Returns the number of cases that finished before the signal arrived.
    pub fn finished(&self) -> usize {
        self.finished
    }
}

/// An error that occurred while starting or waiting on a child process.
///
/// These errors are values attached to a stage result, not failures of the overall run.
#[derive(Clone, Debug, Error)]
pub enum ChildStartError {
    /// The log artifact that receives the child's output could not be created.
    #[error("error creating log file `{path}`")]
    CreateLogFile {
        /// The log file path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: Arc<std::io::Error>,
    },

    /// The process could not be spawned, e.g. because the binary is missing.
    #[error("error spawning child process")]
    Spawn(#[source] Arc<std::io::Error>),

    /// An error occurred while waiting for the process to exit.
    #[error("error waiting for child process to exit")]
    Wait(#[source] Arc<std::io::Error>),
}

/// An error produced while decoding a structured-result artifact.
///
/// Decoding never fails the run: the error is attached to the case, which is then classified as
/// crashed.
#[derive(Clone, Debug, Error)]
#[error("failed to decode result file `{path}`")]
pub struct DecodeError {
    path: Utf8PathBuf,
    #[source]
    kind: DecodeErrorKind,
    partial_input: Option<crate::reporter::OrderedStats>,
}

impl DecodeError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, kind: DecodeErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
            partial_input: None,
        }
    }

    pub(crate) fn with_partial_input(mut self, input: crate::reporter::OrderedStats) -> Self {
        self.partial_input = Some(input);
        self
    }

    /// Returns the path of the result artifact.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the kind of decode error.
    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }

    /// Returns the input-side statistics, if that line decoded before the error occurred.
    ///
    /// These are only used to render a more informative report row.
    pub fn partial_input(&self) -> Option<&crate::reporter::OrderedStats> {
        self.partial_input.as_ref()
    }
}

/// The kind of [`DecodeError`].
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The artifact could not be read.
    #[error("error reading file")]
    Read(#[source] Arc<std::io::Error>),

    /// The artifact didn't have exactly two records.
    #[error("expected 2 lines, found {actual}")]
    LineCount {
        /// The number of non-empty lines found.
        actual: usize,
    },

    /// A line was not valid JSON.
    #[error("{side} line is not a valid record")]
    Malformed {
        /// Which line failed.
        side: StatsSide,

        /// The underlying error.
        #[source]
        error: Arc<serde_json::Error>,
    },

    /// A record contained a value that is not a scalar.
    #[error("{side} record has non-scalar value for key `{key}`")]
    NonScalar {
        /// Which line failed.
        side: StatsSide,

        /// The offending key.
        key: String,
    },
}

/// An expected statistic was missing or non-numeric in an otherwise well-formed record.
///
/// Only the affected metric is skipped.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StatFieldError {
    /// The key was not present.
    #[error("{side} record has no `{key}` field")]
    Missing {
        /// Which record was searched.
        side: StatsSide,

        /// The missing key.
        key: &'static str,
    },

    /// The key was present but not a non-negative integer.
    #[error("{side} record field `{key}` is not numeric: {value}")]
    NotNumeric {
        /// Which record was searched.
        side: StatsSide,

        /// The key.
        key: &'static str,

        /// The value as displayed.
        value: String,
    },

    /// Adding the value would overflow the running total.
    #[error("{side} record field `{key}` overflows the total ({value} + {total})")]
    Overflow {
        /// Which record was searched.
        side: StatsSide,

        /// The key.
        key: &'static str,

        /// The value that was skipped.
        value: u64,

        /// The total before the value was skipped.
        total: u64,
    },
}

impl fmt::Display for StatsSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsSide::Input => write!(f, "input"),
            StatsSide::Output => write!(f, "output"),
        }
    }
}
