// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test cases and the lists they are read from.

use crate::errors::{TestListReadError, TestListWriteError};
use camino::{Utf8Path, Utf8PathBuf};

/// A single benchmark source driven through the pipeline.
///
/// All artifact paths are derived from the source path: the source's extension is replaced, so
/// `loop.c` produces `loop.bc`, `loop.log` and `loop.bc.result` next to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    source: Utf8PathBuf,
}

impl TestCase {
    /// Creates a test case from a list entry, resolving relative entries against `cwd`.
    pub fn new(entry: impl AsRef<Utf8Path>, cwd: &Utf8Path) -> Self {
        Self {
            source: crate::helpers::resolve_against(cwd, entry.as_ref()),
        }
    }

    /// Returns the absolute path to the source file.
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    /// Returns the compiled intermediate artifact, `<basename>.bc`.
    pub fn bitcode_path(&self) -> Utf8PathBuf {
        self.source.with_extension("bc")
    }

    /// Returns the captured analysis output, `<basename>.log`.
    pub fn log_path(&self) -> Utf8PathBuf {
        self.source.with_extension("log")
    }

    /// Returns the structured-result artifact, `<basename>.bc.result`.
    pub fn result_path(&self) -> Utf8PathBuf {
        self.source.with_extension("bc.result")
    }
}

/// An ordered list of test cases, in the order they'll be run.
#[derive(Clone, Debug)]
pub struct TestList {
    list_path: Utf8PathBuf,
    cases: Vec<TestCase>,
}

impl TestList {
    /// File name used when a single source file is materialized as a list.
    pub const LITERAL_LIST_FILE_NAME: &'static str = ".tmp.wdbench-list";

    /// Reads a test list from `path`, one source file per line.
    pub fn from_file(path: &Utf8Path, cwd: &Utf8Path) -> Result<Self, TestListReadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|error| TestListReadError::new(path, error))?;
        Ok(Self::parse(path, &contents, cwd))
    }

    /// Writes a one-entry list containing `source_file` to `list_path`.
    ///
    /// The list is then read back with [`Self::from_file`] like any other list.
    pub fn write_literal(list_path: &Utf8Path, source_file: &str) -> Result<(), TestListWriteError> {
        std::fs::write(list_path, source_file)
            .map_err(|error| TestListWriteError::new(list_path, source_file, error))
    }

    /// Parses list contents. Blank lines are skipped and trailing whitespace is trimmed.
    pub fn parse(list_path: &Utf8Path, contents: &str, cwd: &Utf8Path) -> Self {
        let cases = contents
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
            .map(|line| TestCase::new(line, cwd))
            .collect();
        Self {
            list_path: list_path.to_owned(),
            cases,
        }
    }

    /// Returns the path this list was read from.
    pub fn list_path(&self) -> &Utf8Path {
        &self.list_path
    }

    /// Returns the number of cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// Returns true if there are no cases.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Iterates over the cases in run order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TestCase> {
        self.cases.iter()
    }
}
