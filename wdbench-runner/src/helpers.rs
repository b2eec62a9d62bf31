// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use std::{borrow::Cow, error::Error, fmt};

/// Utilities for pluralizing various words based on count.
pub mod plural {
    /// Returns "case" if `count` is 1, otherwise "cases".
    pub fn cases_str(count: usize) -> &'static str {
        if count == 1 { "case" } else { "cases" }
    }
}

/// The environment variable the dynamic loader consults for extra library directories.
pub(crate) fn dylib_path_envvar() -> &'static str {
    if cfg!(windows) {
        "PATH"
    } else if cfg!(target_os = "macos") {
        // DYLD_LIBRARY_PATH is searched before a library's install path, which can easily have
        // unintended consequences. The fallback variable is only consulted if the install path
        // doesn't resolve.
        "DYLD_FALLBACK_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    }
}

/// Resolves `path` against `base` if it is relative.
pub(crate) fn resolve_against(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        base.join(path)
    }
}

/// Returns `path` relative to `base` if possible, or `path` unchanged.
pub(crate) fn relative_to<'a>(path: &'a Utf8Path, base: &Utf8Path) -> Cow<'a, Utf8Path> {
    match pathdiff::diff_utf8_paths(path, base) {
        Some(rel) => Cow::Owned(rel),
        None => Cow::Borrowed(path),
    }
}

/// Escapes a case name for use in a math-mode table cell.
pub(crate) fn escape_latex_underscores(name: &str) -> Cow<'_, str> {
    if name.contains('_') {
        Cow::Owned(name.replace('_', "\\_"))
    } else {
        Cow::Borrowed(name)
    }
}

/// Converts captured output to a string for display, trimming trailing whitespace.
pub(crate) fn display_output(output: &[u8]) -> Cow<'_, str> {
    match String::from_utf8_lossy(output) {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_end()),
        Cow::Owned(s) => Cow::Owned(s.trim_end().to_owned()),
    }
}

/// Displays an error followed by its sources, separated by `: `.
pub(crate) struct DisplayErrorChain<'a>(pub(crate) &'a (dyn Error + 'static));

impl fmt::Display for DisplayErrorChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
