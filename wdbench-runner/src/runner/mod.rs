// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The benchmark runner.
//!
//! The main structure in this module is [`BenchRunner`].

mod executor;
mod imp;
mod outcome;

#[cfg(unix)]
#[path = "unix.rs"]
mod os;

#[cfg(windows)]
#[path = "windows.rs"]
mod os;

pub use executor::{CaptureTarget, ExecutionResult, ExecutionStatus};
pub use imp::*;
pub use outcome::*;
