// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [wdbench](https://crates.io/crates/wdbench). The `wdbench` binary uses
//! this crate, but it may also be useful for other consumers that drive analysis benchmarks.
//!
//! For each case in a list, the runner compiles the source, optionally instruments it with
//! bounds checks, and runs the analysis engine under a timeout. Each case lands in exactly one of
//! four buckets (completed, timed out, crashed or aborted), and the statistics of completed cases
//! are summed into an aggregate report.

pub mod command;
pub mod config;
pub mod errors;
mod helpers;
pub mod reporter;
pub mod runner;
pub mod signal;
pub mod test_list;
mod time;

pub use helpers::plural;
