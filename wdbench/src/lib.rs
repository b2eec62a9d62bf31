// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs wrapped-domain analysis benchmarks and reports aggregate results.
//!
//! The pipeline and aggregation engine lives in
//! [wdbench-runner](https://crates.io/crates/wdbench-runner); this crate is its command-line
//! front end.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
