// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decodes per-case statistics, aggregates them across a run and renders the final report.
//!
//! The main structures in this module are [`Aggregator`] and [`ReportFormatter`].

mod aggregator;
mod formatter;
mod stats;

pub use aggregator::*;
pub use formatter::*;
pub use stats::{OrderedStats, StatsRecord, StatsSide};
