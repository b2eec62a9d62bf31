// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::stats::{OrderedStats, StatsRecord, StatsSide};
use crate::{
    errors::StatFieldError,
    runner::{CaseOutcome, CaseResult, CrashReason, FinishedCase},
    test_list::TestCase,
};
use std::time::Duration;
use tracing::{info, warn};

/// Input keys that repeat run-wide settings. These are reported once rather than as columns.
pub const RUN_CONSTANT_KEYS: &[&str] = &[
    "name",
    "Abstraction",
    "Num Disjs",
    "Use extrapolation",
    "Perform narrowing",
];

const NUM_INSTRS: &str = "Num Instrs";
const NUM_ASSERTIONS: &str = "Num Assertions";
const NUM_PROVED_ASSERTIONS: &str = "Num Proved Assertions";
const NUM_ABC_ASSERTIONS: &str = "Num Array Bounds Check Assertions";
const NUM_PROVED_ABC_ASSERTIONS: &str = "Num Proved Array Bounds Check Assertions";
const MIN_VOC_SIZE: &str = "Min voc size";
const MAX_VOC_SIZE: &str = "Max voc size";

/// Column keys captured from the first completed case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportHeader {
    input_keys: Vec<String>,
    output_keys: Vec<String>,
}

impl ReportHeader {
    fn from_record(record: &StatsRecord) -> Self {
        let input_keys = record
            .input()
            .keys()
            .filter(|key| !RUN_CONSTANT_KEYS.contains(key))
            .map(str::to_owned)
            .collect();
        let output_keys = record.output().keys().map(str::to_owned).collect();
        Self {
            input_keys,
            output_keys,
        }
    }

    /// Returns the input-side column keys.
    pub fn input_keys(&self) -> &[String] {
        &self.input_keys
    }

    /// Returns the output-side column keys.
    pub fn output_keys(&self) -> &[String] {
        &self.output_keys
    }
}

/// The cells of a single report row.
#[derive(Clone, Debug)]
pub enum RowCells {
    /// Both records decoded.
    Completed {
        /// Input-side statistics.
        input: OrderedStats,

        /// Output-side statistics.
        output: OrderedStats,
    },

    /// The case crashed. The input record is present if it decoded.
    Crashed {
        /// Input-side statistics, if available.
        partial_input: Option<OrderedStats>,
    },

    /// The analysis timed out.
    TimedOut,
}

/// A single case's row in the report.
#[derive(Clone, Debug)]
pub struct ReportRow {
    case: TestCase,
    cells: RowCells,
    elapsed: Duration,
}

impl ReportRow {
    /// Returns the case this row describes.
    pub fn case(&self) -> &TestCase {
        &self.case
    }

    /// Returns the row's cells.
    pub fn cells(&self) -> &RowCells {
        &self.cells
    }

    /// Returns the analysis stage's wall-clock duration.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// How many cases ended up in each bucket.
///
/// Every case is in exactly one of completed, timed out, crashed or aborted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaseCounts {
    /// The number of cases seen.
    pub attempted: usize,

    /// Cases whose result artifact decoded.
    pub completed: usize,

    /// Cases whose analysis was killed after the timeout.
    pub timed_out: usize,

    /// Cases whose analysis couldn't be spawned or whose result artifact didn't decode.
    pub crashed: usize,

    /// Cases that failed before the analysis stage.
    pub aborted: usize,
}

impl CaseCounts {
    /// Returns the number of cases that reached the analysis stage.
    pub fn reached_analysis(&self) -> usize {
        self.completed + self.timed_out + self.crashed
    }
}

/// Sums over completed cases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    /// Summed instruction counts.
    pub instrs: u64,

    /// Summed assertion counts.
    pub assertions: u64,

    /// Summed proved-assertion counts.
    pub proved_assertions: u64,

    /// Summed bounds-check assertion counts. Only tracked with bounds checking on.
    pub array_bounds_check_assertions: u64,

    /// Summed proved bounds-check assertion counts. Only tracked with bounds checking on.
    pub proved_array_bounds_check_assertions: u64,

    /// Summed analysis time.
    pub time: Duration,

    /// The longest single analysis time.
    pub max_example_time: Duration,

    /// The lowest minimum and highest maximum vocabulary size seen, if any case reported both.
    pub voc_range: Option<(u64, u64)>,
}

/// Accumulates finished cases into an [`AggregateReport`].
#[derive(Clone, Debug)]
pub struct Aggregator {
    array_bounds_check: bool,
    header: Option<ReportHeader>,
    rows: Vec<ReportRow>,
    counts: CaseCounts,
    totals: Totals,
}

impl Aggregator {
    /// Creates a new aggregator. Bounds-check totals are only tracked if `array_bounds_check` is
    /// set.
    pub fn new(array_bounds_check: bool) -> Self {
        Self {
            array_bounds_check,
            header: None,
            rows: Vec::new(),
            counts: CaseCounts::default(),
            totals: Totals::default(),
        }
    }

    /// Adds a finished case: counts it, records its row and accumulates its statistics if it
    /// completed.
    pub fn add_case(&mut self, finished: FinishedCase) {
        let FinishedCase { case, result } = finished;
        self.counts.attempted += 1;

        let outcome = match result {
            CaseResult::Aborted { .. } => {
                self.counts.aborted += 1;
                return;
            }
            CaseResult::Analyzed(outcome) => outcome,
        };

        let elapsed = outcome.elapsed();
        let cells = match outcome {
            CaseOutcome::Completed(record) => {
                self.counts.completed += 1;
                if self.header.is_none() {
                    self.freeze_header(&record);
                }
                for error in self.accumulate(&record) {
                    warn!("{}: {error}, skipping it in totals", case.source());
                }
                let (input, output) = record.into_parts();
                RowCells::Completed { input, output }
            }
            CaseOutcome::TimedOut { .. } => {
                self.counts.timed_out += 1;
                RowCells::TimedOut
            }
            CaseOutcome::Crashed { reason, .. } => {
                self.counts.crashed += 1;
                let partial_input = match reason {
                    CrashReason::Decode(error) => error.partial_input().cloned(),
                    CrashReason::Spawn(_) => None,
                };
                RowCells::Crashed { partial_input }
            }
        };

        self.rows.push(ReportRow {
            case,
            cells,
            elapsed,
        });
    }

    /// Adds one completed case's statistics to the totals.
    ///
    /// Must be called exactly once per completed case. Returns the metrics that were skipped
    /// because their fields were missing, not numeric or would overflow the total; the
    /// remaining metrics are still added.
    pub fn accumulate(&mut self, record: &StatsRecord) -> Vec<StatFieldError> {
        let input = record.input();
        let output = record.output();
        let mut errors = Vec::new();

        let mut add = |total: &mut u64, side: StatsSide, stats: &OrderedStats, key: &'static str| {
            let sum = stats.get_u64(side, key).and_then(|value| {
                total.checked_add(value).ok_or(StatFieldError::Overflow {
                    side,
                    key,
                    value,
                    total: *total,
                })
            });
            match sum {
                Ok(sum) => *total = sum,
                Err(error) => errors.push(error),
            }
        };
        add(&mut self.totals.instrs, StatsSide::Input, input, NUM_INSTRS);
        add(
            &mut self.totals.assertions,
            StatsSide::Input,
            input,
            NUM_ASSERTIONS,
        );
        add(
            &mut self.totals.proved_assertions,
            StatsSide::Output,
            output,
            NUM_PROVED_ASSERTIONS,
        );
        if self.array_bounds_check {
            add(
                &mut self.totals.array_bounds_check_assertions,
                StatsSide::Input,
                input,
                NUM_ABC_ASSERTIONS,
            );
            add(
                &mut self.totals.proved_array_bounds_check_assertions,
                StatsSide::Output,
                output,
                NUM_PROVED_ABC_ASSERTIONS,
            );
        }

        let elapsed = record.elapsed();
        self.totals.time += elapsed;
        self.totals.max_example_time = self.totals.max_example_time.max(elapsed);

        match (
            input.get_u64(StatsSide::Input, MIN_VOC_SIZE),
            input.get_u64(StatsSide::Input, MAX_VOC_SIZE),
        ) {
            (Ok(low), Ok(high)) => {
                self.totals.voc_range = Some(match self.totals.voc_range {
                    Some((min, max)) => (min.min(low), max.max(high)),
                    None => (low, high),
                });
            }
            (low, high) => {
                errors.extend(low.err());
                errors.extend(high.err());
            }
        }

        errors
    }

    /// Returns the header, if a case has completed yet.
    pub fn header(&self) -> Option<&ReportHeader> {
        self.header.as_ref()
    }

    /// Returns the counts so far.
    pub fn counts(&self) -> CaseCounts {
        self.counts
    }

    /// Consumes the aggregator, producing the final report.
    pub fn finish(self) -> AggregateReport {
        AggregateReport {
            array_bounds_check: self.array_bounds_check,
            header: self.header,
            rows: self.rows,
            counts: self.counts,
            totals: self.totals,
        }
    }

    fn freeze_header(&mut self, record: &StatsRecord) {
        for (key, value) in record.input().iter() {
            if RUN_CONSTANT_KEYS.contains(&key) {
                info!("{key} is {}", super::stats::display_scalar(value));
            }
        }
        self.header = Some(ReportHeader::from_record(record));
    }
}

/// The final, immutable result of a run.
#[derive(Clone, Debug)]
pub struct AggregateReport {
    array_bounds_check: bool,
    header: Option<ReportHeader>,
    rows: Vec<ReportRow>,
    counts: CaseCounts,
    totals: Totals,
}

impl AggregateReport {
    /// Returns true if bounds-check totals were tracked.
    pub fn array_bounds_check(&self) -> bool {
        self.array_bounds_check
    }

    /// Returns the frozen header, or `None` if no case completed.
    pub fn header(&self) -> Option<&ReportHeader> {
        self.header.as_ref()
    }

    /// Returns rows for every case that reached the analysis stage, in run order.
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    /// Returns the bucket counts.
    pub fn counts(&self) -> CaseCounts {
        self.counts
    }

    /// Returns the totals over completed cases.
    pub fn totals(&self) -> &Totals {
        &self.totals
    }
}
