// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    aggregator::{AggregateReport, ReportHeader, ReportRow, RowCells},
    stats::OrderedStats,
};
use crate::helpers::{escape_latex_underscores, relative_to};
use camino::Utf8PathBuf;
use itertools::Itertools;
use std::{borrow::Cow, time::Duration};
use swrite::{SWrite, swriteln};

const MISSING_INPUT: &str = "?";
const CRASHED_OUTPUT: &str = "crash";
const TIMED_OUT_OUTPUT: &str = "timeout";

/// Renders an [`AggregateReport`] as text.
///
/// The report has three parts:
///
/// 1. A LaTeX-style table with one row per case that reached the analysis stage, with columns
///    taken from the frozen header.
/// 2. A two-row summary table followed by the longest single analysis time.
/// 3. Space-separated `max-disjunctions proved-assertions total-time` lines for spreadsheets.
///
/// If no case completed there is no header, and nothing is rendered.
#[derive(Clone, Debug)]
pub struct ReportFormatter {
    benchmark: String,
    base_dir: Utf8PathBuf,
    max_disjunctions: u32,
}

impl ReportFormatter {
    /// Creates a new formatter.
    ///
    /// `benchmark` labels the summary row. Case names are shown relative to `base_dir`.
    pub fn new(
        benchmark: impl Into<String>,
        base_dir: impl Into<Utf8PathBuf>,
        max_disjunctions: u32,
    ) -> Self {
        Self {
            benchmark: benchmark.into(),
            base_dir: base_dir.into(),
            max_disjunctions,
        }
    }

    /// Renders the report. Rendering the same report twice produces identical output.
    pub fn render(&self, report: &AggregateReport) -> String {
        let mut out = String::new();
        let Some(header) = report.header() else {
            return out;
        };

        self.write_case_table(header, report.rows(), &mut out);
        out.push('\n');
        self.write_summary_table(report, &mut out);
        self.write_spreadsheet_lines(report, &mut out);
        out
    }

    fn write_case_table(&self, header: &ReportHeader, rows: &[ReportRow], out: &mut String) {
        let columns = std::iter::once("name")
            .chain(header.input_keys().iter().map(|key| key.as_str()))
            .chain(header.output_keys().iter().map(|key| key.as_str()))
            .chain(std::iter::once("total time"))
            .join(" & ");
        swriteln!(out, "{columns} \\\\");

        for row in rows {
            let name = self.case_name(row);
            let (input, output) = Self::row_cells(header, row.cells());
            let cells = std::iter::once(Cow::Owned(name))
                .chain(input)
                .chain(output)
                .chain(std::iter::once(Cow::Owned(format_secs(row.elapsed()))))
                .join(" & ");
            swriteln!(out, "{cells} \\\\");
        }
    }

    fn case_name(&self, row: &ReportRow) -> String {
        let bitcode = row.case().bitcode_path();
        let relative = relative_to(&bitcode, &self.base_dir);
        format!("${}$", escape_latex_underscores(relative.as_str()))
    }

    fn row_cells<'a>(
        header: &'a ReportHeader,
        cells: &'a RowCells,
    ) -> (Vec<Cow<'a, str>>, Vec<Cow<'a, str>>) {
        let lookup = |stats: Option<&'a OrderedStats>, keys: &'a [String], missing: &'static str| {
            keys.iter()
                .map(|key| {
                    stats
                        .and_then(|stats| stats.display_value(key))
                        .unwrap_or(Cow::Borrowed(missing))
                })
                .collect::<Vec<_>>()
        };
        match cells {
            RowCells::Completed { input, output } => (
                lookup(Some(input), header.input_keys(), MISSING_INPUT),
                lookup(Some(output), header.output_keys(), MISSING_INPUT),
            ),
            RowCells::Crashed { partial_input } => (
                lookup(partial_input.as_ref(), header.input_keys(), MISSING_INPUT),
                lookup(None, header.output_keys(), CRASHED_OUTPUT),
            ),
            RowCells::TimedOut => (
                lookup(None, header.input_keys(), MISSING_INPUT),
                lookup(None, header.output_keys(), TIMED_OUT_OUTPUT),
            ),
        }
    }

    fn write_summary_table(&self, report: &AggregateReport, out: &mut String) {
        let counts = report.counts();
        let totals = report.totals();
        let voc_range = match totals.voc_range {
            Some((low, high)) => format!("{low}-{high}"),
            None => MISSING_INPUT.to_owned(),
        };

        let mut columns = vec![
            "Benchmark",
            "num_total_examples",
            "num_crashed_examples",
            "num_timedout_examples",
            "num_total_instr",
            "voc_range",
            "num_total_assertions",
            "num_total_proved_assertions",
        ];
        let mut values = vec![
            self.benchmark.clone(),
            counts.attempted.to_string(),
            counts.crashed.to_string(),
            counts.timed_out.to_string(),
            totals.instrs.to_string(),
            voc_range,
            totals.assertions.to_string(),
            totals.proved_assertions.to_string(),
        ];
        if report.array_bounds_check() {
            columns.extend([
                "num_total_arrayboundscheck_assertions",
                "num_total_proved_arrayboundscheck_assertions",
            ]);
            values.extend([
                totals.array_bounds_check_assertions.to_string(),
                totals.proved_array_bounds_check_assertions.to_string(),
            ]);
        }
        columns.push("num_total_time");
        values.push(format_secs(totals.time));

        swriteln!(out, "{} \\\\", columns.join(" & "));
        swriteln!(out, "{} \\\\", values.join(" & "));
        swriteln!(
            out,
            "max_example_time, {}",
            format_secs(totals.max_example_time)
        );
    }

    fn write_spreadsheet_lines(&self, report: &AggregateReport, out: &mut String) {
        let totals = report.totals();
        let time = format_secs(totals.time);
        swriteln!(
            out,
            "{} {} {time}",
            self.max_disjunctions,
            totals.proved_assertions
        );
        if report.array_bounds_check() {
            swriteln!(
                out,
                "{} {} {time}",
                self.max_disjunctions,
                totals.proved_array_bounds_check_assertions
            );
        }
    }
}

fn format_secs(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}
