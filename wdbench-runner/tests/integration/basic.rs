// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use indoc::{formatdoc, indoc};
use pretty_assertions::assert_eq;
use std::time::Duration;
use wdbench_runner::{
    command::{AnalysisFlags, AnalysisSettings, StageKind},
    config::BenchConfig,
    reporter::{AggregateReport, Aggregator, CaseCounts, ReportFormatter},
    runner::{BenchRunnerBuilder, CaseOutcome, CaseResult, CrashReason, FinishedCase},
    signal::SignalHandlerKind,
    test_list::TestList,
};

const OK_ONE: &str = indoc! {r#"
    ok
    {"name":"ok_one.bc","Num Instrs":"10","Num Assertions":"2","Min voc size":"1","Max voc size":"4"}
    {"Num Proved Assertions":"1"}
"#};

const OK_TWO: &str = indoc! {r#"
    ok
    {"name":"ok_two.bc","Num Instrs":"5","Num Assertions":"1","Min voc size":"2","Max voc size":"6"}
    {"Num Proved Assertions":"1","Extra":"x"}
"#};

pub(crate) fn describe(finished: &FinishedCase) -> String {
    let name = finished
        .case
        .source()
        .file_name()
        .unwrap_or_default()
        .to_owned();
    let result = match &finished.result {
        CaseResult::Aborted { stage, .. } => format!("aborted at {stage}"),
        CaseResult::Analyzed(CaseOutcome::Completed(_)) => "completed".to_owned(),
        CaseResult::Analyzed(CaseOutcome::TimedOut { .. }) => "timed out".to_owned(),
        CaseResult::Analyzed(CaseOutcome::Crashed {
            reason: CrashReason::Spawn(_),
            ..
        }) => "crashed (spawn)".to_owned(),
        CaseResult::Analyzed(CaseOutcome::Crashed {
            reason: CrashReason::Decode(_),
            ..
        }) => "crashed (decode)".to_owned(),
    };
    format!("{name}: {result}")
}

pub(crate) fn run(
    install: &FakeInstall,
    list: &TestList,
    config: &BenchConfig,
    settings: AnalysisSettings,
) -> Result<(Vec<String>, AggregateReport)> {
    let mut builder = BenchRunnerBuilder::default();
    builder
        .set_timeout(Duration::from_millis(500))
        .set_analysis_settings(settings);
    let runner = builder.build(list, config, install.root(), SignalHandlerKind::Noop)?;

    let mut aggregator = Aggregator::new(settings.flags.array_bounds_check);
    let mut outcomes = Vec::new();
    runner.execute(|finished| {
        outcomes.push(describe(&finished));
        aggregator.add_case(finished);
    })?;
    Ok((outcomes, aggregator.finish()))
}

#[test]
fn buckets_and_report() -> Result<()> {
    test_init();
    let install = FakeInstall::new()?;
    install.add_case("ok_one.c", OK_ONE)?;
    install.add_case("ok_two.c", OK_TWO)?;
    install.add_case("slow.c", "slow\n")?;
    install.add_case("garbage.c", "garbage\n")?;
    install.add_case("nocompile.c", "nocompile\n")?;
    install.add_case("stale.c", "nothing\n")?;
    // A result left over from an earlier run must not be picked up.
    std::fs::write(
        install.bench_dir().join("stale.bc.result"),
        "{\"Num Instrs\":\"99\"}\n{}\n",
    )?;
    let list_path = install.write_list(&[
        "ok_one.c",
        "ok_two.c",
        "",
        "slow.c",
        "garbage.c",
        "nocompile.c",
        "stale.c",
    ])?;

    let bench_dir = install.bench_dir();
    let list = TestList::from_file(&list_path, &bench_dir)?;
    assert_eq!(list.len(), 6, "blank line is skipped");

    let config = BenchConfig::from_sources(install.root(), None)?;
    let settings = AnalysisSettings {
        max_disjunctions: 3,
        debug_level: 0,
        flags: AnalysisFlags {
            use_oct: true,
            ..AnalysisFlags::default()
        },
    };
    let (outcomes, report) = run(&install, &list, &config, settings)?;

    assert_eq!(
        outcomes,
        vec![
            "ok_one.c: completed",
            "ok_two.c: completed",
            "slow.c: timed out",
            "garbage.c: crashed (decode)",
            "nocompile.c: aborted at compile",
            "stale.c: crashed (decode)",
        ]
    );
    let counts = report.counts();
    assert_eq!(
        counts,
        CaseCounts {
            attempted: 6,
            completed: 2,
            timed_out: 1,
            crashed: 2,
            aborted: 1,
        }
    );

    let totals = report.totals();
    assert_eq!(totals.instrs, 15);
    assert_eq!(totals.assertions, 3);
    assert_eq!(totals.proved_assertions, 2);
    assert_eq!(totals.voc_range, Some((1, 6)));
    ensure!(
        totals.max_example_time < Duration::from_millis(500),
        "timed-out case is excluded from max time, got {:?}",
        totals.max_example_time
    );

    // The analyzer's output goes to the log file, flags included.
    let log = std::fs::read_to_string(bench_dir.join("ok_one.log"))?;
    ensure!(
        log.contains("--max_disjunctions 3 --use_oct"),
        "log contains analyzer args: {log}"
    );

    let formatter = ReportFormatter::new("list.txt", &bench_dir, 3);
    let rendered = formatter.render(&report);
    let lines: Vec<_> = rendered.lines().collect();
    assert_eq!(
        lines[0],
        "name & Num Instrs & Num Assertions & Min voc size & Max voc size & \
         Num Proved Assertions & total time \\\\"
    );
    let rows: Vec<_> = lines[1..6].iter().map(|row| without_time(row)).collect();
    assert_eq!(
        rows,
        vec![
            "$ok\\_one.bc$ & 10 & 2 & 1 & 4 & 1",
            "$ok\\_two.bc$ & 5 & 1 & 2 & 6 & 1",
            "$slow.bc$ & ? & ? & ? & ? & timeout",
            "$garbage.bc$ & ? & ? & ? & ? & crash",
            "$stale.bc$ & ? & ? & ? & ? & crash",
        ]
    );
    assert_eq!(lines[6], "");
    ensure!(
        lines[8].starts_with("list.txt & 6 & 2 & 1 & 15 & 1-6 & 3 & 2 & "),
        "summary row: {}",
        lines[8]
    );
    ensure!(
        lines[10].starts_with("3 2 "),
        "spreadsheet line: {}",
        lines[10]
    );
    assert_eq!(lines.len(), 11);

    Ok(())
}

#[test]
fn missing_analyzer_crashes() -> Result<()> {
    test_init();
    let install = FakeInstall::new()?;
    install.add_case("ok_one.c", OK_ONE)?;
    let list_path = install.write_list(&["ok_one.c"])?;
    install.write_config(&formatdoc! {r#"
        [tools.compiler]
        program = "/bin/sh"
        args = ["{root}/bin/fake-cc", "{{input}}", "{{output}}"]

        [tools.analyzer]
        program = "bin/does-not-exist"
        args = ["{{input}}"]
        "#,
        root = install.root(),
    })?;

    let bench_dir = install.bench_dir();
    let list = TestList::from_file(&list_path, &bench_dir)?;
    let config = BenchConfig::from_sources(install.root(), None)?;

    let (outcomes, report) = run(&install, &list, &config, AnalysisSettings::default())?;
    assert_eq!(outcomes, vec!["ok_one.c: crashed (spawn)"]);
    assert_eq!(report.counts().crashed, 1);
    // No case completed, so there's no header and nothing to render.
    assert!(report.header().is_none());
    assert_eq!(
        ReportFormatter::new("list.txt", &bench_dir, 1).render(&report),
        ""
    );

    Ok(())
}

#[test]
fn failing_instrumenter_aborts() -> Result<()> {
    test_init();
    let install = FakeInstall::new()?;
    install.add_case("ok_one.c", OK_ONE)?;
    let list_path = install.write_list(&["ok_one.c"])?;

    let bench_dir = install.bench_dir();
    let list = TestList::from_file(&list_path, &bench_dir)?;
    let config = BenchConfig::from_sources(install.root(), None)?;
    let settings = AnalysisSettings {
        flags: AnalysisFlags {
            array_bounds_check: true,
            ..AnalysisFlags::default()
        },
        ..AnalysisSettings::default()
    };

    let (outcomes, report) = run(&install, &list, &config, settings)?;
    assert_eq!(
        outcomes,
        vec![format!("ok_one.c: aborted at {}", StageKind::Instrument)]
    );
    assert_eq!(
        report.counts(),
        CaseCounts {
            attempted: 1,
            aborted: 1,
            ..CaseCounts::default()
        }
    );
    assert!(report.rows().is_empty());
    // The analysis never ran, so no log was written.
    ensure!(
        !bench_dir.join("ok_one.log").exists(),
        "log file should not exist"
    );

    Ok(())
}
