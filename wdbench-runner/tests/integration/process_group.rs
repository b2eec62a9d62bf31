// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tools that leave background processes behind must not outlive their stage.

use crate::{
    basic::{describe, run},
    fixtures::*,
};
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};
use wdbench_runner::{
    command::AnalysisSettings,
    config::BenchConfig,
    runner::BenchRunnerBuilder,
    signal::{ShutdownEvent, SignalHandlerKind},
    test_list::TestList,
};

#[test]
fn timeout_kills_background_children() -> Result<()> {
    test_init();
    let install = FakeInstall::new()?;
    install.add_case("spawn.c", "spawn\n")?;
    let list_path = install.write_list(&["spawn.c"])?;

    let bench_dir = install.bench_dir();
    let list = TestList::from_file(&list_path, &bench_dir)?;
    let config = BenchConfig::from_sources(install.root(), None)?;

    let (outcomes, report) = run(&install, &list, &config, AnalysisSettings::default())?;
    assert_eq!(outcomes, vec!["spawn.c: timed out"]);
    assert_eq!(report.counts().timed_out, 1);

    let pid = wait_for_pid(&bench_dir.join("spawn.bc.pid"), Duration::from_secs(1))?;
    ensure!(
        wait_for_exit(pid, Duration::from_secs(5)),
        "background process {pid} still running after the analysis timed out"
    );

    Ok(())
}

#[test]
fn interrupt_kills_process_group_and_stops_run() -> Result<()> {
    test_init();
    let install = FakeInstall::new()?;
    install.add_case("spawn.c", "spawn\n")?;
    install.add_case("never.c", "nothing\n")?;
    let list_path = install.write_list(&["spawn.c", "never.c"])?;

    let bench_dir = install.bench_dir();
    let list = TestList::from_file(&list_path, &bench_dir)?;
    let config = BenchConfig::from_sources(install.root(), None)?;

    let mut builder = BenchRunnerBuilder::default();
    builder.set_timeout(Duration::from_secs(30));
    let runner = builder.build(
        &list,
        &config,
        install.root(),
        SignalHandlerKind::Standard,
    )?;

    // Interrupt ourselves once the analyzer's background process is up.
    let pid_file = bench_dir.join("spawn.bc.pid");
    let interrupter = std::thread::spawn(move || -> Result<i32> {
        let pid = wait_for_pid(&pid_file, Duration::from_secs(10))?;
        unsafe {
            libc::kill(libc::getpid(), libc::SIGINT);
        }
        Ok(pid)
    });

    let start = Instant::now();
    let mut outcomes = Vec::new();
    let error = runner
        .execute(|finished| outcomes.push(describe(&finished)))
        .expect_err("run is interrupted");
    let elapsed = start.elapsed();
    let pid = interrupter.join().expect("interrupter thread panicked")?;

    assert_eq!(error.event(), ShutdownEvent::Interrupt);
    assert_eq!(error.finished(), 0);
    ensure!(
        error.source_path().ends_with("spawn.c"),
        "interrupted case: {}",
        error.source_path()
    );
    assert!(outcomes.is_empty(), "interrupted case is not reported: {outcomes:?}");
    ensure!(
        elapsed < Duration::from_secs(20),
        "run ended well before the analysis timeout, took {elapsed:?}"
    );
    ensure!(
        !bench_dir.join("never.bc").exists(),
        "cases after the interrupted one are not compiled"
    );
    ensure!(
        wait_for_exit(pid, Duration::from_secs(5)),
        "background process {pid} still running after the run was interrupted"
    );

    Ok(())
}
