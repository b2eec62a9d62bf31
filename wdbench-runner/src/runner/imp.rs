// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    executor::{self, CaptureTarget, ExecutionResult, ExecutionStatus},
    outcome::{CaseOutcome, CaseResult, FinishedCase},
};
use crate::{
    command::{AnalysisSettings, RunEnvironment, StageCommand, StageKind, StagePlan},
    config::BenchConfig,
    errors::{RunInterruptedError, RunnerBuildError},
    helpers::{DisplayErrorChain, display_output, dylib_path_envvar, plural, resolve_against},
    reporter::StatsRecord,
    signal::{ShutdownEvent, SignalHandler, SignalHandlerKind},
    test_list::{TestCase, TestList},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Test runner options.
#[derive(Debug, Default)]
pub struct BenchRunnerBuilder {
    timeout: Option<Duration>,
    settings: AnalysisSettings,
}

impl BenchRunnerBuilder {
    /// Overrides the analysis timeout from the config.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the analysis settings: maximum disjunctions, debug level and feature flags.
    pub fn set_analysis_settings(&mut self, settings: AnalysisSettings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Creates a new runner.
    ///
    /// `install_root` must exist. Tool programs and library directories are resolved against it.
    pub fn build<'a>(
        self,
        test_list: &'a TestList,
        config: &BenchConfig,
        install_root: &Utf8Path,
        signal_handler: SignalHandlerKind,
    ) -> Result<BenchRunner<'a>, RunnerBuildError> {
        let install_root =
            install_root
                .canonicalize_utf8()
                .map_err(|error| RunnerBuildError::InstallRoot {
                    install_root: install_root.to_owned(),
                    error,
                })?;

        let library_dirs: Vec<Utf8PathBuf> = config
            .library_dirs()
            .iter()
            .map(|dir| resolve_against(&install_root, dir))
            .collect();
        let var_name = dylib_path_envvar();
        let library_path = std::env::join_paths(&library_dirs)
            .map_err(|error| RunnerBuildError::LibraryPathJoin { var_name, error })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(RunnerBuildError::TokioRuntimeCreate)?;
        let signal_handler = {
            // Signal registration needs the runtime's driver.
            let _guard = runtime.enter();
            signal_handler
                .build()
                .map_err(RunnerBuildError::SignalHandlerSetup)?
        };

        Ok(BenchRunner {
            inner: BenchRunnerInner {
                test_list,
                plan: config.stage_plan(&install_root, self.settings),
                env: RunEnvironment {
                    library_path_var: var_name,
                    library_path,
                },
                timeout: self.timeout.unwrap_or_else(|| config.analysis_timeout()),
                install_root,
                runtime,
            },
            signal_handler,
        })
    }
}

/// Runs each case in a [`TestList`] through the stage pipeline.
///
/// Created using [`BenchRunnerBuilder::build`]. Cases run one at a time, in list order.
#[derive(Debug)]
pub struct BenchRunner<'a> {
    inner: BenchRunnerInner<'a>,
    signal_handler: SignalHandler,
}

impl BenchRunner<'_> {
    /// Returns the resolved install root.
    pub fn install_root(&self) -> &Utf8Path {
        &self.inner.install_root
    }

    /// Returns the name of the library search path variable set for every tool.
    pub fn library_path_var(&self) -> &'static str {
        self.inner.env.library_path_var
    }

    /// Returns the library search path set for every tool.
    pub fn library_path(&self) -> String {
        self.inner.env.library_path.to_string_lossy().into_owned()
    }

    /// Returns the analysis timeout.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Executes every case, calling `callback` with each one as it finishes.
    ///
    /// Per-case failures never stop the run. A shutdown signal does: the running tool's process
    /// group is killed, the remaining cases are skipped and an error is returned.
    pub fn execute<F>(mut self, callback: F) -> Result<(), RunInterruptedError>
    where
        F: FnMut(FinishedCase),
    {
        self.inner.execute(&mut self.signal_handler, callback)
    }
}

#[derive(Debug)]
struct BenchRunnerInner<'a> {
    test_list: &'a TestList,
    plan: StagePlan,
    env: RunEnvironment,
    timeout: Duration,
    install_root: Utf8PathBuf,
    runtime: Runtime,
}

impl BenchRunnerInner<'_> {
    fn execute<F>(
        &self,
        signal_handler: &mut SignalHandler,
        mut callback: F,
    ) -> Result<(), RunInterruptedError>
    where
        F: FnMut(FinishedCase),
    {
        let total = self.test_list.len();
        info!(
            "running {total} {} from `{}`",
            plural::cases_str(total),
            self.test_list.list_path()
        );
        for (index, case) in self.test_list.iter().enumerate() {
            info!(
                "[{}/{total}] processing `{}`",
                index + 1,
                case.source().with_extension("")
            );
            let result = self
                .runtime
                .block_on(self.process(case, signal_handler))
                .map_err(|event| {
                    warn!(
                        "{}: received {event}, stopping after {index} of {total} {}",
                        case.source(),
                        plural::cases_str(total)
                    );
                    RunInterruptedError::new(event, case.source().to_owned(), index)
                })?;
            callback(FinishedCase {
                case: case.clone(),
                result,
            });
        }
        Ok(())
    }

    /// Runs the stages for a single case.
    async fn process(
        &self,
        case: &TestCase,
        signal_handler: &mut SignalHandler,
    ) -> Result<CaseResult, ShutdownEvent> {
        let compile = self.plan.compile_command(case);
        if let Some(status) = self
            .run_preparation(case, &compile, signal_handler)
            .await?
        {
            return Ok(CaseResult::Aborted {
                stage: StageKind::Compile,
                status,
            });
        }

        if let Some(instrument) = self.plan.instrument_command(case) {
            if let Some(status) = self
                .run_preparation(case, &instrument, signal_handler)
                .await?
            {
                return Ok(CaseResult::Aborted {
                    stage: StageKind::Instrument,
                    status,
                });
            }
        }

        // A previous run's result must never be picked up for this one.
        let result_path = case.result_path();
        match std::fs::remove_file(&result_path) {
            Ok(()) => debug!("removed stale result `{result_path}`"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(
                "{}: failed to remove stale result `{result_path}`: {error}",
                case.source()
            ),
        }

        let analyze = self.plan.analyze_command(case);
        info!("executing {}", analyze.to_shell_string());
        let execution = executor::run(
            &analyze,
            &self.env,
            &CaptureTarget::LogFile(case.log_path()),
            Some(self.timeout),
            signal_handler,
        )
        .await?;

        let outcome = CaseOutcome::classify(&execution, || {
            StatsRecord::decode(&result_path, execution.duration)
        });
        self.log_outcome(case, &execution, &outcome);
        Ok(CaseResult::Analyzed(outcome))
    }

    /// Runs a compile or instrument stage. Returns the status if the stage failed.
    async fn run_preparation(
        &self,
        case: &TestCase,
        command: &StageCommand,
        signal_handler: &mut SignalHandler,
    ) -> Result<Option<ExecutionStatus>, ShutdownEvent> {
        info!("executing {}", command.to_shell_string());
        let ExecutionResult { status, output, .. } = executor::run(
            command,
            &self.env,
            &CaptureTarget::Operator,
            None,
            signal_handler,
        )
        .await?;
        let output = display_output(&output);
        if !output.is_empty() {
            info!("{output}");
        }

        let reason = match &status {
            ExecutionStatus::Success => return Ok(None),
            ExecutionStatus::Failure {
                exit_code: Some(code),
            } => format!("failed with exit code {code}"),
            ExecutionStatus::Failure { exit_code: None } => "was killed by a signal".to_owned(),
            ExecutionStatus::SpawnError(error) => {
                format!("could not be started: {}", DisplayErrorChain(error))
            }
            ExecutionStatus::Timeout => "timed out".to_owned(),
        };
        warn!(
            "{}: {} stage {reason}, skipping this case",
            case.source(),
            command.kind()
        );
        Ok(Some(status))
    }

    fn log_outcome(&self, case: &TestCase, execution: &ExecutionResult, outcome: &CaseOutcome) {
        match outcome {
            CaseOutcome::Completed(record) => {
                if let ExecutionStatus::Failure { exit_code } = &execution.status {
                    debug!(
                        "{}: analyzer exited with {exit_code:?} but wrote a result",
                        case.source()
                    );
                }
                info!(
                    "{}: completed ({}; {} input, {} output statistics)",
                    case.source(),
                    execution.display_timing(),
                    record.input().len(),
                    record.output().len(),
                );
            }
            CaseOutcome::TimedOut { .. } => {
                warn!(
                    "{}: analysis timed out ({})",
                    case.source(),
                    execution.display_timing()
                );
            }
            CaseOutcome::Crashed { reason, .. } => {
                warn!(
                    "{}: analysis crashed ({}): {reason}",
                    case.source(),
                    execution.display_timing()
                );
            }
        }
    }
}
