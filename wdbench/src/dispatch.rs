// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, Result, WdbenchExitCode},
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{ArgGroup, Parser};
use std::{io::Write, time::Duration};
use tracing::{info, warn};
use wdbench_runner::{
    command::{AnalysisFlags, AnalysisSettings},
    config::BenchConfig,
    plural,
    reporter::{AggregateReport, Aggregator, ReportFormatter},
    runner::BenchRunnerBuilder,
    signal::SignalHandlerKind,
    test_list::TestList,
};

/// Runs wrapped-domain analysis benchmarks and prints aggregate results.
///
/// Each case is compiled, optionally instrumented with bounds checks, and analyzed under a
/// timeout. The report is printed to standard output as LaTeX table rows followed by a
/// spreadsheet-friendly summary line. Progress is logged to standard error.
#[derive(Debug, Parser)]
#[command(
    version,
    styles = clap_styles::style(),
    group = ArgGroup::new("input").required(true).args(["ifile", "examplefile"]),
)]
pub struct WdbenchApp {
    /// File listing the benchmark sources to run, one per line
    #[arg(short = 'i', long, value_name = "PATH", help_heading = "Input")]
    ifile: Option<Utf8PathBuf>,

    /// Run a single benchmark source instead of a list
    #[arg(short = 'f', long, value_name = "PATH", help_heading = "Input")]
    examplefile: Option<Utf8PathBuf>,

    #[command(flatten)]
    analysis: AnalysisOpts,

    /// Directory the tool programs and library directories are resolved against
    #[arg(long, value_name = "DIR", default_value = ".", env = "WDBENCH_INSTALL_ROOT")]
    install_root: Utf8PathBuf,

    /// Config file [default: wdbench.toml in the current directory, if present]
    #[arg(long, value_name = "PATH", env = "WDBENCH_CONFIG_FILE")]
    config_file: Option<Utf8PathBuf>,

    /// Analysis timeout per case, overriding the config (e.g. "200s", "3m")
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    #[command(flatten)]
    output: OutputOpts,
}

/// Options passed through to the analysis engine.
#[derive(Debug, Default, clap::Args)]
#[command(next_help_heading = "Analysis options")]
struct AnalysisOpts {
    /// Maximum number of disjunctions
    #[arg(short = 'm', long, value_name = "N", default_value_t = 1)]
    max_disjunctions: u32,

    /// Debug print level of the analysis engine
    #[arg(short = 'd', long, value_name = "LEVEL", default_value_t = 0)]
    debug_level: u32,

    /// Use the octagon domain instead of polyhedra
    #[arg(short = 'o', long)]
    use_oct: bool,

    /// Use the reduced product of domains
    #[arg(short = 'r', long)]
    use_red_prod: bool,

    /// Use extrapolation instead of widening
    #[arg(short = 'e', long)]
    use_extrapolation: bool,

    /// Run a narrowing pass before querying
    #[arg(short = 'n', long)]
    perform_narrowing: bool,

    /// Instrument with bounds checks and report array bounds assertions
    #[arg(short = 'a', long)]
    array_bounds_check: bool,

    /// Expect phi nodes in the input
    #[arg(short = 'p', long)]
    allow_phis: bool,

    /// Disable wrapping (unsound)
    #[arg(short = 'w', long)]
    disable_wrapping: bool,
}

impl AnalysisOpts {
    fn to_settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            max_disjunctions: self.max_disjunctions,
            debug_level: self.debug_level,
            flags: AnalysisFlags {
                array_bounds_check: self.array_bounds_check,
                use_oct: self.use_oct,
                use_red_prod: self.use_red_prod,
                use_extrapolation: self.use_extrapolation,
                perform_narrowing: self.perform_narrowing,
                allow_phis: self.allow_phis,
                disable_wrapping: self.disable_wrapping,
            },
        }
    }
}

impl WdbenchApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, _output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let cwd = current_dir()?;
        self.exec_in(&cwd, SignalHandlerKind::Standard, output_writer)
    }

    fn exec_in(
        &self,
        cwd: &Utf8Path,
        signal_handler: SignalHandlerKind,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let test_list = self.read_test_list(cwd)?;
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ExpectedError::ZeroTimeout { timeout });
            }
        }
        let config = BenchConfig::from_sources(cwd, self.config_file.as_deref())?;

        let settings = self.analysis.to_settings();
        let mut builder = BenchRunnerBuilder::default();
        builder.set_analysis_settings(settings);
        if let Some(timeout) = self.timeout {
            builder.set_timeout(timeout);
        }
        let runner = builder.build(
            &test_list,
            &config,
            &cwd.join(&self.install_root),
            signal_handler,
        )?;

        let echo = SettingsEcho {
            list_path: test_list.list_path(),
            example_file: self.examplefile.as_deref(),
            settings,
            timeout: runner.timeout(),
            library_path_var: runner.library_path_var(),
            library_path: runner.library_path(),
        };
        echo.log();

        let mut aggregator = Aggregator::new(settings.flags.array_bounds_check);
        runner.execute(|finished| aggregator.add_case(finished))?;
        let report = aggregator.finish();
        log_run_summary(&report);

        // The summary row is labeled with the input as it was given on the command line.
        let benchmark = match (&self.ifile, &self.examplefile) {
            (Some(path), _) | (None, Some(path)) => path.as_str(),
            (None, None) => test_list.list_path().as_str(),
        };
        let formatter = ReportFormatter::new(benchmark, cwd, settings.max_disjunctions);
        let rendered = formatter.render(&report);
        let mut writer = output_writer.stdout_writer();
        writer
            .write_all(rendered.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(ExpectedError::write_report)?;

        echo.log();
        Ok(WdbenchExitCode::OK)
    }

    /// Reads the list of cases, materializing `--examplefile` as a one-entry list first.
    fn read_test_list(&self, cwd: &Utf8Path) -> Result<TestList> {
        let list_path = match (&self.ifile, &self.examplefile) {
            (Some(ifile), None) => cwd.join(ifile),
            (None, Some(example)) => {
                let list_path = cwd.join(TestList::LITERAL_LIST_FILE_NAME);
                TestList::write_literal(&list_path, example.as_str())?;
                list_path
            }
            _ => return Err(ExpectedError::InputSelection),
        };
        Ok(TestList::from_file(&list_path, cwd)?)
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd =
        std::env::current_dir().map_err(|error| ExpectedError::CurrentDirFailed { error })?;
    Utf8PathBuf::try_from(cwd).map_err(|error| ExpectedError::CurrentDirInvalidUtf8 { error })
}

/// The effective settings of a run, logged before and after the cases run.
struct SettingsEcho<'a> {
    list_path: &'a Utf8Path,
    example_file: Option<&'a Utf8Path>,
    settings: AnalysisSettings,
    timeout: Duration,
    library_path_var: &'static str,
    library_path: String,
}

impl SettingsEcho<'_> {
    fn log(&self) {
        let flags = self.settings.flags.to_args();
        info!("input list: {}", self.list_path);
        if let Some(example_file) = self.example_file {
            info!("example file: {example_file}");
        }
        info!(
            "max disjunctions: {}, debug level: {}, timeout: {:?}",
            self.settings.max_disjunctions, self.settings.debug_level, self.timeout
        );
        info!(
            "analysis flags: {}",
            if flags.is_empty() {
                "(none)".to_owned()
            } else {
                flags.join(" ")
            }
        );
        info!("{}={}", self.library_path_var, self.library_path);
    }
}

fn log_run_summary(report: &AggregateReport) {
    let counts = report.counts();
    info!(
        "{} {} attempted: {} completed, {} timed out, {} crashed, {} aborted before analysis",
        counts.attempted,
        plural::cases_str(counts.attempted),
        counts.completed,
        counts.timed_out,
        counts.crashed,
        counts.aborted,
    );
    if report.header().is_none() {
        warn!("no case produced a result, so there is no report to print");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use test_case::test_case;

    #[test]
    fn verify_app() {
        WdbenchApp::command().debug_assert();
    }

    #[test]
    fn parse_flags() {
        let app = WdbenchApp::try_parse_from([
            "wdbench", "-i", "list.txt", "-m", "4", "-d", "2", "-o", "-a", "-w", "--timeout",
            "90s",
        ])
        .expect("valid arguments");
        assert_eq!(app.ifile.as_deref(), Some(Utf8Path::new("list.txt")));
        assert_eq!(app.timeout, Some(Duration::from_secs(90)));
        assert_eq!(
            app.analysis.to_settings(),
            AnalysisSettings {
                max_disjunctions: 4,
                debug_level: 2,
                flags: AnalysisFlags {
                    use_oct: true,
                    array_bounds_check: true,
                    disable_wrapping: true,
                    ..AnalysisFlags::default()
                },
            }
        );
    }

    #[test]
    fn parse_defaults() {
        let app =
            WdbenchApp::try_parse_from(["wdbench", "-f", "loop.c"]).expect("valid arguments");
        assert_eq!(app.examplefile.as_deref(), Some(Utf8Path::new("loop.c")));
        assert_eq!(app.install_root, Utf8Path::new("."));
        assert_eq!(app.analysis.to_settings(), AnalysisSettings::default());
    }

    #[test_case(&["wdbench"]; "neither input")]
    #[test_case(&["wdbench", "-i", "list.txt", "-f", "loop.c"]; "both inputs")]
    #[test_case(&["wdbench", "-i", "list.txt", "--timeout", "soon"]; "bad timeout")]
    #[test_case(&["wdbench", "-i", "list.txt", "-m", "-1"]; "negative disjunctions")]
    fn parse_errors(args: &[&str]) {
        WdbenchApp::try_parse_from(args).expect_err("arguments should be rejected");
    }

    #[cfg(unix)]
    #[test]
    fn example_file_end_to_end() {
        use camino_tempfile::Utf8TempDir;
        use indoc::{formatdoc, indoc};
        use pretty_assertions::assert_eq;

        let dir = Utf8TempDir::new().expect("created temp dir");
        let root = dir.path();
        std::fs::write(
            root.join("fake-analyzer"),
            indoc! {r#"
                #!/bin/sh
                printf '%s\n%s\n' \
                    '{"name":"loop.bc","Num Instrs":"7","Num Assertions":"1"}' \
                    '{"Num Proved Assertions":"1"}' > "$1.result"
            "#},
        )
        .expect("wrote analyzer");
        std::fs::write(
            root.join("wdbench.toml"),
            formatdoc! {r#"
                [tools.compiler]
                program = "/bin/cp"
                args = ["{{input}}", "{{output}}"]

                [tools.analyzer]
                program = "/bin/sh"
                args = ["{root}/fake-analyzer", "{{input}}"]
                "#,
                root = root,
            },
        )
        .expect("wrote config");
        std::fs::write(root.join("loop_1.c"), "int main() { return 0; }\n").expect("wrote source");

        let app = WdbenchApp::try_parse_from(["wdbench", "-f", "loop_1.c", "-m", "2"])
            .expect("valid arguments");
        let mut writer = OutputWriter::Test { stdout: Vec::new() };
        let code = app
            .exec_in(root, SignalHandlerKind::Noop, &mut writer)
            .expect("run succeeded");
        assert_eq!(code, WdbenchExitCode::OK);

        assert_eq!(
            std::fs::read_to_string(root.join(TestList::LITERAL_LIST_FILE_NAME))
                .expect("literal list written"),
            "loop_1.c"
        );
        let OutputWriter::Test { stdout } = writer else {
            unreachable!("writer is a test writer");
        };
        let stdout = String::from_utf8(stdout).expect("report is UTF-8");
        let lines: Vec<_> = stdout.lines().collect();
        assert_eq!(
            lines[0],
            "name & Num Instrs & Num Assertions & Num Proved Assertions & total time \\\\"
        );
        assert!(
            lines[1].starts_with("$loop\\_1.bc$ & 7 & 1 & 1 & "),
            "case row: {}",
            lines[1]
        );
        assert!(
            lines.last().is_some_and(|line| line.starts_with("2 1 ")),
            "spreadsheet line: {stdout}"
        );
    }
}
