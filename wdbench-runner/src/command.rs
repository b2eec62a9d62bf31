// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction of the command lines run for each stage.
//!
//! Each stage is described by a [`StageTemplate`] from the config: a program and an argument list
//! containing `{placeholder}`s. Rendering a template for a [`TestCase`] produces a
//! [`StageCommand`]. The analysis stage additionally appends the arguments derived from
//! [`AnalysisFlags`], always in the same order.

use crate::{errors::ConfigParseErrorKind, test_list::TestCase};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::{ffi::OsString, fmt};

/// One of the stages of the per-case pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Compile the source file to an intermediate artifact.
    Compile,

    /// Instrument the intermediate artifact with bounds checks, in place.
    Instrument,

    /// Run the analysis engine on the intermediate artifact.
    Analyze,
}

impl StageKind {
    /// Returns the name of the tool that runs this stage, as used in config keys.
    pub fn tool_name(self) -> &'static str {
        match self {
            StageKind::Compile => "compiler",
            StageKind::Instrument => "instrumenter",
            StageKind::Analyze => "analyzer",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Compile => write!(f, "compile"),
            StageKind::Instrument => write!(f, "instrument"),
            StageKind::Analyze => write!(f, "analyze"),
        }
    }
}

/// A placeholder that may appear in a [`StageTemplate`]'s arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// The stage's input artifact.
    Input,

    /// The stage's output artifact.
    Output,

    /// The maximum number of disjunctions.
    MaxDisjunctions,

    /// The analysis engine's debug print level.
    DebugLevel,
}

impl Placeholder {
    /// All placeholders, in documentation order.
    pub const ALL: &'static [Self] = &[
        Self::Input,
        Self::Output,
        Self::MaxDisjunctions,
        Self::DebugLevel,
    ];

    /// Returns the name of the placeholder, without braces.
    pub fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::MaxDisjunctions => "max-disjunctions",
            Self::DebugLevel => "debug-level",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }
}

/// A tool invocation template, as specified in the config.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct StageTemplate {
    /// The program to run. Relative paths are resolved against the install root.
    pub program: Utf8PathBuf,

    /// Arguments, possibly containing placeholders.
    #[serde(default)]
    pub args: Vec<String>,
}

impl StageTemplate {
    /// Checks that the program is non-empty and every placeholder is known.
    pub(crate) fn validate(&self, tool: &'static str) -> Result<(), ConfigParseErrorKind> {
        if self.program.as_str().is_empty() {
            return Err(ConfigParseErrorKind::EmptyProgram { tool });
        }
        for arg in &self.args {
            for segment in ArgSegments::new(arg) {
                if let ArgSegment::Placeholder(name) = segment {
                    if Placeholder::from_name(name).is_none() {
                        return Err(ConfigParseErrorKind::UnknownPlaceholder {
                            tool,
                            placeholder: name.to_owned(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn render(
        &self,
        kind: StageKind,
        install_root: &Utf8Path,
        values: &PlaceholderValues<'_>,
    ) -> StageCommand {
        let args = self.args.iter().map(|arg| values.substitute(arg)).collect();
        StageCommand {
            kind,
            program: crate::helpers::resolve_against(install_root, &self.program),
            args,
        }
    }
}

/// A piece of a template argument: literal text or a `{name}` placeholder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ArgSegment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
}

/// Splits an argument into segments, left to right. A `{` with no closing `}` is literal.
struct ArgSegments<'a> {
    rest: &'a str,
}

impl<'a> ArgSegments<'a> {
    fn new(arg: &'a str) -> Self {
        Self { rest: arg }
    }
}

impl<'a> Iterator for ArgSegments<'a> {
    type Item = ArgSegment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let placeholder = self
            .rest
            .find('{')
            .and_then(|start| Some((start, self.rest[start..].find('}')? + start)));
        match placeholder {
            Some((0, end)) => {
                let name = &self.rest[1..end];
                self.rest = &self.rest[end + 1..];
                Some(ArgSegment::Placeholder(name))
            }
            Some((start, _)) => {
                let (literal, rest) = self.rest.split_at(start);
                self.rest = rest;
                Some(ArgSegment::Literal(literal))
            }
            None => Some(ArgSegment::Literal(std::mem::take(&mut self.rest))),
        }
    }
}

struct PlaceholderValues<'a> {
    input: &'a str,
    output: &'a str,
    max_disjunctions: String,
    debug_level: String,
}

impl PlaceholderValues<'_> {
    fn get(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Input => self.input,
            Placeholder::Output => self.output,
            Placeholder::MaxDisjunctions => &self.max_disjunctions,
            Placeholder::DebugLevel => &self.debug_level,
        }
    }

    /// Replaces each placeholder in `arg` once. Substituted text is never rescanned.
    fn substitute(&self, arg: &str) -> String {
        let mut out = String::with_capacity(arg.len());
        for segment in ArgSegments::new(arg) {
            match segment {
                ArgSegment::Literal(text) => out.push_str(text),
                ArgSegment::Placeholder(name) => match Placeholder::from_name(name) {
                    Some(placeholder) => out.push_str(self.get(placeholder)),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                },
            }
        }
        out
    }
}

/// Feature toggles passed through to the analysis engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AnalysisFlags {
    /// Instrument with bounds checks and check the resulting assertions.
    pub array_bounds_check: bool,

    /// Use the octagon domain instead of polyhedra.
    pub use_oct: bool,

    /// Use the reduced product of domains.
    pub use_red_prod: bool,

    /// Use extrapolation instead of widening.
    pub use_extrapolation: bool,

    /// Run a narrowing pass before querying.
    pub perform_narrowing: bool,

    /// Expect phi nodes in the input.
    pub allow_phis: bool,

    /// Disable wrapping (unsound).
    pub disable_wrapping: bool,
}

impl AnalysisFlags {
    /// Returns the extra analyzer arguments for the enabled flags.
    ///
    /// The order is fixed: `--array_bounds_check`, `--use_oct`, `--use_red_prod`,
    /// `--use_extrapolation`, `--perform_narrowing`, `--allow_phis`, `--disable_wrapping`.
    pub fn to_args(&self) -> Vec<&'static str> {
        let table = [
            (self.array_bounds_check, "--array_bounds_check"),
            (self.use_oct, "--use_oct"),
            (self.use_red_prod, "--use_red_prod"),
            (self.use_extrapolation, "--use_extrapolation"),
            (self.perform_narrowing, "--perform_narrowing"),
            (self.allow_phis, "--allow_phis"),
            (self.disable_wrapping, "--disable_wrapping"),
        ];
        table
            .into_iter()
            .filter_map(|(enabled, arg)| enabled.then_some(arg))
            .collect()
    }
}

/// Settings for the analysis stage that are fixed for a whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalysisSettings {
    /// The maximum number of disjunctions.
    pub max_disjunctions: u32,

    /// The analysis engine's debug print level.
    pub debug_level: u32,

    /// Feature toggles.
    pub flags: AnalysisFlags,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_disjunctions: 1,
            debug_level: 0,
            flags: AnalysisFlags::default(),
        }
    }
}

/// A fully rendered command for one stage of one case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageCommand {
    kind: StageKind,
    program: Utf8PathBuf,
    args: Vec<String>,
}

impl StageCommand {
    /// Returns the stage this command runs.
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    /// Returns the program.
    pub fn program(&self) -> &Utf8Path {
        &self.program
    }

    /// Returns the arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Returns the command as a shell-quoted string, for display.
    pub fn to_shell_string(&self) -> String {
        let args = self.args.iter().map(String::as_str);
        shell_words::join(std::iter::once(self.program.as_str()).chain(args))
    }

    pub(crate) fn to_command(&self, env: &RunEnvironment) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args);
        cmd.env(env.library_path_var, &env.library_path);
        cmd
    }
}

/// Environment shared by every process spawned during a run.
///
/// This is computed once when the runner is built and never changes afterwards.
#[derive(Clone, Debug)]
pub(crate) struct RunEnvironment {
    pub(crate) library_path_var: &'static str,
    pub(crate) library_path: OsString,
}

/// The three stage templates plus the run-wide analysis settings.
#[derive(Clone, Debug)]
pub struct StagePlan {
    compiler: StageTemplate,
    instrumenter: StageTemplate,
    analyzer: StageTemplate,
    install_root: Utf8PathBuf,
    settings: AnalysisSettings,
}

impl StagePlan {
    /// Creates a new plan. Relative programs are resolved against `install_root`.
    pub fn new(
        compiler: StageTemplate,
        instrumenter: StageTemplate,
        analyzer: StageTemplate,
        install_root: impl Into<Utf8PathBuf>,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            compiler,
            instrumenter,
            analyzer,
            install_root: install_root.into(),
            settings,
        }
    }

    /// Returns the analysis settings.
    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Returns the command that compiles `case`'s source to its intermediate artifact.
    pub fn compile_command(&self, case: &TestCase) -> StageCommand {
        let bitcode = case.bitcode_path();
        let values = self.values(case.source().as_str(), bitcode.as_str());
        self.compiler
            .render(StageKind::Compile, &self.install_root, &values)
    }

    /// Returns the command that instruments `case`'s intermediate artifact in place, if bounds
    /// checking is enabled.
    pub fn instrument_command(&self, case: &TestCase) -> Option<StageCommand> {
        if !self.settings.flags.array_bounds_check {
            return None;
        }
        let bitcode = case.bitcode_path();
        let values = self.values(bitcode.as_str(), bitcode.as_str());
        Some(
            self.instrumenter
                .render(StageKind::Instrument, &self.install_root, &values),
        )
    }

    /// Returns the command that runs the analysis engine on `case`'s intermediate artifact.
    pub fn analyze_command(&self, case: &TestCase) -> StageCommand {
        let bitcode = case.bitcode_path();
        let result = case.result_path();
        let values = self.values(bitcode.as_str(), result.as_str());
        let mut command = self
            .analyzer
            .render(StageKind::Analyze, &self.install_root, &values);
        command.args.extend(
            self.settings
                .flags
                .to_args()
                .into_iter()
                .map(|arg| arg.to_owned()),
        );
        command
    }

    fn values<'a>(&self, input: &'a str, output: &'a str) -> PlaceholderValues<'a> {
        PlaceholderValues {
            input,
            output,
            max_disjunctions: self.settings.max_disjunctions.to_string(),
            debug_level: self.settings.debug_level.to_string(),
        }
    }
}
