// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for wdbench.
//!
//! The config is layered: the embedded [`BenchConfig::DEFAULT_CONFIG`] is the base, and a user
//! file is merged on top of it.

use crate::{
    command::{AnalysisSettings, StagePlan, StageTemplate},
    errors::{ConfigParseError, ConfigParseErrorKind},
    helpers::resolve_against,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::time::Duration;

/// Overall configuration for a benchmark run.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BenchConfig {
    tools: ToolsConfig,
    analysis: AnalysisConfig,
    environment: EnvironmentConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ToolsConfig {
    compiler: StageTemplate,
    instrumenter: StageTemplate,
    analyzer: StageTemplate,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct AnalysisConfig {
    #[serde(with = "humantime_serde")]
    timeout: Duration,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct EnvironmentConfig {
    library_dirs: Vec<Utf8PathBuf>,
}

impl BenchConfig {
    /// The name of the config file looked up in the current directory.
    pub const CONFIG_FILE_NAME: &'static str = "wdbench.toml";

    /// The default configuration.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config.
    ///
    /// If `file` is `Some`, it must exist; relative paths are resolved against `cwd`. Otherwise,
    /// [`Self::CONFIG_FILE_NAME`] in `cwd` is used if present.
    pub fn from_sources(cwd: &Utf8Path, file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let (config_file, source) = match file {
            Some(file) => {
                let config_file = resolve_against(cwd, file);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(true);
                (config_file, source)
            }
            None => {
                let config_file = cwd.join(Self::CONFIG_FILE_NAME);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let config = Self::build_and_deserialize(builder)
            .map_err(|kind| ConfigParseError::new(Some(&config_file), kind))?;
        config
            .validate()
            .map_err(|kind| ConfigParseError::new(Some(&config_file), kind))?;
        Ok(config)
    }

    /// Returns the default config with no user overrides.
    pub fn default_config() -> Result<Self, ConfigParseError> {
        let config = Self::build_and_deserialize(Self::make_default_config())
            .map_err(|kind| ConfigParseError::new(None, kind))?;
        config
            .validate()
            .map_err(|kind| ConfigParseError::new(None, kind))?;
        Ok(config)
    }

    /// Returns the analysis-stage timeout.
    pub fn analysis_timeout(&self) -> Duration {
        self.analysis.timeout
    }

    /// Returns the library directories, as configured (possibly relative).
    pub fn library_dirs(&self) -> &[Utf8PathBuf] {
        &self.environment.library_dirs
    }

    /// Builds the stage plan from the tool templates.
    pub fn stage_plan(&self, install_root: &Utf8Path, settings: AnalysisSettings) -> StagePlan {
        StagePlan::new(
            self.tools.compiler.clone(),
            self.tools.instrumenter.clone(),
            self.tools.analyzer.clone(),
            install_root,
            settings,
        )
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;
        config
            .try_deserialize()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))
    }

    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        self.tools.compiler.validate("compiler")?;
        self.tools.instrumenter.validate("instrumenter")?;
        self.tools.analyzer.validate("analyzer")?;
        if self.analysis.timeout.is_zero() {
            return Err(ConfigParseErrorKind::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{command::AnalysisFlags, test_list::TestCase};
    use camino_tempfile::tempdir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn default_config_is_valid() {
        let config = BenchConfig::default_config().expect("default config is valid");
        assert_eq!(config.analysis_timeout(), Duration::from_secs(200));
        assert_eq!(
            config.library_dirs(),
            [Utf8PathBuf::from("external/lib"), Utf8PathBuf::from("lib")]
        );

        let plan = config.stage_plan(Utf8Path::new("/opt/wd"), AnalysisSettings::default());
        let case = TestCase::new("demo.c", Utf8Path::new("/bench"));
        assert_eq!(
            plan.analyze_command(&case).to_shell_string(),
            "/opt/wd/bin/bvsfdAnalysis --filename /bench/demo.bc --max_disjunctions 1 \
             --debug_print_level 0"
        );
    }

    #[test]
    fn missing_cwd_file_uses_defaults() {
        let dir = tempdir().expect("tempdir created");
        let config = BenchConfig::from_sources(dir.path(), None).expect("defaults used");
        assert_eq!(config.analysis_timeout(), Duration::from_secs(200));
    }

    #[test]
    fn user_file_overrides_defaults() {
        let dir = tempdir().expect("tempdir created");
        std::fs::write(
            dir.path().join(BenchConfig::CONFIG_FILE_NAME),
            indoc! {r#"
                [tools.analyzer]
                program = "/usr/local/bin/analyzer"
                args = ["{input}"]

                [analysis]
                timeout = "1m 30s"
            "#},
        )
        .expect("config written");

        let config = BenchConfig::from_sources(dir.path(), None).expect("config parsed");
        assert_eq!(config.analysis_timeout(), Duration::from_secs(90));
        // Untouched sections keep their defaults.
        assert_eq!(config.library_dirs().len(), 2);

        let settings = AnalysisSettings {
            flags: AnalysisFlags {
                use_oct: true,
                ..AnalysisFlags::default()
            },
            ..AnalysisSettings::default()
        };
        let plan = config.stage_plan(dir.path(), settings);
        let case = TestCase::new("demo.c", Utf8Path::new("/bench"));
        assert_eq!(
            plan.analyze_command(&case).to_shell_string(),
            "/usr/local/bin/analyzer /bench/demo.bc --use_oct"
        );
    }

    #[test]
    fn explicit_file_must_exist() {
        let dir = tempdir().expect("tempdir created");
        let path = dir.path().join("custom.toml");
        let error = BenchConfig::from_sources(dir.path(), Some(&path))
            .expect_err("explicit file is required");
        assert_eq!(error.config_file(), Some(path.as_path()));
        assert!(
            matches!(error.kind(), ConfigParseErrorKind::BuildError(_)),
            "unexpected error kind: {:?}",
            error.kind()
        );
    }

    #[test_case(
        indoc! {r#"
            [tools.compiler]
            program = "clang"
            args = ["{source}"]
        "#},
        "unknown placeholder"
        ; "unknown placeholder"
    )]
    #[test_case(
        indoc! {r#"
            [tools.instrumenter]
            program = ""
        "#},
        "empty program"
        ; "empty program"
    )]
    #[test_case(
        indoc! {r#"
            [analysis]
            timeout = "0s"
        "#},
        "zero timeout"
        ; "zero timeout"
    )]
    #[test_case(
        indoc! {r#"
            [analysis]
            timeout = "soon"
        "#},
        "build error"
        ; "bad duration"
    )]
    fn invalid_config(contents: &str, expected: &str) {
        let dir = tempdir().expect("tempdir created");
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, contents).expect("config written");

        let error = BenchConfig::from_sources(dir.path(), Some(&path))
            .expect_err("config is invalid");
        let actual = match error.kind() {
            ConfigParseErrorKind::BuildError(_) => "build error",
            ConfigParseErrorKind::UnknownPlaceholder { .. } => "unknown placeholder",
            ConfigParseErrorKind::EmptyProgram { .. } => "empty program",
            ConfigParseErrorKind::ZeroTimeout => "zero timeout",
        };
        assert_eq!(actual, expected);
    }
}
