// Copyright (c) The wdbench Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::executor::{ExecutionResult, ExecutionStatus};
use crate::{
    command::StageKind,
    errors::{ChildStartError, DecodeError},
    helpers::DisplayErrorChain,
    reporter::StatsRecord,
    test_list::TestCase,
};
use std::{fmt, time::Duration};

/// Why a case that reached the analysis stage crashed.
#[derive(Clone, Debug)]
pub enum CrashReason {
    /// The analysis engine couldn't be started.
    Spawn(ChildStartError),

    /// The result artifact was missing or malformed.
    Decode(DecodeError),
}

impl fmt::Display for CrashReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashReason::Spawn(error) => write!(f, "{}", DisplayErrorChain(error)),
            CrashReason::Decode(error) => write!(f, "{}", DisplayErrorChain(error)),
        }
    }
}

/// The bucket a case that reached the analysis stage ends up in.
#[derive(Clone, Debug)]
pub enum CaseOutcome {
    /// The result artifact decoded.
    Completed(StatsRecord),

    /// The analysis ran past the timeout and was killed. No result artifact is read.
    TimedOut {
        /// How long the analysis ran for before it was killed.
        elapsed: Duration,
    },

    /// The analysis couldn't be started, or its result artifact couldn't be decoded.
    Crashed {
        /// How long the analysis ran for.
        elapsed: Duration,

        /// Why the case crashed.
        reason: CrashReason,
    },
}

impl CaseOutcome {
    /// Classifies an analysis run.
    ///
    /// A timeout takes precedence over everything else, and `decode` is only called if the
    /// process ran to completion. A non-zero exit code alone doesn't make a case crash: if the
    /// result artifact decodes, the case completed.
    pub fn classify(
        execution: &ExecutionResult,
        decode: impl FnOnce() -> Result<StatsRecord, DecodeError>,
    ) -> Self {
        let elapsed = execution.duration;
        match &execution.status {
            ExecutionStatus::Timeout => CaseOutcome::TimedOut { elapsed },
            ExecutionStatus::SpawnError(error) => CaseOutcome::Crashed {
                elapsed,
                reason: CrashReason::Spawn(error.clone()),
            },
            ExecutionStatus::Success | ExecutionStatus::Failure { .. } => match decode() {
                Ok(record) => CaseOutcome::Completed(record),
                Err(error) => CaseOutcome::Crashed {
                    elapsed,
                    reason: CrashReason::Decode(error),
                },
            },
        }
    }

    /// Returns the analysis stage's wall-clock duration.
    pub fn elapsed(&self) -> Duration {
        match self {
            CaseOutcome::Completed(record) => record.elapsed(),
            CaseOutcome::TimedOut { elapsed } | CaseOutcome::Crashed { elapsed, .. } => *elapsed,
        }
    }
}

/// What happened to a case.
#[derive(Clone, Debug)]
pub enum CaseResult {
    /// A stage before analysis failed, so the case was abandoned.
    Aborted {
        /// The stage that failed.
        stage: StageKind,

        /// How that stage ended.
        status: ExecutionStatus,
    },

    /// The case reached the analysis stage.
    Analyzed(CaseOutcome),
}

/// A case together with its result. Produced once per case, in list order.
#[derive(Clone, Debug)]
pub struct FinishedCase {
    /// The case.
    pub case: TestCase,

    /// What happened to it.
    pub result: CaseResult,
}
