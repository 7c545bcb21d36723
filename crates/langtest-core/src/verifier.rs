//! Build/run sequencing for a staged test.
//!
//! Runtime tests move through
//! `Staged -> BuildAttempted -> (BuildFailed | RunAttempted) -> Judged`.
//! No run is attempted unless the build exited zero.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::descriptor::Expectation;
use crate::error::Result;
use crate::judge::{judge_compilation, judge_runtime, ExecutionOutcome, Verdict};
use crate::stage::StagedEnvironment;
use crate::toolchain::{BuildOutcome, RunOutcome, Toolchain};

/// Phases of a single test execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Staged,
    BuildAttempted,
    BuildFailed,
    RunAttempted,
    Judged,
}

/// Everything observed while building (and running) one test.
#[derive(Debug, Clone)]
pub struct Verification {
    /// Last phase reached. Always `Judged` or `BuildFailed`.
    pub phase: Phase,
    pub build: BuildOutcome,
    pub run: Option<RunOutcome>,
    pub outcome: ExecutionOutcome,
    pub verdict: Verdict,
}

struct Tracker {
    phase: Phase,
}

impl Tracker {
    fn new() -> Self {
        Self {
            phase: Phase::Staged,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "Phase transition");
        self.phase = next;
    }
}

/// Build once and compare the build result with the expectation.
pub async fn verify_compilation(
    toolchain: &dyn Toolchain,
    env: &StagedEnvironment,
    expected: &Expectation,
) -> Result<Verification> {
    let mut tracker = Tracker::new();

    let build = toolchain.build(env).await?;
    tracker.advance(Phase::BuildAttempted);

    let verdict = judge_compilation(expected, build.result_str());
    tracker.advance(Phase::Judged);

    Ok(Verification {
        phase: tracker.phase,
        build,
        run: None,
        outcome: ExecutionOutcome::build_only(build.succeeded()),
        verdict,
    })
}

/// Build, run if the build succeeded, and judge the runtime behavior.
pub async fn verify_runtime(
    toolchain: &dyn Toolchain,
    env: &StagedEnvironment,
    expected: &Expectation,
) -> Result<Verification> {
    let mut tracker = Tracker::new();

    let build = toolchain.build(env).await?;
    tracker.advance(Phase::BuildAttempted);

    if !build.succeeded() {
        tracker.advance(Phase::BuildFailed);
        let outcome = ExecutionOutcome::build_only(false);
        let verdict = judge_runtime(expected, &outcome);
        return Ok(Verification {
            phase: tracker.phase,
            build,
            run: None,
            outcome,
            verdict,
        });
    }

    let run = toolchain.run(env).await?;
    tracker.advance(Phase::RunAttempted);
    if !run.stderr.is_empty() {
        info!(stderr = %run.stderr, "Program wrote to stderr");
    }

    let outcome = ExecutionOutcome::ran(run.exit_code, run.stdout.clone());
    let verdict = judge_runtime(expected, &outcome);
    tracker.advance(Phase::Judged);

    Ok(Verification {
        phase: tracker.phase,
        build,
        run: Some(run),
        outcome,
        verdict,
    })
}
