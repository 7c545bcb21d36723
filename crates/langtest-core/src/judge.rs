//! Pass/fail judgment.
//!
//! Judgment is pure: it takes the declared [`Expectation`] and what actually
//! happened, and returns a [`Verdict`]. Turning a failed verdict into a
//! non-zero exit status is the caller's job.

use serde::{Deserialize, Serialize};

use crate::descriptor::{Expectation, TestKind};

/// Build and run results of one test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub build_succeeded: bool,

    /// `None` when no run was attempted or the program was killed by a signal.
    pub run_exit_code: Option<i32>,

    /// `None` when no run was attempted.
    pub run_stdout: Option<String>,
}

impl ExecutionOutcome {
    /// Outcome of a build that was not followed by a run.
    pub fn build_only(build_succeeded: bool) -> Self {
        Self {
            build_succeeded,
            run_exit_code: None,
            run_stdout: None,
        }
    }

    /// Outcome of a successful build followed by a run.
    pub fn ran(run_exit_code: Option<i32>, run_stdout: String) -> Self {
        Self {
            build_succeeded: true,
            run_exit_code,
            run_stdout: Some(run_stdout),
        }
    }

    fn run_succeeded(&self) -> bool {
        self.run_exit_code == Some(0)
    }
}

/// Why a test failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mismatch {
    #[error("Expected compilation result: \"{expected}\", but got: \"{actual}\".")]
    CompilationResult { expected: String, actual: String },

    #[error("This is a runtime test, but the compilation of the test's sources failed.")]
    RuntimeBuildFailed,

    #[error("This runtime test must have failed, but ran successfully.")]
    UnexpectedRunSuccess,

    #[error(
        "This runtime test must have succeeded, but failed (exit code: {}).",
        describe_exit(.exit_code)
    )]
    UnexpectedRunFailure { exit_code: Option<i32> },

    #[error("Expected runtime result: \"{expected}\", but got: \"{actual}\".")]
    OutputMismatch { expected: String, actual: String },
}

fn describe_exit(exit_code: &Option<i32>) -> String {
    match exit_code {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

/// Terminal result of judging one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "mismatch", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail(Mismatch),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    /// The failure reason, if any.
    pub fn mismatch(&self) -> Option<&Mismatch> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail(mismatch) => Some(mismatch),
        }
    }
}

/// Judge a compilation test.
///
/// `actual` is the build result spelled as in descriptors (`"ok"` or
/// `"fail"`); it must equal the declared expectation.
pub fn judge_compilation(expected: &Expectation, actual: &str) -> Verdict {
    let expected_str = expected.as_result_str(TestKind::Compilation);
    if expected_str == actual {
        Verdict::Pass
    } else {
        Verdict::Fail(Mismatch::CompilationResult {
            expected: expected_str.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// Judge a runtime test.
///
/// Rules apply in order:
/// 1. a failed build always fails the test;
/// 2. exit zero while a failure was expected fails;
/// 3. non-zero exit while anything else was expected fails;
/// 4. `Success` and `Failure` pass without looking at the output;
/// 5. otherwise stdout must equal the expected literal exactly.
///
/// A `Failure` expectation is satisfied by any non-zero exit. The output of
/// a crashing program is not compared against the `_fail` sentinel.
pub fn judge_runtime(expected: &Expectation, outcome: &ExecutionOutcome) -> Verdict {
    if !outcome.build_succeeded {
        return Verdict::Fail(Mismatch::RuntimeBuildFailed);
    }

    let ran_ok = outcome.run_succeeded();
    if ran_ok && expected.is_failure() {
        return Verdict::Fail(Mismatch::UnexpectedRunSuccess);
    }
    if !ran_ok && !expected.is_failure() {
        return Verdict::Fail(Mismatch::UnexpectedRunFailure {
            exit_code: outcome.run_exit_code,
        });
    }

    match expected {
        Expectation::Success | Expectation::Failure => Verdict::Pass,
        Expectation::Output(literal) => {
            let actual = outcome.run_stdout.as_deref().unwrap_or_default();
            if literal == actual {
                Verdict::Pass
            } else {
                Verdict::Fail(Mismatch::OutputMismatch {
                    expected: literal.clone(),
                    actual: actual.to_string(),
                })
            }
        }
    }
}
