//! Build and run invocation against a staged environment.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{self, CommandSpec, OutputMode};
use crate::error::{HarnessError, Result};
use crate::stage::StagedEnvironment;

/// Terminal signal of the external build step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildOutcome {
    /// `None` when the build was terminated by a signal.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// `"ok"` or `"fail"`, as written in compilation descriptors.
    pub fn result_str(&self) -> &'static str {
        if self.succeeded() {
            "ok"
        } else {
            "fail"
        }
    }
}

/// Exit status and captured output of the produced program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunOutcome {
    /// `None` when the program was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

/// The external toolchain a test is built and run with.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run the build step once and report its exit status.
    async fn build(&self, env: &StagedEnvironment) -> Result<BuildOutcome>;

    /// Run the produced program once, capturing its stdout.
    async fn run(&self, env: &StagedEnvironment) -> Result<RunOutcome>;
}

/// Toolchain backed by external commands.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    build: CommandSpec,
    run: Option<CommandSpec>,
}

impl CommandToolchain {
    pub fn new(build: CommandSpec, run: Option<CommandSpec>) -> Self {
        Self { build, run }
    }
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn build(&self, env: &StagedEnvironment) -> Result<BuildOutcome> {
        info!(environment = %env.root().display(), "Building staged sources");

        // Build logs go straight to the CI log; only the exit code matters.
        let output = command::execute("build", &self.build, env.root(), OutputMode::Inherit).await?;

        info!(
            exit_code = ?output.exit_code,
            duration_ms = output.duration_ms,
            "Build finished"
        );

        Ok(BuildOutcome {
            exit_code: output.exit_code,
            duration_ms: output.duration_ms,
        })
    }

    async fn run(&self, env: &StagedEnvironment) -> Result<RunOutcome> {
        let Some(run) = &self.run else {
            return Err(HarnessError::InvalidConfig(
                "no run command configured for this environment".to_string(),
            ));
        };

        info!(environment = %env.root().display(), "Running built program");

        let output = command::execute("run", run, env.root(), OutputMode::Capture).await?;

        info!(
            exit_code = ?output.exit_code,
            duration_ms = output.duration_ms,
            "Run finished"
        );

        Ok(RunOutcome {
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
            duration_ms: output.duration_ms,
        })
    }
}
