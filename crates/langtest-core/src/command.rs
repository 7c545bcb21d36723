//! External command specification and execution.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::{HarnessError, Result};

/// Placeholder in command arguments replaced by the staged environment path.
pub const ENV_DIR_PLACEHOLDER: &str = "{env}";

/// Environment variable exported to every child with the staged environment path.
pub const ENV_DIR_VAR: &str = "LANGTEST_ENV_DIR";

/// An external command run against a staged environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommandSpec {
    /// Command to execute (first element is the executable).
    pub command: Vec<String>,

    /// Optional wall-clock limit. `None` waits for the child to exit on its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CommandSpec {
    pub fn new<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            timeout_secs: None,
        }
    }

    /// `mvn clean compile --file {env}/pom.xml`
    pub fn maven_compile() -> Self {
        Self::new(["mvn", "clean", "compile", "--file", "{env}/pom.xml"])
    }

    /// `{env}/run.sh`
    pub fn run_script() -> Self {
        Self::new(["{env}/run.sh"])
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Arguments with every `{env}` occurrence replaced by `env_dir`.
    pub fn expand(&self, env_dir: &Path) -> Vec<String> {
        let env = env_dir.to_string_lossy();
        self.command
            .iter()
            .map(|arg| arg.replace(ENV_DIR_PLACEHOLDER, &env))
            .collect()
    }
}

/// How the child's standard streams are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child writes straight to the harness's stdout/stderr (build logs).
    Inherit,

    /// stdout and stderr are captured for judgment.
    Capture,
}

/// Result of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,

    /// Captured stdout (empty in [`OutputMode::Inherit`]).
    pub stdout: String,

    /// Captured stderr (empty in [`OutputMode::Inherit`]).
    pub stderr: String,

    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the child exited with code zero.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Execute `spec` once against `env_dir` and wait for it to finish.
///
/// `step` names the command in logs and errors. A child that cannot be
/// spawned is an error; a child that exits non-zero is not.
pub async fn execute(
    step: &str,
    spec: &CommandSpec,
    env_dir: &Path,
    mode: OutputMode,
) -> Result<CommandOutput> {
    let start = Instant::now();

    let argv = spec.expand(env_dir);
    let Some((exe, args)) = argv.split_first() else {
        return Err(HarnessError::EmptyCommand {
            step: step.to_string(),
        });
    };

    debug!(step, command = ?argv, "Spawning command");

    let (stdout, stderr) = match mode {
        OutputMode::Inherit => (Stdio::inherit(), Stdio::inherit()),
        OutputMode::Capture => (Stdio::piped(), Stdio::piped()),
    };

    let child = Command::new(exe)
        .args(args)
        .env(ENV_DIR_VAR, env_dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| HarnessError::Spawn {
            step: step.to_string(),
            program: exe.clone(),
            source,
        })?;

    let output = match spec.timeout_secs {
        Some(timeout_secs) => tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| HarnessError::Timeout {
            step: step.to_string(),
            timeout_secs,
        })??,
        None => child.wait_with_output().await?,
    };

    let duration_ms = start.elapsed().as_millis() as u64;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        duration_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new(["sh", "-c", script])
    }

    #[test]
    fn test_expand_replaces_placeholder() {
        let spec = CommandSpec::maven_compile();
        let argv = spec.expand(Path::new("/tmp/env"));
        assert_eq!(argv, vec!["mvn", "clean", "compile", "--file", "/tmp/env/pom.xml"]);
    }

    #[test]
    fn test_run_script_default() {
        let argv = CommandSpec::run_script().expand(Path::new("envs/runtime"));
        assert_eq!(argv, vec!["envs/runtime/run.sh"]);
    }

    #[test]
    fn test_command_spec_serde_defaults() {
        let spec: CommandSpec = serde_json::from_str(r#"{"command": ["make"]}"#).unwrap();
        assert_eq!(spec.command, vec!["make"]);
        assert_eq!(spec.timeout_secs, None);

        let err = serde_json::from_str::<CommandSpec>(r#"{"command": [], "retries": 2}"#);
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_execute_captures_stdout_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let out = execute("run", &sh("printf '42\\n'"), dir.path(), OutputMode::Capture)
            .await
            .expect("execute failed");
        assert!(out.succeeded());
        assert_eq!(out.stdout, "42\n");
    }

    #[tokio::test]
    async fn test_execute_reports_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let out = execute("build", &sh("exit 3"), dir.path(), OutputMode::Capture)
            .await
            .expect("execute failed");
        assert!(!out.succeeded());
        assert_eq!(out.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_execute_exports_env_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = execute(
            "run",
            &sh("printf '%s' \"$LANGTEST_ENV_DIR\""),
            dir.path(),
            OutputMode::Capture,
        )
        .await
        .expect("execute failed");
        assert_eq!(out.stdout, dir.path().to_string_lossy());
    }

    #[tokio::test]
    async fn test_execute_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute("build", &CommandSpec::new(Vec::<String>::new()), dir.path(), OutputMode::Inherit)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::EmptyCommand { .. }));
    }

    #[tokio::test]
    async fn test_execute_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new(["definitely-not-a-real-program-langtest"]);
        let err = execute("build", &spec, dir.path(), OutputMode::Capture)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let spec = sh("sleep 5").with_timeout(1);
        let err = execute("run", &spec, dir.path(), OutputMode::Capture)
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { timeout_secs: 1, .. }));
    }
}
