//! One test invocation, end to end.

use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::descriptor::{TestDescriptor, TestKind};
use crate::error::{HarnessError, Result};
use crate::report::TestReport;
use crate::toolchain::Toolchain;
use crate::verifier::{verify_compilation, verify_runtime};

/// Runs single tests against the configured environments.
#[derive(Debug, Clone)]
pub struct TestHarness {
    config: HarnessConfig,
    keep_workdir: bool,
}

impl TestHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            keep_workdir: false,
        }
    }

    /// Leave isolated working directories on disk for inspection.
    pub fn keep_workdir(mut self, keep: bool) -> Self {
        self.keep_workdir = keep;
        self
    }

    /// Run the test in `directory` (relative to the tests root) with the
    /// toolchain configured for its kind.
    ///
    /// When `required_kind` is set, a descriptor of any other kind is
    /// rejected before anything is staged.
    pub async fn run_test(
        &self,
        directory: &str,
        required_kind: Option<TestKind>,
    ) -> Result<TestReport> {
        let (descriptor, test_dir) = self.load(directory, required_kind)?;
        let toolchain = self.config.toolchain(descriptor.kind);
        self.execute(descriptor, &test_dir, &toolchain).await
    }

    /// Like [`TestHarness::run_test`] with an explicit toolchain.
    pub async fn run_test_with(
        &self,
        directory: &str,
        required_kind: Option<TestKind>,
        toolchain: &dyn Toolchain,
    ) -> Result<TestReport> {
        let (descriptor, test_dir) = self.load(directory, required_kind)?;
        self.execute(descriptor, &test_dir, toolchain).await
    }

    /// Resolve and load the named test. Names are single directory entries
    /// under the tests root, as listed in the matrix.
    fn load(
        &self,
        directory: &str,
        required_kind: Option<TestKind>,
    ) -> Result<(TestDescriptor, PathBuf)> {
        let mut components = Path::new(directory).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(HarnessError::InvalidTestName {
                name: directory.to_string(),
            });
        }

        let test_dir = self.config.test_dir(directory);
        if !test_dir.is_dir() {
            return Err(HarnessError::TestDirMissing { path: test_dir });
        }

        let descriptor = TestDescriptor::load(&test_dir)?;
        if let Some(expected) = required_kind {
            if descriptor.kind != expected {
                return Err(HarnessError::KindMismatch {
                    expected,
                    found: descriptor.kind,
                });
            }
        }
        if !descriptor.active {
            warn!(directory = %descriptor.directory, "Running a test marked inactive");
        }
        Ok((descriptor, test_dir))
    }

    async fn execute(
        &self,
        descriptor: TestDescriptor,
        test_dir: &Path,
        toolchain: &dyn Toolchain,
    ) -> Result<TestReport> {
        let invocation_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            %invocation_id,
            directory = %descriptor.directory,
            kind = %descriptor.kind,
            expected = descriptor.expectation.as_result_str(descriptor.kind),
            "Starting test"
        );

        let template = self.config.environment_dir(descriptor.kind);
        let mut env = self
            .config
            .stager()
            .stage(descriptor.kind, test_dir, &template)?;

        if self.keep_workdir {
            let kept = env.persist();
            info!(workdir = %kept.display(), "Keeping working directory");
        }

        let verification = match descriptor.kind {
            TestKind::Compilation => {
                verify_compilation(toolchain, &env, &descriptor.expectation).await?
            }
            TestKind::Runtime => verify_runtime(toolchain, &env, &descriptor.expectation).await?,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let message = verification.verdict.mismatch().map(ToString::to_string);

        match &message {
            None => info!(%invocation_id, duration_ms, "Test passed"),
            Some(reason) => warn!(%invocation_id, duration_ms, %reason, "Test failed"),
        }

        Ok(TestReport {
            invocation_id,
            directory: descriptor.directory,
            kind: descriptor.kind,
            expectation: descriptor.expectation,
            staging: env.mode(),
            staged_files: env.staged_files().to_vec(),
            sources_digest: env.sources_digest().to_string(),
            phase: verification.phase,
            build_exit_code: verification.build.exit_code,
            run_exit_code: verification.outcome.run_exit_code,
            run_stdout: verification.outcome.run_stdout,
            verdict: verification.verdict,
            message,
            started_at,
            duration_ms,
        })
    }
}
