//! Harness configuration.
//!
//! Defaults reproduce the layout of the EO language test suite:
//!
//! ```text
//! .github/workflows/eo-language-tests/
//!   tests/<test>/test.json
//!   environments/compilation-tests-environment/{pom.xml, eo/}
//!   environments/runtime-tests-environment/{pom.xml, run.sh, eo/}
//! ```
//!
//! A JSON file may override any field; fields left out keep their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::command::CommandSpec;
use crate::descriptor::TestKind;
use crate::error::{HarnessError, Result};
use crate::stage::{Stager, StagingMode};
use crate::toolchain::CommandToolchain;

const SUITE_ROOT: &str = ".github/workflows/eo-language-tests";

/// Build environment for one test kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Environment directory, relative to `environments_root`.
    pub directory: PathBuf,

    pub build: CommandSpec,

    /// Runner for the produced program. Required for runtime tests.
    #[serde(default)]
    pub run: Option<CommandSpec>,
}

/// Top-level harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessConfig {
    /// Directory holding one subdirectory per test.
    pub tests_root: PathBuf,

    /// Directory holding the per-kind environments.
    pub environments_root: PathBuf,

    /// Folder inside an environment that receives test files.
    pub sources_subdir: PathBuf,

    pub staging: StagingMode,

    /// Parent of isolated working directories (system temp dir when unset).
    pub work_root: Option<PathBuf>,

    pub compilation: EnvironmentConfig,

    pub runtime: EnvironmentConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let suite = PathBuf::from(SUITE_ROOT);
        Self {
            tests_root: suite.join("tests"),
            environments_root: suite.join("environments"),
            sources_subdir: PathBuf::from("eo"),
            staging: StagingMode::default(),
            work_root: None,
            compilation: EnvironmentConfig {
                directory: PathBuf::from("compilation-tests-environment"),
                build: CommandSpec::maven_compile(),
                run: None,
            },
            runtime: EnvironmentConfig {
                directory: PathBuf::from("runtime-tests-environment"),
                build: CommandSpec::maven_compile(),
                run: Some(CommandSpec::run_script()),
            },
        }
    }
}

impl HarnessConfig {
    /// Load a JSON config file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            HarnessError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        for kind in [TestKind::Compilation, TestKind::Runtime] {
            if self.environment(kind).build.command.is_empty() {
                return Err(HarnessError::InvalidConfig(format!(
                    "{kind} build command is empty"
                )));
            }
        }
        match &self.runtime.run {
            Some(run) if !run.command.is_empty() => Ok(()),
            _ => Err(HarnessError::InvalidConfig(
                "runtime environment needs a non-empty run command".to_string(),
            )),
        }
    }

    pub fn environment(&self, kind: TestKind) -> &EnvironmentConfig {
        match kind {
            TestKind::Compilation => &self.compilation,
            TestKind::Runtime => &self.runtime,
        }
    }

    /// Environment template directory for `kind`.
    pub fn environment_dir(&self, kind: TestKind) -> PathBuf {
        self.environments_root
            .join(&self.environment(kind).directory)
    }

    /// Directory of the named test.
    pub fn test_dir(&self, directory: &str) -> PathBuf {
        self.tests_root.join(directory)
    }

    pub fn stager(&self) -> Stager {
        Stager::new(
            self.staging,
            self.sources_subdir.clone(),
            self.work_root.clone(),
        )
    }

    pub fn toolchain(&self, kind: TestKind) -> CommandToolchain {
        let env = self.environment(kind);
        CommandToolchain::new(env.build.clone(), env.run.clone())
    }
}
