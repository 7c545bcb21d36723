//! Environment staging.
//!
//! A test's top-level files are copied into the sources folder of the build
//! environment for its kind. Two modes exist:
//!
//! - [`StagingMode::Isolated`]: the per-kind environment directory is a
//!   template. It is copied into a fresh working directory for every
//!   invocation and removed when the [`StagedEnvironment`] is dropped.
//! - [`StagingMode::Shared`]: files are copied straight into the per-kind
//!   environment directory. Same-named files are overwritten, everything else
//!   a previous test left there stays. Two tests of the same kind must not
//!   run concurrently in this mode.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::descriptor::TestKind;
use crate::error::{HarnessError, Result};

/// Where a test's sources are staged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StagingMode {
    /// Copy into the fixed per-kind environment directory.
    Shared,

    /// Copy the environment template into an invocation-scoped directory first.
    #[default]
    Isolated,
}

impl StagingMode {
    pub fn name(&self) -> &'static str {
        match self {
            StagingMode::Shared => "shared",
            StagingMode::Isolated => "isolated",
        }
    }
}

impl fmt::Display for StagingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StagingMode {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shared" => Ok(StagingMode::Shared),
            "isolated" => Ok(StagingMode::Isolated),
            other => Err(HarnessError::InvalidConfig(format!(
                "unknown staging mode '{other}' (expected 'shared' or 'isolated')"
            ))),
        }
    }
}

/// A build environment with one test's sources copied in.
#[derive(Debug)]
pub struct StagedEnvironment {
    root: PathBuf,
    sources_dir: PathBuf,
    mode: StagingMode,
    staged_files: Vec<String>,
    sources_digest: String,
    workdir: Option<TempDir>,
}

impl StagedEnvironment {
    /// Environment root; substituted for `{env}` in commands.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder the test files were copied into.
    pub fn sources_dir(&self) -> &Path {
        &self.sources_dir
    }

    pub fn mode(&self) -> StagingMode {
        self.mode
    }

    /// Names of the files copied from the test directory, sorted.
    pub fn staged_files(&self) -> &[String] {
        &self.staged_files
    }

    /// SHA-256 over the staged files' names and contents.
    pub fn sources_digest(&self) -> &str {
        &self.sources_digest
    }

    /// Keep an isolated working directory on disk after this value is dropped.
    /// Returns the directory path. No-op for shared environments.
    pub fn persist(&mut self) -> PathBuf {
        if let Some(workdir) = self.workdir.take() {
            let _ = workdir.keep();
        }
        self.root.clone()
    }
}

/// Copies test sources into build environments.
#[derive(Debug, Clone)]
pub struct Stager {
    mode: StagingMode,
    sources_subdir: PathBuf,
    work_root: Option<PathBuf>,
}

impl Stager {
    /// `sources_subdir` is relative to the environment root.
    /// `work_root` is where isolated working directories are created
    /// (system temp dir when `None`).
    pub fn new(mode: StagingMode, sources_subdir: PathBuf, work_root: Option<PathBuf>) -> Self {
        Self {
            mode,
            sources_subdir,
            work_root,
        }
    }

    /// Stage the files of `test_dir` into the environment built from `template`.
    pub fn stage(
        &self,
        kind: TestKind,
        test_dir: &Path,
        template: &Path,
    ) -> Result<StagedEnvironment> {
        if !test_dir.is_dir() {
            return Err(HarnessError::TestDirMissing {
                path: test_dir.to_path_buf(),
            });
        }
        if !template.is_dir() {
            return Err(HarnessError::EnvironmentMissing {
                path: template.to_path_buf(),
            });
        }

        let (root, workdir) = match self.mode {
            StagingMode::Shared => {
                warn!(
                    environment = %template.display(),
                    "Staging into shared environment; files from earlier tests are not removed"
                );
                (template.to_path_buf(), None)
            }
            StagingMode::Isolated => {
                let prefix = format!("langtest-{}-", kind.name());
                let mut builder = tempfile::Builder::new();
                builder.prefix(&prefix);
                let workdir = match &self.work_root {
                    Some(work_root) => {
                        std::fs::create_dir_all(work_root)?;
                        builder.tempdir_in(work_root)?
                    }
                    None => builder.tempdir()?,
                };
                copy_tree(template, workdir.path())?;
                (workdir.path().to_path_buf(), Some(workdir))
            }
        };

        let sources_dir = root.join(&self.sources_subdir);
        std::fs::create_dir_all(&sources_dir)?;

        let staged_files = copy_top_level_files(test_dir, &sources_dir)?;
        let sources_digest = digest_files(&sources_dir, &staged_files)?;

        debug!(
            sources = %sources_dir.display(),
            files = ?staged_files,
            "Staged test sources"
        );

        Ok(StagedEnvironment {
            root,
            sources_dir,
            mode: self.mode,
            staged_files,
            sources_digest,
            workdir,
        })
    }
}

/// Recursively copy `from` into the existing directory `to`.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copy every top-level regular file of `from` into `to`, overwriting
/// same-named files. Subdirectories are skipped. Returns sorted file names.
fn copy_top_level_files(from: &Path, to: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let path = entry.path();
        // Follows symlinks, so a link to a file is staged as a file.
        if !std::fs::metadata(&path)?.is_file() {
            continue;
        }
        std::fs::copy(&path, to.join(entry.file_name()))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn digest_files(dir: &Path, names: &[String]) -> Result<String> {
    let mut hasher = Sha256::new();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(std::fs::read(dir.join(name))?);
        hasher.update(b"\0");
    }
    Ok(hex::encode(hasher.finalize()))
}
