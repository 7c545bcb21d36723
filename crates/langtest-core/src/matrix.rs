//! CI matrix construction.
//!
//! Every subdirectory of the tests root is a test and must carry a
//! descriptor. One bad descriptor fails the whole enumeration: a matrix that
//! silently drops tests is worse than no matrix.
//!
//! Entries come out in directory enumeration order, which the filesystem
//! does not guarantee to be stable between runs.

use std::path::Path;
use std::str::FromStr;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::descriptor::{TestDescriptor, TestKind};
use crate::error::{HarnessError, Result};

/// Prefix of the workflow command the CI scheduler reads the matrix from.
pub const SET_OUTPUT_PREFIX: &str = "::set-output name=matrix::";

/// Which descriptors a matrix includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixScope {
    /// Active tests of one kind.
    Kind(TestKind),

    /// Every descriptor, active or not, of any kind.
    All,
}

impl MatrixScope {
    pub fn includes(&self, descriptor: &TestDescriptor) -> bool {
        match self {
            MatrixScope::Kind(kind) => descriptor.kind == *kind && descriptor.active,
            MatrixScope::All => true,
        }
    }
}

/// How the matrix is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatrixFormat {
    /// `::set-output name=matrix::<json>`
    #[default]
    SetOutput,

    /// Bare JSON.
    Json,
}

impl FromStr for MatrixFormat {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "set-output" => Ok(MatrixFormat::SetOutput),
            "json" => Ok(MatrixFormat::Json),
            other => Err(HarnessError::InvalidConfig(format!(
                "unknown matrix format '{other}' (expected 'set-output' or 'json')"
            ))),
        }
    }
}

/// The set of tests a CI run should schedule.
#[derive(Debug, Clone, Default)]
pub struct TestMatrix {
    tests: Vec<TestDescriptor>,
}

impl TestMatrix {
    /// Enumerate `tests_root` and keep the descriptors `scope` includes.
    pub fn build(tests_root: &Path, scope: MatrixScope) -> Result<Self> {
        let descriptors = load_all(tests_root)?;
        let total = descriptors.len();
        let matrix = Self::from_descriptors(descriptors, scope);

        info!(
            root = %tests_root.display(),
            total,
            selected = matrix.len(),
            "Built test matrix"
        );
        Ok(matrix)
    }

    pub fn from_descriptors<I>(descriptors: I, scope: MatrixScope) -> Self
    where
        I: IntoIterator<Item = TestDescriptor>,
    {
        Self {
            tests: descriptors
                .into_iter()
                .filter(|d| scope.includes(d))
                .collect(),
        }
    }

    pub fn tests(&self) -> &[TestDescriptor] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// `{"include": [descriptor + {"directory": name}, ...]}`
    pub fn to_json(&self) -> Value {
        let include: Vec<Value> = self.tests.iter().map(TestDescriptor::matrix_entry).collect();
        json!({ "include": include })
    }

    pub fn render(&self, format: MatrixFormat) -> Result<String> {
        let body = serde_json::to_string(&self.to_json())?;
        Ok(match format {
            MatrixFormat::SetOutput => format!("{SET_OUTPUT_PREFIX}{body}"),
            MatrixFormat::Json => body,
        })
    }
}

/// Load the descriptor of every subdirectory of `tests_root`.
pub fn load_all(tests_root: &Path) -> Result<Vec<TestDescriptor>> {
    if !tests_root.is_dir() {
        return Err(HarnessError::TestDirMissing {
            path: tests_root.to_path_buf(),
        });
    }

    let mut descriptors = Vec::new();
    for entry in std::fs::read_dir(tests_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let descriptor = TestDescriptor::load(&entry.path())?;
        debug!(
            directory = %descriptor.directory,
            kind = %descriptor.kind,
            active = descriptor.active,
            "Loaded descriptor"
        );
        descriptors.push(descriptor);
    }
    Ok(descriptors)
}
