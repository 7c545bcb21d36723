//! Harness error taxonomy.
//!
//! These are infrastructure and descriptor failures that abort an invocation.
//! Expected-vs-actual mismatches are not errors; they are carried by
//! [`crate::judge::Verdict::Fail`].

use std::path::PathBuf;

use crate::descriptor::TestKind;

/// Errors produced while loading, staging, or executing a test.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("descriptor not found: {}", path.display())]
    DescriptorMissing { path: PathBuf },

    #[error("malformed descriptor {}: {source}", path.display())]
    MalformedDescriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid descriptor {}: {reason}", path.display())]
    InvalidDescriptor { path: PathBuf, reason: String },

    #[error("unknown type of the test: {found}")]
    UnknownKind { found: String },

    #[error("unknown type of the test: expected a {expected} test, found {found}")]
    KindMismatch { expected: TestKind, found: TestKind },

    #[error("invalid test name '{name}': expected a directory directly under the tests root")]
    InvalidTestName { name: String },

    #[error("test directory not found: {}", path.display())]
    TestDirMissing { path: PathBuf },

    #[error("environment template not found: {}", path.display())]
    EnvironmentMissing { path: PathBuf },

    #[error("command for '{step}' is empty")]
    EmptyCommand { step: String },

    #[error("failed to spawn '{program}' for '{step}': {source}")]
    Spawn {
        step: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{step}' timed out after {timeout_secs} seconds")]
    Timeout { step: String, timeout_secs: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
