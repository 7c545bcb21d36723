//! langtest core - conformance test execution for language toolchains
//!
//! Provides the test execution protocol:
//! - Loads per-test descriptors and builds the CI matrix
//! - Stages test sources into a build environment
//! - Builds, optionally runs, and judges each test

pub mod command;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod harness;
pub mod judge;
pub mod matrix;
pub mod report;
pub mod stage;
pub mod telemetry;
pub mod toolchain;
pub mod verifier;

// Re-export key types
pub use command::{CommandOutput, CommandSpec, OutputMode};
pub use config::{EnvironmentConfig, HarnessConfig};
pub use descriptor::{Expectation, TestDescriptor, TestKind};
pub use error::{HarnessError, Result};
pub use harness::TestHarness;
pub use judge::{judge_compilation, judge_runtime, ExecutionOutcome, Mismatch, Verdict};
pub use matrix::{MatrixFormat, MatrixScope, TestMatrix};
pub use report::TestReport;
pub use stage::{StagedEnvironment, Stager, StagingMode};
pub use telemetry::init_tracing;
pub use toolchain::{BuildOutcome, CommandToolchain, RunOutcome, Toolchain};
pub use verifier::{verify_compilation, verify_runtime, Phase, Verification};
