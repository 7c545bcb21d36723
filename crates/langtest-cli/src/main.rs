//! langtest - conformance test harness CLI
//!
//! ## Commands
//!
//! - `matrix`: print the CI matrix of tests to schedule
//! - `run`: stage, build, (run,) and judge a single test

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};

use langtest_core::{
    init_tracing, HarnessConfig, MatrixFormat, MatrixScope, StagingMode, TestHarness, TestKind,
    TestMatrix,
};

#[derive(Parser)]
#[command(name = "langtest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Conformance test harness for language toolchains", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Harness configuration file (JSON)
    #[arg(long, global = true, env = "LANGTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing one subdirectory per test
    #[arg(long, global = true, env = "LANGTEST_TESTS_ROOT")]
    tests_root: Option<PathBuf>,

    /// Directory containing the per-kind build environments
    #[arg(long, global = true, env = "LANGTEST_ENVIRONMENTS_ROOT")]
    environments_root: Option<PathBuf>,

    /// Staging mode: isolated (fresh copy per run) or shared (legacy, in place)
    #[arg(long, global = true, env = "LANGTEST_STAGING")]
    staging: Option<StagingMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CI matrix of tests to run
    Matrix {
        /// Only active tests of this kind (compilation or runtime)
        #[arg(short, long, conflicts_with = "all")]
        kind: Option<TestKind>,

        /// Every test, regardless of kind or active flag
        #[arg(long)]
        all: bool,

        /// Output format: set-output or json
        #[arg(long, default_value = "set-output")]
        format: MatrixFormat,
    },

    /// Run a single test and judge the outcome
    Run {
        /// Test directory name under the tests root
        directory: String,

        /// Reject the test unless it is of this kind
        #[arg(short, long)]
        kind: Option<TestKind>,

        /// Write a JSON report of the invocation to this path
        #[arg(long)]
        report: Option<PathBuf>,

        /// Keep the isolated working directory after the run
        #[arg(long)]
        keep_workdir: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let config = load_config(
        cli.config.as_deref(),
        cli.tests_root,
        cli.environments_root,
        cli.staging,
    )?;

    match cli.command {
        Commands::Matrix { kind, all, format } => cmd_matrix(&config, kind, all, format),
        Commands::Run {
            directory,
            kind,
            report,
            keep_workdir,
        } => cmd_run(config, &directory, kind, report.as_deref(), keep_workdir).await,
    }
}

/// Start from the config file (or defaults) and apply command-line overrides.
fn load_config(
    path: Option<&Path>,
    tests_root: Option<PathBuf>,
    environments_root: Option<PathBuf>,
    staging: Option<StagingMode>,
) -> Result<HarnessConfig> {
    let mut config = match path {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HarnessConfig::default(),
    };

    if let Some(tests_root) = tests_root {
        config.tests_root = tests_root;
    }
    if let Some(environments_root) = environments_root {
        config.environments_root = environments_root;
    }
    if let Some(staging) = staging {
        config.staging = staging;
    }
    config.validate()?;

    debug!(?config, "Resolved configuration");
    Ok(config)
}

fn matrix_scope(kind: Option<TestKind>, all: bool) -> Result<MatrixScope> {
    match (kind, all) {
        (Some(kind), false) => Ok(MatrixScope::Kind(kind)),
        (None, true) => Ok(MatrixScope::All),
        _ => anyhow::bail!("Specify either --kind <compilation|runtime> or --all"),
    }
}

/// Print the CI matrix
fn cmd_matrix(
    config: &HarnessConfig,
    kind: Option<TestKind>,
    all: bool,
    format: MatrixFormat,
) -> Result<()> {
    let scope = matrix_scope(kind, all)?;
    let matrix = TestMatrix::build(&config.tests_root, scope).with_context(|| {
        format!(
            "Failed to build test matrix from {}",
            config.tests_root.display()
        )
    })?;

    println!("{}", matrix.render(format)?);
    Ok(())
}

/// Run one test; a failed verdict becomes a non-zero exit
async fn cmd_run(
    config: HarnessConfig,
    directory: &str,
    kind: Option<TestKind>,
    report_path: Option<&Path>,
    keep_workdir: bool,
) -> Result<()> {
    let harness = TestHarness::new(config).keep_workdir(keep_workdir);
    let report = harness
        .run_test(directory, kind)
        .await
        .with_context(|| format!("Failed to run test '{}'", directory))?;

    if let Some(path) = report_path {
        report
            .write_to(path)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    match report.message {
        None => {
            println!("OK!");
            Ok(())
        }
        Some(reason) => anyhow::bail!(reason),
    }
}
