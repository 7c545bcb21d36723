//! Machine-readable record of one test invocation.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::descriptor::{Expectation, TestKind};
use crate::error::Result;
use crate::judge::Verdict;
use crate::stage::StagingMode;
use crate::verifier::Phase;

/// Outcome of one `run` invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestReport {
    pub invocation_id: Uuid,
    pub directory: String,
    pub kind: TestKind,
    pub expectation: Expectation,
    pub staging: StagingMode,
    pub staged_files: Vec<String>,
    pub sources_digest: String,
    /// Last phase reached.
    pub phase: Phase,
    pub build_exit_code: Option<i32>,
    pub run_exit_code: Option<i32>,
    pub run_stdout: Option<String>,
    pub verdict: Verdict,
    /// Human-readable failure reason, absent on pass.
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl TestReport {
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }

    /// Write the report as pretty JSON.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::Mismatch;
    use serde_json::Value;

    fn sample(verdict: Verdict) -> TestReport {
        let message = verdict.mismatch().map(ToString::to_string);
        TestReport {
            invocation_id: Uuid::new_v4(),
            directory: "print-42".to_string(),
            kind: TestKind::Runtime,
            expectation: Expectation::Output("42\n".to_string()),
            staging: StagingMode::Isolated,
            staged_files: vec!["app.eo".to_string(), "test.json".to_string()],
            sources_digest: "ab".repeat(32),
            phase: Phase::Judged,
            build_exit_code: Some(0),
            run_exit_code: Some(0),
            run_stdout: Some("43\n".to_string()),
            verdict,
            message,
            started_at: Utc::now(),
            duration_ms: 1234,
        }
    }

    #[test]
    fn test_report_schema_fields() {
        let report = sample(Verdict::Pass);
        let v: Value = serde_json::to_value(&report).unwrap();
        let obj = v.as_object().expect("top-level object");
        for key in &[
            "invocation_id",
            "directory",
            "kind",
            "expectation",
            "staging",
            "staged_files",
            "sources_digest",
            "phase",
            "build_exit_code",
            "run_exit_code",
            "run_stdout",
            "verdict",
            "message",
            "started_at",
            "duration_ms",
        ] {
            assert!(obj.contains_key(*key), "missing key: {}", key);
        }
        assert_eq!(obj["kind"], "runtime");
        assert_eq!(obj["staging"], "isolated");
        assert_eq!(obj["expectation"]["expect"], "output");
    }

    #[test]
    fn test_report_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = sample(Verdict::Fail(Mismatch::OutputMismatch {
            expected: "42\n".to_string(),
            actual: "43\n".to_string(),
        }));

        report.write_to(&path).unwrap();
        let read: TestReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, report);
        assert!(!read.passed());
        assert!(read.message.unwrap().contains("Expected runtime result"));
    }
}
