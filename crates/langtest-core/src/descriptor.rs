//! Test descriptor records (`test.json`).
//!
//! Each test lives in its own directory next to a descriptor of the form
//!
//! ```json
//! { "type": "runtime", "active": true, "result": "42\n" }
//! ```
//!
//! The `result` field is decoded into an [`Expectation`] according to the
//! test kind. The raw record is kept so extra fields survive into the CI
//! matrix unchanged.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HarnessError, Result};

/// File name of the descriptor inside each test directory.
pub const DESCRIPTOR_FILE: &str = "test.json";

/// Runtime sentinel: the program must exit zero, output is not checked.
pub const SENTINEL_OK: &str = "_ok";

/// Runtime sentinel: the program must exit non-zero.
pub const SENTINEL_FAIL: &str = "_fail";

/// Test classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// Only the build result is judged.
    Compilation,

    /// The build must succeed; the produced program is run and judged.
    Runtime,
}

impl TestKind {
    /// Name as it appears in descriptors.
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::Compilation => "compilation",
            TestKind::Runtime => "runtime",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TestKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compilation" => Ok(TestKind::Compilation),
            "runtime" => Ok(TestKind::Runtime),
            other => Err(HarnessError::UnknownKind {
                found: other.to_string(),
            }),
        }
    }
}

/// What a test declares as its expected outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "expect", content = "output", rename_all = "snake_case")]
pub enum Expectation {
    /// `"ok"` for compilation tests, `"_ok"` for runtime tests.
    Success,

    /// `"fail"` for compilation tests, `"_fail"` for runtime tests.
    Failure,

    /// Literal standard output of a runtime test, compared verbatim.
    Output(String),
}

impl Expectation {
    /// Decode a descriptor `result` string for the given kind.
    ///
    /// Compilation tests only accept `"ok"` and `"fail"`. Runtime tests treat
    /// anything that is not a sentinel as literal expected output, so a
    /// runtime `"ok"` means "print exactly `ok`".
    pub fn parse(kind: TestKind, raw: &str) -> std::result::Result<Self, String> {
        match kind {
            TestKind::Compilation => match raw {
                "ok" => Ok(Expectation::Success),
                "fail" => Ok(Expectation::Failure),
                other => Err(format!(
                    "compilation result must be \"ok\" or \"fail\", got \"{other}\""
                )),
            },
            TestKind::Runtime => Ok(match raw {
                SENTINEL_OK => Expectation::Success,
                SENTINEL_FAIL => Expectation::Failure,
                literal => Expectation::Output(literal.to_string()),
            }),
        }
    }

    /// Encode back into the descriptor `result` string for the given kind.
    pub fn as_result_str(&self, kind: TestKind) -> &str {
        match (self, kind) {
            (Expectation::Success, TestKind::Compilation) => "ok",
            (Expectation::Failure, TestKind::Compilation) => "fail",
            (Expectation::Success, TestKind::Runtime) => SENTINEL_OK,
            (Expectation::Failure, TestKind::Runtime) => SENTINEL_FAIL,
            (Expectation::Output(text), _) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Expectation::Failure)
    }
}

/// Typed view of the mandatory descriptor fields.
#[derive(Debug, Deserialize)]
struct DescriptorFields {
    #[serde(rename = "type")]
    kind: String,
    active: bool,
    result: String,
}

/// A loaded test descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct TestDescriptor {
    /// Name of the test directory; identifies the test.
    pub directory: String,

    pub kind: TestKind,

    /// Inactive tests are left out of the CI matrix.
    pub active: bool,

    pub expectation: Expectation,

    record: Map<String, Value>,
}

impl TestDescriptor {
    /// Load `<test_dir>/test.json`.
    pub fn load(test_dir: &Path) -> Result<Self> {
        let path = test_dir.join(DESCRIPTOR_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HarnessError::DescriptorMissing { path })
            }
            Err(e) => return Err(e.into()),
        };

        let directory = test_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| test_dir.to_string_lossy().into_owned());

        Self::parse(directory, &text, &path)
    }

    /// Parse descriptor JSON text. `path` is only used in error messages.
    pub fn parse(directory: String, text: &str, path: &Path) -> Result<Self> {
        let malformed = |source| HarnessError::MalformedDescriptor {
            path: path.to_path_buf(),
            source,
        };

        let record: Map<String, Value> = serde_json::from_str(text).map_err(malformed)?;
        let fields: DescriptorFields =
            serde_json::from_value(Value::Object(record.clone())).map_err(malformed)?;

        let kind = fields.kind.parse::<TestKind>()?;
        let expectation = Expectation::parse(kind, &fields.result).map_err(|reason| {
            HarnessError::InvalidDescriptor {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        Ok(Self {
            directory,
            kind,
            active: fields.active,
            expectation,
            record,
        })
    }

    /// The descriptor record annotated with its directory name, as emitted
    /// in the CI matrix.
    pub fn matrix_entry(&self) -> Value {
        let mut entry = self.record.clone();
        entry.insert(
            "directory".to_string(),
            Value::String(self.directory.clone()),
        );
        Value::Object(entry)
    }
}
