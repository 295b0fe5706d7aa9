use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use slate_core::error::{Result, SlateError};
use slate_core::types::{FieldValue, SemanticType};
use slate_store::{FieldDef, Record, SqlValue, StorageKind, StoredRow, TypeRegistry};

/// Semantic type of a [`TestOutcome`] column.
pub const OUTCOME: SemanticType = SemanticType::new("test_outcome");

/// Register the column types report records need beyond the built-ins.
pub fn register_types(registry: &mut TypeRegistry) {
    registry.register(OUTCOME, StorageKind::Text, convert_outcome);
}

/// Only the six known outcome names are accepted.
fn convert_outcome(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Text(s) => s
            .parse::<TestOutcome>()
            .ok()
            .map(|outcome| SqlValue::Text(outcome.as_str().to_string())),
        _ => None,
    }
}

/// Result of a single test case.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    #[default]
    Pass,
    Fail,
    Error,
    /// Expected failure that failed.
    Xfail,
    /// Expected failure that passed.
    Xpass,
    Skipped,
}

impl TestOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestOutcome::Pass => "pass",
            TestOutcome::Fail => "fail",
            TestOutcome::Error => "error",
            TestOutcome::Xfail => "xfail",
            TestOutcome::Xpass => "xpass",
            TestOutcome::Skipped => "skipped",
        }
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestOutcome {
    type Err = SlateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pass" => Ok(TestOutcome::Pass),
            "fail" => Ok(TestOutcome::Fail),
            "error" => Ok(TestOutcome::Error),
            "xfail" => Ok(TestOutcome::Xfail),
            "xpass" => Ok(TestOutcome::Xpass),
            "skipped" => Ok(TestOutcome::Skipped),
            other => Err(SlateError::Serialization(format!(
                "Unknown test outcome: {}",
                other
            ))),
        }
    }
}

/// One test case of a suite run. Stored in `test_case_result`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub rowid: Option<i64>,
    /// Path of the suite report this case belongs to.
    pub report_path: PathBuf,
    pub name: String,
    /// Fully qualified class name.
    pub full_name: String,
    /// Seconds.
    pub time: f64,
    pub result: TestOutcome,
}

impl Record for TestCaseResult {
    const TYPE_NAME: &'static str = "TestCaseResult";

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("report_path", SemanticType::PATH),
            FieldDef::new("name", SemanticType::TEXT),
            FieldDef::new("full_name", SemanticType::TEXT),
            FieldDef::new("time", SemanticType::FLOAT),
            FieldDef::new("result", OUTCOME),
        ];
        FIELDS
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.report_path.clone().into(),
            self.name.clone().into(),
            self.full_name.clone().into(),
            self.time.into(),
            self.result.as_str().into(),
        ]
    }

    fn identity(&self) -> Option<i64> {
        self.rowid
    }

    fn from_row(row: &StoredRow) -> Result<Self> {
        Ok(Self {
            rowid: row.identity()?,
            report_path: PathBuf::from(row.get::<String>("report_path")?),
            name: row.get("name")?,
            full_name: row.get("full_name")?,
            time: row.get("time")?,
            result: row.get::<String>("result")?.parse()?,
        })
    }
}

/// Summary of one suite run. Stored in `suite_report`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub rowid: Option<i64>,
    pub total_tests: i64,
    pub errors: i64,
    pub failures: i64,
    pub skipped: i64,
    /// Seconds.
    pub duration: f64,
    pub start_time: DateTime<Utc>,
    /// Where the raw report was placed on disk.
    pub report_path: PathBuf,
    /// Free-form suite properties.
    pub properties: serde_json::Value,
}

impl SuiteReport {
    /// Tests that neither failed, errored nor were skipped.
    pub fn passed(&self) -> i64 {
        self.total_tests - self.errors - self.failures - self.skipped
    }
}

impl Record for SuiteReport {
    const TYPE_NAME: &'static str = "SuiteReport";

    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("total_tests", SemanticType::INTEGER),
            FieldDef::new("errors", SemanticType::INTEGER),
            FieldDef::new("failures", SemanticType::INTEGER),
            FieldDef::new("skipped", SemanticType::INTEGER),
            FieldDef::new("duration", SemanticType::FLOAT),
            FieldDef::new("start_time", SemanticType::TIMESTAMP),
            FieldDef::new("report_path", SemanticType::PATH),
            FieldDef::new("properties", SemanticType::JSON),
        ];
        FIELDS
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.total_tests.into(),
            self.errors.into(),
            self.failures.into(),
            self.skipped.into(),
            self.duration.into(),
            self.start_time.into(),
            self.report_path.clone().into(),
            self.properties.clone().into(),
        ]
    }

    fn identity(&self) -> Option<i64> {
        self.rowid
    }

    fn from_row(row: &StoredRow) -> Result<Self> {
        Ok(Self {
            rowid: row.identity()?,
            total_tests: row.get("total_tests")?,
            errors: row.get("errors")?,
            failures: row.get("failures")?,
            skipped: row.get("skipped")?,
            duration: row.get("duration")?,
            start_time: row.get("start_time")?,
            report_path: PathBuf::from(row.get::<String>("report_path")?),
            properties: row.get("properties")?,
        })
    }
}
