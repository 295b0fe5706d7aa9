//! Value types shared by the store and the record crates.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved location name for a transient in-memory database.
pub const MEMORY_LOCATION: &str = ":memory:";

/// Where a session's database lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    /// Transient database, gone when its connection closes.
    Memory,
    /// Single-file database on disk.
    File(PathBuf),
}

impl StorageLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        StorageLocation::File(path.into())
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, StorageLocation::Memory)
    }

    /// Filesystem path, if this location is persisted on disk.
    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageLocation::Memory => None,
            StorageLocation::File(path) => Some(path),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Memory => f.write_str(MEMORY_LOCATION),
            StorageLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl FromStr for StorageLocation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StorageLocation::from(s))
    }
}

impl From<&str> for StorageLocation {
    fn from(s: &str) -> Self {
        if s == MEMORY_LOCATION {
            StorageLocation::Memory
        } else {
            StorageLocation::File(PathBuf::from(s))
        }
    }
}

impl From<PathBuf> for StorageLocation {
    fn from(path: PathBuf) -> Self {
        StorageLocation::File(path)
    }
}

impl From<&Path> for StorageLocation {
    fn from(path: &Path) -> Self {
        StorageLocation::File(path.to_path_buf())
    }
}

/// Semantic tag attached to a record field.
///
/// The built-in tags cover the value shapes in [`FieldValue`]; additional tags
/// can be declared with [`SemanticType::new`] and registered with their own
/// converter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SemanticType(&'static str);

impl SemanticType {
    pub const INTEGER: SemanticType = SemanticType("integer");
    pub const FLOAT: SemanticType = SemanticType("float");
    pub const TEXT: SemanticType = SemanticType("text");
    pub const PATH: SemanticType = SemanticType("path");
    pub const TIMESTAMP: SemanticType = SemanticType("timestamp");
    pub const JSON: SemanticType = SemanticType("json");
    pub const BYTES: SemanticType = SemanticType("bytes");

    pub const fn new(name: &'static str) -> Self {
        SemanticType(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// In-memory value of a record field, before conversion to a storage primitive.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Path(PathBuf),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Short name of the variant, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::Path(_) => "path",
            FieldValue::Timestamp(_) => "timestamp",
            FieldValue::Json(_) => "json",
            FieldValue::Bytes(_) => "bytes",
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<PathBuf> for FieldValue {
    fn from(v: PathBuf) -> Self {
        FieldValue::Path(v)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(v: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        FieldValue::Json(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// What a transaction scope does with pending writes when it is dropped
/// without finishing cleanly.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Roll back pending writes; only a clean finish commits.
    #[default]
    OnSuccess,
    /// Commit pending writes on every exit, including error paths.
    Always,
}
