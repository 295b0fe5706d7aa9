use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for Slate.
///
/// Schema and statement generation failures are reported before anything is
/// sent to the database. Engine failures from the store crate are flattened
/// into [`SlateError::Storage`] with the failing operation as context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SlateError {
    #[error("Field {record}.{field} has no semantic type")]
    UnsupportedFieldType { record: String, field: String },

    #[error("No column type registered for semantic type '{semantic_type}'")]
    UnregisteredType { semantic_type: String },

    #[error("Field {field}: expected a {expected} value, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("Table {table} is already defined")]
    DuplicateTableDefinition { table: String },

    #[error("Session for {location} is closed")]
    SessionClosed { location: String },

    #[error("Session for {location} is not open")]
    SessionNotOpen { location: String },

    #[error("Session for {location} is held by an active scope")]
    SessionBusy { location: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Refusing to overwrite existing artifact at {}", path.display())]
    OverwriteConflict { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for SlateError {
    fn from(err: toml::de::Error) -> Self {
        SlateError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SlateError {
    fn from(err: toml::ser::Error) -> Self {
        SlateError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SlateError {
    fn from(err: serde_json::Error) -> Self {
        SlateError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Slate operations.
pub type Result<T> = std::result::Result<T, SlateError>;
