//! Semantic type to storage primitive registry.
//!
//! Maps each [`SemanticType`] to a [`ColumnType`]: the SQLite storage class
//! used in `CREATE TABLE` and the one-way converter applied when binding an
//! insert. Reading values back is left to [`Record::from_row`].
//!
//! [`Record::from_row`]: crate::record::Record::from_row

use std::collections::HashMap;
use std::fmt;

use rusqlite::types::Value;
use tracing::debug;

use slate_core::error::{Result, SlateError};
use slate_core::types::{FieldValue, SemanticType};

/// Raw value handed to SQLite.
pub type SqlValue = Value;

/// Converts a semantic value into a storage primitive.
///
/// Returns `None` when the value does not have the shape the converter
/// expects. Null values never reach a converter.
pub type Converter = fn(&FieldValue) -> Option<SqlValue>;

/// The four SQLite storage classes a column can be declared with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageKind {
    pub fn as_sql(&self) -> &'static str {
        match self {
            StorageKind::Integer => "INTEGER",
            StorageKind::Real => "REAL",
            StorageKind::Text => "TEXT",
            StorageKind::Blob => "BLOB",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Column type descriptor for one semantic type.
#[derive(Clone, Debug)]
pub struct ColumnType {
    pub semantic_type: SemanticType,
    pub kind: StorageKind,
    converter: Converter,
}

impl ColumnType {
    /// Convert `value` for binding into the column of `field`.
    pub fn convert(&self, field: &str, value: &FieldValue) -> Result<SqlValue> {
        if matches!(value, FieldValue::Null) {
            return Ok(SqlValue::Null);
        }
        (self.converter)(value).ok_or_else(|| SlateError::TypeMismatch {
            field: field.to_string(),
            expected: self.semantic_type.to_string(),
            found: value.kind().to_string(),
        })
    }
}

/// Registry of column type descriptors.
///
/// Populate it once at start-up and share it behind an `Arc`; sessions and
/// the connection manager only ever read from it.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<SemanticType, ColumnType>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding descriptors for every built-in semantic type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(SemanticType::INTEGER, StorageKind::Integer, convert_integer);
        registry.register(SemanticType::FLOAT, StorageKind::Real, convert_float);
        registry.register(SemanticType::TEXT, StorageKind::Text, convert_text);
        registry.register(SemanticType::PATH, StorageKind::Text, convert_path);
        registry.register(SemanticType::TIMESTAMP, StorageKind::Text, convert_timestamp);
        registry.register(SemanticType::JSON, StorageKind::Text, convert_json);
        registry.register(SemanticType::BYTES, StorageKind::Blob, convert_bytes);
        registry
    }

    /// Add or overwrite the descriptor for `semantic_type`.
    pub fn register(
        &mut self,
        semantic_type: SemanticType,
        kind: StorageKind,
        converter: Converter,
    ) -> &mut Self {
        let replaced = self
            .types
            .insert(
                semantic_type,
                ColumnType {
                    semantic_type,
                    kind,
                    converter,
                },
            )
            .is_some();
        debug!(%semantic_type, %kind, replaced, "Registered column type");
        self
    }

    /// Look up the descriptor for `semantic_type`.
    pub fn resolve(&self, semantic_type: SemanticType) -> Result<&ColumnType> {
        self.types
            .get(&semantic_type)
            .ok_or_else(|| SlateError::UnregisteredType {
                semantic_type: semantic_type.to_string(),
            })
    }

    pub fn contains(&self, semantic_type: SemanticType) -> bool {
        self.types.contains_key(&semantic_type)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

fn convert_integer(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Integer(v) => Some(SqlValue::Integer(*v)),
        _ => None,
    }
}

fn convert_float(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Float(v) => Some(SqlValue::Real(*v)),
        FieldValue::Integer(v) => Some(SqlValue::Real(*v as f64)),
        _ => None,
    }
}

fn convert_text(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Text(v) => Some(SqlValue::Text(v.clone())),
        _ => None,
    }
}

fn convert_path(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Path(p) => Some(SqlValue::Text(p.to_string_lossy().into_owned())),
        _ => None,
    }
}

fn convert_timestamp(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Timestamp(t) => Some(SqlValue::Text(t.to_rfc3339())),
        _ => None,
    }
}

fn convert_json(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Json(v) => Some(SqlValue::Text(v.to_string())),
        _ => None,
    }
}

fn convert_bytes(value: &FieldValue) -> Option<SqlValue> {
    match value {
        FieldValue::Bytes(v) => Some(SqlValue::Blob(v.clone())),
        _ => None,
    }
}
