//! Record type declarations and raw result rows.

use std::sync::Arc;

use rusqlite::types::{FromSql, ValueRef};

use slate_core::error::{Result, SlateError};
use slate_core::types::{FieldValue, SemanticType};

use crate::naming;
use crate::registry::SqlValue;

/// Name of the storage-assigned identity column.
pub const IDENTITY_COLUMN: &str = "rowid";

/// One declared field of a record type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    /// `None` when the field carries no semantic type information at all.
    pub semantic_type: Option<SemanticType>,
}

impl FieldDef {
    pub const fn new(name: &'static str, semantic_type: SemanticType) -> Self {
        Self {
            name,
            semantic_type: Some(semantic_type),
        }
    }

    pub const fn untyped(name: &'static str) -> Self {
        Self {
            name,
            semantic_type: None,
        }
    }
}

/// A persistable record type.
///
/// The field list is declared explicitly and excludes the identity column,
/// which SQLite provides as `rowid`.
///
/// ```ignore
/// struct TestModel {
///     rowid: Option<i64>,
///     power_level: i64,
///     name: String,
/// }
///
/// impl Record for TestModel {
///     const TYPE_NAME: &'static str = "TestModel";
///
///     fn fields() -> &'static [FieldDef] {
///         const FIELDS: &[FieldDef] = &[
///             FieldDef::new("power_level", SemanticType::INTEGER),
///             FieldDef::new("name", SemanticType::TEXT),
///         ];
///         FIELDS
///     }
///
///     fn values(&self) -> Vec<FieldValue> {
///         vec![self.power_level.into(), self.name.clone().into()]
///     }
///
///     fn identity(&self) -> Option<i64> {
///         self.rowid
///     }
///
///     fn from_row(row: &StoredRow) -> Result<Self> {
///         Ok(Self {
///             rowid: row.identity()?,
///             power_level: row.get("power_level")?,
///             name: row.get("name")?,
///         })
///     }
/// }
/// ```
pub trait Record: Sized {
    /// PascalCase type name; the table name is derived from it.
    const TYPE_NAME: &'static str;

    /// Declared fields in column order.
    fn fields() -> &'static [FieldDef];

    /// Current field values, one per entry of [`Record::fields`], same order.
    fn values(&self) -> Vec<FieldValue>;

    /// Storage-assigned identity; `None` until the record has been read back.
    fn identity(&self) -> Option<i64>;

    /// Rebuild a record from a row selected with every field plus `rowid`.
    fn from_row(row: &StoredRow) -> Result<Self>;

    fn table_name() -> String {
        naming::table_name(Self::TYPE_NAME)
    }
}

/// A result row, detached from the statement that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRow {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl StoredRow {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    /// Raw value of column `name`.
    pub fn value(&self, name: &str) -> Result<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|idx| &self.values[idx])
            .ok_or_else(|| SlateError::Storage(format!("No column named {} in row", name)))
    }

    /// Read column `name` using SQLite's native conversion for `T`.
    pub fn get<T: FromSql>(&self, name: &str) -> Result<T> {
        let value = self.value(name)?;
        T::column_result(ValueRef::from(value)).map_err(|e| {
            SlateError::Storage(format!("Failed to read column {}: {}", name, e))
        })
    }

    /// The identity column, if it was selected and is not NULL.
    pub fn identity(&self) -> Result<Option<i64>> {
        self.get(IDENTITY_COLUMN)
    }
}
