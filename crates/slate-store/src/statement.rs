//! INSERT and SELECT generation for record instances.

use slate_core::error::{Result, SlateError};

use crate::record::{Record, IDENTITY_COLUMN};
use crate::registry::{SqlValue, TypeRegistry};
use crate::schema::resolve_columns;

/// A parameterized insert and its bound values.
#[derive(Clone, Debug, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    /// Field name to converted value, in column order.
    pub params: Vec<(String, SqlValue)>,
}

/// Build the `INSERT` statement for one record instance.
///
/// Column, placeholder and parameter lists share the declared field order.
/// The identity is never written.
pub fn insert_statement<R: Record>(record: &R, registry: &TypeRegistry) -> Result<InsertStatement> {
    let columns = resolve_columns::<R>(registry)?;
    let values = record.values();
    if values.len() != columns.len() {
        return Err(SlateError::TypeMismatch {
            field: R::TYPE_NAME.to_string(),
            expected: format!("{} field values", columns.len()),
            found: format!("{} values", values.len()),
        });
    }

    let params = columns
        .iter()
        .zip(values.iter())
        .map(|((field, column), value)| {
            column
                .convert(field.name, value)
                .map(|converted| (field.name.to_string(), converted))
        })
        .collect::<Result<Vec<_>>>()?;

    let names = params
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>();
    let placeholders = names
        .iter()
        .map(|name| format!(":{}", name))
        .collect::<Vec<_>>();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        R::table_name(),
        names.join(", "),
        placeholders.join(", ")
    );

    Ok(InsertStatement { sql, params })
}

/// Build the full-table `SELECT` used by both read paths: every declared
/// field in order, then the identity column.
pub fn select_statement<R: Record>() -> String {
    let columns = R::fields()
        .iter()
        .map(|field| field.name)
        .chain(std::iter::once(IDENTITY_COLUMN))
        .collect::<Vec<_>>();

    format!("SELECT {} FROM {}", columns.join(", "), R::table_name())
}
