//! CREATE TABLE generation from record field declarations.

use slate_core::error::{Result, SlateError};

use crate::record::{FieldDef, Record};
use crate::registry::{ColumnType, TypeRegistry};

/// Resolve the column descriptor of every declared field of `R`, in order.
///
/// Fails on the first field without a semantic type or with an unregistered
/// one, before the caller has produced any SQL.
pub(crate) fn resolve_columns<'r, R: Record>(
    registry: &'r TypeRegistry,
) -> Result<Vec<(&'static FieldDef, &'r ColumnType)>> {
    let fields = R::fields();
    if fields.is_empty() {
        return Err(SlateError::UnsupportedFieldType {
            record: R::TYPE_NAME.to_string(),
            field: "<none>".to_string(),
        });
    }

    fields
        .iter()
        .map(|field| -> Result<(&'static FieldDef, &'r ColumnType)> {
            let semantic_type =
                field
                    .semantic_type
                    .ok_or_else(|| SlateError::UnsupportedFieldType {
                        record: R::TYPE_NAME.to_string(),
                        field: field.name.to_string(),
                    })?;
            Ok((field, registry.resolve(semantic_type)?))
        })
        .collect()
}

/// Build the `CREATE TABLE` statement for `R`.
///
/// One column per declared field in declaration order, no constraints. The
/// identity is SQLite's implicit `rowid`.
pub fn create_table_statement<R: Record>(registry: &TypeRegistry) -> Result<String> {
    let columns = resolve_columns::<R>(registry)?;
    let definitions = columns
        .iter()
        .map(|(field, column)| format!("{} {}", field.name, column.kind))
        .collect::<Vec<_>>()
        .join(",\n");

    Ok(format!(
        "CREATE TABLE {} (\n{}\n)",
        R::table_name(),
        definitions
    ))
}
