//! Slate Store crate - a minimal ORM over SQLite.
//!
//! Record types declare their fields explicitly; the [`TypeRegistry`] maps
//! each field's semantic type to a SQLite storage class and converter. From
//! that the store generates `CREATE TABLE`, `INSERT` and `SELECT` statements,
//! and [`Session`]s move records in and out of one database per location,
//! handed out by the [`ConnectionManager`].

pub mod db;
pub mod manager;
pub mod naming;
pub mod record;
pub mod registry;
pub mod schema;
pub mod session;
pub mod statement;

pub use db::ConnectOptions;
pub use manager::ConnectionManager;
pub use record::{FieldDef, Record, StoredRow, IDENTITY_COLUMN};
pub use registry::{ColumnType, Converter, SqlValue, StorageKind, TypeRegistry};
pub use schema::create_table_statement;
pub use session::{
    RecordStream, RowStream, Scope, Session, SessionHandle, SessionState, NO_PARAMS,
};
pub use statement::{insert_statement, select_statement, InsertStatement};

pub use slate_core::error::{Result, SlateError};
pub use slate_core::types::{CommitPolicy, FieldValue, SemanticType, StorageLocation};
