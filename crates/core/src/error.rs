//! Error types for Tessera.
//!
//! Every error belongs to one of a handful of kinds (see [`ErrorKind`]) and
//! carries a stable SQLSTATE-style code so that a SQL front end can report it
//! without string matching.

use crate::row::RowId;
use crate::types::DataType;
use thiserror::Error;

/// Result type alias for Tessera operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A user-facing constraint was violated; the statement is aborted.
    Constraint,
    /// A user-facing schema problem (unknown or duplicate object, bad definition).
    Schema,
    /// A value could not be converted or had the wrong type.
    Type,
    /// An internal invariant was broken. Never swallow these.
    Consistency,
    /// A recognized but unimplemented feature.
    Unsupported,
}

/// Error types for Tessera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A NOT NULL column (or not-null index key) received a null.
    #[error("null value in column \"{column}\" of relation \"{table}\" violates not-null constraint")]
    NotNullViolation { table: String, column: String },

    /// A unique index already maps the key to another row.
    #[error("duplicate key value violates unique constraint \"{index}\": key {key} already exists (row {conflicting_row})")]
    UniqueViolation {
        index: String,
        key: String,
        conflicting_row: RowId,
    },

    /// A foreign key has no match, or a referenced row is still in use.
    #[error("{message} (constraint \"{constraint}\" on table \"{table}\")")]
    ForeignKeyViolation {
        constraint: String,
        table: String,
        message: String,
    },

    /// A check constraint evaluated to false.
    #[error("new row for relation \"{table}\" violates check constraint \"{constraint}\"")]
    CheckViolation { table: String, constraint: String },

    /// Misuse of a generated (identity or computed) column.
    #[error("column \"{column}\": {message}")]
    GeneratedColumn { column: String, message: String },

    /// Column not found.
    #[error("column \"{column}\" of relation \"{table}\" does not exist")]
    ColumnNotFound { table: String, column: String },

    /// Table not found.
    #[error("relation \"{name}\" does not exist")]
    TableNotFound { name: String },

    /// Index not found.
    #[error("index \"{name}\" does not exist")]
    IndexNotFound { name: String },

    /// Named constraint not found.
    #[error("constraint \"{name}\" of relation \"{table}\" does not exist")]
    ConstraintNotFound { table: String, name: String },

    /// A table, index, constraint or sequence name is already taken.
    #[error("{kind} \"{name}\" already exists")]
    DuplicateObject { kind: &'static str, name: String },

    /// A column name is already taken within its table.
    #[error("column \"{column}\" of relation \"{table}\" already exists")]
    DuplicateColumn { table: String, column: String },

    /// Positional insert with a mismatched number of values.
    #[error("INSERT has {got} expressions but {expected} target columns")]
    ColumnCountMismatch { expected: usize, got: usize },

    /// Invalid schema definition.
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    /// Type mismatch error.
    #[error("type mismatch: expected {expected:?}, got {got:?}")]
    TypeMismatch { expected: DataType, got: DataType },

    /// A value could not be cast to the requested type.
    #[error("invalid input syntax for type {to:?}: {value}")]
    InvalidCast { value: String, to: DataType },

    /// Mutation of a readonly (catalog) table.
    #[error("cannot modify readonly relation \"{table}\"")]
    ReadonlyTable { table: String },

    /// An object cannot be dropped or truncated because others depend on it.
    #[error("{message}")]
    DependentObjects { message: String },

    /// An operation that is valid SQL but not allowed in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    /// Write through a committed or rolled back transaction handle.
    #[error("transaction {id} is no longer active")]
    DeadTransaction { id: u64 },

    /// Internal invariant break on a table (missing row id, orphan index entry...).
    #[error("table \"{table}\" is corrupted: {message}")]
    CorruptedTable { table: String, message: String },

    /// Use of a dropped or unregistered schema object.
    #[error("{message}")]
    DroppedObject { message: String },

    /// Recognized but unimplemented feature.
    #[error("not supported: {feature}")]
    Unsupported { feature: String },
}

impl Error {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotNullViolation { .. }
            | Error::UniqueViolation { .. }
            | Error::ForeignKeyViolation { .. }
            | Error::CheckViolation { .. }
            | Error::GeneratedColumn { .. }
            | Error::ReadonlyTable { .. } => ErrorKind::Constraint,
            Error::ColumnNotFound { .. }
            | Error::TableNotFound { .. }
            | Error::IndexNotFound { .. }
            | Error::ConstraintNotFound { .. }
            | Error::DuplicateObject { .. }
            | Error::DuplicateColumn { .. }
            | Error::ColumnCountMismatch { .. }
            | Error::InvalidSchema { .. }
            | Error::DependentObjects { .. }
            | Error::InvalidOperation { .. } => ErrorKind::Schema,
            Error::TypeMismatch { .. } | Error::InvalidCast { .. } => ErrorKind::Type,
            Error::DeadTransaction { .. }
            | Error::CorruptedTable { .. }
            | Error::DroppedObject { .. } => ErrorKind::Consistency,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// Returns the machine readable (SQLSTATE style) code of this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotNullViolation { .. } => "23502",
            Error::ForeignKeyViolation { .. } => "23503",
            Error::UniqueViolation { .. } => "23505",
            Error::CheckViolation { .. } => "23514",
            Error::GeneratedColumn { .. } => "428C9",
            Error::ColumnNotFound { .. } => "42703",
            Error::TableNotFound { .. } => "42P01",
            Error::IndexNotFound { .. } | Error::ConstraintNotFound { .. } => "42704",
            Error::DuplicateObject { .. } => "42710",
            Error::DuplicateColumn { .. } => "42701",
            Error::ColumnCountMismatch { .. } => "42601",
            Error::InvalidSchema { .. } => "42P16",
            Error::TypeMismatch { .. } => "42804",
            Error::InvalidCast { .. } => "22P02",
            Error::ReadonlyTable { .. } => "25006",
            Error::DependentObjects { .. } => "2BP01",
            Error::InvalidOperation { .. } => "55000",
            Error::DeadTransaction { .. }
            | Error::CorruptedTable { .. }
            | Error::DroppedObject { .. } => "XX000",
            Error::Unsupported { .. } => "0A000",
        }
    }

    /// Creates a not-null violation error.
    pub fn not_null(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::NotNullViolation {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a unique violation error.
    pub fn unique_violation(index: impl Into<String>, key: impl Into<String>, row: RowId) -> Self {
        Error::UniqueViolation {
            index: index.into(),
            key: key.into(),
            conflicting_row: row,
        }
    }

    /// Creates a foreign key violation error.
    pub fn foreign_key(
        constraint: impl Into<String>,
        table: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::ForeignKeyViolation {
            constraint: constraint.into(),
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a check violation error.
    pub fn check_violation(table: impl Into<String>, constraint: impl Into<String>) -> Self {
        Error::CheckViolation {
            table: table.into(),
            constraint: constraint.into(),
        }
    }

    /// Creates a generated column misuse error.
    pub fn generated_column(column: impl Into<String>, message: impl Into<String>) -> Self {
        Error::GeneratedColumn {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Creates a column not found error.
    pub fn column_not_found(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::ColumnNotFound {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates a table not found error.
    pub fn table_not_found(name: impl Into<String>) -> Self {
        Error::TableNotFound { name: name.into() }
    }

    /// Creates an index not found error.
    pub fn index_not_found(name: impl Into<String>) -> Self {
        Error::IndexNotFound { name: name.into() }
    }

    /// Creates a duplicate object error.
    pub fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        Error::DuplicateObject {
            kind,
            name: name.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Error::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a corrupted table error.
    pub fn corrupted(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::CorruptedTable {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a dropped object error.
    pub fn dropped(message: impl Into<String>) -> Self {
        Error::DroppedObject {
            message: message.into(),
        }
    }

    /// Creates an unsupported feature error.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Error::Unsupported {
            feature: feature.into(),
        }
    }
}
