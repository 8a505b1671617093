//! Table definition for Tessera schemas.
//!
//! A [`TableDef`] is the static description handed to the namespace when a
//! table is created; the live table keeps its own mutable copy afterwards.

use super::column::ColumnDef;
use super::constraint::{CheckDef, ForeignKeyDef, UniqueDef};
use super::index::IndexDef;
use crate::error::{Error, Result};
use crate::expr::ExprRef;
use crate::types::DataType;

/// A table definition.
#[derive(Clone, Debug)]
pub struct TableDef {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Option<UniqueDef>,
    uniques: Vec<UniqueDef>,
    indexes: Vec<IndexDef>,
    foreign_keys: Vec<ForeignKeyDef>,
    checks: Vec<CheckDef>,
}

impl TableDef {
    /// Returns the table name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the columns in declaration order.
    #[inline]
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Gets a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Returns the primary key if defined.
    #[inline]
    pub fn primary_key(&self) -> Option<&UniqueDef> {
        self.primary_key.as_ref()
    }

    #[inline]
    pub fn uniques(&self) -> &[UniqueDef] {
        &self.uniques
    }

    #[inline]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    #[inline]
    pub fn foreign_keys(&self) -> &[ForeignKeyDef] {
        &self.foreign_keys
    }

    #[inline]
    pub fn checks(&self) -> &[CheckDef] {
        &self.checks
    }
}

/// Validates that a name is a plain SQL identifier.
pub fn check_naming_rules(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first = chars
        .next()
        .ok_or_else(|| Error::invalid_schema("name cannot be empty"))?;
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::invalid_schema(format!(
            "name must start with a letter or underscore: {}",
            name
        )));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::invalid_schema(format!(
            "name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}

/// Builder for creating table definitions.
pub struct TableBuilder {
    name: String,
    columns: Vec<ColumnDef>,
    primary_key: Option<UniqueDef>,
    uniques: Vec<UniqueDef>,
    indexes: Vec<IndexDef>,
    foreign_keys: Vec<ForeignKeyDef>,
    checks: Vec<CheckDef>,
}

impl TableBuilder {
    /// Creates a new table builder.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        check_naming_rules(&name)?;
        Ok(Self {
            name,
            columns: Vec::new(),
            primary_key: None,
            uniques: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
        })
    }

    fn require_columns<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in columns {
            if !self.columns.iter().any(|c| c.name() == name) {
                return Err(Error::column_not_found(&self.name, name));
            }
        }
        Ok(())
    }

    /// Adds a nullable column to the table.
    pub fn add_column(self, name: impl Into<String>, data_type: DataType) -> Result<Self> {
        self.column(ColumnDef::new(name, data_type))
    }

    /// Adds a fully specified column.
    pub fn column(mut self, column: ColumnDef) -> Result<Self> {
        check_naming_rules(column.name())?;
        if self.columns.iter().any(|c| c.name() == column.name()) {
            return Err(Error::DuplicateColumn {
                table: self.name.clone(),
                column: column.name().to_string(),
            });
        }
        self.columns.push(column);
        Ok(self)
    }

    /// Marks columns `NOT NULL`.
    pub fn add_not_null(mut self, columns: &[&str]) -> Self {
        for name in columns {
            if let Some(col) = self.columns.iter_mut().find(|c| c.name() == *name) {
                col.set_nullable(false);
            }
        }
        self
    }

    /// Sets the primary key, named `<table>_pkey`.
    pub fn add_primary_key(mut self, columns: &[&str]) -> Result<Self> {
        if self.primary_key.is_some() {
            return Err(Error::invalid_schema(format!(
                "multiple primary keys for table \"{}\" are not allowed",
                self.name
            )));
        }
        self.require_columns(columns.iter().copied())?;
        for name in columns {
            if let Some(col) = self.columns.iter().find(|c| c.name() == *name) {
                if !col.is_indexable() {
                    return Err(Error::invalid_schema(format!(
                        "column is not indexable: {}",
                        name
                    )));
                }
            }
        }
        let name = format!("{}_pkey", self.name);
        self.primary_key = Some(UniqueDef::new(name, columns).primary(true));
        Ok(self)
    }

    /// Adds a unique constraint.
    pub fn add_unique(mut self, name: impl Into<String>, columns: &[&str]) -> Result<Self> {
        let name = name.into();
        check_naming_rules(&name)?;
        self.require_columns(columns.iter().copied())?;
        self.uniques.push(UniqueDef::new(name, columns));
        Ok(self)
    }

    /// Adds a secondary index.
    pub fn add_index(mut self, index: IndexDef) -> Result<Self> {
        check_naming_rules(index.name())?;
        let columns = index.columns();
        self.require_columns(columns.iter().map(String::as_str))?;
        self.indexes.push(index);
        Ok(self)
    }

    /// Adds a foreign key constraint.
    pub fn add_foreign_key(mut self, fk: ForeignKeyDef) -> Result<Self> {
        check_naming_rules(&fk.name)?;
        if fk.local_columns.is_empty() || fk.local_columns.len() != fk.foreign_columns.len() {
            return Err(Error::invalid_schema(format!(
                "foreign key \"{}\" must pair each local column with one referenced column",
                fk.name
            )));
        }
        self.require_columns(fk.local_columns.iter().map(String::as_str))?;
        self.foreign_keys.push(fk);
        Ok(self)
    }

    /// Adds a check constraint.
    pub fn add_check(mut self, name: impl Into<String>, expr: ExprRef) -> Result<Self> {
        let name = name.into();
        check_naming_rules(&name)?;
        self.checks.push(CheckDef::new(name, expr));
        Ok(self)
    }

    /// Builds the table definition.
    ///
    /// Primary key and identity columns are promoted to `NOT NULL`.
    pub fn build(mut self) -> Result<TableDef> {
        if let Some(pk) = &self.primary_key {
            for col in self.columns.iter_mut() {
                if pk.columns.iter().any(|c| c == col.name()) {
                    col.set_nullable(false);
                }
            }
        }
        for col in self.columns.iter_mut() {
            let generated = col.is_serial() as u8
                + col.identity_spec().is_some() as u8
                + col.generated_expr().is_some() as u8;
            if generated > 1 {
                return Err(Error::invalid_schema(format!(
                    "column \"{}\" can only be one of serial, identity or generated",
                    col.name()
                )));
            }
            if (col.is_serial() || col.identity_spec().is_some()) && !col.data_type().is_integer() {
                return Err(Error::invalid_schema(format!(
                    "identity column \"{}\" must have an integer type",
                    col.name()
                )));
            }
            if generated > 0 && col.default().is_some() {
                return Err(Error::invalid_schema(format!(
                    "both default and generation specified for column \"{}\"",
                    col.name()
                )));
            }
            if col.identity_spec().is_some() {
                col.set_nullable(false);
            }
        }
        Ok(TableDef {
            name: self.name,
            columns: self.columns,
            primary_key: self.primary_key,
            uniques: self.uniques,
            indexes: self.indexes,
            foreign_keys: self.foreign_keys,
            checks: self.checks,
        })
    }
}
