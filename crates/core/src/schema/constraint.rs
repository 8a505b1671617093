//! Constraint definitions for Tessera schemas.

use crate::expr::ExprRef;

/// Referential action taken when a referenced row is updated or deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ReferentialAction {
    /// Reject the change if dependent rows exist.
    #[default]
    NoAction,
    /// Same as `NoAction`; constraints are never deferred here.
    Restrict,
    /// Propagate the update, or delete the dependent rows.
    Cascade,
    /// Null out the referencing columns.
    SetNull,
    /// Reset the referencing columns to their defaults.
    SetDefault,
}

/// Foreign key specification.
#[derive(Clone, Debug)]
pub struct ForeignKeyDef {
    /// Constraint name.
    pub name: String,
    /// Referencing columns of the local table.
    pub local_columns: Vec<String>,
    /// Referenced table name.
    pub foreign_table: String,
    /// Referenced columns, paired with `local_columns` by position.
    pub foreign_columns: Vec<String>,
    /// Action on referenced row delete.
    pub on_delete: ReferentialAction,
    /// Action on referenced key update.
    pub on_update: ReferentialAction,
}

impl ForeignKeyDef {
    /// Creates a new foreign key specification.
    pub fn new(
        name: impl Into<String>,
        local_columns: &[&str],
        foreign_table: impl Into<String>,
        foreign_columns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            local_columns: local_columns.iter().map(|c| c.to_string()).collect(),
            foreign_table: foreign_table.into(),
            foreign_columns: foreign_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    /// Sets the delete action.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Sets the update action.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }
}

/// A unique or primary key constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniqueDef {
    pub name: String,
    pub columns: Vec<String>,
    pub primary: bool,
}

impl UniqueDef {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            primary: false,
        }
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }
}

/// A check constraint.
#[derive(Clone, Debug)]
pub struct CheckDef {
    pub name: String,
    /// Boolean expression; false rejects the row, null passes.
    pub expr: ExprRef,
}

impl CheckDef {
    pub fn new(name: impl Into<String>, expr: ExprRef) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}
