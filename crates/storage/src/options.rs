//! Statement options for table operations.

use std::fmt;
use std::rc::Rc;
use tessera_core::{Result, Row, RowValues};
use tessera_reactive::{ChangeOptions, Overriding};

/// Computes the assignments of `ON CONFLICT DO UPDATE` from the existing row
/// and the rejected (`excluded`) row.
pub type ConflictUpdateFn = Rc<dyn Fn(&Row, &Row) -> Result<RowValues>>;

/// What to do when an insert hits a unique key.
#[derive(Clone)]
pub enum ConflictAction {
    /// `DO NOTHING`: the insert returns no row.
    Ignore,
    /// `DO UPDATE`: the existing row is updated and returned.
    Update(ConflictUpdateFn),
}

impl fmt::Debug for ConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictAction::Ignore => f.write_str("Ignore"),
            ConflictAction::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// An `ON CONFLICT` clause.
#[derive(Clone, Debug)]
pub struct OnConflict {
    /// Unique index to probe; `None` probes every unique index.
    pub target: Option<String>,
    pub action: ConflictAction,
}

impl OnConflict {
    pub fn ignore() -> Self {
        Self {
            target: None,
            action: ConflictAction::Ignore,
        }
    }

    pub fn update<F>(f: F) -> Self
    where
        F: Fn(&Row, &Row) -> Result<RowValues> + 'static,
    {
        Self {
            target: None,
            action: ConflictAction::Update(Rc::new(f)),
        }
    }

    /// Restricts the probe to one unique index.
    pub fn on(mut self, index: impl Into<String>) -> Self {
        self.target = Some(index.into());
        self
    }
}

/// Options of [`crate::Table::insert`].
#[derive(Clone, Debug, Default)]
pub struct InsertOptions {
    pub overriding: Option<Overriding>,
    pub on_conflict: Option<OnConflict>,
}

impl InsertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overriding(mut self, overriding: Overriding) -> Self {
        self.overriding = Some(overriding);
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = Some(on_conflict);
        self
    }

    pub(crate) fn change_options(&self) -> ChangeOptions {
        ChangeOptions {
            overriding: self.overriding,
            cascade_of: None,
        }
    }
}

/// Options of [`crate::Table::truncate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TruncateOptions {
    /// Restart the sequences of serial and identity columns.
    pub restart_identity: bool,
    /// Also truncate tables referencing this one.
    pub cascade: bool,
}

impl TruncateOptions {
    pub fn restart_identity(mut self) -> Self {
        self.restart_identity = true;
        self
    }

    pub fn cascade(mut self) -> Self {
        self.cascade = true;
        self
    }
}

/// Options of `DROP TABLE`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DropOptions {
    /// Drop foreign keys of other tables referencing this one instead of
    /// failing.
    pub cascade: bool,
}

impl DropOptions {
    pub fn cascade() -> Self {
        Self { cascade: true }
    }
}
