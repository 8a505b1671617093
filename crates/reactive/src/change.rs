//! Change descriptions passed to observers.

use tessera_core::Row;

/// What a mutation does to a single row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Classifies a change by the presence of its old and new row.
    pub fn of(old: Option<&Row>, new: Option<&Row>) -> Option<Self> {
        match (old, new) {
            (None, Some(_)) => Some(ChangeKind::Insert),
            (Some(_), Some(_)) => Some(ChangeKind::Update),
            (Some(_), None) => Some(ChangeKind::Delete),
            (None, None) => None,
        }
    }
}

/// `OVERRIDING ... VALUE` clause of an insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overriding {
    /// Supplied values win over `GENERATED ALWAYS` identity values.
    SystemValue,
    /// Supplied identity values are replaced by generated ones.
    UserValue,
}

/// Statement-level options visible to every observer of a change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeOptions {
    pub overriding: Option<Overriding>,
    /// Set when the change is the referential action of the named foreign
    /// key, so that constraint does not re-validate its own cascade.
    pub cascade_of: Option<String>,
}

impl ChangeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overriding(mut self, overriding: Overriding) -> Self {
        self.overriding = Some(overriding);
        self
    }

    pub fn cascade_of(mut self, constraint: impl Into<String>) -> Self {
        self.cascade_of = Some(constraint.into());
        self
    }

    /// Returns true if this change is the cascade of `constraint`.
    pub fn is_cascade_of(&self, constraint: &str) -> bool {
        self.cascade_of.as_deref() == Some(constraint)
    }
}
