//! Journal of constraint releases made by a running schema change.
//!
//! Uninstalling a constraint detaches its observers from the table buses.
//! While a schema change runs, the released constraints are recorded here so
//! that a failed change can put their observers back. Tables of one
//! namespace share a journal, because a change of one table can release
//! constraints of another (`DROP TABLE ... CASCADE`).

use crate::constraint::Constraint;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

#[derive(Default)]
pub(crate) struct SchemaJournal {
    released: RefCell<Vec<Rc<Constraint>>>,
    /// Number of schema changes in progress.
    depth: Cell<usize>,
}

impl fmt::Debug for SchemaJournal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaJournal")
            .field("released", &self.released.borrow().len())
            .field("depth", &self.depth.get())
            .finish()
    }
}

impl SchemaJournal {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Starts a schema change. Returns the mark to roll back to.
    pub(crate) fn begin(&self) -> usize {
        self.depth.set(self.depth.get() + 1);
        self.released.borrow().len()
    }

    /// Records an uninstalled constraint. Outside a schema change the
    /// release is final right away.
    pub(crate) fn record(&self, constraint: Rc<Constraint>) {
        if self.depth.get() == 0 {
            constraint.forget_released();
            return;
        }
        trace!(constraint = %constraint.name(), "release recorded");
        self.released.borrow_mut().push(constraint);
    }

    /// Ends a successful schema change. Releases become final once the
    /// outermost change ends.
    pub(crate) fn commit(&self) {
        let depth = self.depth.get().saturating_sub(1);
        self.depth.set(depth);
        if depth == 0 {
            let released: Vec<Rc<Constraint>> = self.released.borrow_mut().drain(..).collect();
            for constraint in released {
                constraint.forget_released();
            }
        }
    }

    /// Ends a failed schema change, reattaching what it released since
    /// `mark`, newest first.
    pub(crate) fn rollback(&self, mark: usize) {
        self.depth.set(self.depth.get().saturating_sub(1));
        let released = {
            let mut released = self.released.borrow_mut();
            let mark = mark.min(released.len());
            released.split_off(mark)
        };
        for constraint in released.into_iter().rev() {
            trace!(constraint = %constraint.name(), "release undone");
            constraint.reattach();
        }
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.released.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::expr::func;
    use tessera_core::schema::CheckDef;
    use tessera_core::Value;

    fn check() -> Rc<Constraint> {
        Constraint::check(CheckDef::new("ck", func("true", &[], |_, _| Ok(Value::Boolean(true)))))
    }

    #[test]
    fn test_record_outside_change_is_final() {
        let journal = SchemaJournal::new();
        journal.record(check());
        assert_eq!(journal.pending(), 0);
    }

    #[test]
    fn test_nested_commit_keeps_entries() {
        let journal = SchemaJournal::new();
        let outer = journal.begin();
        journal.begin();
        journal.record(check());
        journal.commit();
        assert_eq!(journal.pending(), 1);
        journal.rollback(outer);
        assert_eq!(journal.pending(), 0);
    }

    #[test]
    fn test_commit_clears() {
        let journal = SchemaJournal::new();
        journal.begin();
        journal.record(check());
        journal.record(check());
        journal.commit();
        assert_eq!(journal.pending(), 0);
    }
}
