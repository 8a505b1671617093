//! Table constraints.
//!
//! Every constraint is one variant of [`Constraint`]. Installing a constraint
//! wires it into a table (an index, change observers, lifecycle hooks);
//! uninstalling releases everything it registered. Released observers are
//! kept until the schema change that released them ends, so a failed change
//! can reattach them. The table never calls
//! into a constraint directly during DML: constraints only act through the
//! subscriptions they hold.

mod check;
mod foreign_key;
mod generated;
mod unique;

pub use check::CheckConstraint;
pub use foreign_key::ForeignKeyConstraint;
pub use generated::{ComputedConstraint, IdentityConstraint};
pub use unique::UniqueConstraint;

use crate::table::Table;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tessera_core::schema::{CheckDef, ForeignKeyDef, UniqueDef};
use tessera_core::{ExprRef, Result, Transaction};
use tessera_reactive::{Detached, Subscription};
use tracing::debug;

/// Installs a wrapper constraint, returning the subscriptions it holds.
pub type WrapperInstallFn = Rc<dyn Fn(&Table, &mut Transaction) -> Result<Vec<Subscription>>>;

/// The kind of a constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Identity,
    Computed,
    Wrapper,
}

/// A constraint attached (or attachable) to a table.
pub enum Constraint {
    Unique(UniqueConstraint),
    ForeignKey(ForeignKeyConstraint),
    Check(CheckConstraint),
    GeneratedIdentity(IdentityConstraint),
    GeneratedComputed(ComputedConstraint),
    /// Arbitrary behavior expressed as change observers and hooks.
    Wrapper(WrapperConstraint),
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("columns", &self.columns())
            .finish()
    }
}

impl Constraint {
    /// A unique or primary key constraint.
    pub fn unique(def: UniqueDef) -> Rc<Constraint> {
        Rc::new(Constraint::Unique(UniqueConstraint::new(def)))
    }

    pub fn check(def: CheckDef) -> Rc<Constraint> {
        Rc::new(Constraint::Check(CheckConstraint::new(def)))
    }

    /// A foreign key referencing `foreign`. The referencing table is the one
    /// the constraint gets installed on.
    pub fn foreign_key(def: ForeignKeyDef, foreign: &Rc<Table>) -> Rc<Constraint> {
        Rc::new(Constraint::ForeignKey(ForeignKeyConstraint::new(def, foreign)))
    }

    /// The identity constraint of `column`, named after its sequence.
    pub fn identity(table: &str, column: &str) -> Rc<Constraint> {
        Rc::new(Constraint::GeneratedIdentity(IdentityConstraint::new(table, column)))
    }

    /// The generation constraint of a computed column.
    pub fn computed(table: &str, column: &str, expr: ExprRef) -> Rc<Constraint> {
        Rc::new(Constraint::GeneratedComputed(ComputedConstraint::new(table, column, expr)))
    }

    pub fn wrapper<F>(name: impl Into<String>, columns: &[&str], install: F) -> Rc<Constraint>
    where
        F: Fn(&Table, &mut Transaction) -> Result<Vec<Subscription>> + 'static,
    {
        Rc::new(Constraint::Wrapper(WrapperConstraint {
            name: name.into(),
            columns: RefCell::new(columns.iter().map(|c| c.to_string()).collect()),
            install: Rc::new(install),
            attached: Attached::default(),
        }))
    }

    pub fn name(&self) -> String {
        match self {
            Constraint::Unique(c) => c.name(),
            Constraint::ForeignKey(c) => c.name(),
            Constraint::Check(c) => c.name(),
            Constraint::GeneratedIdentity(c) => c.name(),
            Constraint::GeneratedComputed(c) => c.name(),
            Constraint::Wrapper(c) => c.name.clone(),
        }
    }

    pub fn kind(&self) -> ConstraintKind {
        match self {
            Constraint::Unique(c) if c.is_primary() => ConstraintKind::PrimaryKey,
            Constraint::Unique(_) => ConstraintKind::Unique,
            Constraint::ForeignKey(_) => ConstraintKind::ForeignKey,
            Constraint::Check(_) => ConstraintKind::Check,
            Constraint::GeneratedIdentity(_) => ConstraintKind::Identity,
            Constraint::GeneratedComputed(_) => ConstraintKind::Computed,
            Constraint::Wrapper(_) => ConstraintKind::Wrapper,
        }
    }

    /// Local columns the constraint is about.
    pub fn columns(&self) -> Vec<String> {
        match self {
            Constraint::Unique(c) => c.columns(),
            Constraint::ForeignKey(c) => c.definition().local_columns,
            Constraint::Check(c) => c.columns(),
            Constraint::GeneratedIdentity(c) => vec![c.column()],
            Constraint::GeneratedComputed(c) => c.columns(),
            Constraint::Wrapper(c) => c.columns.borrow().clone(),
        }
    }

    pub fn as_foreign_key(&self) -> Option<&ForeignKeyConstraint> {
        match self {
            Constraint::ForeignKey(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_unique(&self) -> Option<&UniqueConstraint> {
        match self {
            Constraint::Unique(c) => Some(c),
            _ => None,
        }
    }

    /// Wires the constraint into `table`. On failure nothing stays
    /// registered.
    pub(crate) fn install(self: &Rc<Self>, table: &Table, txn: &mut Transaction) -> Result<()> {
        let result = match self.as_ref() {
            Constraint::Unique(c) => c.install(table, txn),
            Constraint::ForeignKey(c) => c.install(self, table, txn),
            Constraint::Check(c) => c.install(table, txn),
            Constraint::GeneratedIdentity(c) => c.install(table, txn),
            Constraint::GeneratedComputed(c) => c.install(table, txn),
            Constraint::Wrapper(c) => (c.install)(table, txn).map(|subs| {
                for sub in subs {
                    c.attached.hold(sub);
                }
            }),
        };
        if let Err(e) = result {
            debug!(constraint = %self.name(), table = %table.name(), error = %e, "install failed");
            let undone = self.uninstall(table, txn);
            self.forget_released();
            undone?;
            return Err(e);
        }
        debug!(constraint = %self.name(), table = %table.name(), "installed");
        Ok(())
    }

    /// Releases everything the constraint registered on `table`.
    pub(crate) fn uninstall(&self, table: &Table, txn: &mut Transaction) -> Result<()> {
        match self {
            Constraint::Unique(c) => c.uninstall(table, txn),
            Constraint::ForeignKey(c) => c.uninstall(self, table, txn),
            Constraint::Check(c) => {
                c.uninstall();
                Ok(())
            }
            Constraint::GeneratedIdentity(c) => {
                c.uninstall(table);
                Ok(())
            }
            Constraint::GeneratedComputed(c) => {
                c.uninstall();
                Ok(())
            }
            Constraint::Wrapper(c) => {
                c.attached.release();
                Ok(())
            }
        }
    }

    fn attached(&self) -> Option<&Attached> {
        match self {
            Constraint::Unique(_) => None,
            Constraint::ForeignKey(c) => Some(c.attached()),
            Constraint::Check(c) => Some(c.attached()),
            Constraint::GeneratedIdentity(c) => Some(c.attached()),
            Constraint::GeneratedComputed(c) => Some(c.attached()),
            Constraint::Wrapper(c) => Some(&c.attached),
        }
    }

    /// Puts back the observers released by the last uninstall.
    pub(crate) fn reattach(&self) {
        if let Some(attached) = self.attached() {
            attached.reattach();
        }
    }

    /// Makes the last uninstall final.
    pub(crate) fn forget_released(&self) {
        if let Some(attached) = self.attached() {
            attached.forget();
        }
    }

    /// Whether renaming `column` would have to rewrite an opaque expression
    /// or a foreign key.
    pub(crate) fn blocks_rename(&self, column: &str) -> bool {
        match self {
            Constraint::Unique(_) | Constraint::GeneratedIdentity(_) => false,
            Constraint::ForeignKey(c) => c.definition().local_columns.iter().any(|c| c == column),
            Constraint::Check(c) => c.columns().iter().any(|c| c == column),
            Constraint::GeneratedComputed(c) => c.reads(column),
            Constraint::Wrapper(c) => c.columns.borrow().iter().any(|c| c == column),
        }
    }

    /// Follows a column rename of the owning table.
    pub(crate) fn rename_column(&self, from: &str, to: &str) {
        match self {
            Constraint::Unique(c) => c.rename_column(from, to),
            Constraint::GeneratedIdentity(c) => c.rename_column(from, to),
            Constraint::GeneratedComputed(c) => c.rename_column(from, to),
            Constraint::ForeignKey(_) | Constraint::Check(_) | Constraint::Wrapper(_) => {}
        }
    }
}

/// A constraint made of caller-supplied observers.
pub struct WrapperConstraint {
    name: String,
    columns: RefCell<Vec<String>>,
    install: WrapperInstallFn,
    attached: Attached,
}

/// Subscriptions held by an installed constraint, and the ones its last
/// uninstall detached.
#[derive(Default)]
pub(crate) struct Attached {
    live: RefCell<Vec<Subscription>>,
    released: RefCell<Vec<Detached>>,
}

impl Attached {
    pub(crate) fn hold(&self, sub: Subscription) {
        self.live.borrow_mut().push(sub);
    }

    pub(crate) fn release(&self) {
        let subs: Vec<Subscription> = self.live.borrow_mut().drain(..).collect();
        let mut released = self.released.borrow_mut();
        released.extend(subs.into_iter().filter_map(Subscription::detach));
    }

    fn reattach(&self) {
        let released: Vec<Detached> = self.released.borrow_mut().drain(..).collect();
        let mut live = self.live.borrow_mut();
        live.extend(released.into_iter().filter_map(Detached::reattach));
    }

    fn forget(&self) {
        self.released.borrow_mut().clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.live.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::InsertOptions;
    use tessera_core::schema::TableBuilder;
    use tessera_core::{DataType, Error, RowValues, Value};
    use tessera_reactive::ChangeScope;

    fn table(txn: &mut Transaction) -> Rc<Table> {
        let def = TableBuilder::new("t")
            .unwrap()
            .add_column("a", DataType::Int32)
            .unwrap()
            .build()
            .unwrap();
        Table::create(txn, &def).unwrap()
    }

    #[test]
    fn test_wrapper_install_and_drop() {
        let mut txn = Transaction::root();
        let t = table(&mut txn);
        let even = Constraint::wrapper("a_even", &["a"], |table, _| {
            Ok(vec![table.on_before_change(ChangeScope::columns(&["a"]), |_, new, _, _| {
                match new.and_then(|r| r.value("a").as_i32()) {
                    Some(v) if v % 2 != 0 => Err(Error::check_violation("t", "a_even")),
                    _ => Ok(()),
                }
            })])
        });
        t.add_constraint(&mut txn, even).unwrap();
        assert_eq!(t.constraint("a_even").unwrap().kind(), ConstraintKind::Wrapper);

        let options = InsertOptions::default();
        assert!(t.insert(&mut txn, RowValues::new().set("a", 1), &options).is_err());
        assert!(t.insert(&mut txn, RowValues::new().set("a", 2), &options).is_ok());

        t.drop_constraint(&mut txn, "a_even").unwrap();
        let row = t.insert(&mut txn, RowValues::new().set("a", 3), &options).unwrap().unwrap();
        assert_eq!(row.value("a"), &Value::Int32(3));
    }

    #[test]
    fn test_failed_install_releases_subscriptions() {
        let mut txn = Transaction::root();
        let t = table(&mut txn);
        let broken = Constraint::wrapper("broken", &[], |_, _| {
            Err(Error::invalid_schema("cannot install"))
        });
        assert!(t.add_constraint(&mut txn, broken).is_err());
        assert!(t.constraint("broken").is_none());
        assert_eq!(t.bus.before_count(), 0);
    }

    #[test]
    fn test_attached_release() {
        let mut txn = Transaction::root();
        let t = table(&mut txn);
        let attached = Attached::default();
        attached.hold(t.on_before_change(ChangeScope::AllColumns, |_, _, _, _| Ok(())));
        attached.hold(t.on_after_change(ChangeScope::AllColumns, |_, _, _, _| Ok(())));
        assert_eq!(attached.len(), 2);
        attached.release();
        assert_eq!(attached.len(), 0);
        assert_eq!(t.bus.before_count() + t.bus.after_count(), 0);

        attached.reattach();
        assert_eq!(attached.len(), 2);
        assert_eq!(t.bus.before_count(), 1);
        assert_eq!(t.bus.after_count(), 1);

        attached.release();
        attached.forget();
        attached.reattach();
        assert_eq!(attached.len(), 0);
        assert_eq!(t.bus.before_count() + t.bus.after_count(), 0);
    }

    #[test]
    fn test_failed_drop_reattaches_wrapper() {
        let mut txn = Transaction::root();
        let t = table(&mut txn);
        let positive = Constraint::wrapper("a_positive", &["a"], |table, _| {
            Ok(vec![table.on_before_change(ChangeScope::columns(&["a"]), |_, new, _, _| {
                match new.and_then(|r| r.value("a").as_i32()) {
                    Some(v) if v <= 0 => Err(Error::check_violation("t", "a_positive")),
                    _ => Ok(()),
                }
            })])
        });
        t.add_constraint(&mut txn, positive).unwrap();
        let result = t.schema_op(&mut txn, "drop and fail", false, |txn| {
            t.remove_constraint(txn, "a_positive")?;
            assert_eq!(t.bus.before_count(), 0);
            Err::<(), _>(Error::invalid_schema("later step failed"))
        });
        assert!(result.is_err());
        assert!(t.constraint("a_positive").is_some());
        assert_eq!(t.bus.before_count(), 1);
        let options = InsertOptions::default();
        assert!(t.insert(&mut txn, RowValues::new().set("a", -1), &options).is_err());

        t.drop_constraint(&mut txn, "a_positive").unwrap();
        assert_eq!(t.bus.before_count(), 0);
        assert!(t.insert(&mut txn, RowValues::new().set("a", -1), &options).is_ok());
    }
}
