//! Per-table change notification bus.
//!
//! Observers register for "before" or "after" changes, scoped to the whole
//! row or to a set of columns. An insert or delete touches every column; an
//! update touches the columns whose values differ. Each subscription fires at
//! most once per change, however many of its columns were touched.

use crate::change::ChangeOptions;
use crate::subscription::{Subscription, SubscriptionManager};
use hashbrown::HashSet;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tessera_core::{Result, Row, Transaction};
use tracing::trace;

/// Observer run before a change is validated and stored. It may rewrite the
/// new row or veto the change by returning an error.
pub type BeforeChangeFn =
    dyn Fn(Option<&Row>, Option<&mut Row>, &mut Transaction, &ChangeOptions) -> Result<()>;

/// Observer run once a change has passed validation.
pub type AfterChangeFn =
    dyn Fn(Option<&Row>, Option<&Row>, &mut Transaction, &ChangeOptions) -> Result<()>;

/// The columns an observer cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeScope {
    AllColumns,
    Columns(Vec<String>),
}

impl ChangeScope {
    pub fn columns(columns: &[&str]) -> Self {
        ChangeScope::Columns(columns.iter().map(|c| c.to_string()).collect())
    }

    /// `changed` is `None` when every column is affected.
    fn matches(&self, changed: Option<&HashSet<String>>) -> bool {
        match (self, changed) {
            (ChangeScope::AllColumns, _) | (_, None) => true,
            (ChangeScope::Columns(cols), Some(changed)) => cols.iter().any(|c| changed.contains(c)),
        }
    }

    /// Follows a column rename.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if let ChangeScope::Columns(cols) = self {
            for c in cols.iter_mut().filter(|c| c.as_str() == from) {
                *c = to.to_string();
            }
        }
    }
}

/// Dispatch order among before-change observers. Generators rewrite the row
/// and run first so validators see final values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Generate,
    #[default]
    Normal,
}

struct Handler<F: ?Sized> {
    scope: Rc<RefCell<ChangeScope>>,
    priority: Priority,
    callback: Rc<F>,
}

impl<F: ?Sized> Clone for Handler<F> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            priority: self.priority,
            callback: self.callback.clone(),
        }
    }
}

/// Before and after observers of one table.
pub struct ChangeBus {
    before: Rc<SubscriptionManager<Handler<BeforeChangeFn>>>,
    after: Rc<SubscriptionManager<Handler<AfterChangeFn>>>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

fn changed_columns(old: Option<&Row>, new: Option<&Row>) -> Option<HashSet<String>> {
    match (old, new) {
        (Some(old), Some(new)) => Some(old.changed_columns(new).into_iter().collect()),
        _ => None,
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            before: SubscriptionManager::new(),
            after: SubscriptionManager::new(),
        }
    }

    /// Registers a before-change observer.
    pub fn on_before_change<F>(&self, scope: ChangeScope, priority: Priority, f: F) -> Subscription
    where
        F: Fn(Option<&Row>, Option<&mut Row>, &mut Transaction, &ChangeOptions) -> Result<()>
            + 'static,
    {
        self.before.subscribe(Handler {
            scope: Rc::new(RefCell::new(scope)),
            priority,
            callback: Rc::new(f),
        })
    }

    /// Registers an after-change observer.
    pub fn on_after_change<F>(&self, scope: ChangeScope, f: F) -> Subscription
    where
        F: Fn(Option<&Row>, Option<&Row>, &mut Transaction, &ChangeOptions) -> Result<()> + 'static,
    {
        self.after.subscribe(Handler {
            scope: Rc::new(RefCell::new(scope)),
            priority: Priority::Normal,
            callback: Rc::new(f),
        })
    }

    /// Runs the before-change observers affected by a change.
    ///
    /// Generators are matched against the columns the caller changed. The
    /// remaining observers are matched against the row as the generators
    /// left it. The first error aborts dispatch.
    pub fn dispatch_before(
        &self,
        old: Option<&Row>,
        mut new: Option<&mut Row>,
        txn: &mut Transaction,
        options: &ChangeOptions,
    ) -> Result<()> {
        let (generators, validators): (Vec<_>, Vec<_>) = self
            .before
            .snapshot()
            .into_iter()
            .partition(|h| h.priority == Priority::Generate);
        for handlers in [generators, validators] {
            let changed = changed_columns(old, new.as_deref());
            for handler in handlers {
                if handler.scope.borrow().matches(changed.as_ref()) {
                    trace!(priority = ?handler.priority, "before-change observer");
                    (handler.callback)(old, new.as_deref_mut(), txn, options)?;
                }
            }
        }
        Ok(())
    }

    /// Runs the after-change observers affected by a change.
    pub fn dispatch_after(
        &self,
        old: Option<&Row>,
        new: Option<&Row>,
        txn: &mut Transaction,
        options: &ChangeOptions,
    ) -> Result<()> {
        let changed = changed_columns(old, new);
        for handler in self.after.snapshot() {
            if handler.scope.borrow().matches(changed.as_ref()) {
                (handler.callback)(old, new, txn, options)?;
            }
        }
        Ok(())
    }

    /// Rewrites column scopes after a column rename.
    pub fn rename_column(&self, from: &str, to: &str) {
        for handler in self.before.snapshot() {
            handler.scope.borrow_mut().rename_column(from, to);
        }
        for handler in self.after.snapshot() {
            handler.scope.borrow_mut().rename_column(from, to);
        }
    }

    pub fn before_count(&self) -> usize {
        self.before.len()
    }

    pub fn after_count(&self) -> usize {
        self.after.len()
    }

    /// Drops every observer.
    pub fn clear(&self) {
        self.before.clear();
        self.after.clear();
    }
}
