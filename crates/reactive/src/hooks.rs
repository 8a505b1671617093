//! Table lifecycle hooks: drop, truncate and index changes.

use crate::subscription::{Subscription, SubscriptionManager};
use std::fmt;
use std::rc::Rc;
use tessera_core::{Result, Transaction};

/// A hook observing events of type `E`. Returning an error vetoes the
/// operation that raised the event.
pub type HookFn<E> = dyn Fn(&mut Transaction, &E) -> Result<()>;

/// `DROP TABLE` of the owning table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DropEvent {
    pub table: String,
    pub cascade: bool,
}

/// `TRUNCATE` of the owning table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TruncateEvent {
    pub table: String,
    pub cascade: bool,
    pub restart_identity: bool,
}

/// An index was created on or dropped from the owning table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexEvent {
    Created { table: String, index: String },
    Dropped { table: String, index: String },
}

/// Ordered list of hooks for one event type.
pub struct HookList<E: 'static> {
    manager: Rc<SubscriptionManager<Rc<HookFn<E>>>>,
}

impl<E: 'static> Default for HookList<E> {
    fn default() -> Self {
        Self {
            manager: SubscriptionManager::new(),
        }
    }
}

impl<E: 'static> fmt::Debug for HookList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookList")
            .field("len", &self.manager.len())
            .finish()
    }
}

impl<E: 'static> HookList<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, f: F) -> Subscription
    where
        F: Fn(&mut Transaction, &E) -> Result<()> + 'static,
    {
        let hook: Rc<HookFn<E>> = Rc::new(f);
        self.manager.subscribe(hook)
    }

    /// Runs every hook in registration order, stopping at the first error.
    pub fn fire(&self, txn: &mut Transaction, event: &E) -> Result<()> {
        for hook in self.manager.snapshot() {
            hook(txn, event)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.manager.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manager.is_empty()
    }

    pub fn clear(&self) {
        self.manager.clear();
    }
}
