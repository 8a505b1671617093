//! Versioned transaction store.
//!
//! A [`Transaction`] is a handle on one version of the whole key/value space.
//! Tables and indexes never keep their row maps or trees in native fields;
//! they park them in the store under a [`SlotKey`] so that forking a handle
//! forks every table and index at once.
//!
//! All maps are persistent (`im`), so `fork` is O(1) and a write costs
//! O(log n) regardless of how much data the handle can see.

use crate::error::{Error, Result};
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);
static NEXT_TXN: AtomicU64 = AtomicU64::new(1);

type Entry = Rc<dyn Any>;

/// Opaque per-instance key of a value stored in a [`Transaction`].
///
/// Every table, index and sequence allocates its own slot at construction
/// time. The type parameter ties the slot to the type stored under it.
pub struct SlotKey<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> SlotKey<T> {
    /// Allocates a fresh, process-unique slot.
    pub fn new() -> Self {
        Self {
            id: NEXT_SLOT.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }

    /// Returns the raw identifier.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T: 'static> Default for SlotKey<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SlotKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlotKey<T> {}

impl<T> fmt::Debug for SlotKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotKey({})", self.id)
    }
}

/// Lifecycle state of a transaction handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnStatus {
    /// The handle accepts reads and writes.
    Active,
    /// The handle was folded into its parent.
    Committed,
    /// The handle's writes were discarded.
    RolledBack,
}

/// A handle on one version of the key/value space.
///
/// A root handle has no parent. A child is created by [`Transaction::fork`],
/// which consumes the parent so the parent cannot be written while the child
/// is alive; [`Transaction::commit`] and [`Transaction::rollback`] give it
/// back.
///
/// `Clone` produces an alias of the same handle: all aliases share one
/// status, so once any of them is committed or rolled back the others are
/// dead and refuse writes. Use [`Transaction::snapshot`] for an independent
/// copy.
#[derive(Clone)]
pub struct Transaction {
    id: u64,
    /// Everything visible through this handle.
    data: im::HashMap<u64, Entry>,
    /// Writes made since the fork. `None` is a tombstone.
    delta: im::HashMap<u64, Option<Entry>>,
    parent: Option<Box<Transaction>>,
    depth: usize,
    status: Rc<Cell<TxnStatus>>,
}

/// A restore point inside a single handle, used for statement atomicity.
#[derive(Clone)]
pub struct Savepoint {
    txn: u64,
    data: im::HashMap<u64, Entry>,
    delta: im::HashMap<u64, Option<Entry>>,
}

impl Transaction {
    /// Creates an empty root handle.
    pub fn root() -> Self {
        Self {
            id: NEXT_TXN.fetch_add(1, Ordering::Relaxed),
            data: im::HashMap::new(),
            delta: im::HashMap::new(),
            parent: None,
            depth: 0,
            status: Rc::new(Cell::new(TxnStatus::Active)),
        }
    }

    /// Returns the handle identifier.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the nesting depth; a root has depth 0.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if this handle has no parent.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns the lifecycle state.
    #[inline]
    pub fn status(&self) -> TxnStatus {
        self.status.get()
    }

    /// Returns true if the handle still accepts writes.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.get() == TxnStatus::Active
    }

    /// Returns true if the handle has written the slot since it was forked.
    pub fn has_written<T: 'static>(&self, key: &SlotKey<T>) -> bool {
        self.delta.contains_key(&key.id)
    }

    /// Returns the number of slots written since the fork.
    pub fn pending_writes(&self) -> usize {
        self.delta.len()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::DeadTransaction { id: self.id })
        }
    }

    /// Forks a child handle layered on this one.
    pub fn fork(self) -> Result<Transaction> {
        self.ensure_active()?;
        let child = Transaction {
            id: NEXT_TXN.fetch_add(1, Ordering::Relaxed),
            data: self.data.clone(),
            delta: im::HashMap::new(),
            depth: self.depth + 1,
            parent: None,
            status: Rc::new(Cell::new(TxnStatus::Active)),
        };
        debug!(parent = self.id, child = child.id, depth = child.depth, "fork transaction");
        Ok(Transaction {
            parent: Some(Box::new(self)),
            ..child
        })
    }

    /// Folds this handle's writes into its parent and returns the parent.
    ///
    /// This handle, and every alias of it, is dead afterwards.
    pub fn commit(self) -> Result<Transaction> {
        self.ensure_active()?;
        let Transaction {
            id,
            data,
            delta,
            parent,
            status,
            ..
        } = self;
        let mut parent = parent
            .ok_or_else(|| Error::invalid_operation("cannot commit a root transaction"))?;
        parent.ensure_active()?;
        debug!(txn = id, parent = parent.id, writes = delta.len(), "commit transaction");
        parent.data = data;
        for (key, entry) in delta {
            parent.delta.insert(key, entry);
        }
        status.set(TxnStatus::Committed);
        Ok(*parent)
    }

    /// Discards this handle's writes and returns the parent unchanged.
    pub fn rollback(self) -> Result<Transaction> {
        self.ensure_active()?;
        let parent = self
            .parent
            .ok_or_else(|| Error::invalid_operation("cannot roll back a root transaction"))?;
        debug!(txn = self.id, parent = parent.id, writes = self.delta.len(), "rollback transaction");
        self.status.set(TxnStatus::RolledBack);
        Ok(*parent)
    }

    /// Makes every pending write irrevocable.
    ///
    /// All writes in the ancestor chain are folded down to the root and every
    /// level's write-set is emptied. The handle stays active at the same
    /// depth, so later writes can still be rolled back, but nothing written
    /// before this call will be undone by rolling back this handle or any of
    /// its ancestors.
    pub fn full_commit(&mut self) -> Result<()> {
        self.ensure_active()?;
        debug!(txn = self.id, depth = self.depth, "full commit");
        let data = self.data.clone();
        let mut level = Some(self);
        while let Some(txn) = level {
            txn.data = data.clone();
            txn.delta = im::HashMap::new();
            level = txn.parent.as_deref_mut();
        }
        Ok(())
    }

    /// Produces an independent copy of this handle and its ancestor chain.
    ///
    /// Structure is shared, but writes to the copy never reach the source and
    /// vice versa. The copy is active even if the source is dead.
    pub fn snapshot(&self) -> Transaction {
        Transaction {
            id: NEXT_TXN.fetch_add(1, Ordering::Relaxed),
            data: self.data.clone(),
            delta: self.delta.clone(),
            parent: self.parent.as_ref().map(|p| Box::new(p.snapshot())),
            depth: self.depth,
            status: Rc::new(Cell::new(TxnStatus::Active)),
        }
    }

    /// Reads the value stored under a slot.
    pub fn get<T: 'static>(&self, key: &SlotKey<T>) -> Option<&T> {
        self.data.get(&key.id).and_then(|e| e.downcast_ref::<T>())
    }

    /// Binds a value to a slot.
    pub fn set<T: 'static>(&mut self, key: &SlotKey<T>, value: T) -> Result<()> {
        self.ensure_active()?;
        let entry: Entry = Rc::new(value);
        self.data.insert(key.id, entry.clone());
        self.delta.insert(key.id, Some(entry));
        Ok(())
    }

    /// Removes a slot binding. The parent's binding does not leak through.
    pub fn delete<T: 'static>(&mut self, key: &SlotKey<T>) -> Result<()> {
        self.ensure_active()?;
        self.data.remove(&key.id);
        self.delta.insert(key.id, None);
        Ok(())
    }

    /// Applies `f` to a copy of the slot value (or its default) and stores
    /// the result.
    pub fn update<T, R>(&mut self, key: &SlotKey<T>, f: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: Clone + Default + 'static,
    {
        self.ensure_active()?;
        let mut value = self.get(key).cloned().unwrap_or_default();
        let out = f(&mut value);
        self.set(key, value)?;
        Ok(out)
    }

    /// Captures the current state of this handle.
    pub fn savepoint(&self) -> Savepoint {
        Savepoint {
            txn: self.id,
            data: self.data.clone(),
            delta: self.delta.clone(),
        }
    }

    /// Returns this handle to a previously captured state.
    pub fn restore(&mut self, savepoint: Savepoint) -> Result<()> {
        self.ensure_active()?;
        if savepoint.txn != self.id {
            return Err(Error::invalid_operation(format!(
                "savepoint of transaction {} restored on transaction {}",
                savepoint.txn, self.id
            )));
        }
        self.data = savepoint.data;
        self.delta = savepoint.delta;
        Ok(())
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("status", &self.status.get())
            .field("entries", &self.data.len())
            .field("pending_writes", &self.delta.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_delete() {
        let key: SlotKey<i32> = SlotKey::new();
        let mut txn = Transaction::root();
        assert_eq!(txn.get(&key), None);
        txn.set(&key, 5).unwrap();
        assert_eq!(txn.get(&key), Some(&5));
        txn.delete(&key).unwrap();
        assert_eq!(txn.get(&key), None);
    }

    #[test]
    fn test_child_sees_parent() {
        let key: SlotKey<String> = SlotKey::new();
        let mut root = Transaction::root();
        root.set(&key, "a".to_string()).unwrap();
        let child = root.fork().unwrap();
        assert_eq!(child.get(&key).map(String::as_str), Some("a"));
        assert_eq!(child.depth(), 1);
        assert!(!child.is_root());
    }

    #[test]
    fn test_rollback_discards() {
        let key: SlotKey<i32> = SlotKey::new();
        let mut root = Transaction::root();
        root.set(&key, 1).unwrap();
        let mut child = root.fork().unwrap();
        child.set(&key, 2).unwrap();
        let root = child.rollback().unwrap();
        assert_eq!(root.get(&key), Some(&1));
    }

    #[test]
    fn test_delete_in_child_hides_parent() {
        let key: SlotKey<i32> = SlotKey::new();
        let mut root = Transaction::root();
        root.set(&key, 1).unwrap();
        let mut child = root.fork().unwrap();
        child.delete(&key).unwrap();
        assert_eq!(child.get(&key), None);
        let root = child.commit().unwrap();
        assert_eq!(root.get(&key), None);
    }

    #[test]
    fn test_commit_propagates_and_kills_aliases() {
        let key: SlotKey<i32> = SlotKey::new();
        let root = Transaction::root();
        let mut child = root.fork().unwrap();
        child.set(&key, 7).unwrap();
        let mut alias = child.clone();
        let root = child.commit().unwrap();
        assert_eq!(root.get(&key), Some(&7));
        assert_eq!(alias.status(), TxnStatus::Committed);
        let err = alias.set(&key, 8).unwrap_err();
        assert_eq!(err.code(), "XX000");
    }

    #[test]
    fn test_nested_commit_then_outer_rollback() {
        let key: SlotKey<i32> = SlotKey::new();
        let root = Transaction::root();
        let outer = root.fork().unwrap();
        let mut inner = outer.fork().unwrap();
        inner.set(&key, 1).unwrap();
        let outer = inner.commit().unwrap();
        assert_eq!(outer.get(&key), Some(&1));
        let root = outer.rollback().unwrap();
        assert_eq!(root.get(&key), None);
    }

    #[test]
    fn test_full_commit_survives_outer_rollback() {
        let key: SlotKey<i32> = SlotKey::new();
        let root = Transaction::root();
        let mut outer = root.fork().unwrap();
        outer.set(&key, 1).unwrap();
        outer.full_commit().unwrap();
        assert_eq!(outer.depth(), 1);
        outer.set(&key, 2).unwrap();
        let root = outer.rollback().unwrap();
        assert_eq!(root.get(&key), Some(&1));
    }

    #[test]
    fn test_root_commit_is_error() {
        assert!(Transaction::root().commit().is_err());
        assert!(Transaction::root().rollback().is_err());
    }

    #[test]
    fn test_snapshot_is_independent() {
        let key: SlotKey<i32> = SlotKey::new();
        let mut txn = Transaction::root();
        txn.set(&key, 1).unwrap();
        let mut copy = txn.snapshot();
        copy.set(&key, 2).unwrap();
        txn.set(&key, 3).unwrap();
        assert_eq!(copy.get(&key), Some(&2));
        assert_eq!(txn.get(&key), Some(&3));
        assert_ne!(copy.id(), txn.id());
    }

    #[test]
    fn test_savepoint_restore() {
        let key: SlotKey<Vec<i32>> = SlotKey::new();
        let mut txn = Transaction::root();
        txn.update(&key, |v| v.push(1)).unwrap();
        let sp = txn.savepoint();
        txn.update(&key, |v| v.push(2)).unwrap();
        assert_eq!(txn.get(&key), Some(&vec![1, 2]));
        txn.restore(sp).unwrap();
        assert_eq!(txn.get(&key), Some(&vec![1]));
    }

    #[test]
    fn test_savepoint_foreign_handle_rejected() {
        let a = Transaction::root();
        let mut b = Transaction::root();
        assert!(b.restore(a.savepoint()).is_err());
    }

    #[test]
    fn test_fork_dead_handle_fails() {
        let root = Transaction::root();
        let child = root.fork().unwrap();
        let alias = child.clone();
        let _root = child.rollback().unwrap();
        assert!(alias.fork().is_err());
    }
}
