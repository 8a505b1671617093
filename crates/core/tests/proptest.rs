//! Property-based tests for the versioned store using proptest.

use proptest::prelude::*;
use std::collections::BTreeMap;
use tessera_core::{SlotKey, Transaction};

/// One write against one of a few slots.
#[derive(Clone, Debug)]
enum Op {
    Set(usize, i64),
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4, any::<i64>()).prop_map(|(slot, v)| Op::Set(slot, v)),
        (0usize..4).prop_map(Op::Delete),
    ]
}

fn apply(txn: &mut Transaction, slots: &[SlotKey<i64>], model: &mut BTreeMap<usize, i64>, op: &Op) {
    match *op {
        Op::Set(slot, v) => {
            txn.set(&slots[slot], v).unwrap();
            model.insert(slot, v);
        }
        Op::Delete(slot) => {
            txn.delete(&slots[slot]).unwrap();
            model.remove(&slot);
        }
    }
}

fn observe(txn: &Transaction, slots: &[SlotKey<i64>]) -> BTreeMap<usize, i64> {
    slots
        .iter()
        .enumerate()
        .filter_map(|(i, s)| txn.get(s).map(|v| (i, *v)))
        .collect()
}

fn slots() -> Vec<SlotKey<i64>> {
    (0..4).map(|_| SlotKey::new()).collect()
}

proptest! {
    /// Rolling back a fork leaves the parent exactly as it was.
    #[test]
    fn rollback_isolates_writes(
        before in prop::collection::vec(op(), 0..20),
        inside in prop::collection::vec(op(), 0..20),
    ) {
        let slots = slots();
        let mut model = BTreeMap::new();
        let mut txn = Transaction::root();
        for op in &before {
            apply(&mut txn, &slots, &mut model, op);
        }
        let mut child = txn.fork().unwrap();
        let mut scratch = model.clone();
        for op in &inside {
            apply(&mut child, &slots, &mut scratch, op);
        }
        prop_assert_eq!(observe(&child, &slots), scratch);
        let parent = child.rollback().unwrap();
        prop_assert_eq!(observe(&parent, &slots), model);
    }

    /// Committing a fork makes the parent see exactly the child's state.
    #[test]
    fn commit_propagates_writes(
        before in prop::collection::vec(op(), 0..20),
        inside in prop::collection::vec(op(), 0..20),
    ) {
        let slots = slots();
        let mut model = BTreeMap::new();
        let mut txn = Transaction::root();
        for op in &before {
            apply(&mut txn, &slots, &mut model, op);
        }
        let mut child = txn.fork().unwrap();
        for op in &inside {
            apply(&mut child, &slots, &mut model, op);
        }
        let parent = child.commit().unwrap();
        prop_assert_eq!(observe(&parent, &slots), model);
    }

    /// Writes made before a full commit survive rolling back the handle.
    #[test]
    fn full_commit_survives_rollback(
        folded in prop::collection::vec(op(), 0..20),
        discarded in prop::collection::vec(op(), 0..20),
    ) {
        let slots = slots();
        let mut model = BTreeMap::new();
        let mut child = Transaction::root().fork().unwrap();
        for op in &folded {
            apply(&mut child, &slots, &mut model, op);
        }
        child.full_commit().unwrap();
        prop_assert_eq!(child.pending_writes(), 0);
        let mut scratch = model.clone();
        for op in &discarded {
            apply(&mut child, &slots, &mut scratch, op);
        }
        let root = child.rollback().unwrap();
        prop_assert_eq!(observe(&root, &slots), model);
    }

    /// A snapshot is unaffected by later writes to its source.
    #[test]
    fn snapshot_is_independent(
        before in prop::collection::vec(op(), 0..20),
        after in prop::collection::vec(op(), 0..20),
    ) {
        let slots = slots();
        let mut model = BTreeMap::new();
        let mut txn = Transaction::root();
        for op in &before {
            apply(&mut txn, &slots, &mut model, op);
        }
        let snapshot = txn.snapshot();
        let mut scratch = model.clone();
        for op in &after {
            apply(&mut txn, &slots, &mut scratch, op);
        }
        prop_assert_eq!(observe(&snapshot, &slots), model);
        prop_assert_eq!(observe(&txn, &slots), scratch);
    }
}

#[test]
fn test_nested_rollback_then_commit() {
    let slot: SlotKey<i64> = SlotKey::new();
    let mut outer = Transaction::root().fork().unwrap();
    outer.set(&slot, 1).unwrap();
    let mut inner = outer.fork().unwrap();
    inner.set(&slot, 2).unwrap();
    let outer = inner.rollback().unwrap();
    assert_eq!(outer.get(&slot), Some(&1));
    let root = outer.commit().unwrap();
    assert_eq!(root.get(&slot), Some(&1));
    assert!(root.is_root());
}
