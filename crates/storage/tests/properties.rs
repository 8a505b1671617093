//! Property-based tests for tessera-storage using proptest.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tessera_core::schema::{
    ColumnDef, ForeignKeyDef, IdentityMode, IdentitySpec, IndexDef, ReferentialAction, TableBuilder,
};
use tessera_core::{DataType, Row, RowValues, Transaction, Value};
use tessera_storage::{InsertOptions, Namespace, NamespaceConfig, Table};

/// A mutation against a table with a unique `k` and an indexed `v`.
#[derive(Clone, Debug)]
enum Op {
    Insert(i64, i64),
    Update(usize, i64, i64),
    Delete(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..12, 0i64..5).prop_map(|(k, v)| Op::Insert(k, v)),
        (0usize..16, 0i64..12, 0i64..5).prop_map(|(i, k, v)| Op::Update(i, k, v)),
        (0usize..16).prop_map(Op::Delete),
    ]
}

fn keyed_table(txn: &mut Transaction) -> Rc<Table> {
    let def = TableBuilder::new("t")
        .unwrap()
        .add_column("k", DataType::Int64)
        .unwrap()
        .add_column("v", DataType::Int64)
        .unwrap()
        .add_unique("t_k_key", &["k"])
        .unwrap()
        .add_index(IndexDef::on_columns("t_v_idx", &["v"]))
        .unwrap()
        .build()
        .unwrap();
    Table::create(txn, &def).unwrap()
}

/// Applies `op`, ignoring failures, which must leave no trace.
fn apply(table: &Table, txn: &mut Transaction, op: &Op) {
    let rows: Vec<Row> = table.enumerate(txn).collect();
    match *op {
        Op::Insert(k, v) => {
            let _ = table.insert(
                txn,
                RowValues::new().set("k", k).set("v", v),
                &InsertOptions::default(),
            );
        }
        Op::Update(i, k, v) if !rows.is_empty() => {
            let row = rows[i % rows.len()].clone().with("k", k).with("v", v);
            let _ = table.update(txn, row);
        }
        Op::Delete(i) if !rows.is_empty() => {
            let _ = table.delete(txn, &rows[i % rows.len()]);
        }
        _ => {}
    }
}

fn contents(table: &Table, txn: &Transaction) -> BTreeMap<u64, (Value, Value)> {
    table
        .enumerate(txn)
        .map(|r| (r.id().seq(), (r.value("k").clone(), r.value("v").clone())))
        .collect()
}

/// Every index holds exactly the stored rows.
fn assert_indexes_consistent(table: &Table, txn: &Transaction) -> Result<(), TestCaseError> {
    let stored: BTreeSet<u64> = table.enumerate(txn).map(|r| r.id().seq()).collect();
    for index in table.indexes() {
        let indexed: BTreeSet<u64> = index.scan(txn).map(|r| r.id().seq()).collect();
        prop_assert_eq!(&indexed, &stored, "index {}", index.name());
        for row in table.enumerate(txn) {
            let key = index.compute_key(&row, txn).unwrap();
            prop_assert!(index
                .eq(txn, key, true)
                .any(|hit| hit.id() == row.id() && hit == row));
        }
    }
    Ok(())
}

proptest! {
    /// Indexes agree with the stored rows after any sequence of mutations,
    /// including failed ones.
    #[test]
    fn indexes_track_rows(ops in prop::collection::vec(op(), 1..60)) {
        let mut txn = Transaction::root();
        let table = keyed_table(&mut txn);
        for op in &ops {
            apply(&table, &mut txn, op);
            assert_indexes_consistent(&table, &txn)?;
        }
    }

    /// No two stored rows ever share a unique key.
    #[test]
    fn unique_keys_stay_unique(ops in prop::collection::vec(op(), 1..60)) {
        let mut txn = Transaction::root();
        let table = keyed_table(&mut txn);
        for op in &ops {
            apply(&table, &mut txn, op);
        }
        let keys: Vec<Value> = table.enumerate(&txn).map(|r| r.value("k").clone()).collect();
        let distinct: BTreeSet<Value> = keys.iter().cloned().collect();
        prop_assert_eq!(keys.len(), distinct.len());
    }

    /// Rolling back a fork restores rows and indexes, committing keeps them.
    #[test]
    fn rollback_restores_table(
        before in prop::collection::vec(op(), 0..30),
        inside in prop::collection::vec(op(), 1..30),
        commit in any::<bool>(),
    ) {
        let mut txn = Transaction::root();
        let table = keyed_table(&mut txn);
        for op in &before {
            apply(&table, &mut txn, op);
        }
        let expected = contents(&table, &txn);
        let mut child = txn.fork().unwrap();
        for op in &inside {
            apply(&table, &mut child, op);
        }
        let changed = contents(&table, &child);
        let parent = if commit { child.commit().unwrap() } else { child.rollback().unwrap() };
        if commit {
            prop_assert_eq!(contents(&table, &parent), changed);
        } else {
            prop_assert_eq!(contents(&table, &parent), expected);
        }
        assert_indexes_consistent(&table, &parent)?;
    }

    /// Identity values are handed out in order, and a failed insert does not
    /// consume one.
    #[test]
    fn identity_values_are_contiguous(names in prop::collection::vec(prop::option::of("[a-z]{1,4}"), 1..30)) {
        let mut txn = Transaction::root();
        let def = TableBuilder::new("t")
            .unwrap()
            .column(
                ColumnDef::new("id", DataType::Int64)
                    .identity(IdentitySpec::new(IdentityMode::ByDefault).start(10).increment(5)),
            )
            .unwrap()
            .column(ColumnDef::new("name", DataType::String).not_null())
            .unwrap()
            .build()
            .unwrap();
        let table = Table::create(&mut txn, &def).unwrap();
        let mut next = 10i64;
        for name in names {
            let values = match &name {
                Some(n) => RowValues::new().set("name", n.as_str()),
                None => RowValues::new(),
            };
            let result = table.insert(&mut txn, values, &InsertOptions::default());
            match name {
                Some(_) => {
                    let row = result.unwrap().unwrap();
                    prop_assert_eq!(row.value("id"), &Value::Int64(next));
                    next += 5;
                }
                None => prop_assert!(result.is_err()),
            }
        }
    }

    /// Deleting parents with `ON DELETE CASCADE` leaves no orphan children.
    #[test]
    fn cascade_leaves_no_orphans(
        children in prop::collection::vec(0i64..6, 0..30),
        doomed in prop::collection::btree_set(0i64..6, 0..6),
    ) {
        let ns = Namespace::new("public", NamespaceConfig::default());
        let mut txn = Transaction::root();
        let parent = TableBuilder::new("parent")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap();
        let child = TableBuilder::new("child")
            .unwrap()
            .add_column("parent_id", DataType::Int64)
            .unwrap()
            .add_foreign_key(
                ForeignKeyDef::new("child_parent_fkey", &["parent_id"], "parent", &["id"])
                    .on_delete(ReferentialAction::Cascade),
            )
            .unwrap()
            .build()
            .unwrap();
        let parent = ns.create_table(&mut txn, &parent).unwrap();
        let child = ns.create_table(&mut txn, &child).unwrap();
        let options = InsertOptions::default();
        for id in 0..6i64 {
            parent.insert(&mut txn, RowValues::new().set("id", id), &options).unwrap();
        }
        for &p in &children {
            child.insert(&mut txn, RowValues::new().set("parent_id", p), &options).unwrap();
        }
        let rows: Vec<Row> = parent.enumerate(&txn).collect();
        for row in rows {
            if let Value::Int64(id) = row.value("id") {
                if doomed.contains(id) {
                    parent.delete(&mut txn, &row).unwrap();
                }
            }
        }
        let remaining = children.iter().filter(|p| !doomed.contains(p)).count();
        prop_assert_eq!(child.row_count(&txn), remaining);
        for row in child.enumerate(&txn) {
            let key = RowValues::new().set("id", row.value("parent_id").clone());
            prop_assert_eq!(parent.find(&txn, &key, None).unwrap().count(), 1);
        }
    }
}
