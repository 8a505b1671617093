//! Benchmarks for tessera-storage using criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;
use tessera_core::schema::{ForeignKeyDef, IndexDef, ReferentialAction, TableBuilder};
use tessera_core::{DataType, Row, RowValues, Transaction};
use tessera_storage::{InsertOptions, Namespace, NamespaceConfig, Table};

fn users(txn: &mut Transaction) -> Rc<Table> {
    let def = TableBuilder::new("users")
        .unwrap()
        .add_column("id", DataType::Int64)
        .unwrap()
        .add_column("age", DataType::Int32)
        .unwrap()
        .add_primary_key(&["id"])
        .unwrap()
        .add_index(IndexDef::on_columns("users_age_idx", &["age"]))
        .unwrap()
        .build()
        .unwrap();
    Table::create(txn, &def).unwrap()
}

fn fill(table: &Table, txn: &mut Transaction, size: i64) {
    let options = InsertOptions::default();
    for i in 0..size {
        table
            .insert(
                txn,
                RowValues::new().set("id", i).set("age", (i % 80) as i32),
                &options,
            )
            .unwrap();
    }
}

fn insert_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_insert");

    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut txn = Transaction::root();
                let table = users(&mut txn);
                fill(&table, &mut txn, size);
                black_box(table.row_count(&txn))
            });
        });
    }

    group.finish();
}

fn update_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_update");

    for size in [100, 1000, 10000].iter() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        fill(&table, &mut txn, *size);
        let rows: Vec<Row> = table.enumerate(&txn).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut child = txn.snapshot().fork().unwrap();
                for row in rows.iter().take(100) {
                    let age = row.value("age").as_i32().unwrap_or(0) + 1;
                    table.update(&mut child, row.clone().with("age", age)).unwrap();
                }
                black_box(child.rollback().unwrap())
            });
        });
    }

    group.finish();
}

fn fork_rollback_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("fork_rollback");

    for size in [1000, 10000].iter() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        fill(&table, &mut txn, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut child = txn.snapshot().fork().unwrap();
                table
                    .insert(
                        &mut child,
                        RowValues::new().set("id", size + 1).set("age", 1),
                        &InsertOptions::default(),
                    )
                    .unwrap();
                black_box(child.rollback().unwrap())
            });
        });
    }

    group.finish();
}

fn cascade_delete_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_delete");

    for fan_out in [10, 100, 1000].iter() {
        let ns = Namespace::new("bench", NamespaceConfig::default().auto_create_foreign_key_indices(true));
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
        let root = parent
            .insert(&mut txn, RowValues::new().set("id", 1i64), &options)
            .unwrap()
            .unwrap();
        for _ in 0..*fan_out {
            child
                .insert(&mut txn, RowValues::new().set("parent_id", 1i64), &options)
                .unwrap();
        }
        group.bench_with_input(BenchmarkId::from_parameter(fan_out), fan_out, |b, _| {
            b.iter(|| {
                let mut scratch = txn.snapshot();
                parent.delete(&mut scratch, &root).unwrap();
                black_box(child.row_count(&scratch))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    insert_benchmark,
    update_benchmark,
    fork_rollback_benchmark,
    cascade_delete_benchmark,
);

criterion_main!(benches);
