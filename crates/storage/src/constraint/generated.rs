//! Generated columns: identity columns fed by a sequence, and computed
//! columns derived from the rest of the row.

use super::Attached;
use crate::sequence::Sequence;
use crate::table::Table;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tessera_core::schema::IdentityMode;
use tessera_core::{Error, ExprRef, Result, Transaction};
use tessera_reactive::{ChangeScope, Overriding, Priority};
use tracing::debug;

/// `GENERATED { ALWAYS | BY DEFAULT } AS IDENTITY`.
///
/// Owns the column's sequence. Value generation on insert happens in the
/// table pipeline; this constraint guards updates of `ALWAYS` columns and
/// restarts the sequence on `TRUNCATE ... RESTART IDENTITY`.
pub struct IdentityConstraint {
    name: String,
    column: Rc<RefCell<String>>,
    attached: Attached,
}

impl IdentityConstraint {
    pub(crate) fn new(table: &str, column: &str) -> Self {
        Self {
            name: format!("{}_{}_seq", table, column),
            column: Rc::new(RefCell::new(column.to_string())),
            attached: Attached::default(),
        }
    }

    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub fn column(&self) -> String {
        self.column.borrow().clone()
    }

    pub(crate) fn install(&self, table: &Table, txn: &mut Transaction) -> Result<()> {
        let column = table.require_column(&self.column())?;
        let spec = column.identity_spec().copied().ok_or_else(|| {
            Error::invalid_schema(format!(
                "column \"{}\" of relation \"{}\" is not an identity column",
                column.name(),
                table.name()
            ))
        })?;
        if column.is_nullable() {
            return Err(Error::invalid_schema(format!(
                "column \"{}\" of relation \"{}\" must be declared NOT NULL before identity can be added",
                column.name(),
                table.name()
            )));
        }
        if !column.data_type().is_integer() {
            return Err(Error::invalid_schema(format!(
                "identity column type must be smallint, integer, or bigint (column \"{}\")",
                column.name()
            )));
        }
        let sequence = Rc::new(Sequence::for_identity(self.name.as_str(), &spec)?);
        table
            .sequences
            .borrow_mut()
            .insert(column.name().to_string(), sequence.clone());

        let owner: Weak<Table> = table.me.clone();
        let watched = self.column.clone();
        let guard = table.bus.on_before_change(
            ChangeScope::columns(&[column.name()]),
            Priority::Normal,
            move |old, new, _, options| {
                let (Some(old), Some(new), Some(table)) = (old, new, owner.upgrade()) else {
                    return Ok(());
                };
                let column = watched.borrow().clone();
                let always = table
                    .column(&column)
                    .and_then(|c| c.identity_spec().map(|s| s.mode == IdentityMode::Always))
                    .unwrap_or(false);
                if always
                    && old.value(&column) != new.value(&column)
                    && options.overriding != Some(Overriding::SystemValue)
                {
                    debug!(table = %table.name(), column = %column, "identity update rejected");
                    return Err(Error::generated_column(
                        column,
                        "column can only be updated to DEFAULT",
                    ));
                }
                Ok(())
            },
        );
        self.attached.hold(guard);

        let restart = table.truncate_hooks.subscribe(move |txn, event| {
            if event.restart_identity {
                sequence.restart(txn)?;
            }
            Ok(())
        });
        self.attached.hold(restart);
        Ok(())
    }

    pub(crate) fn uninstall(&self, table: &Table) {
        self.attached.release();
        let column = self.column();
        let mut sequences = table.sequences.borrow_mut();
        if sequences.get(&column).map_or(false, |s| s.name() == self.name) {
            sequences.remove(&column);
        }
    }

    pub(super) fn attached(&self) -> &Attached {
        &self.attached
    }

    pub(crate) fn rename_column(&self, from: &str, to: &str) {
        let mut column = self.column.borrow_mut();
        if *column == from {
            *column = to.to_string();
        }
    }
}

/// `GENERATED ALWAYS AS (expr) STORED`.
pub struct ComputedConstraint {
    name: String,
    column: Rc<RefCell<String>>,
    expr: ExprRef,
    attached: Attached,
}

impl ComputedConstraint {
    pub(crate) fn new(table: &str, column: &str, expr: ExprRef) -> Self {
        Self {
            name: format!("{}_{}_generated", table, column),
            column: Rc::new(RefCell::new(column.to_string())),
            expr,
            attached: Attached::default(),
        }
    }

    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub fn column(&self) -> String {
        self.column.borrow().clone()
    }

    pub fn expr(&self) -> &ExprRef {
        &self.expr
    }

    /// The generated column followed by the columns it is computed from.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![self.column()];
        columns.extend(self.expr.columns());
        columns
    }

    /// Whether the expression reads `column`.
    pub fn reads(&self, column: &str) -> bool {
        self.expr.columns().iter().any(|c| c == column)
    }

    pub(crate) fn install(&self, table: &Table, txn: &mut Transaction) -> Result<()> {
        let column = table.require_column(&self.column())?;
        let name = column.name().to_string();
        if self.reads(&name) {
            return Err(Error::invalid_schema(format!(
                "generation expression of column \"{}\" cannot reference itself",
                name
            )));
        }
        for dependency in self.expr.columns() {
            table.require_column(&dependency)?;
            let generated = table
                .column(&dependency)
                .map_or(false, |c| c.generated_expr().is_some());
            if generated {
                return Err(Error::invalid_schema(format!(
                    "generation expression of column \"{}\" cannot reference generated column \"{}\"",
                    name, dependency
                )));
            }
        }

        let data_type = column.data_type();
        let nullable = column.is_nullable();
        let expr = self.expr.clone();
        table.rewrite_rows(txn, |row, txn| {
            let value = expr.evaluate(row, txn)?.cast(data_type)?;
            if value.is_null() && !nullable {
                return Err(Error::not_null(row.id().table(), name.as_str()));
            }
            row.set(name.as_str(), value);
            Ok(())
        })?;

        let owner: Weak<Table> = table.me.clone();
        let watched = self.column.clone();
        let expr = self.expr.clone();
        let sub = table.bus.on_before_change(
            ChangeScope::AllColumns,
            Priority::Generate,
            move |old, new, txn, _| {
                let (Some(row), Some(table)) = (new, owner.upgrade()) else {
                    return Ok(());
                };
                let column = watched.borrow().clone();
                match old {
                    None if !row.value(&column).is_null() => {
                        return Err(Error::generated_column(
                            column,
                            "cannot insert a non-DEFAULT value into a generated column",
                        ));
                    }
                    Some(old) if old.value(&column) != row.value(&column) => {
                        return Err(Error::generated_column(
                            column,
                            "column can only be updated to DEFAULT",
                        ));
                    }
                    _ => {}
                }
                let data_type = table.require_column(&column)?.data_type();
                let value = expr.evaluate(row, txn)?.cast(data_type)?;
                row.set(column, value);
                Ok(())
            },
        );
        self.attached.hold(sub);
        Ok(())
    }

    pub(crate) fn uninstall(&self) {
        self.attached.release();
    }

    pub(super) fn attached(&self) -> &Attached {
        &self.attached
    }

    pub(crate) fn rename_column(&self, from: &str, to: &str) {
        let mut column = self.column.borrow_mut();
        if *column == from {
            *column = to.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::options::{InsertOptions, TruncateOptions};
    use crate::table::Table;
    use tessera_core::expr::func;
    use tessera_core::schema::{ColumnDef, IdentityMode, IdentitySpec, TableBuilder};
    use tessera_core::{DataType, RowValues, Transaction, Value};
    use tessera_reactive::{ChangeOptions, Overriding};

    fn identity_table(txn: &mut Transaction, mode: IdentityMode) -> std::rc::Rc<Table> {
        let def = TableBuilder::new("t")
            .unwrap()
            .column(ColumnDef::new("id", DataType::Int64).identity(IdentitySpec::new(mode)))
            .unwrap()
            .add_column("v", DataType::String)
            .unwrap()
            .build()
            .unwrap();
        Table::create(txn, &def).unwrap()
    }

    #[test]
    fn test_identity_by_default_contiguous() {
        let mut txn = Transaction::root();
        let t = identity_table(&mut txn, IdentityMode::ByDefault);
        let ids: Vec<i64> = (0..5)
            .map(|_| {
                t.insert(&mut txn, RowValues::new().set("v", "x"), &InsertOptions::default())
                    .unwrap()
                    .unwrap()
                    .value("id")
                    .as_i64()
                    .unwrap()
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(t.constraint("t_id_seq").unwrap().columns(), vec!["id".to_string()]);
    }

    #[test]
    fn test_identity_always_update_guard() {
        let mut txn = Transaction::root();
        let t = identity_table(&mut txn, IdentityMode::Always);
        let row = t
            .insert(&mut txn, RowValues::new().set("v", "x"), &InsertOptions::default())
            .unwrap()
            .unwrap();
        let err = t.update(&mut txn, row.clone().with("id", 42i64)).unwrap_err();
        assert_eq!(err.code(), "428C9");
        let updated = t
            .update_with(
                &mut txn,
                row.clone().with("id", 42i64),
                &ChangeOptions::new().overriding(Overriding::SystemValue),
            )
            .unwrap();
        assert_eq!(updated.value("id"), &Value::Int64(42));
        assert!(t.update(&mut txn, updated.with("v", "y")).is_ok());
    }

    #[test]
    fn test_truncate_restart_identity() {
        let mut txn = Transaction::root();
        let t = identity_table(&mut txn, IdentityMode::ByDefault);
        let options = InsertOptions::default();
        for _ in 0..3 {
            t.insert(&mut txn, RowValues::new().set("v", "x"), &options).unwrap();
        }
        t.truncate(&mut txn, TruncateOptions::default()).unwrap();
        let row = t
            .insert(&mut txn, RowValues::new().set("v", "x"), &options)
            .unwrap()
            .unwrap();
        assert_eq!(row.value("id"), &Value::Int64(4));

        t.truncate(&mut txn, TruncateOptions::default().restart_identity()).unwrap();
        let row = t
            .insert(&mut txn, RowValues::new().set("v", "x"), &options)
            .unwrap()
            .unwrap();
        assert_eq!(row.value("id"), &Value::Int64(1));
    }

    fn computed_table(txn: &mut Transaction) -> std::rc::Rc<Table> {
        let total = func("a + b", &["a", "b"], |row, _| {
            Ok(match (row.value("a").as_integer(), row.value("b").as_integer()) {
                (Some(a), Some(b)) => Value::Int64(a + b),
                _ => Value::Null,
            })
        });
        let def = TableBuilder::new("t")
            .unwrap()
            .add_column("a", DataType::Int32)
            .unwrap()
            .add_column("b", DataType::Int32)
            .unwrap()
            .column(ColumnDef::new("total", DataType::Int32).generated(total))
            .unwrap()
            .build()
            .unwrap();
        Table::create(txn, &def).unwrap()
    }

    #[test]
    fn test_computed_column() {
        let mut txn = Transaction::root();
        let t = computed_table(&mut txn);
        let options = InsertOptions::default();
        let row = t
            .insert(&mut txn, RowValues::new().set("a", 1).set("b", 2), &options)
            .unwrap()
            .unwrap();
        assert_eq!(row.value("total"), &Value::Int32(3));

        let row = t.update(&mut txn, row.with("a", 10)).unwrap();
        assert_eq!(row.value("total"), &Value::Int32(12));

        let err = t.update(&mut txn, row.with("total", 0)).unwrap_err();
        assert_eq!(err.code(), "428C9");
        let err = t
            .insert(&mut txn, RowValues::new().set("a", 1).set("total", 5), &options)
            .unwrap_err();
        assert_eq!(err.code(), "428C9");
    }

    #[test]
    fn test_computed_column_added_later_backfills() {
        let mut txn = Transaction::root();
        let t = computed_table(&mut txn);
        let options = InsertOptions::default();
        t.insert(&mut txn, RowValues::new().set("a", 2).set("b", 3), &options)
            .unwrap();
        let doubled = func("a * 2", &["a"], |row, _| {
            Ok(row
                .value("a")
                .as_integer()
                .map_or(Value::Null, |a| Value::Int64(a * 2)))
        });
        t.add_column(&mut txn, ColumnDef::new("twice", DataType::Int64).generated(doubled))
            .unwrap();
        let row = t.enumerate(&txn).next().unwrap();
        assert_eq!(row.value("twice"), &Value::Int64(4));
        assert!(t.constraint("t_twice_generated").is_some());
    }
}
