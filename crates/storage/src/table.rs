//! Live tables and the row mutation pipeline.
//!
//! A [`Table`] keeps its schema (columns, indexes, constraints) in native
//! fields and its rows in the [`Transaction`], under its own slot. Every
//! insert, update and delete runs the same pipeline:
//!
//! 1. compute the new row (defaults, serial and identity values, casts)
//! 2. before-change observers, generators first
//! 3. `ON CONFLICT` probing (insert only)
//! 4. not-null checks
//! 5. after-change observers
//! 6. index maintenance: validate every index, remove the old row, add the new one
//! 7. store the row
//!
//! Each statement runs under a savepoint: if any step fails, every write it
//! made (including cascaded writes to other tables) is undone.

use crate::constraint::Constraint;
use crate::journal::SchemaJournal;
use crate::namespace::Namespace;
use crate::options::{ConflictAction, InsertOptions};
use crate::sequence::Sequence;
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tessera_core::schema::{ColumnDef, IdentityMode};
use tessera_core::{Error, ExprRef, Result, Row, RowId, RowValues, SlotKey, Transaction, Value};
use tessera_index::{IndexKey, OrderedIndex, RowIter};
use tessera_reactive::{
    ChangeBus, ChangeOptions, ChangeScope, DropEvent, HookList, IndexEvent, Overriding, Priority,
    Subscription, TruncateEvent,
};
use tracing::{debug, trace, warn};

/// Rows of a table by id, as stored in a transaction.
pub type RowMap = im::OrdMap<RowId, Row>;

/// A table.
pub struct Table {
    pub(crate) me: Weak<Table>,
    pub(crate) name: RefCell<String>,
    pub(crate) columns: RefCell<Vec<ColumnDef>>,
    pub(crate) indexes: RefCell<Vec<Rc<OrderedIndex>>>,
    pub(crate) primary: RefCell<Option<Rc<OrderedIndex>>>,
    pub(crate) constraints: RefCell<Vec<Rc<Constraint>>>,
    /// Foreign keys of other tables (or this one) pointing at this table.
    pub(crate) referenced_by: RefCell<Vec<Rc<Constraint>>>,
    /// Sequences of serial and identity columns, by column.
    pub(crate) sequences: RefCell<HashMap<String, Rc<Sequence>>>,
    pub(crate) rows: SlotKey<RowMap>,
    counter: Cell<u64>,
    readonly: Cell<bool>,
    hidden: Cell<bool>,
    dropped: Cell<bool>,
    pub(crate) namespace: RefCell<Weak<Namespace>>,
    /// Shared with the other tables of the namespace.
    pub(crate) journal: Rc<SchemaJournal>,
    pub(crate) bus: ChangeBus,
    pub(crate) drop_hooks: HookList<DropEvent>,
    pub(crate) truncate_hooks: HookList<TruncateEvent>,
    pub(crate) index_hooks: HookList<IndexEvent>,
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name.borrow())
            .field("columns", &self.columns.borrow().len())
            .field("indexes", &self.indexes.borrow().len())
            .field("constraints", &self.constraints.borrow().len())
            .field("dropped", &self.dropped.get())
            .finish()
    }
}

impl Table {
    pub(crate) fn new(name: &str, namespace: Weak<Namespace>) -> Rc<Table> {
        let journal = namespace
            .upgrade()
            .map_or_else(SchemaJournal::new, |ns| ns.journal());
        Rc::new_cyclic(|me| Table {
            me: me.clone(),
            name: RefCell::new(name.to_string()),
            columns: RefCell::new(Vec::new()),
            indexes: RefCell::new(Vec::new()),
            primary: RefCell::new(None),
            constraints: RefCell::new(Vec::new()),
            referenced_by: RefCell::new(Vec::new()),
            sequences: RefCell::new(HashMap::new()),
            rows: SlotKey::new(),
            counter: Cell::new(0),
            readonly: Cell::new(false),
            hidden: Cell::new(false),
            dropped: Cell::new(false),
            namespace: RefCell::new(namespace),
            journal,
            bus: ChangeBus::new(),
            drop_hooks: HookList::new(),
            truncate_hooks: HookList::new(),
            index_hooks: HookList::new(),
        })
    }

    // ---------------------------------------------------------------------
    // Schema accessors
    // ---------------------------------------------------------------------

    /// Returns the table name.
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    /// Returns the columns in declaration order.
    pub fn columns(&self) -> Vec<ColumnDef> {
        self.columns.borrow().clone()
    }

    /// Gets a column by name.
    pub fn column(&self, name: &str) -> Option<ColumnDef> {
        self.columns.borrow().iter().find(|c| c.name() == name).cloned()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.borrow().iter().any(|c| c.name() == name)
    }

    pub(crate) fn require_column(&self, name: &str) -> Result<ColumnDef> {
        self.column(name)
            .ok_or_else(|| Error::column_not_found(self.name(), name))
    }

    /// Returns every index, constraint-owned ones included.
    pub fn indexes(&self) -> Vec<Rc<OrderedIndex>> {
        self.indexes.borrow().clone()
    }

    /// Gets an index by name.
    pub fn index(&self, name: &str) -> Option<Rc<OrderedIndex>> {
        self.indexes.borrow().iter().find(|i| i.name() == name).cloned()
    }

    /// Returns the primary key index.
    pub fn primary_key(&self) -> Option<Rc<OrderedIndex>> {
        self.primary.borrow().clone()
    }

    /// Returns the index whose key expressions are exactly `exprs`, in any
    /// order. Partial indexes are never returned.
    pub fn get_index(&self, exprs: &[ExprRef]) -> Option<Rc<OrderedIndex>> {
        let wanted: Vec<String> = exprs.iter().map(|e| e.hash_key()).collect();
        self.find_index_by_keys(&wanted)
    }

    /// Returns the index over exactly these columns, in any order.
    pub fn get_index_on(&self, columns: &[&str]) -> Option<Rc<OrderedIndex>> {
        let wanted: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        self.find_index_by_keys(&wanted)
    }

    fn find_index_by_keys(&self, wanted: &[String]) -> Option<Rc<OrderedIndex>> {
        let mut wanted = wanted.to_vec();
        wanted.sort();
        wanted.dedup();
        self.indexes
            .borrow()
            .iter()
            .find(|idx| {
                let mut keys = idx.key_hashes();
                keys.sort();
                keys.dedup();
                keys == wanted && idx.definition().partial_predicate().is_none()
            })
            .cloned()
    }

    /// Gets a constraint by name.
    pub fn constraint(&self, name: &str) -> Option<Rc<Constraint>> {
        self.constraints
            .borrow()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub fn constraints(&self) -> Vec<Rc<Constraint>> {
        self.constraints.borrow().clone()
    }

    /// Returns the sequence feeding a serial or identity column.
    pub fn sequence(&self, column: &str) -> Option<Rc<Sequence>> {
        self.sequences.borrow().get(column).cloned()
    }

    pub fn namespace(&self) -> Option<Rc<Namespace>> {
        self.namespace.borrow().upgrade()
    }

    #[inline]
    pub fn is_readonly(&self) -> bool {
        self.readonly.get()
    }

    pub fn set_readonly(&self, readonly: bool) {
        self.readonly.set(readonly);
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
    }

    #[inline]
    pub fn is_dropped(&self) -> bool {
        self.dropped.get()
    }

    pub(crate) fn mark_dropped(&self) {
        self.dropped.set(true);
    }

    pub(crate) fn check_alive(&self) -> Result<()> {
        if self.dropped.get() {
            Err(Error::dropped(format!(
                "relation \"{}\" has been dropped",
                self.name()
            )))
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_writable(&self) -> Result<()> {
        self.check_alive()?;
        if self.readonly.get() {
            return Err(Error::ReadonlyTable { table: self.name() });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Subscriptions
    // ---------------------------------------------------------------------

    /// Observes changes before they are validated. The observer may rewrite
    /// the new row or veto the change.
    pub fn on_before_change<F>(&self, scope: ChangeScope, f: F) -> Subscription
    where
        F: Fn(Option<&Row>, Option<&mut Row>, &mut Transaction, &ChangeOptions) -> Result<()>
            + 'static,
    {
        self.bus.on_before_change(scope, Priority::Normal, f)
    }

    /// Observes changes that passed validation, before they are stored.
    pub fn on_after_change<F>(&self, scope: ChangeScope, f: F) -> Subscription
    where
        F: Fn(Option<&Row>, Option<&Row>, &mut Transaction, &ChangeOptions) -> Result<()> + 'static,
    {
        self.bus.on_after_change(scope, f)
    }

    pub fn on_truncate<F>(&self, f: F) -> Subscription
    where
        F: Fn(&mut Transaction, &TruncateEvent) -> Result<()> + 'static,
    {
        self.truncate_hooks.subscribe(f)
    }

    pub fn on_drop<F>(&self, f: F) -> Subscription
    where
        F: Fn(&mut Transaction, &DropEvent) -> Result<()> + 'static,
    {
        self.drop_hooks.subscribe(f)
    }

    pub fn on_index<F>(&self, f: F) -> Subscription
    where
        F: Fn(&mut Transaction, &IndexEvent) -> Result<()> + 'static,
    {
        self.index_hooks.subscribe(f)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    pub(crate) fn row_map(&self, txn: &Transaction) -> RowMap {
        txn.get(&self.rows).cloned().unwrap_or_default()
    }

    /// Gets a row by id.
    pub fn get(&self, txn: &Transaction, id: &RowId) -> Option<Row> {
        txn.get(&self.rows).and_then(|rows| rows.get(id).cloned())
    }

    /// Returns the number of rows.
    pub fn row_count(&self, txn: &Transaction) -> usize {
        txn.get(&self.rows).map_or(0, |rows| rows.len())
    }

    /// Scans every row in insertion order. Rows are copies.
    pub fn enumerate(&self, txn: &Transaction) -> RowIter {
        Box::new(self.row_map(txn).into_iter().map(|(_, row)| row))
    }

    /// Finds the rows whose values equal the template on `columns` (every
    /// template column when `None`). Nulls in the template match nulls.
    ///
    /// Uses an index over exactly those columns when one exists.
    pub fn find(
        &self,
        txn: &Transaction,
        template: &RowValues,
        columns: Option<&[&str]>,
    ) -> Result<RowIter> {
        let names: Vec<String> = match columns {
            Some(cols) => cols.iter().map(|c| c.to_string()).collect(),
            None => template.iter().map(|(c, _)| c.clone()).collect(),
        };
        let mut wanted = Vec::with_capacity(names.len());
        for name in &names {
            let column = self.require_column(name)?;
            let value = match template.get(name) {
                Some(v) => v.cast(column.data_type())?,
                None => Value::Null,
            };
            wanted.push((name.clone(), value));
        }
        if wanted.is_empty() {
            return Ok(self.enumerate(txn));
        }
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        if let Some(index) = self.get_index_on(&refs) {
            let key = index
                .key_hashes()
                .iter()
                .map(|k| {
                    wanted
                        .iter()
                        .find(|(c, _)| c == k)
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null)
                })
                .collect::<Vec<_>>();
            trace!(table = %self.name(), index = %index.name(), "find through index");
            return Ok(index.eq(txn, IndexKey::new(key), true));
        }
        Ok(Box::new(self.enumerate(txn).filter(move |row| {
            wanted.iter().all(|(c, v)| row.value(c) == v)
        })))
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Inserts a row built from `values`; absent columns take their default.
    ///
    /// Returns `None` when an `ON CONFLICT DO NOTHING` clause swallowed the
    /// insert, and the updated existing row for `ON CONFLICT DO UPDATE`.
    pub fn insert(
        &self,
        txn: &mut Transaction,
        values: RowValues,
        options: &InsertOptions,
    ) -> Result<Option<Row>> {
        self.check_writable()?;
        atomically(txn, |txn| self.insert_row(txn, values, options))
    }

    /// Positional insert.
    pub fn insert_values(
        &self,
        txn: &mut Transaction,
        columns: &[&str],
        values: Vec<Value>,
        options: &InsertOptions,
    ) -> Result<Option<Row>> {
        if columns.len() != values.len() {
            return Err(Error::ColumnCountMismatch {
                expected: columns.len(),
                got: values.len(),
            });
        }
        let row: RowValues = columns.iter().copied().zip(values).collect();
        self.insert(txn, row, options)
    }

    /// Replaces a stored row (matched by id) with `row`. Columns missing from
    /// `row` keep their current value.
    pub fn update(&self, txn: &mut Transaction, row: Row) -> Result<Row> {
        self.update_with(txn, row, &ChangeOptions::default())
    }

    /// [`Table::update`] with explicit change options.
    pub fn update_with(&self, txn: &mut Transaction, row: Row, options: &ChangeOptions) -> Result<Row> {
        self.check_writable()?;
        atomically(txn, |txn| self.update_row(txn, row, options))
    }

    /// Deletes a stored row (matched by id) and returns it.
    pub fn delete(&self, txn: &mut Transaction, row: &Row) -> Result<Row> {
        self.check_writable()?;
        let options = ChangeOptions::default();
        atomically(txn, |txn| self.delete_row(txn, row.id(), &options))
    }

    fn insert_row(
        &self,
        txn: &mut Transaction,
        values: RowValues,
        options: &InsertOptions,
    ) -> Result<Option<Row>> {
        let change = options.change_options();
        let mut row = self.build_row(txn, values, options.overriding)?;
        trace!(table = %self.name(), row = %row.id(), "insert");

        self.bus.dispatch_before(None, Some(&mut row), txn, &change)?;

        if let Some(on_conflict) = &options.on_conflict {
            if let Some(existing) = self.find_conflict(txn, &row, on_conflict.target.as_deref())? {
                return match &on_conflict.action {
                    ConflictAction::Ignore => {
                        trace!(table = %self.name(), existing = %existing.id(), "on conflict do nothing");
                        Ok(None)
                    }
                    ConflictAction::Update(assign) => {
                        let assignments = assign(&existing, &row)?;
                        let mut updated = existing;
                        for (column, value) in assignments.iter() {
                            updated.set(column.clone(), value.clone());
                        }
                        trace!(table = %self.name(), row = %updated.id(), "on conflict do update");
                        self.update_row(txn, updated, &change).map(Some)
                    }
                };
            }
        }

        self.check_not_null(&row)?;
        self.bus.dispatch_after(None, Some(&row), txn, &change)?;
        self.maintain_indexes(txn, None, Some(&row))?;
        self.store_row(txn, row.clone())?;
        Ok(Some(row))
    }

    pub(crate) fn update_row(
        &self,
        txn: &mut Transaction,
        mut row: Row,
        options: &ChangeOptions,
    ) -> Result<Row> {
        let old = self.get(txn, row.id()).ok_or_else(|| {
            Error::corrupted(self.name(), format!("cannot update row {}: not found", row.id()))
        })?;
        let columns = self.columns();
        if let Some(unknown) = row
            .values()
            .keys()
            .find(|k| !columns.iter().any(|c| c.name() == k.as_str()))
        {
            return Err(Error::column_not_found(self.name(), unknown.as_str()));
        }
        for column in &columns {
            let value = match row.get(column.name()) {
                Some(v) => v.cast(column.data_type())?,
                None => old.value(column.name()).clone(),
            };
            row.set(column.name(), value);
        }
        trace!(table = %self.name(), row = %row.id(), "update");

        self.bus.dispatch_before(Some(&old), Some(&mut row), txn, options)?;
        self.check_not_null(&row)?;
        self.bus.dispatch_after(Some(&old), Some(&row), txn, options)?;
        self.maintain_indexes(txn, Some(&old), Some(&row))?;
        self.store_row(txn, row.clone())?;
        Ok(row)
    }

    pub(crate) fn delete_row(
        &self,
        txn: &mut Transaction,
        id: &RowId,
        options: &ChangeOptions,
    ) -> Result<Row> {
        let old = self.get(txn, id).ok_or_else(|| {
            Error::corrupted(self.name(), format!("cannot delete row {}: not found", id))
        })?;
        trace!(table = %self.name(), row = %id, "delete");

        self.bus.dispatch_before(Some(&old), None, txn, options)?;
        self.bus.dispatch_after(Some(&old), None, txn, options)?;
        self.maintain_indexes(txn, Some(&old), None)?;
        txn.update(&self.rows, |rows: &mut RowMap| rows.remove(id))?;
        Ok(old)
    }

    /// Builds a full row from caller values: casts, identity rules, serial
    /// values and defaults. Supplied values are placed first so defaults can
    /// read them.
    fn build_row(
        &self,
        txn: &mut Transaction,
        values: RowValues,
        overriding: Option<Overriding>,
    ) -> Result<Row> {
        let columns = self.columns();
        let mut supplied = values.into_map();
        if let Some(unknown) = supplied
            .keys()
            .find(|k| !columns.iter().any(|c| c.name() == k.as_str()))
        {
            return Err(Error::column_not_found(self.name(), unknown.as_str()));
        }

        let seq = self.counter.get() + 1;
        self.counter.set(seq);
        let mut row = Row::new(RowId::new(&self.name(), seq), BTreeMap::new());

        let mut absent = Vec::new();
        for column in &columns {
            match supplied.remove(column.name()) {
                Some(value) => {
                    let value = match column.identity_spec() {
                        Some(spec) => self.identity_value(txn, column, spec.mode, value, overriding)?,
                        None => value,
                    };
                    row.set(column.name(), value.cast(column.data_type())?);
                }
                None => absent.push(column),
            }
        }
        for column in absent {
            let value = if let Some(sequence) = self.sequence(column.name()) {
                Value::integer(column.data_type(), sequence.next_value(txn)?)?
            } else if let Some(default) = column.default() {
                default.evaluate(&row, txn)?.cast(column.data_type())?
            } else {
                Value::Null
            };
            row.set(column.name(), value);
        }
        Ok(row)
    }

    /// Decides between a supplied identity value and a generated one.
    fn identity_value(
        &self,
        txn: &mut Transaction,
        column: &ColumnDef,
        mode: IdentityMode,
        supplied: Value,
        overriding: Option<Overriding>,
    ) -> Result<Value> {
        match (mode, overriding) {
            (_, Some(Overriding::UserValue)) => {
                let sequence = self.sequence(column.name()).ok_or_else(|| {
                    Error::corrupted(
                        self.name(),
                        format!("identity column \"{}\" has no sequence", column.name()),
                    )
                })?;
                Value::integer(column.data_type(), sequence.next_value(txn)?)
            }
            (IdentityMode::ByDefault, _) | (IdentityMode::Always, Some(Overriding::SystemValue)) => {
                Ok(supplied)
            }
            (IdentityMode::Always, None) => Err(Error::generated_column(
                column.name(),
                "cannot insert a non-DEFAULT value into column defined as GENERATED ALWAYS; use OVERRIDING SYSTEM VALUE to override",
            )),
        }
    }

    fn check_not_null(&self, row: &Row) -> Result<()> {
        let columns = self.columns.borrow();
        for column in columns.iter().filter(|c| !c.is_nullable()) {
            if row.value(column.name()).is_null() {
                debug!(table = %self.name.borrow(), column = column.name(), "not-null violation");
                return Err(Error::not_null(self.name.borrow().as_str(), column.name()));
            }
        }
        Ok(())
    }

    /// Returns an existing row sharing a unique key with `row`.
    fn find_conflict(
        &self,
        txn: &Transaction,
        row: &Row,
        target: Option<&str>,
    ) -> Result<Option<Row>> {
        let candidates = match target {
            Some(name) => {
                let index = self
                    .index(name)
                    .ok_or_else(|| Error::index_not_found(name))?;
                if !index.is_unique() {
                    return Err(Error::invalid_operation(format!(
                        "there is no unique or exclusion constraint matching the ON CONFLICT specification (index \"{}\")",
                        name
                    )));
                }
                vec![index]
            }
            None => self.indexes().into_iter().filter(|i| i.is_unique()).collect(),
        };
        for index in candidates {
            if let Some(existing) = index.find_conflict(txn, row)? {
                return Ok(Some(existing));
            }
        }
        Ok(None)
    }

    /// Validates the new row against every index before touching any, so a
    /// failure leaves all indexes unchanged.
    fn maintain_indexes(
        &self,
        txn: &mut Transaction,
        old: Option<&Row>,
        new: Option<&Row>,
    ) -> Result<()> {
        let indexes = self.indexes();
        if let Some(new) = new {
            for index in &indexes {
                index.check_add(txn, new)?;
            }
        }
        if let Some(old) = old {
            for index in &indexes {
                index.delete(txn, old)?;
            }
        }
        if let Some(new) = new {
            for index in &indexes {
                index.add(txn, new)?;
            }
        }
        Ok(())
    }

    fn store_row(&self, txn: &mut Transaction, row: Row) -> Result<()> {
        txn.update(&self.rows, move |rows: &mut RowMap| {
            rows.insert(row.id().clone(), row);
        })
    }

    /// Rewrites every stored row in place, bypassing observers, then rebuilds
    /// every index. Indexes hold row copies, so even indexes not reading the
    /// rewritten columns are refreshed.
    pub(crate) fn rewrite_rows<F>(&self, txn: &mut Transaction, mut f: F) -> Result<()>
    where
        F: FnMut(&mut Row, &mut Transaction) -> Result<()>,
    {
        let rows = self.row_map(txn);
        let mut rewritten = rows.clone();
        for (id, mut row) in rows {
            f(&mut row, txn)?;
            rewritten.insert(id, row);
        }
        txn.set(&self.rows, rewritten)?;
        self.rebuild_indexes(txn)
    }

    pub(crate) fn rebuild_indexes(&self, txn: &mut Transaction) -> Result<()> {
        for index in self.indexes() {
            index.truncate(txn)?;
            let rows = self.enumerate(txn);
            index.populate(txn, rows)?;
        }
        Ok(())
    }
}

/// Runs `f` under a savepoint of `txn`, restoring it if `f` fails.
pub(crate) fn atomically<R>(
    txn: &mut Transaction,
    f: impl FnOnce(&mut Transaction) -> Result<R>,
) -> Result<R> {
    let savepoint = txn.savepoint();
    match f(txn) {
        Ok(r) => Ok(r),
        Err(e) => {
            if let Err(restore) = txn.restore(savepoint) {
                warn!(error = %restore, "could not restore savepoint");
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::expr::lit;
    use tessera_core::schema::{IdentitySpec, TableBuilder};
    use tessera_core::DataType;

    fn users(txn: &mut Transaction) -> Rc<Table> {
        let def = TableBuilder::new("users")
            .unwrap()
            .add_column("id", DataType::Int64)
            .unwrap()
            .add_column("name", DataType::String)
            .unwrap()
            .column(ColumnDef::new("active", DataType::Boolean).default_expr(lit(true)))
            .unwrap()
            .add_primary_key(&["id"])
            .unwrap()
            .build()
            .unwrap();
        Table::create(txn, &def).unwrap()
    }

    fn user(id: i64, name: &str) -> RowValues {
        RowValues::new().set("id", id).set("name", name)
    }

    #[test]
    fn test_insert_applies_defaults_and_casts() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        let row = table
            .insert(&mut txn, RowValues::new().set("id", 1).set("name", "a"), &InsertOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(row.value("id"), &Value::Int64(1));
        assert_eq!(row.value("active"), &Value::Boolean(true));
        assert_eq!(row.id().to_string(), "users_1");
        assert_eq!(table.row_count(&txn), 1);
    }

    #[test]
    fn test_unknown_column() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        let err = table
            .insert(&mut txn, RowValues::new().set("nope", 1), &InsertOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "42703");
    }

    #[test]
    fn test_not_null_leaves_no_trace() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        let err = table
            .insert(&mut txn, RowValues::new().set("name", "x"), &InsertOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "23502");
        assert_eq!(table.row_count(&txn), 0);
        assert_eq!(table.primary_key().unwrap().len(&txn), 0);
    }

    #[test]
    fn test_update_and_delete() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        let row = table
            .insert(&mut txn, user(1, "a"), &InsertOptions::default())
            .unwrap()
            .unwrap();
        let updated = table.update(&mut txn, row.with("name", "b")).unwrap();
        assert_eq!(updated.value("name"), &Value::String("b".into()));
        assert_eq!(table.get(&txn, updated.id()).unwrap().value("name"), &Value::String("b".into()));

        let deleted = table.delete(&mut txn, &updated).unwrap();
        assert_eq!(deleted.id(), updated.id());
        assert_eq!(table.row_count(&txn), 0);
        let err = table.delete(&mut txn, &updated).unwrap_err();
        assert_eq!(err.code(), "XX000");
    }

    #[test]
    fn test_row_ids_never_reused() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        let first = table
            .insert(&mut txn, user(1, "a"), &InsertOptions::default())
            .unwrap()
            .unwrap();
        table.delete(&mut txn, &first).unwrap();
        let second = table
            .insert(&mut txn, user(1, "a"), &InsertOptions::default())
            .unwrap()
            .unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_insert_values_count_mismatch() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        let err = table
            .insert_values(&mut txn, &["id", "name"], vec![Value::Int64(1)], &InsertOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "42601");
        let row = table
            .insert_values(
                &mut txn,
                &["id", "name"],
                vec![Value::Int64(1), Value::from("a")],
                &InsertOptions::default(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(row.value("name"), &Value::from("a"));
    }

    #[test]
    fn test_find_with_and_without_index() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        for (id, name) in [(1, "a"), (2, "b"), (3, "a")] {
            table.insert(&mut txn, user(id, name), &InsertOptions::default()).unwrap();
        }
        let by_pk: Vec<Row> = table
            .find(&txn, &RowValues::new().set("id", 2), None)
            .unwrap()
            .collect();
        assert_eq!(by_pk.len(), 1);
        let by_name: Vec<i64> = table
            .find(&txn, &RowValues::new().set("name", "a").set("id", 3), Some(&["name"][..]))
            .unwrap()
            .filter_map(|r| r.value("id").as_i64())
            .collect();
        assert_eq!(by_name, vec![1, 3]);
    }

    #[test]
    fn test_readonly_table() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        table.set_readonly(true);
        let err = table
            .insert(&mut txn, user(1, "a"), &InsertOptions::default())
            .unwrap_err();
        assert_eq!(err.code(), "25006");
    }

    #[test]
    fn test_identity_overriding() {
        let mut txn = Transaction::root();
        let def = TableBuilder::new("t")
            .unwrap()
            .column(
                ColumnDef::new("id", DataType::Int32)
                    .identity(IdentitySpec::new(IdentityMode::Always).start(10)),
            )
            .unwrap()
            .add_column("v", DataType::String)
            .unwrap()
            .build()
            .unwrap();
        let table = Table::create(&mut txn, &def).unwrap();
        let options = InsertOptions::default();
        let row = table
            .insert(&mut txn, RowValues::new().set("v", "a"), &options)
            .unwrap()
            .unwrap();
        assert_eq!(row.value("id"), &Value::Int32(10));

        let err = table
            .insert(&mut txn, RowValues::new().set("id", 99), &options)
            .unwrap_err();
        assert_eq!(err.code(), "428C9");

        let system = InsertOptions::new().overriding(Overriding::SystemValue);
        let row = table
            .insert(&mut txn, RowValues::new().set("id", 99), &system)
            .unwrap()
            .unwrap();
        assert_eq!(row.value("id"), &Value::Int32(99));

        let user = InsertOptions::new().overriding(Overriding::UserValue);
        let row = table
            .insert(&mut txn, RowValues::new().set("id", 99), &user)
            .unwrap()
            .unwrap();
        assert_eq!(row.value("id"), &Value::Int32(11));
    }

    #[test]
    fn test_observer_veto_rolls_back_statement() {
        let mut txn = Transaction::root();
        let table = users(&mut txn);
        let _guard = table.on_after_change(ChangeScope::AllColumns, |_, new, _, _| {
            match new.map(|r| r.value("name").clone()) {
                Some(Value::String(s)) if s == "bad" => Err(Error::invalid_operation("rejected")),
                _ => Ok(()),
            }
        });
        assert!(table.insert(&mut txn, user(1, "bad"), &InsertOptions::default()).is_err());
        assert_eq!(table.row_count(&txn), 0);
        assert!(table.insert(&mut txn, user(1, "good"), &InsertOptions::default()).is_ok());
    }
}
