//! Schema changes of a live table.
//!
//! Every DDL operation runs through [`Table::schema_op`]: pending writes are
//! made irrevocable first, so an unrelated rollback can never undo a schema
//! change, and a failing operation restores both the in-memory schema and the
//! data it touched.

use crate::constraint::{Constraint, ConstraintKind};
use crate::namespace::Namespace;
use crate::options::{DropOptions, TruncateOptions};
use crate::sequence::Sequence;
use crate::table::{atomically, Table};
use hashbrown::HashMap;
use std::rc::{Rc, Weak};
use tessera_core::schema::{check_naming_rules, ColumnDef, ForeignKeyDef, IdentitySpec, IndexDef, TableDef};
use tessera_core::{DataType, Error, ExprRef, Result, Transaction, Value};
use tessera_index::OrderedIndex;
use tessera_reactive::{DropEvent, IndexEvent, TruncateEvent};
use tracing::{info, warn};

/// A change to one column of an existing table.
#[derive(Clone, Debug)]
pub enum ColumnAlteration {
    /// Casts every stored value to the new type.
    SetType(DataType),
    SetDefault(ExprRef),
    DropDefault,
    /// Fails if a null is stored.
    SetNotNull,
    DropNotNull,
    /// Requires the column to be `NOT NULL` already.
    AddIdentity(IdentitySpec),
    DropIdentity,
}

/// In-memory schema of a table, restored when a DDL operation fails.
struct SchemaState {
    name: String,
    columns: Vec<ColumnDef>,
    indexes: Vec<(Rc<OrderedIndex>, String)>,
    primary: Option<Rc<OrderedIndex>>,
    constraints: Vec<Rc<Constraint>>,
    referenced_by: Vec<Rc<Constraint>>,
    sequences: HashMap<String, Rc<Sequence>>,
}

impl Table {
    fn save_schema(&self) -> SchemaState {
        SchemaState {
            name: self.name(),
            columns: self.columns(),
            indexes: self
                .indexes()
                .into_iter()
                .map(|i| {
                    let name = i.name();
                    (i, name)
                })
                .collect(),
            primary: self.primary.borrow().clone(),
            constraints: self.constraints(),
            referenced_by: self.referenced_by.borrow().clone(),
            sequences: self.sequences.borrow().clone(),
        }
    }

    fn restore_schema(&self, state: SchemaState) {
        *self.name.borrow_mut() = state.name;
        *self.columns.borrow_mut() = state.columns;
        let mut indexes = Vec::with_capacity(state.indexes.len());
        for (index, name) in state.indexes {
            index.rename(&name);
            indexes.push(index);
        }
        *self.indexes.borrow_mut() = indexes;
        *self.primary.borrow_mut() = state.primary;
        *self.constraints.borrow_mut() = state.constraints;
        *self.referenced_by.borrow_mut() = state.referenced_by;
        *self.sequences.borrow_mut() = state.sequences;
        if let Some(ns) = self.namespace() {
            ns.resync_index_names(self);
        }
    }

    /// Tables a schema change of this one may touch.
    fn schema_scope(&self) -> Vec<Rc<Table>> {
        let mut tables = self.namespace().map(|ns| ns.tables()).unwrap_or_default();
        if let Some(me) = self.me.upgrade() {
            if !tables.iter().any(|t| Rc::ptr_eq(t, &me)) {
                tables.push(me);
            }
        }
        tables
    }

    /// Uninstalls a constraint of this table as part of a schema change.
    pub(crate) fn release_constraint(&self, txn: &mut Transaction, constraint: &Rc<Constraint>) -> Result<()> {
        constraint.uninstall(self, txn)?;
        self.journal.record(constraint.clone());
        Ok(())
    }

    /// Runs a schema change. `bump` advances the namespace schema version on
    /// success. On failure the schema of every table in scope is restored,
    /// together with the observers of released constraints.
    pub(crate) fn schema_op<R>(
        &self,
        txn: &mut Transaction,
        op: &str,
        bump: bool,
        f: impl FnOnce(&mut Transaction) -> Result<R>,
    ) -> Result<R> {
        self.check_writable()?;
        txn.full_commit()?;
        let saved: Vec<(Rc<Table>, SchemaState)> = self
            .schema_scope()
            .into_iter()
            .map(|t| {
                let state = t.save_schema();
                (t, state)
            })
            .collect();
        let mark = self.journal.begin();
        let savepoint = txn.savepoint();
        match f(txn) {
            Ok(r) => {
                self.journal.commit();
                txn.full_commit()?;
                if bump {
                    if let Some(ns) = self.namespace() {
                        ns.bump_schema_version();
                    }
                }
                Ok(r)
            }
            Err(e) => {
                warn!(table = %self.name(), op, error = %e, "schema change failed, restoring");
                self.journal.rollback(mark);
                for (table, state) in saved {
                    table.restore_schema(state);
                }
                if let Err(restore) = txn.restore(savepoint) {
                    warn!(table = %self.name(), error = %restore, "could not restore savepoint");
                }
                Err(e)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Indexes
    // ---------------------------------------------------------------------

    /// Creates an index and fills it from the stored rows.
    pub fn create_index(&self, txn: &mut Transaction, def: IndexDef) -> Result<Rc<OrderedIndex>> {
        self.schema_op(txn, "create index", true, |txn| self.attach_index(txn, def))
    }

    /// Drops an index that no constraint relies on.
    pub fn drop_index(&self, txn: &mut Transaction, name: &str) -> Result<()> {
        self.schema_op(txn, "drop index", true, |txn| {
            let index = self.index(name).ok_or_else(|| Error::index_not_found(name))?;
            for constraint in self.constraints() {
                let owned = constraint
                    .as_unique()
                    .and_then(|u| u.index())
                    .map_or(false, |i| Rc::ptr_eq(&i, &index));
                if owned {
                    return Err(Error::DependentObjects {
                        message: format!(
                            "cannot drop index {} because constraint {} on table {} requires it",
                            name,
                            constraint.name(),
                            self.name()
                        ),
                    });
                }
            }
            self.check_not_relied_on(&index)?;
            self.detach_index(txn, name).map(|_| ())
        })
    }

    fn check_not_relied_on(&self, index: &OrderedIndex) -> Result<()> {
        let referencing = self.referenced_by.borrow().clone();
        for constraint in referencing {
            if let Some(fk) = constraint.as_foreign_key() {
                if fk.relies_on(index) && self.get_index_on_excluding(index).is_none() {
                    return Err(Error::DependentObjects {
                        message: format!(
                            "cannot drop index {} because constraint {} on table {} requires it",
                            index.name(),
                            fk.name(),
                            fk.local_table().map(|t| t.name()).unwrap_or_default()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Another unique index over the same key as `index`.
    fn get_index_on_excluding(&self, index: &OrderedIndex) -> Option<Rc<OrderedIndex>> {
        let mut wanted = index.key_hashes();
        wanted.sort();
        self.indexes()
            .into_iter()
            .filter(|i| !std::ptr::eq(i.as_ref(), index) && i.is_unique())
            .find(|i| {
                let mut keys = i.key_hashes();
                keys.sort();
                keys == wanted && i.definition().partial_predicate().is_none()
            })
    }

    pub(crate) fn attach_index(&self, txn: &mut Transaction, def: IndexDef) -> Result<Rc<OrderedIndex>> {
        let name = def.name().to_string();
        check_naming_rules(&name)?;
        let ns = self.namespace();
        let taken = self.index(&name).is_some()
            || ns.as_ref().map_or(false, |ns| ns.has_index_name(&name));
        if taken {
            return Err(Error::duplicate("relation", name));
        }
        if def.parts().is_empty() {
            return Err(Error::invalid_schema(format!("index \"{}\" has no key", name)));
        }
        for column in def.columns() {
            self.require_column(&column)?;
        }
        for column in def.parts().iter().flat_map(|p| p.expr.columns()) {
            let column = self.require_column(&column)?;
            if !column.is_indexable() {
                return Err(Error::invalid_schema(format!(
                    "data type {} of column \"{}\" has no default operator class for an index",
                    column.data_type().sql_name(),
                    column.name()
                )));
            }
        }
        let index = Rc::new(OrderedIndex::new(def, self.name()));
        let rows = self.enumerate(txn);
        index.populate(txn, rows)?;
        if let Some(ns) = &ns {
            ns.claim_index_name(&name, &self.name())?;
        }
        self.indexes.borrow_mut().push(index.clone());
        self.index_hooks.fire(
            txn,
            &IndexEvent::Created {
                table: self.name(),
                index: name.clone(),
            },
        )?;
        info!(table = %self.name(), index = %name, "index created");
        Ok(index)
    }

    pub(crate) fn detach_index(&self, txn: &mut Transaction, name: &str) -> Result<Rc<OrderedIndex>> {
        let index = self.index(name).ok_or_else(|| Error::index_not_found(name))?;
        self.indexes.borrow_mut().retain(|i| !Rc::ptr_eq(i, &index));
        index.truncate(txn)?;
        if let Some(ns) = self.namespace() {
            ns.release_index_name(name);
        }
        self.index_hooks.fire(
            txn,
            &IndexEvent::Dropped {
                table: self.name(),
                index: name.to_string(),
            },
        )?;
        info!(table = %self.name(), index = name, "index dropped");
        Ok(index)
    }

    // ---------------------------------------------------------------------
    // Constraints
    // ---------------------------------------------------------------------

    /// Installs a constraint. Existing rows are validated first.
    pub fn add_constraint(&self, txn: &mut Transaction, constraint: Rc<Constraint>) -> Result<()> {
        self.schema_op(txn, "add constraint", true, |txn| {
            self.install_constraint(txn, constraint)
        })
    }

    /// Adds a foreign key referencing `foreign`.
    pub fn add_foreign_key(
        &self,
        txn: &mut Transaction,
        def: ForeignKeyDef,
        foreign: &Rc<Table>,
    ) -> Result<()> {
        self.add_constraint(txn, Constraint::foreign_key(def, foreign))
    }

    pub fn drop_constraint(&self, txn: &mut Transaction, name: &str) -> Result<()> {
        self.schema_op(txn, "drop constraint", true, |txn| {
            self.remove_constraint(txn, name)
        })
    }

    pub(crate) fn install_constraint(&self, txn: &mut Transaction, constraint: Rc<Constraint>) -> Result<()> {
        let name = constraint.name();
        check_naming_rules(&name)?;
        if self.constraint(&name).is_some() {
            return Err(Error::duplicate("constraint", name));
        }
        constraint.install(self, txn)?;
        self.constraints.borrow_mut().push(constraint);
        info!(table = %self.name(), constraint = %name, "constraint added");
        Ok(())
    }

    pub(crate) fn remove_constraint(&self, txn: &mut Transaction, name: &str) -> Result<()> {
        let constraint = self.constraint(name).ok_or_else(|| Error::ConstraintNotFound {
            table: self.name(),
            name: name.to_string(),
        })?;
        if let Some(index) = constraint.as_unique().and_then(|u| u.index()) {
            self.check_not_relied_on(&index)?;
        }
        self.release_constraint(txn, &constraint)?;
        self.constraints
            .borrow_mut()
            .retain(|c| !Rc::ptr_eq(c, &constraint));
        info!(table = %self.name(), constraint = name, "constraint dropped");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Columns
    // ---------------------------------------------------------------------

    /// Adds a column and fills it for the stored rows.
    pub fn add_column(&self, txn: &mut Transaction, column: ColumnDef) -> Result<()> {
        self.schema_op(txn, "add column", true, |txn| self.add_column_def(txn, column))
    }

    fn add_column_def(&self, txn: &mut Transaction, mut column: ColumnDef) -> Result<()> {
        let name = column.name().to_string();
        check_naming_rules(&name)?;
        if self.has_column(&name) {
            return Err(Error::DuplicateColumn {
                table: self.name(),
                column: name,
            });
        }
        validate_generation(&column)?;
        if column.identity_spec().is_some() {
            column.set_nullable(false);
        }
        self.columns.borrow_mut().push(column.clone());

        if column.identity_spec().is_some() {
            self.install_constraint(txn, Constraint::identity(&self.name(), &name))?;
        } else if column.is_serial() {
            self.add_serial_sequence(&name)?;
        }

        if let Some(expr) = column.generated_expr() {
            return self.install_constraint(txn, Constraint::computed(&self.name(), &name, expr.clone()));
        }

        let sequence = self.sequence(&name);
        let table = self.name();
        self.rewrite_rows(txn, |row, txn| {
            let value = if let Some(sequence) = &sequence {
                Value::integer(column.data_type(), sequence.next_value(txn)?)?
            } else if let Some(default) = column.default() {
                default.evaluate(row, txn)?.cast(column.data_type())?
            } else {
                Value::Null
            };
            if value.is_null() && !column.is_nullable() {
                return Err(Error::not_null(table.as_str(), name.as_str()));
            }
            row.set(name.as_str(), value);
            Ok(())
        })
    }

    pub(crate) fn add_serial_sequence(&self, column: &str) -> Result<()> {
        let sequence = Sequence::new(format!("{}_{}_seq", self.name(), column), 1, 1)?;
        self.sequences
            .borrow_mut()
            .insert(column.to_string(), Rc::new(sequence));
        Ok(())
    }

    fn update_column(&self, name: &str, f: impl FnOnce(&mut ColumnDef)) -> Result<()> {
        let mut columns = self.columns.borrow_mut();
        let column = columns
            .iter_mut()
            .find(|c| c.name() == name)
            .ok_or_else(|| Error::column_not_found(self.name(), name))?;
        f(column);
        Ok(())
    }

    /// Alters one column.
    pub fn alter_column(
        &self,
        txn: &mut Transaction,
        name: &str,
        alteration: ColumnAlteration,
    ) -> Result<()> {
        self.schema_op(txn, "alter column", true, |txn| {
            let column = self.require_column(name)?;
            match alteration {
                ColumnAlteration::SetType(data_type) => {
                    if (column.is_serial() || column.identity_spec().is_some()) && !data_type.is_integer() {
                        return Err(Error::invalid_schema(format!(
                            "identity column \"{}\" must have an integer type",
                            name
                        )));
                    }
                    let indexed = self.indexes().iter().any(|i| i.references(name));
                    if indexed && !data_type.is_indexable() {
                        return Err(Error::invalid_schema(format!(
                            "data type {} of column \"{}\" has no default operator class for an index",
                            data_type.sql_name(),
                            name
                        )));
                    }
                    self.update_column(name, |c| c.set_data_type(data_type))?;
                    self.rewrite_rows(txn, |row, _| {
                        let value = row.value(name).cast(data_type)?;
                        row.set(name, value);
                        Ok(())
                    })
                }
                ColumnAlteration::SetDefault(expr) => {
                    if column.identity_spec().is_some() || column.generated_expr().is_some() {
                        return Err(Error::invalid_schema(format!(
                            "column \"{}\" of relation \"{}\" is a generated column",
                            name,
                            self.name()
                        )));
                    }
                    self.update_column(name, |c| c.set_default(Some(expr)))
                }
                ColumnAlteration::DropDefault => self.update_column(name, |c| c.set_default(None)),
                ColumnAlteration::SetNotNull => {
                    if self.enumerate(txn).any(|row| row.value(name).is_null()) {
                        return Err(Error::not_null(self.name(), name));
                    }
                    self.update_column(name, |c| c.set_nullable(false))
                }
                ColumnAlteration::DropNotNull => {
                    let in_primary_key = self
                        .primary_key()
                        .map_or(false, |pk| pk.references(name));
                    if in_primary_key {
                        return Err(Error::invalid_schema(format!(
                            "column \"{}\" is in a primary key",
                            name
                        )));
                    }
                    if column.identity_spec().is_some() {
                        return Err(Error::invalid_schema(format!(
                            "column \"{}\" of relation \"{}\" is an identity column",
                            name,
                            self.name()
                        )));
                    }
                    self.update_column(name, |c| c.set_nullable(true))
                }
                ColumnAlteration::AddIdentity(spec) => {
                    if column.identity_spec().is_some()
                        || column.is_serial()
                        || column.generated_expr().is_some()
                        || column.default().is_some()
                    {
                        return Err(Error::invalid_schema(format!(
                            "column \"{}\" of relation \"{}\" already has a default or generation",
                            name,
                            self.name()
                        )));
                    }
                    self.update_column(name, |c| c.set_identity(Some(spec)))?;
                    self.install_constraint(txn, Constraint::identity(&self.name(), name))
                }
                ColumnAlteration::DropIdentity => {
                    if column.identity_spec().is_none() {
                        return Err(Error::invalid_schema(format!(
                            "column \"{}\" of relation \"{}\" is not an identity column",
                            name,
                            self.name()
                        )));
                    }
                    let identity = self
                        .constraints()
                        .into_iter()
                        .find(|c| c.kind() == ConstraintKind::Identity && c.columns() == [name])
                        .map(|c| c.name());
                    if let Some(identity) = identity {
                        self.remove_constraint(txn, &identity)?;
                    }
                    self.update_column(name, |c| c.set_identity(None))
                }
            }
        })
    }

    /// Renames a column everywhere it appears: rows, indexes, constraints
    /// and observer scopes. Columns read by opaque expressions or foreign keys
    /// cannot be renamed.
    pub fn rename_column(&self, txn: &mut Transaction, from: &str, to: &str) -> Result<()> {
        self.schema_op(txn, "rename column", true, |txn| {
            self.require_column(from)?;
            check_naming_rules(to)?;
            if self.has_column(to) {
                return Err(Error::DuplicateColumn {
                    table: self.name(),
                    column: to.to_string(),
                });
            }
            let unsupported = |owner: String| {
                Err(Error::unsupported(format!(
                    "renaming column \"{}\" used by {}",
                    from, owner
                )))
            };
            for constraint in self.constraints() {
                if constraint.blocks_rename(from) {
                    return unsupported(format!("constraint \"{}\"", constraint.name()));
                }
            }
            let referencing = self.referenced_by.borrow().clone();
            for constraint in referencing {
                let blocked = constraint
                    .as_foreign_key()
                    .map_or(false, |fk| fk.definition().foreign_columns.iter().any(|c| c == from));
                if blocked {
                    return unsupported(format!("constraint \"{}\"", constraint.name()));
                }
            }
            for column in self.columns() {
                let reads = column
                    .default()
                    .map_or(false, |d| d.columns().iter().any(|c| c == from));
                if reads {
                    return unsupported(format!("the default of column \"{}\"", column.name()));
                }
            }
            for index in self.indexes() {
                index.check_rename_column(from)?;
            }

            for index in self.indexes() {
                index.rename_column(from, to)?;
            }
            self.update_column(from, |c| c.set_name(to))?;
            self.bus.rename_column(from, to);
            for constraint in self.constraints() {
                constraint.rename_column(from, to);
            }
            let sequence = self.sequences.borrow_mut().remove(from);
            if let Some(sequence) = sequence {
                self.sequences.borrow_mut().insert(to.to_string(), sequence);
            }
            self.rewrite_rows(txn, |row, _| {
                row.rename(from, to);
                Ok(())
            })?;
            info!(table = %self.name(), from, to, "column renamed");
            Ok(())
        })
    }

    /// Drops a column, with the constraints and indexes involving it.
    pub fn drop_column(&self, txn: &mut Transaction, name: &str) -> Result<()> {
        self.schema_op(txn, "drop column", true, |txn| {
            self.require_column(name)?;
            let referencing = self.referenced_by.borrow().clone();
            for constraint in referencing {
                let needed = constraint
                    .as_foreign_key()
                    .map_or(false, |fk| fk.definition().foreign_columns.iter().any(|c| c == name));
                if needed {
                    return Err(Error::DependentObjects {
                        message: format!(
                            "cannot drop column {} of table {} because constraint {} depends on it",
                            name,
                            self.name(),
                            constraint.name()
                        ),
                    });
                }
            }
            for column in self.columns() {
                let reads = column
                    .generated_expr()
                    .map_or(false, |e| e.columns().iter().any(|c| c == name));
                if reads {
                    return Err(Error::DependentObjects {
                        message: format!(
                            "cannot drop column {} of table {} because generated column {} depends on it",
                            name,
                            self.name(),
                            column.name()
                        ),
                    });
                }
            }

            for constraint in self.constraints() {
                if constraint.columns().iter().any(|c| c == name) {
                    self.remove_constraint(txn, &constraint.name())?;
                }
            }
            for index in self.indexes() {
                if index.references(name) {
                    self.detach_index(txn, &index.name())?;
                }
            }
            self.sequences.borrow_mut().remove(name);
            self.columns.borrow_mut().retain(|c| c.name() != name);
            self.rewrite_rows(txn, |row, _| {
                row.remove(name);
                Ok(())
            })?;
            info!(table = %self.name(), column = name, "column dropped");
            Ok(())
        })
    }

    // ---------------------------------------------------------------------
    // Table lifecycle
    // ---------------------------------------------------------------------

    /// Removes every row. Tables referencing this one are truncated too with
    /// `cascade`, otherwise they make the truncate fail.
    pub fn truncate(&self, txn: &mut Transaction, options: TruncateOptions) -> Result<()> {
        self.schema_op(txn, "truncate", false, |txn| self.truncate_rows(txn, options))
    }

    pub(crate) fn truncate_rows(&self, txn: &mut Transaction, options: TruncateOptions) -> Result<()> {
        self.check_writable()?;
        self.truncate_hooks.fire(
            txn,
            &TruncateEvent {
                table: self.name(),
                cascade: options.cascade,
                restart_identity: options.restart_identity,
            },
        )?;
        txn.delete(&self.rows)?;
        for index in self.indexes() {
            index.truncate(txn)?;
        }
        if options.restart_identity {
            let sequences: Vec<Rc<Sequence>> = self.sequences.borrow().values().cloned().collect();
            for sequence in sequences {
                sequence.restart(txn)?;
            }
        }
        info!(table = %self.name(), restart_identity = options.restart_identity, "truncated");
        Ok(())
    }

    /// Drops the table: constraints, indexes and rows. Foreign keys of other
    /// tables referencing it are dropped with `cascade`, otherwise they make
    /// the drop fail.
    pub fn drop_table(&self, txn: &mut Transaction, options: DropOptions) -> Result<()> {
        self.schema_op(txn, "drop table", true, |txn| {
            self.drop_hooks.fire(
                txn,
                &DropEvent {
                    table: self.name(),
                    cascade: options.cascade,
                },
            )?;
            let outside: Vec<String> = self
                .referenced_by
                .borrow()
                .iter()
                .filter(|c| {
                    c.as_foreign_key()
                        .and_then(|fk| fk.local_table())
                        .map_or(false, |t| !std::ptr::eq(t.as_ref(), self))
                })
                .map(|c| c.name())
                .collect();
            if let Some(name) = outside.first() {
                return Err(Error::DependentObjects {
                    message: format!(
                        "cannot drop table {} because constraint {} depends on it",
                        self.name(),
                        name
                    ),
                });
            }
            let constraints = self.constraints();
            for constraint in constraints.iter().rev() {
                self.release_constraint(txn, constraint)?;
            }
            self.constraints.borrow_mut().clear();
            for index in self.indexes() {
                self.detach_index(txn, &index.name())?;
            }
            txn.delete(&self.rows)?;
            self.sequences.borrow_mut().clear();
            self.mark_dropped();
            self.bus.clear();
            self.drop_hooks.clear();
            self.truncate_hooks.clear();
            self.index_hooks.clear();
            info!(table = %self.name(), "table dropped");
            Ok(())
        })
    }

    /// Renames the table. Row ids keep the name they were created with.
    pub(crate) fn rename(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
        for index in self.indexes() {
            index.set_table_name(name);
        }
    }

    /// Creates a table outside any namespace. Foreign keys may only
    /// reference the table itself.
    pub fn create(txn: &mut Transaction, def: &TableDef) -> Result<Rc<Table>> {
        Table::create_in(txn, def, Weak::new(), &|_| None)
    }

    /// Creates a table; `resolve` finds the tables its foreign keys reference.
    pub(crate) fn create_in(
        txn: &mut Transaction,
        def: &TableDef,
        namespace: Weak<Namespace>,
        resolve: &dyn Fn(&str) -> Option<Rc<Table>>,
    ) -> Result<Rc<Table>> {
        check_naming_rules(def.name())?;
        txn.full_commit()?;
        let table = Table::new(def.name(), namespace);
        match atomically(txn, |txn| table.setup(txn, def, resolve)) {
            Ok(()) => {
                txn.full_commit()?;
                info!(table = %table.name(), columns = def.columns().len(), "table created");
                Ok(table)
            }
            Err(e) => {
                warn!(table = %table.name(), error = %e, "table creation failed, tearing down");
                table.teardown(txn);
                Err(e)
            }
        }
    }

    fn setup(
        &self,
        txn: &mut Transaction,
        def: &TableDef,
        resolve: &dyn Fn(&str) -> Option<Rc<Table>>,
    ) -> Result<()> {
        for column in def.columns() {
            validate_generation(column)?;
            self.columns.borrow_mut().push(column.clone());
            if column.is_serial() {
                self.add_serial_sequence(column.name())?;
            }
        }
        if let Some(pk) = def.primary_key() {
            self.install_constraint(txn, Constraint::unique(pk.clone()))?;
        }
        for unique in def.uniques() {
            self.install_constraint(txn, Constraint::unique(unique.clone()))?;
        }
        for index in def.indexes() {
            self.attach_index(txn, index.clone())?;
        }
        for column in def.columns() {
            if column.identity_spec().is_some() {
                self.install_constraint(txn, Constraint::identity(def.name(), column.name()))?;
            }
            if let Some(expr) = column.generated_expr() {
                self.install_constraint(
                    txn,
                    Constraint::computed(def.name(), column.name(), expr.clone()),
                )?;
            }
        }
        for check in def.checks() {
            self.install_constraint(txn, Constraint::check(check.clone()))?;
        }
        for fk in def.foreign_keys() {
            let foreign = if fk.foreign_table == def.name() {
                self.me
                    .upgrade()
                    .ok_or_else(|| Error::dropped(format!("relation \"{}\" is gone", def.name())))?
            } else {
                resolve(&fk.foreign_table).ok_or_else(|| Error::table_not_found(fk.foreign_table.as_str()))?
            };
            self.install_constraint(txn, Constraint::foreign_key(fk.clone(), &foreign))?;
        }
        Ok(())
    }

    /// Releases whatever a failed creation registered outside the table.
    fn teardown(&self, txn: &mut Transaction) {
        let constraints = self.constraints();
        for constraint in constraints.iter().rev() {
            if let Err(e) = constraint.uninstall(self, txn) {
                warn!(table = %self.name(), constraint = %constraint.name(), error = %e, "teardown failed");
            }
            constraint.forget_released();
        }
        self.constraints.borrow_mut().clear();
        if let Some(ns) = self.namespace() {
            for index in self.indexes() {
                ns.release_index_name(&index.name());
            }
        }
        self.indexes.borrow_mut().clear();
        self.mark_dropped();
    }
}

/// Checks the mutually exclusive generation options of a column.
fn validate_generation(column: &ColumnDef) -> Result<()> {
    let generated = column.is_serial() as u8
        + column.identity_spec().is_some() as u8
        + column.generated_expr().is_some() as u8;
    if generated > 1 {
        return Err(Error::invalid_schema(format!(
            "column \"{}\" can only be one of serial, identity or generated",
            column.name()
        )));
    }
    if (column.is_serial() || column.identity_spec().is_some()) && !column.data_type().is_integer() {
        return Err(Error::invalid_schema(format!(
            "identity column \"{}\" must have an integer type",
            column.name()
        )));
    }
    if generated > 0 && column.default().is_some() {
        return Err(Error::invalid_schema(format!(
            "both default and generation specified for column \"{}\"",
            column.name()
        )));
    }
    Ok(())
}
