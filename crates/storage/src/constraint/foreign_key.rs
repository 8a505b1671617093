//! Foreign keys and their referential actions.

use super::{Attached, Constraint};
use crate::options::TruncateOptions;
use crate::table::Table;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::{Rc, Weak};
use tessera_core::schema::{ForeignKeyDef, IndexDef, ReferentialAction};
use tessera_core::{Error, Result, Row, Transaction, Value};
use tessera_index::{IndexKey, OrderedIndex};
use tessera_reactive::{ChangeOptions, ChangeScope, Priority};
use tracing::{debug, info};

/// `FOREIGN KEY (local) REFERENCES foreign (columns)`.
///
/// Registers an existence check on the referencing (local) table and the
/// referential actions on the referenced (foreign) table, plus drop and
/// truncate guards on the referenced table.
pub struct ForeignKeyConstraint {
    inner: Rc<Inner>,
    attached: Attached,
    auto_index: RefCell<Option<String>>,
}

struct Inner {
    def: ForeignKeyDef,
    local: RefCell<Weak<Table>>,
    foreign: Weak<Table>,
}

impl ForeignKeyConstraint {
    pub(crate) fn new(def: ForeignKeyDef, foreign: &Rc<Table>) -> Self {
        Self {
            inner: Rc::new(Inner {
                def,
                local: RefCell::new(Weak::new()),
                foreign: Rc::downgrade(foreign),
            }),
            attached: Attached::default(),
            auto_index: RefCell::new(None),
        }
    }

    pub fn name(&self) -> String {
        self.inner.def.name.clone()
    }

    pub fn definition(&self) -> ForeignKeyDef {
        self.inner.def.clone()
    }

    /// The referencing table.
    pub fn local_table(&self) -> Option<Rc<Table>> {
        self.inner.local.borrow().upgrade()
    }

    /// The referenced table.
    pub fn foreign_table(&self) -> Option<Rc<Table>> {
        self.inner.foreign.upgrade()
    }

    /// Whether `index` is the referenced key this constraint relies on.
    pub(crate) fn relies_on(&self, index: &OrderedIndex) -> bool {
        let mut wanted = self.inner.def.foreign_columns.clone();
        wanted.sort();
        let mut keys = index.key_hashes();
        keys.sort();
        index.is_unique() && keys == wanted
    }

    pub(crate) fn install(
        &self,
        constraint: &Rc<Constraint>,
        table: &Table,
        txn: &mut Transaction,
    ) -> Result<()> {
        let inner = &self.inner;
        let def = &inner.def;
        let foreign = inner.foreign.upgrade().ok_or_else(|| {
            Error::dropped(format!("referenced relation of \"{}\" has been dropped", def.name))
        })?;
        foreign.check_alive()?;
        if def.local_columns.is_empty() || def.local_columns.len() != def.foreign_columns.len() {
            return Err(Error::invalid_schema(format!(
                "number of referencing and referenced columns for foreign key \"{}\" disagree",
                def.name
            )));
        }
        for column in &def.local_columns {
            table.require_column(column)?;
        }
        for column in &def.foreign_columns {
            foreign.require_column(column)?;
        }
        *inner.local.borrow_mut() = table.me.clone();
        *self.auto_index.borrow_mut() = None;
        inner.parent_index(&foreign)?;

        for row in table.enumerate(txn) {
            inner.check_row(table, &foreign, txn, &row)?;
        }

        let auto = table
            .namespace()
            .map_or(false, |ns| ns.config().auto_create_foreign_key_indices);
        let columns: Vec<&str> = def.local_columns.iter().map(String::as_str).collect();
        if auto && table.get_index_on(&columns).is_none() {
            let name = format!("{}_idx", def.name);
            table.attach_index(txn, IndexDef::on_columns(name.as_str(), &columns))?;
            *self.auto_index.borrow_mut() = Some(name);
        }

        let check = inner.clone();
        self.attached.hold(table.bus.on_before_change(
            ChangeScope::Columns(def.local_columns.clone()),
            Priority::Normal,
            move |_, new, txn, options| {
                let Some(row) = new else {
                    return Ok(());
                };
                if options.is_cascade_of(&check.def.name) {
                    return Ok(());
                }
                let (Some(local), Some(foreign)) = (check.local.borrow().upgrade(), check.foreign.upgrade())
                else {
                    return Ok(());
                };
                check.check_row(&local, &foreign, txn, row)
            },
        ));

        let action = inner.clone();
        self.attached.hold(foreign.bus.on_before_change(
            ChangeScope::Columns(def.foreign_columns.clone()),
            Priority::Normal,
            move |old, new, txn, _| match old {
                Some(old) => action.on_parent_change(old, new.as_deref(), txn),
                None => Ok(()),
            },
        ));

        let guard = inner.clone();
        self.attached.hold(foreign.drop_hooks.subscribe(move |txn, event| {
            let Some(local) = guard.foreign_dependent() else {
                return Ok(());
            };
            if !event.cascade {
                return Err(Error::DependentObjects {
                    message: format!(
                        "cannot drop table {} because other objects depend on it: constraint {} on table {} depends on table {}",
                        event.table,
                        guard.def.name,
                        local.name(),
                        event.table
                    ),
                });
            }
            info!(constraint = %guard.def.name, table = %local.name(), "drop cascades to foreign key");
            local.remove_constraint(txn, &guard.def.name)
        }));

        let guard = inner.clone();
        self.attached.hold(foreign.truncate_hooks.subscribe(move |txn, event| {
            let Some(local) = guard.foreign_dependent() else {
                return Ok(());
            };
            if !event.cascade {
                return Err(Error::DependentObjects {
                    message: format!(
                        "cannot truncate a table referenced in a foreign key constraint: table \"{}\" references \"{}\"",
                        local.name(),
                        event.table
                    ),
                });
            }
            info!(table = %local.name(), "truncate cascades");
            let options = TruncateOptions {
                restart_identity: event.restart_identity,
                cascade: true,
            };
            local.truncate_rows(txn, options)
        }));

        foreign.referenced_by.borrow_mut().push(constraint.clone());
        Ok(())
    }

    pub(crate) fn uninstall(
        &self,
        constraint: &Constraint,
        table: &Table,
        txn: &mut Transaction,
    ) -> Result<()> {
        self.attached.release();
        let auto_index = self.auto_index.borrow().clone();
        if let Some(name) = auto_index {
            if table.index(&name).is_some() {
                table.detach_index(txn, &name)?;
            }
        }
        if let Some(foreign) = self.inner.foreign.upgrade() {
            foreign
                .referenced_by
                .borrow_mut()
                .retain(|c| !std::ptr::eq(c.as_ref(), constraint));
        }
        Ok(())
    }

    pub(super) fn attached(&self) -> &Attached {
        &self.attached
    }
}

impl Inner {
    fn is_self_reference(&self) -> bool {
        Weak::ptr_eq(&self.local.borrow(), &self.foreign)
    }

    /// The referencing table, unless it is the referenced table itself.
    fn foreign_dependent(&self) -> Option<Rc<Table>> {
        if self.is_self_reference() {
            return None;
        }
        self.local.borrow().upgrade()
    }

    /// The unique index over the referenced columns.
    fn parent_index(&self, foreign: &Table) -> Result<Rc<OrderedIndex>> {
        foreign
            .indexes()
            .into_iter()
            .find(|index| {
                let mut keys = index.key_hashes();
                keys.sort();
                let mut wanted = self.def.foreign_columns.clone();
                wanted.sort();
                index.is_unique() && keys == wanted && index.definition().partial_predicate().is_none()
            })
            .ok_or_else(|| {
                Error::invalid_schema(format!(
                    "there is no unique constraint matching given keys for referenced table \"{}\"",
                    foreign.name()
                ))
            })
    }

    /// Orders `key` (paired with `columns`) by the key parts of `index`.
    fn index_key(index: &OrderedIndex, columns: &[String], key: &[Value]) -> IndexKey {
        let values = index
            .key_hashes()
            .iter()
            .map(|part| {
                columns
                    .iter()
                    .position(|c| c == part)
                    .and_then(|i| key.get(i).cloned())
                    .unwrap_or(Value::Null)
            })
            .collect();
        IndexKey::new(values)
    }

    fn check_row(&self, local: &Table, foreign: &Table, txn: &Transaction, row: &Row) -> Result<()> {
        let key: Vec<Value> = values(row, &self.def.local_columns);
        if key.iter().any(Value::is_null) {
            return Ok(());
        }
        if self.is_self_reference() && same_key(&key, &values(row, &self.def.foreign_columns)) {
            return Ok(());
        }
        let index = self.parent_index(foreign)?;
        let probe = Self::index_key(&index, &self.def.foreign_columns, &key);
        if index.has_key(txn, &probe) {
            return Ok(());
        }
        debug!(constraint = %self.def.name, row = %row.id(), "missing referenced row");
        Err(Error::foreign_key(
            self.def.name.as_str(),
            local.name(),
            format!(
                "insert or update on table \"{}\" violates foreign key constraint \"{}\": Key ({})=({}) is not present in table \"{}\"",
                local.name(),
                self.def.name,
                self.def.local_columns.join(", "),
                render(&key),
                foreign.name()
            ),
        ))
    }

    /// Rows of the referencing table whose key equals `key`.
    fn children(&self, local: &Table, txn: &Transaction, key: &[Value]) -> Vec<Row> {
        let columns: Vec<&str> = self.def.local_columns.iter().map(String::as_str).collect();
        if let Some(index) = local.get_index_on(&columns) {
            let probe = Self::index_key(&index, &self.def.local_columns, key);
            return index.eq(txn, probe, false).collect();
        }
        local
            .enumerate(txn)
            .filter(|row| same_key(&values(row, &self.def.local_columns), key))
            .collect()
    }

    /// Applies the referential action for a referenced row being updated
    /// (`new` is some) or deleted.
    fn on_parent_change(&self, old: &Row, new: Option<&Row>, txn: &mut Transaction) -> Result<()> {
        let old_key = values(old, &self.def.foreign_columns);
        if old_key.iter().any(Value::is_null) {
            return Ok(());
        }
        if let Some(new) = new {
            if same_key(&old_key, &values(new, &self.def.foreign_columns)) {
                return Ok(());
            }
        }
        let Some(local) = self.local.borrow().upgrade() else {
            return Ok(());
        };
        let self_reference = self.is_self_reference();
        let children: Vec<Row> = self
            .children(&local, txn, &old_key)
            .into_iter()
            .filter(|child| !(self_reference && child.id() == old.id()))
            .collect();
        if children.is_empty() {
            return Ok(());
        }

        let action = match new {
            Some(_) => self.def.on_update,
            None => self.def.on_delete,
        };
        debug!(
            constraint = %self.def.name,
            action = ?action,
            children = children.len(),
            "referential action"
        );
        let cascade = ChangeOptions::new().cascade_of(self.def.name.as_str());
        match action {
            ReferentialAction::NoAction | ReferentialAction::Restrict => {
                let verb = if new.is_some() { "update" } else { "delete" };
                Err(Error::foreign_key(
                    self.def.name.as_str(),
                    local.name(),
                    format!(
                        "{} on table \"{}\" violates foreign key constraint \"{}\" on table \"{}\": Key ({})=({}) is still referenced from table \"{}\"",
                        verb,
                        old.id().table(),
                        self.def.name,
                        local.name(),
                        self.def.foreign_columns.join(", "),
                        render(&old_key),
                        local.name()
                    ),
                ))
            }
            ReferentialAction::Cascade => {
                for child in children {
                    // An earlier cascade may already have removed or changed it.
                    let Some(current) = local.get(txn, child.id()) else {
                        continue;
                    };
                    match new {
                        None => {
                            local.delete(txn, &current)?;
                        }
                        Some(new) => {
                            let mut row = current;
                            for (l, f) in self.def.local_columns.iter().zip(&self.def.foreign_columns) {
                                row.set(l.as_str(), new.value(f).clone());
                            }
                            local.update_with(txn, row, &cascade)?;
                        }
                    }
                }
                Ok(())
            }
            ReferentialAction::SetNull => {
                for child in children {
                    let Some(mut row) = local.get(txn, child.id()) else {
                        continue;
                    };
                    for l in &self.def.local_columns {
                        row.set(l.as_str(), Value::Null);
                    }
                    local.update_with(txn, row, &cascade)?;
                }
                Ok(())
            }
            ReferentialAction::SetDefault => {
                for child in children {
                    let Some(mut row) = local.get(txn, child.id()) else {
                        continue;
                    };
                    for l in &self.def.local_columns {
                        let column = local.require_column(l)?;
                        let value = match column.default() {
                            Some(default) => default.evaluate(&row, txn)?.cast(column.data_type())?,
                            None => Value::Null,
                        };
                        row.set(l.as_str(), value);
                    }
                    // The defaulted key must itself reference an existing row.
                    local.update(txn, row)?;
                }
                Ok(())
            }
        }
    }
}

fn values(row: &Row, columns: &[String]) -> Vec<Value> {
    columns.iter().map(|c| row.value(c).clone()).collect()
}

fn same_key(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.cmp(y) == Ordering::Equal)
}

fn render(key: &[Value]) -> String {
    key.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
