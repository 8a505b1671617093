//! Table registry.

use crate::journal::SchemaJournal;
use crate::options::DropOptions;
use crate::table::Table;
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use tessera_core::schema::{check_naming_rules, TableDef};
use tessera_core::{Error, Result, Transaction};
use tracing::info;

/// Namespace-wide settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NamespaceConfig {
    /// Create an index over the referencing columns of every foreign key.
    pub auto_create_foreign_key_indices: bool,
    /// Make every table created in the namespace readonly.
    pub readonly: bool,
}

impl NamespaceConfig {
    pub fn auto_create_foreign_key_indices(mut self, enabled: bool) -> Self {
        self.auto_create_foreign_key_indices = enabled;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }
}

/// A set of tables sharing one index name space.
pub struct Namespace {
    me: Weak<Namespace>,
    name: String,
    config: NamespaceConfig,
    tables: RefCell<HashMap<String, Rc<Table>>>,
    /// Index name to owning table name.
    index_names: RefCell<HashMap<String, String>>,
    schema_version: Cell<u64>,
    journal: Rc<SchemaJournal>,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("tables", &self.table_names())
            .field("schema_version", &self.schema_version.get())
            .finish()
    }
}

impl Namespace {
    pub fn new(name: impl Into<String>, config: NamespaceConfig) -> Rc<Namespace> {
        let name = name.into();
        Rc::new_cyclic(|me| Namespace {
            me: me.clone(),
            name,
            config,
            tables: RefCell::new(HashMap::new()),
            index_names: RefCell::new(HashMap::new()),
            schema_version: Cell::new(0),
            journal: SchemaJournal::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &NamespaceConfig {
        &self.config
    }

    /// Creates a table. Its foreign keys may reference tables of this
    /// namespace, or the new table itself.
    pub fn create_table(&self, txn: &mut Transaction, def: &TableDef) -> Result<Rc<Table>> {
        if self.has_table(def.name()) {
            return Err(Error::duplicate("relation", def.name()));
        }
        let table = Table::create_in(txn, def, self.me.clone(), &|name| self.get_table(name))?;
        if self.config.readonly {
            table.set_readonly(true);
        }
        self.tables
            .borrow_mut()
            .insert(def.name().to_string(), table.clone());
        self.bump_schema_version();
        Ok(table)
    }

    pub fn get_table(&self, name: &str) -> Option<Rc<Table>> {
        self.tables.borrow().get(name).cloned()
    }

    /// Like [`Namespace::get_table`], failing for an unknown name.
    pub fn table(&self, name: &str) -> Result<Rc<Table>> {
        self.get_table(name)
            .ok_or_else(|| Error::table_not_found(name))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.borrow().contains_key(name)
    }

    /// Table names, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn drop_table(&self, txn: &mut Transaction, name: &str, options: DropOptions) -> Result<()> {
        let table = self.table(name)?;
        table.drop_table(txn, options)?;
        self.tables.borrow_mut().remove(name);
        Ok(())
    }

    /// Renames a table. Existing row ids keep the old name.
    pub fn rename_table(&self, from: &str, to: &str) -> Result<()> {
        check_naming_rules(to)?;
        let table = self.table(from)?;
        table.check_writable()?;
        if self.has_table(to) {
            return Err(Error::duplicate("relation", to));
        }
        table.rename(to);
        let mut tables = self.tables.borrow_mut();
        tables.remove(from);
        tables.insert(to.to_string(), table);
        drop(tables);
        for owner in self.index_names.borrow_mut().values_mut() {
            if owner == from {
                *owner = to.to_string();
            }
        }
        self.bump_schema_version();
        info!(from, to, "table renamed");
        Ok(())
    }

    pub fn rename_index(&self, from: &str, to: &str) -> Result<()> {
        check_naming_rules(to)?;
        let owner = self
            .index_names
            .borrow()
            .get(from)
            .cloned()
            .ok_or_else(|| Error::index_not_found(from))?;
        if self.has_index_name(to) {
            return Err(Error::duplicate("relation", to));
        }
        let table = self.table(&owner)?;
        table.check_writable()?;
        let index = table.index(from).ok_or_else(|| {
            Error::corrupted(owner.as_str(), format!("index \"{}\" is registered but missing", from))
        })?;
        // a unique or primary key constraint is named after its index
        let enforced = table.constraints().into_iter().find(|c| {
            c.as_unique()
                .and_then(|u| u.index())
                .map_or(false, |i| Rc::ptr_eq(&i, &index))
        });
        if let Some(constraint) = &enforced {
            if table.constraint(to).is_some() {
                return Err(Error::duplicate("constraint", to));
            }
            if let Some(unique) = constraint.as_unique() {
                unique.rename(to);
            }
        }
        index.rename(to);
        let mut names = self.index_names.borrow_mut();
        names.remove(from);
        names.insert(to.to_string(), owner);
        drop(names);
        self.bump_schema_version();
        info!(from, to, "index renamed");
        Ok(())
    }

    /// Version of the schema, advanced by every successful DDL.
    pub fn schema_version(&self) -> u64 {
        self.schema_version.get()
    }

    pub(crate) fn journal(&self) -> Rc<SchemaJournal> {
        self.journal.clone()
    }

    /// Every table of the namespace, in no particular order.
    pub(crate) fn tables(&self) -> Vec<Rc<Table>> {
        self.tables.borrow().values().cloned().collect()
    }

    pub(crate) fn bump_schema_version(&self) {
        self.schema_version.set(self.schema_version.get() + 1);
    }

    pub fn has_index_name(&self, name: &str) -> bool {
        self.index_names.borrow().contains_key(name)
    }

    pub(crate) fn claim_index_name(&self, index: &str, table: &str) -> Result<()> {
        let mut names = self.index_names.borrow_mut();
        if names.contains_key(index) {
            return Err(Error::duplicate("relation", index));
        }
        names.insert(index.to_string(), table.to_string());
        Ok(())
    }

    pub(crate) fn release_index_name(&self, index: &str) {
        self.index_names.borrow_mut().remove(index);
    }

    /// Makes the registry match the indexes `table` currently has.
    pub(crate) fn resync_index_names(&self, table: &Table) {
        let name = table.name();
        let mut names = self.index_names.borrow_mut();
        names.retain(|_, owner| *owner != name);
        for index in table.indexes() {
            names.insert(index.name(), name.clone());
        }
    }

    /// Captures the data of every table as of `txn`.
    pub fn backup(&self, txn: &Transaction) -> Backup {
        Backup {
            snapshot: txn.snapshot(),
            schema_version: self.schema_version(),
            namespace: self.me.clone(),
        }
    }
}

/// A point-in-time copy of a namespace's data.
pub struct Backup {
    snapshot: Transaction,
    schema_version: u64,
    namespace: Weak<Namespace>,
}

impl fmt::Debug for Backup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backup")
            .field("schema_version", &self.schema_version)
            .finish()
    }
}

impl Backup {
    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    /// Returns a fresh transaction holding the backed up data. Fails if the
    /// schema changed since the backup was taken.
    pub fn restore(&self) -> Result<Transaction> {
        let namespace = self
            .namespace
            .upgrade()
            .ok_or_else(|| Error::dropped("the namespace of this backup no longer exists"))?;
        if namespace.schema_version() != self.schema_version {
            return Err(Error::unsupported(format!(
                "restoring a backup of schema version {} into schema version {}",
                self.schema_version,
                namespace.schema_version()
            )));
        }
        info!(namespace = %namespace.name(), version = self.schema_version, "backup restored");
        Ok(self.snapshot.snapshot())
    }
}
