use crate::table::Table;
use std::cell::RefCell;
use std::rc::Rc;
use tessera_core::schema::{IndexDef, UniqueDef};
use tessera_core::{Error, Result, Transaction};
use tessera_index::OrderedIndex;

/// `UNIQUE` or `PRIMARY KEY`, enforced by an index of the same name.
pub struct UniqueConstraint {
    def: RefCell<UniqueDef>,
    index: RefCell<Option<Rc<OrderedIndex>>>,
}

impl UniqueConstraint {
    pub(crate) fn new(def: UniqueDef) -> Self {
        Self {
            def: RefCell::new(def),
            index: RefCell::new(None),
        }
    }

    pub fn name(&self) -> String {
        self.def.borrow().name.clone()
    }

    pub fn columns(&self) -> Vec<String> {
        self.def.borrow().columns.clone()
    }

    pub fn is_primary(&self) -> bool {
        self.def.borrow().primary
    }

    /// The enforcing index, once installed.
    pub fn index(&self) -> Option<Rc<OrderedIndex>> {
        self.index.borrow().clone()
    }

    pub(crate) fn install(&self, table: &Table, txn: &mut Transaction) -> Result<()> {
        *self.index.borrow_mut() = None;
        let def = self.def.borrow().clone();
        if def.primary {
            if let Some(existing) = table.primary_key() {
                return Err(Error::invalid_schema(format!(
                    "multiple primary keys for table \"{}\" are not allowed (existing \"{}\")",
                    table.name(),
                    existing.name()
                )));
            }
        }
        let columns: Vec<&str> = def.columns.iter().map(String::as_str).collect();
        let index_def = IndexDef::on_columns(def.name.as_str(), &columns)
            .unique(true)
            .not_null(def.primary);
        let index = table.attach_index(txn, index_def)?;
        *self.index.borrow_mut() = Some(index.clone());
        if def.primary {
            *table.primary.borrow_mut() = Some(index);
        }
        Ok(())
    }

    /// Detaches the enforcing index. The constraint keeps referring to it,
    /// so a failed schema change can restore the pair.
    pub(crate) fn uninstall(&self, table: &Table, txn: &mut Transaction) -> Result<()> {
        let Some(index) = self.index() else {
            return Ok(());
        };
        let attached = table.indexes().iter().any(|i| Rc::ptr_eq(i, &index));
        if attached {
            table.detach_index(txn, &index.name())?;
        }
        let mut primary = table.primary.borrow_mut();
        if primary.as_ref().map_or(false, |p| Rc::ptr_eq(p, &index)) {
            *primary = None;
        }
        Ok(())
    }

    /// Follows a rename of the enforcing index.
    pub(crate) fn rename(&self, name: &str) {
        self.def.borrow_mut().name = name.to_string();
    }

    pub(crate) fn rename_column(&self, from: &str, to: &str) {
        for column in self.def.borrow_mut().columns.iter_mut() {
            if column == from {
                *column = to.to_string();
            }
        }
    }
}
