use super::Attached;
use crate::table::Table;
use std::rc::Weak;
use tessera_core::schema::CheckDef;
use tessera_core::{Error, ExprRef, Result, Row, Transaction};
use tessera_reactive::ChangeScope;
use tracing::debug;

/// `CHECK (expr)`. A null result passes.
pub struct CheckConstraint {
    def: CheckDef,
    attached: Attached,
}

impl CheckConstraint {
    pub(crate) fn new(def: CheckDef) -> Self {
        Self {
            def,
            attached: Attached::default(),
        }
    }

    pub fn name(&self) -> String {
        self.def.name.clone()
    }

    pub fn expr(&self) -> &ExprRef {
        &self.def.expr
    }

    pub fn columns(&self) -> Vec<String> {
        self.def.expr.columns()
    }

    pub(crate) fn install(&self, table: &Table, txn: &mut Transaction) -> Result<()> {
        for row in table.enumerate(txn) {
            check_row(&self.def, &table.name(), &row, txn)?;
        }
        let columns = self.columns();
        let scope = if columns.is_empty() {
            ChangeScope::AllColumns
        } else {
            ChangeScope::Columns(columns)
        };
        let def = self.def.clone();
        let owner: Weak<Table> = table.me.clone();
        let sub = table.on_before_change(scope, move |_, new, txn, _| {
            let (Some(row), Some(table)) = (new, owner.upgrade()) else {
                return Ok(());
            };
            check_row(&def, &table.name(), row, txn)
        });
        self.attached.hold(sub);
        Ok(())
    }

    pub(crate) fn uninstall(&self) {
        self.attached.release();
    }

    pub(super) fn attached(&self) -> &Attached {
        &self.attached
    }
}

fn check_row(def: &CheckDef, table: &str, row: &Row, txn: &Transaction) -> Result<()> {
    if def.expr.evaluate(row, txn)?.as_bool() == Some(false) {
        debug!(table, constraint = %def.name, row = %row.id(), "check violation");
        return Err(Error::check_violation(table, def.name.as_str()));
    }
    Ok(())
}
