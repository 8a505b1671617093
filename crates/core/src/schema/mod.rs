//! Schema module for Tessera.
//!
//! This module contains the static schema descriptions: columns, indexes,
//! constraints and whole tables.

mod column;
mod constraint;
mod index;
mod table;

pub use column::{ColumnDef, IdentityMode, IdentitySpec};
pub use constraint::{CheckDef, ForeignKeyDef, ReferentialAction, UniqueDef};
pub use index::{IndexDef, IndexPart, NullsOrder, Order};
pub use table::{check_naming_rules, TableBuilder, TableDef};
