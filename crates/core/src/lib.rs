//! Tessera Core - core types, schema definitions and the versioned
//! transaction store for the Tessera storage engine.
//!
//! This crate provides the foundational types every other Tessera crate
//! builds on:
//!
//! - `DataType` / `Value`: stored types and values, with ordering and casts
//! - `Row` / `RowId` / `RowValues`: stored rows and insert payloads
//! - `Expression`: the boundary to whatever evaluates SQL expressions
//! - `schema`: static definitions (columns, indexes, constraints, tables)
//! - `Transaction`: the copy-on-write version store every table and index
//!   keeps its data in
//! - `Error`: the error taxonomy with SQLSTATE-style codes
//!
//! # Example
//!
//! ```rust
//! use tessera_core::{DataType, SlotKey, Transaction};
//! use tessera_core::schema::TableBuilder;
//!
//! let table = TableBuilder::new("users")
//!     .unwrap()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("name", DataType::String)
//!     .unwrap()
//!     .add_primary_key(&["id"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! assert_eq!(table.primary_key().unwrap().name, "users_pkey");
//!
//! let counter: SlotKey<u32> = SlotKey::new();
//! let mut txn = Transaction::root().fork().unwrap();
//! txn.set(&counter, 1).unwrap();
//! let root = txn.rollback().unwrap();
//! assert_eq!(root.get(&counter), None);
//! ```

mod error;
pub mod expr;
mod row;
pub mod schema;
mod types;
mod value;
mod version;

pub use error::{Error, ErrorKind, Result};
pub use expr::{ExprRef, Expression};
pub use row::{Row, RowId, RowValues};
pub use types::DataType;
pub use value::Value;
pub use version::{Savepoint, SlotKey, Transaction, TxnStatus};
