//! Tessera Storage - Tables, constraints and namespaces.
//!
//! This crate provides the relational layer on top of the versioned store:
//!
//! - `Table`: rows, the insert/update/delete pipeline and schema changes
//! - `Constraint`: unique and primary keys, foreign keys, checks, identity
//!   and computed columns, and user supplied wrappers
//! - `Namespace`: a set of tables sharing index names and a schema version
//! - `Sequence`: transactional counters behind serial and identity columns
//!
//! # Example
//!
//! ```rust
//! use tessera_core::schema::{ForeignKeyDef, ReferentialAction, TableBuilder};
//! use tessera_core::{DataType, RowValues, Transaction};
//! use tessera_storage::{InsertOptions, Namespace, NamespaceConfig};
//!
//! let ns = Namespace::new("public", NamespaceConfig::default());
//! let mut txn = Transaction::root();
//!
//! let users = TableBuilder::new("users")
//!     .unwrap()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("name", DataType::String)
//!     .unwrap()
//!     .add_primary_key(&["id"])
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let posts = TableBuilder::new("posts")
//!     .unwrap()
//!     .add_column("id", DataType::Int64)
//!     .unwrap()
//!     .add_column("author", DataType::Int64)
//!     .unwrap()
//!     .add_primary_key(&["id"])
//!     .unwrap()
//!     .add_foreign_key(
//!         ForeignKeyDef::new("posts_author_fkey", &["author"], "users", &["id"])
//!             .on_delete(ReferentialAction::Cascade),
//!     )
//!     .unwrap()
//!     .build()
//!     .unwrap();
//! let users = ns.create_table(&mut txn, &users).unwrap();
//! let posts = ns.create_table(&mut txn, &posts).unwrap();
//!
//! let options = InsertOptions::default();
//! let alice = users
//!     .insert(&mut txn, RowValues::new().set("id", 1i64).set("name", "Alice"), &options)
//!     .unwrap()
//!     .unwrap();
//! posts
//!     .insert(&mut txn, RowValues::new().set("id", 10i64).set("author", 1i64), &options)
//!     .unwrap();
//!
//! users.delete(&mut txn, &alice).unwrap();
//! assert_eq!(posts.row_count(&txn), 0);
//! ```

pub mod constraint;
mod ddl;
mod journal;
mod namespace;
mod options;
mod sequence;
mod table;

pub use constraint::{
    CheckConstraint, ComputedConstraint, Constraint, ConstraintKind, ForeignKeyConstraint,
    IdentityConstraint, UniqueConstraint, WrapperConstraint, WrapperInstallFn,
};
pub use ddl::ColumnAlteration;
pub use namespace::{Backup, Namespace, NamespaceConfig};
pub use options::{ConflictAction, ConflictUpdateFn, DropOptions, InsertOptions, OnConflict, TruncateOptions};
pub use sequence::Sequence;
pub use table::{RowMap, Table};
pub use tessera_reactive::{
    ChangeOptions, ChangeScope, DropEvent, IndexEvent, Overriding, Subscription, TruncateEvent,
};
