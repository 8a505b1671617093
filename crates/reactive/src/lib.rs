//! Tessera Reactive - Change notification for Tessera tables.
//!
//! Constraints and external consumers observe table mutations through this
//! crate instead of reaching into table internals.
//!
//! # Core Concepts
//!
//! - `ChangeBus`: before/after change observers scoped to all columns or a
//!   column set
//! - `HookList`: drop, truncate and index hooks
//! - `Subscription`: handle used to unsubscribe, or to detach a handler and
//!   put it back later
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use tessera_core::{Error, Row, RowId, Transaction, Value};
//! use tessera_reactive::{ChangeBus, ChangeOptions, ChangeScope, Priority};
//!
//! let bus = ChangeBus::new();
//! let guard = bus.on_before_change(ChangeScope::columns(&["a"]), Priority::Normal, |_, new, _, _| {
//!     match new.map(|r| r.value("a").clone()) {
//!         Some(Value::Int32(v)) if v < 0 => Err(Error::check_violation("t", "a_positive")),
//!         _ => Ok(()),
//!     }
//! });
//!
//! let mut txn = Transaction::root();
//! let mut values = BTreeMap::new();
//! values.insert("a".to_string(), Value::Int32(-1));
//! let mut row = Row::new(RowId::new("t", 1), values);
//! assert!(bus.dispatch_before(None, Some(&mut row), &mut txn, &ChangeOptions::default()).is_err());
//!
//! guard.unsubscribe();
//! assert!(bus.dispatch_before(None, Some(&mut row), &mut txn, &ChangeOptions::default()).is_ok());
//! ```

pub mod bus;
pub mod change;
pub mod hooks;
pub mod subscription;

pub use bus::{AfterChangeFn, BeforeChangeFn, ChangeBus, ChangeScope, Priority};
pub use change::{ChangeKind, ChangeOptions, Overriding};
pub use hooks::{DropEvent, HookFn, HookList, IndexEvent, TruncateEvent};
pub use subscription::{Detached, Subscription, SubscriptionId, SubscriptionManager, Unsubscribe};
