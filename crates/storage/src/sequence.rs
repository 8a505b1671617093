//! Sequences backing serial and identity columns.

use std::fmt;
use tessera_core::schema::IdentitySpec;
use tessera_core::{Error, Result, SlotKey, Transaction};
use tracing::trace;

/// A counter producing `start`, `start + increment`, ...
///
/// The last produced value lives in the transaction, so a rolled back insert
/// also rolls back the values it drew.
pub struct Sequence {
    name: String,
    start: i64,
    increment: i64,
    last: SlotKey<i64>,
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("start", &self.start)
            .field("increment", &self.increment)
            .finish()
    }
}

impl Sequence {
    pub fn new(name: impl Into<String>, start: i64, increment: i64) -> Result<Self> {
        let name = name.into();
        if increment == 0 {
            return Err(Error::invalid_schema(format!(
                "INCREMENT must not be zero (sequence \"{}\")",
                name
            )));
        }
        Ok(Self {
            name,
            start,
            increment,
            last: SlotKey::new(),
        })
    }

    /// Creates the sequence of an identity column.
    pub fn for_identity(name: impl Into<String>, spec: &IdentitySpec) -> Result<Self> {
        Self::new(name, spec.start, spec.increment)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Produces the next value.
    pub fn next_value(&self, txn: &mut Transaction) -> Result<i64> {
        let next = match txn.get(&self.last) {
            None => self.start,
            Some(last) => last.checked_add(self.increment).ok_or_else(|| {
                Error::invalid_operation(format!(
                    "nextval: reached maximum value of sequence \"{}\"",
                    self.name
                ))
            })?,
        };
        txn.set(&self.last, next)?;
        trace!(sequence = %self.name, value = next, "next value");
        Ok(next)
    }

    /// Returns the last produced value, if any.
    pub fn current_value(&self, txn: &Transaction) -> Option<i64> {
        txn.get(&self.last).copied()
    }

    /// Makes the next value `start` again.
    pub fn restart(&self, txn: &mut Transaction) -> Result<()> {
        txn.delete(&self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_value() {
        let seq = Sequence::new("s", 10, 5).unwrap();
        let mut txn = Transaction::root();
        assert_eq!(seq.current_value(&txn), None);
        assert_eq!(seq.next_value(&mut txn).unwrap(), 10);
        assert_eq!(seq.next_value(&mut txn).unwrap(), 15);
        assert_eq!(seq.current_value(&txn), Some(15));
    }

    #[test]
    fn test_restart() {
        let seq = Sequence::new("s", 1, 1).unwrap();
        let mut txn = Transaction::root();
        seq.next_value(&mut txn).unwrap();
        seq.next_value(&mut txn).unwrap();
        seq.restart(&mut txn).unwrap();
        assert_eq!(seq.next_value(&mut txn).unwrap(), 1);
    }

    #[test]
    fn test_rollback_returns_values() {
        let seq = Sequence::new("s", 1, 1).unwrap();
        let mut txn = Transaction::root();
        seq.next_value(&mut txn).unwrap();
        let mut child = txn.fork().unwrap();
        seq.next_value(&mut child).unwrap();
        let mut txn = child.rollback().unwrap();
        assert_eq!(seq.next_value(&mut txn).unwrap(), 2);
    }

    #[test]
    fn test_zero_increment() {
        assert!(Sequence::new("s", 1, 0).is_err());
    }

    #[test]
    fn test_overflow() {
        let seq = Sequence::new("s", i64::MAX, 1).unwrap();
        let mut txn = Transaction::root();
        seq.next_value(&mut txn).unwrap();
        assert!(seq.next_value(&mut txn).is_err());
    }
}
