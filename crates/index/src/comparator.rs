//! Comparator implementations for index keys.
//!
//! The tree never relies on `Ord` of its keys; it asks a comparator, so the
//! same key type can be ordered ascending, descending, nulls first or nulls
//! last per key part.

use crate::key::IndexKey;
use std::cmp::Ordering;
use std::rc::Rc;
use tessera_core::schema::IndexPart;

/// Trait for comparing index keys.
pub trait Comparator<K> {
    /// Compares two keys according to the comparator's ordering.
    fn compare(&self, a: &K, b: &K) -> Ordering;

    /// Returns true if a < b according to this comparator.
    fn is_less(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Returns true if a <= b according to this comparator.
    fn is_less_or_equal(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) != Ordering::Greater
    }

    /// Returns true if a > b according to this comparator.
    fn is_greater(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) == Ordering::Greater
    }

    /// Returns true if a >= b according to this comparator.
    fn is_greater_or_equal(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) != Ordering::Less
    }

    /// Returns true if a == b according to this comparator.
    fn is_equal(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Comparator for any `Ord` key in natural order.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Ordering of one key part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartOrder {
    /// Largest values first.
    pub desc: bool,
    /// Nulls before every value, whatever the direction.
    pub nulls_first: bool,
}

impl PartOrder {
    /// Ascending, nulls first.
    pub fn asc() -> Self {
        Self {
            desc: false,
            nulls_first: true,
        }
    }

    /// Descending, nulls last.
    pub fn desc() -> Self {
        Self {
            desc: true,
            nulls_first: false,
        }
    }

    /// Overrides the null placement.
    pub fn nulls_first(mut self, nulls_first: bool) -> Self {
        self.nulls_first = nulls_first;
        self
    }

    /// Applies the direction to a comparison of two non-null values.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        if self.desc {
            ord.reverse()
        } else {
            ord
        }
    }
}

impl From<&IndexPart> for PartOrder {
    fn from(part: &IndexPart) -> Self {
        Self {
            desc: part.is_desc(),
            nulls_first: part.nulls_first(),
        }
    }
}

/// Component-wise comparator for composite index keys.
///
/// Null placement is absolute: a nulls-first part puts nulls before every
/// value whatever its direction.
#[derive(Clone, Debug)]
pub struct KeyComparator {
    parts: Rc<[PartOrder]>,
}

impl KeyComparator {
    /// Creates a comparator from per-part orderings.
    pub fn new(parts: Vec<PartOrder>) -> Self {
        Self {
            parts: parts.into(),
        }
    }

    /// Creates a comparator from index key parts.
    pub fn from_parts(parts: &[IndexPart]) -> Self {
        Self::new(parts.iter().map(PartOrder::from).collect())
    }

    /// Creates a comparator of `n` parts sharing one ordering.
    pub fn uniform(n: usize, part: PartOrder) -> Self {
        Self::new(vec![part; n])
    }

    /// Returns the per-part orderings.
    pub fn parts(&self) -> &[PartOrder] {
        &self.parts
    }

    /// Returns the number of key parts.
    #[inline]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns true if the comparator has no parts.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl Comparator<IndexKey> for KeyComparator {
    /// Compares part by part. A key that runs out of parts first sorts
    /// before the longer one.
    fn compare(&self, a: &IndexKey, b: &IndexKey) -> Ordering {
        let a = a.values();
        let b = b.values();
        for (i, part) in self.parts.iter().enumerate() {
            let cmp = match (a.get(i), b.get(i)) {
                (Some(av), Some(bv)) => match (av.is_null(), bv.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) if part.nulls_first => Ordering::Less,
                    (true, false) => Ordering::Greater,
                    (false, true) if part.nulls_first => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => part.apply(av.cmp(bv)),
                },
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }
}
