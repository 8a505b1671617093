//! Persistent order-statistic tree.

use super::iter::Range;
use super::node::{size, Link, Node};
use crate::comparator::Comparator;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Bound;
use std::rc::Rc;

/// A persistent, balanced (AVL) map with rank queries.
///
/// Cloning is O(1) and clones never observe each other's updates. Every
/// update is O(log n) and copies only the root-to-target path.
pub struct OrderTree<K, V, C> {
    root: Link<K, V>,
    cmp: C,
}

impl<K, V, C: Clone> Clone for OrderTree<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            cmp: self.cmp.clone(),
        }
    }
}

impl<K: fmt::Debug, V, C> fmt::Debug for OrderTree<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderTree")
            .field("len", &size(&self.root))
            .finish()
    }
}

impl<K, V, C> OrderTree<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Comparator<K> + Clone,
{
    /// Creates an empty tree ordered by `cmp`.
    pub fn new(cmp: C) -> Self {
        Self { root: None, cmp }
    }

    /// Returns the comparator.
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Returns the number of keys.
    #[inline]
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Height of the tree, 0 when empty.
    pub fn height(&self) -> u32 {
        super::node::height(&self.root)
    }

    /// Looks up a key.
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            match self.cmp.compare(key, &node.key) {
                Ordering::Less => cur = node.left.as_deref(),
                Ordering::Greater => cur = node.right.as_deref(),
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Inserts or replaces a binding. Returns true if the key is new.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let (root, added) = Self::insert_at(&self.root, key, value, &self.cmp);
        self.root = Some(root);
        added
    }

    fn insert_at(link: &Link<K, V>, key: K, value: V, cmp: &C) -> (Rc<Node<K, V>>, bool) {
        match link {
            None => (Node::leaf(key, value), true),
            Some(node) => match cmp.compare(&key, &node.key) {
                Ordering::Less => {
                    let (left, added) = Self::insert_at(&node.left, key, value, cmp);
                    let n = Node::balance(
                        node.key.clone(),
                        node.value.clone(),
                        Some(left),
                        node.right.clone(),
                    );
                    (n, added)
                }
                Ordering::Greater => {
                    let (right, added) = Self::insert_at(&node.right, key, value, cmp);
                    let n = Node::balance(
                        node.key.clone(),
                        node.value.clone(),
                        node.left.clone(),
                        Some(right),
                    );
                    (n, added)
                }
                Ordering::Equal => (node.with_value(value), false),
            },
        }
    }

    /// Removes a key and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (root, value) = Self::remove_at(&self.root, key, &self.cmp)?;
        self.root = root;
        Some(value)
    }

    fn remove_at(link: &Link<K, V>, key: &K, cmp: &C) -> Option<(Link<K, V>, V)> {
        let node = link.as_ref()?;
        match cmp.compare(key, &node.key) {
            Ordering::Less => {
                let (left, v) = Self::remove_at(&node.left, key, cmp)?;
                let n = Node::balance(node.key.clone(), node.value.clone(), left, node.right.clone());
                Some((Some(n), v))
            }
            Ordering::Greater => {
                let (right, v) = Self::remove_at(&node.right, key, cmp)?;
                let n = Node::balance(node.key.clone(), node.value.clone(), node.left.clone(), right);
                Some((Some(n), v))
            }
            Ordering::Equal => {
                let replacement = match (&node.left, &node.right) {
                    (None, right) => right.clone(),
                    (left, None) => left.clone(),
                    (left, Some(right)) => {
                        let (rest, k, v) = Self::remove_min(right);
                        Some(Node::balance(k, v, left.clone(), rest))
                    }
                };
                Some((replacement, node.value.clone()))
            }
        }
    }

    fn remove_min(node: &Rc<Node<K, V>>) -> (Link<K, V>, K, V) {
        match &node.left {
            None => (node.right.clone(), node.key.clone(), node.value.clone()),
            Some(left) => {
                let (rest, k, v) = Self::remove_min(left);
                let n = Node::balance(node.key.clone(), node.value.clone(), rest, node.right.clone());
                (Some(n), k, v)
            }
        }
    }

    /// Number of keys strictly before `key`.
    pub fn rank_lower(&self, key: &K) -> usize {
        self.rank_by(|node_key| self.cmp.is_less(node_key, key))
    }

    /// Number of keys before or equal to `key`.
    pub fn rank_upper(&self, key: &K) -> usize {
        self.rank_by(|node_key| self.cmp.is_less_or_equal(node_key, key))
    }

    fn rank_by(&self, before: impl Fn(&K) -> bool) -> usize {
        let mut rank = 0;
        let mut cur = self.root.as_deref();
        while let Some(node) = cur {
            if before(&node.key) {
                rank += size(&node.left) + 1;
                cur = node.right.as_deref();
            } else {
                cur = node.left.as_deref();
            }
        }
        rank
    }

    /// Iterates bindings between two bounds in ascending order.
    ///
    /// The iterator owns a handle on the current root, so later updates to
    /// the tree do not affect it.
    pub fn range(&self, lower: Bound<K>, upper: Bound<K>) -> Range<K, V, C> {
        Range::new(self.root.clone(), lower, upper, self.cmp.clone())
    }

    /// Iterates every binding in ascending order.
    pub fn iter(&self) -> Range<K, V, C> {
        self.range(Bound::Unbounded, Bound::Unbounded)
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.root = None;
    }

    /// Checks ordering, balance and size bookkeeping. Test helper.
    #[doc(hidden)]
    pub fn check_invariants(&self) -> bool {
        fn walk<K: Clone, V: Clone, C: Comparator<K>>(
            link: &Link<K, V>,
            cmp: &C,
        ) -> Option<(u32, usize)> {
            let node = match link {
                None => return Some((0, 0)),
                Some(n) => n,
            };
            if let Some(l) = &node.left {
                if !cmp.is_less(&l.key, &node.key) {
                    return None;
                }
            }
            if let Some(r) = &node.right {
                if !cmp.is_greater(&r.key, &node.key) {
                    return None;
                }
            }
            let (hl, sl) = walk(&node.left, cmp)?;
            let (hr, sr) = walk(&node.right, cmp)?;
            if (hl as i64 - hr as i64).abs() > 1 {
                return None;
            }
            let h = 1 + hl.max(hr);
            let s = 1 + sl + sr;
            if h != node.height || s != node.size {
                return None;
            }
            Some((h, s))
        }
        walk(&self.root, &self.cmp).is_some()
    }
}
