//! In-order iteration over a persistent tree.

use super::node::{Link, Node};
use crate::comparator::Comparator;
use std::ops::Bound;
use std::rc::Rc;

/// Ascending iterator over the bindings between two bounds.
///
/// Holds `Rc` handles on the nodes it still has to visit, so it does not
/// borrow the tree it came from.
pub struct Range<K, V, C> {
    stack: Vec<Rc<Node<K, V>>>,
    upper: Bound<K>,
    cmp: C,
}

impl<K, V, C> Range<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Comparator<K>,
{
    pub(crate) fn new(root: Link<K, V>, lower: Bound<K>, upper: Bound<K>, cmp: C) -> Self {
        let mut stack = Vec::new();
        let mut cur = root;
        // Seek: keep every node that satisfies the lower bound on the stack
        // and descend left; skip right past nodes below it.
        while let Some(node) = cur {
            let above_lower = match &lower {
                Bound::Unbounded => true,
                Bound::Included(k) => !cmp.is_less(&node.key, k),
                Bound::Excluded(k) => cmp.is_greater(&node.key, k),
            };
            if above_lower {
                cur = node.left.clone();
                stack.push(node);
            } else {
                cur = node.right.clone();
            }
        }
        Self { stack, upper, cmp }
    }

    fn push_left(&mut self, mut link: Link<K, V>) {
        while let Some(node) = link {
            link = node.left.clone();
            self.stack.push(node);
        }
    }

    fn below_upper(&self, key: &K) -> bool {
        match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(k) => self.cmp.is_less_or_equal(key, k),
            Bound::Excluded(k) => self.cmp.is_less(key, k),
        }
    }
}

impl<K, V, C> Iterator for Range<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Comparator<K>,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if !self.below_upper(&node.key) {
            self.stack.clear();
            return None;
        }
        self.push_left(node.right.clone());
        Some((node.key.clone(), node.value.clone()))
    }
}
