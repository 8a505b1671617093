//! Persistent AVL tree nodes.
//!
//! Nodes are immutable once built and shared through `Rc`; an update copies
//! the path from the root to the changed node and reuses every other subtree.

use std::rc::Rc;

/// Shared link to a subtree.
pub type Link<K, V> = Option<Rc<Node<K, V>>>;

/// A node in the tree.
#[derive(Debug)]
pub struct Node<K, V> {
    pub key: K,
    pub value: V,
    pub left: Link<K, V>,
    pub right: Link<K, V>,
    /// Height of the subtree rooted here (a leaf has height 1).
    pub height: u32,
    /// Number of keys in the subtree rooted here.
    pub size: usize,
}

/// Height of a possibly empty subtree.
#[inline]
pub fn height<K, V>(link: &Link<K, V>) -> u32 {
    link.as_ref().map_or(0, |n| n.height)
}

/// Key count of a possibly empty subtree.
#[inline]
pub fn size<K, V>(link: &Link<K, V>) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

impl<K: Clone, V: Clone> Node<K, V> {
    /// Builds a node over two subtrees, computing height and size.
    pub fn make(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Rc<Self> {
        Rc::new(Self {
            height: 1 + height(&left).max(height(&right)),
            size: 1 + size(&left) + size(&right),
            key,
            value,
            left,
            right,
        })
    }

    /// Builds a single leaf.
    pub fn leaf(key: K, value: V) -> Rc<Self> {
        Self::make(key, value, None, None)
    }

    /// Copies this node with a different value.
    pub fn with_value(&self, value: V) -> Rc<Self> {
        Self::make(self.key.clone(), value, self.left.clone(), self.right.clone())
    }

    fn balance_factor(left: &Link<K, V>, right: &Link<K, V>) -> i64 {
        height(left) as i64 - height(right) as i64
    }

    /// Builds a node over two subtrees whose heights differ by at most two,
    /// rotating as needed to restore the AVL invariant.
    pub fn balance(key: K, value: V, left: Link<K, V>, right: Link<K, V>) -> Rc<Self> {
        let factor = Self::balance_factor(&left, &right);
        if factor > 1 {
            if let Some(l) = &left {
                if height(&l.left) >= height(&l.right) {
                    // single right rotation
                    let new_right = Self::make(key, value, l.right.clone(), right);
                    return Self::make(l.key.clone(), l.value.clone(), l.left.clone(), Some(new_right));
                }
                if let Some(lr) = &l.right {
                    // left-right
                    let new_left =
                        Self::make(l.key.clone(), l.value.clone(), l.left.clone(), lr.left.clone());
                    let new_right = Self::make(key, value, lr.right.clone(), right);
                    return Self::make(
                        lr.key.clone(),
                        lr.value.clone(),
                        Some(new_left),
                        Some(new_right),
                    );
                }
            }
        } else if factor < -1 {
            if let Some(r) = &right {
                if height(&r.right) >= height(&r.left) {
                    // single left rotation
                    let new_left = Self::make(key, value, left, r.left.clone());
                    return Self::make(r.key.clone(), r.value.clone(), Some(new_left), r.right.clone());
                }
                if let Some(rl) = &r.left {
                    // right-left
                    let new_left = Self::make(key, value, left, rl.left.clone());
                    let new_right =
                        Self::make(r.key.clone(), r.value.clone(), rl.right.clone(), r.right.clone());
                    return Self::make(
                        rl.key.clone(),
                        rl.value.clone(),
                        Some(new_left),
                        Some(new_right),
                    );
                }
            }
        }
        Self::make(key, value, left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_computes_size_and_height() {
        let l = Node::leaf(1, ());
        let r = Node::leaf(3, ());
        let n = Node::make(2, (), Some(l), Some(r));
        assert_eq!(n.size, 3);
        assert_eq!(n.height, 2);
    }

    #[test]
    fn test_balance_rotates_left_chain() {
        // 1 -> 2 -> 3 leaning right
        let three = Node::leaf(3, ());
        let two = Node::make(2, (), None, Some(three));
        let root = Node::balance(1, (), None, Some(two));
        assert_eq!(root.key, 2);
        assert_eq!(root.height, 2);
        assert_eq!(root.left.as_ref().map(|n| n.key), Some(1));
        assert_eq!(root.right.as_ref().map(|n| n.key), Some(3));
    }

    #[test]
    fn test_balance_left_right_case() {
        let two = Node::leaf(2, ());
        let one = Node::make(1, (), None, Some(two));
        let root = Node::balance(3, (), Some(one), None);
        assert_eq!(root.key, 2);
        assert_eq!(root.size, 3);
    }
}
