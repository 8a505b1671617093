//! The ordered secondary index.

use crate::comparator::{Comparator, KeyComparator};
use crate::key::IndexKey;
use crate::ops::IndexOp;
use crate::stats::IndexStats;
use crate::tree::OrderTree;
use std::cell::RefCell;
use std::fmt;
use std::ops::Bound;
use tessera_core::expr::col;
use tessera_core::schema::{IndexDef, IndexPart};
use tessera_core::{Error, Result, Row, RowId, SlotKey, Transaction, Value};
use tracing::{debug, trace};

/// Rows sharing one key, by row id.
pub type RowSet = im::OrdMap<RowId, Row>;

/// A lazily produced sequence of matching rows. Rows are copies.
pub type RowIter = Box<dyn Iterator<Item = Row>>;

type Tree = OrderTree<IndexKey, RowSet, KeyComparator>;

/// Index contents, as stored in a transaction.
#[derive(Clone, Debug)]
pub struct IndexData {
    tree: Tree,
    /// Number of (key, row) pairings.
    count: usize,
}

impl IndexData {
    fn new(cmp: KeyComparator) -> Self {
        Self {
            tree: OrderTree::new(cmp),
            count: 0,
        }
    }
}

/// A persistent ordered index over one table.
///
/// The index keeps only its definition in native fields; the tree and the
/// row counter live in the [`Transaction`] under the index's own slot, so
/// every handle sees its own version of the index.
pub struct OrderedIndex {
    def: RefCell<IndexDef>,
    table: RefCell<String>,
    cmp: KeyComparator,
    slot: SlotKey<IndexData>,
}

impl fmt::Debug for OrderedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedIndex")
            .field("name", &self.def.borrow().name())
            .field("table", &self.table.borrow())
            .field("slot", &self.slot)
            .finish()
    }
}

impl OrderedIndex {
    /// Creates an empty index for `table`.
    pub fn new(def: IndexDef, table: impl Into<String>) -> Self {
        let cmp = KeyComparator::from_parts(def.parts());
        Self {
            def: RefCell::new(def),
            table: RefCell::new(table.into()),
            cmp,
            slot: SlotKey::new(),
        }
    }

    /// Returns the index name.
    pub fn name(&self) -> String {
        self.def.borrow().name().to_string()
    }

    /// Returns a copy of the definition.
    pub fn definition(&self) -> IndexDef {
        self.def.borrow().clone()
    }

    #[inline]
    pub fn is_unique(&self) -> bool {
        self.def.borrow().is_unique()
    }

    /// Returns the textual keys of the key expressions.
    pub fn key_hashes(&self) -> Vec<String> {
        self.def.borrow().key_hashes()
    }

    /// Returns true if the key or predicate reads `column`.
    pub fn references(&self, column: &str) -> bool {
        self.def.borrow().references(column)
    }

    /// Returns the key comparator.
    pub fn comparator(&self) -> &KeyComparator {
        &self.cmp
    }

    pub fn rename(&self, name: &str) {
        self.def.borrow_mut().set_name(name);
    }

    pub fn set_table_name(&self, table: &str) {
        *self.table.borrow_mut() = table.to_string();
    }

    /// Fails if renaming `from` would need to rewrite an expression key part
    /// or the partial predicate.
    pub fn check_rename_column(&self, from: &str) -> Result<()> {
        let def = self.def.borrow();
        let blocked = def
            .parts()
            .iter()
            .any(|p| p.expr.as_column().is_none() && p.expr.columns().iter().any(|c| c == from))
            || def
                .partial_predicate()
                .map_or(false, |p| p.columns().iter().any(|c| c == from));
        if blocked {
            return Err(Error::unsupported(format!(
                "renaming column \"{}\" used in an expression of index \"{}\"",
                from,
                def.name()
            )));
        }
        Ok(())
    }

    /// Follows a column rename.
    ///
    /// Only bare column key parts can be rewritten; an expression part or a
    /// predicate reading the column makes the rename unsupported.
    pub fn rename_column(&self, from: &str, to: &str) -> Result<()> {
        self.check_rename_column(from)?;
        let mut def = self.def.borrow_mut();
        let parts: Vec<IndexPart> = def
            .parts()
            .iter()
            .map(|p| match p.expr.as_column() {
                Some(c) if c == from => IndexPart {
                    expr: col(to),
                    ..p.clone()
                },
                _ => p.clone(),
            })
            .collect();
        let mut renamed = IndexDef::new(def.name(), parts)
            .unique(def.is_unique())
            .not_null(def.is_not_null());
        if let Some(p) = def.partial_predicate() {
            renamed = renamed.predicate(p.clone());
        }
        *def = renamed;
        Ok(())
    }

    fn data(&self, txn: &Transaction) -> IndexData {
        txn.get(&self.slot)
            .cloned()
            .unwrap_or_else(|| IndexData::new(self.cmp.clone()))
    }

    /// Computes the key of a row.
    pub fn compute_key(&self, row: &Row, txn: &Transaction) -> Result<IndexKey> {
        let def = self.def.borrow();
        let values = def
            .parts()
            .iter()
            .map(|p| p.expr.evaluate(row, txn))
            .collect::<Result<Vec<Value>>>()?;
        Ok(IndexKey::new(values))
    }

    /// Returns false if the row is filtered out by the partial predicate.
    pub fn matches_predicate(&self, row: &Row, txn: &Transaction) -> Result<bool> {
        let def = self.def.borrow();
        match def.partial_predicate() {
            None => Ok(true),
            Some(p) => Ok(p.evaluate(row, txn)?.as_bool() == Some(true)),
        }
    }

    /// Validates that `row` could be added without breaking not-null or
    /// uniqueness. A row with the same id already in the index does not
    /// conflict with itself, so this also validates updates.
    pub fn check_add(&self, txn: &Transaction, row: &Row) -> Result<()> {
        if !self.matches_predicate(row, txn)? {
            return Ok(());
        }
        let key = self.compute_key(row, txn)?;
        self.check_key(txn, &key, row)
    }

    fn check_key(&self, txn: &Transaction, key: &IndexKey, row: &Row) -> Result<()> {
        let def = self.def.borrow();
        if def.is_not_null() {
            if let Some(i) = key.values().iter().position(Value::is_null) {
                let part = &def.parts()[i];
                let column = part
                    .expr
                    .as_column()
                    .map(str::to_string)
                    .unwrap_or_else(|| part.expr.hash_key());
                debug!(index = def.name(), column = %column, "not-null violation");
                return Err(Error::not_null(self.table.borrow().as_str(), column));
            }
        }
        if def.is_unique() && !key.has_null() {
            if let Some(existing) = self.data(txn).tree.get(key) {
                if let Some(other) = existing.keys().find(|id| *id != row.id()) {
                    debug!(index = def.name(), key = %key, row = %other, "unique violation");
                    return Err(Error::unique_violation(def.name(), key.to_string(), other.clone()));
                }
            }
        }
        Ok(())
    }

    /// Returns a row of another identity sharing the candidate row's key,
    /// ignoring null keys and rows outside the partial predicate.
    pub fn find_conflict(&self, txn: &Transaction, row: &Row) -> Result<Option<Row>> {
        if !self.matches_predicate(row, txn)? {
            return Ok(None);
        }
        let key = self.compute_key(row, txn)?;
        if key.has_null() {
            return Ok(None);
        }
        Ok(self.data(txn).tree.get(&key).and_then(|rows| {
            rows.values()
                .find(|r| r.id() != row.id())
                .cloned()
        }))
    }

    /// Adds a row.
    pub fn add(&self, txn: &mut Transaction, row: &Row) -> Result<()> {
        if !self.matches_predicate(row, txn)? {
            return Ok(());
        }
        let key = self.compute_key(row, txn)?;
        self.check_key(txn, &key, row)?;
        let mut data = self.data(txn);
        let mut rows = data.tree.get(&key).cloned().unwrap_or_default();
        if rows.insert(row.id().clone(), row.clone()).is_none() {
            data.count += 1;
        }
        trace!(index = %self.def.borrow().name(), row = %row.id(), key = %key, "index add");
        data.tree.insert(key, rows);
        txn.set(&self.slot, data)
    }

    /// Adds many rows.
    pub fn populate(&self, txn: &mut Transaction, rows: impl IntoIterator<Item = Row>) -> Result<()> {
        for row in rows {
            self.add(txn, &row)?;
        }
        Ok(())
    }

    /// Removes a row.
    pub fn delete(&self, txn: &mut Transaction, row: &Row) -> Result<()> {
        if !self.matches_predicate(row, txn)? {
            return Ok(());
        }
        let key = self.compute_key(row, txn)?;
        let mut data = self.data(txn);
        let mut rows = match data.tree.get(&key) {
            Some(rows) if rows.contains_key(row.id()) => rows.clone(),
            _ => {
                return Err(Error::corrupted(
                    self.table.borrow().as_str(),
                    format!(
                        "row {} is missing from index \"{}\"",
                        row.id(),
                        self.def.borrow().name()
                    ),
                ))
            }
        };
        rows.remove(row.id());
        if rows.is_empty() {
            data.tree.remove(&key);
        } else {
            data.tree.insert(key, rows);
        }
        data.count -= 1;
        trace!(index = %self.def.borrow().name(), row = %row.id(), "index delete");
        txn.set(&self.slot, data)
    }

    /// Resets the index to empty.
    pub fn truncate(&self, txn: &mut Transaction) -> Result<()> {
        txn.set(&self.slot, IndexData::new(self.cmp.clone()))
    }

    /// Returns the number of indexed rows.
    pub fn len(&self, txn: &Transaction) -> usize {
        txn.get(&self.slot).map_or(0, |d| d.count)
    }

    pub fn is_empty(&self, txn: &Transaction) -> bool {
        self.len(txn) == 0
    }

    /// Returns true if at least one row has this exact key.
    pub fn has_key(&self, txn: &Transaction, key: &IndexKey) -> bool {
        self.data(txn).tree.contains_key(key)
    }

    /// Row and key counts, for the whole index or a single key.
    pub fn stats(&self, txn: &Transaction, key: Option<&IndexKey>) -> IndexStats {
        let data = self.data(txn);
        match key {
            None => IndexStats::new(data.count, data.tree.len()),
            Some(key) => match data.tree.get(key) {
                Some(rows) => IndexStats::new(rows.len(), 1),
                None => IndexStats::default(),
            },
        }
    }

    /// Iterates the distinct keys in index order.
    pub fn iterate_keys(&self, txn: &Transaction) -> Box<dyn Iterator<Item = IndexKey>> {
        Box::new(self.data(txn).tree.iter().map(|(k, _)| k))
    }

    /// Iterates every indexed row in key order.
    pub fn scan(&self, txn: &Transaction) -> RowIter {
        flatten(self.data(txn).tree.iter())
    }

    /// Runs a lookup.
    pub fn query(&self, txn: &Transaction, op: &IndexOp) -> RowIter {
        trace!(index = %self.def.borrow().name(), op = op.name(), "index query");
        let tree = self.data(txn).tree;
        let cmp = self.cmp.clone();
        match op {
            IndexOp::Eq { key, match_null } => {
                if key.has_null() && !match_null {
                    return empty();
                }
                let rows = tree.get(key).cloned().unwrap_or_default();
                Box::new(rows.into_iter().map(|(_, r)| r))
            }
            IndexOp::Neq { key, match_null } => {
                if key.has_null() && !match_null {
                    return empty();
                }
                let key = key.clone();
                let match_null = *match_null;
                flatten(
                    tree.iter()
                        .filter(move |(k, _)| !cmp.is_equal(k, &key) && (match_null || !k.has_null())),
                )
            }
            IndexOp::Lt(k) => non_null_range(&tree, Bound::Unbounded, Bound::Excluded(k)),
            IndexOp::Le(k) => non_null_range(&tree, Bound::Unbounded, Bound::Included(k)),
            IndexOp::Gt(k) => non_null_range(&tree, Bound::Excluded(k), Bound::Unbounded),
            IndexOp::Ge(k) => non_null_range(&tree, Bound::Included(k), Bound::Unbounded),
            IndexOp::Inside { lo, hi } => {
                if hi.has_null() {
                    return empty();
                }
                non_null_range(&tree, Bound::Included(lo), Bound::Included(hi))
            }
            IndexOp::Outside { lo, hi } => {
                if lo.has_null() || hi.has_null() {
                    return empty();
                }
                if cmp.is_greater(lo, hi) {
                    // Empty interval: everything is outside.
                    return flatten(tree.iter().filter(|(k, _)| !k.has_null()));
                }
                let below = tree.range(Bound::Unbounded, Bound::Excluded(lo.clone()));
                let above = tree.range(Bound::Excluded(hi.clone()), Bound::Unbounded);
                flatten(below.chain(above).filter(|(k, _)| !k.has_null()))
            }
            IndexOp::Nin(keys) => {
                if keys.iter().any(IndexKey::has_null) {
                    return empty();
                }
                let mut excluded = keys.clone();
                excluded.sort_by(|a, b| cmp.compare(a, b));
                flatten(tree.iter().filter(move |(k, _)| {
                    !k.has_null() && excluded.binary_search_by(|e| cmp.compare(e, k)).is_err()
                }))
            }
        }
    }

    pub fn eq(&self, txn: &Transaction, key: impl Into<IndexKey>, match_null: bool) -> RowIter {
        self.query(
            txn,
            &IndexOp::Eq {
                key: key.into(),
                match_null,
            },
        )
    }

    pub fn neq(&self, txn: &Transaction, key: impl Into<IndexKey>, match_null: bool) -> RowIter {
        self.query(
            txn,
            &IndexOp::Neq {
                key: key.into(),
                match_null,
            },
        )
    }

    pub fn lt(&self, txn: &Transaction, key: impl Into<IndexKey>) -> RowIter {
        self.query(txn, &IndexOp::Lt(key.into()))
    }

    pub fn le(&self, txn: &Transaction, key: impl Into<IndexKey>) -> RowIter {
        self.query(txn, &IndexOp::Le(key.into()))
    }

    pub fn gt(&self, txn: &Transaction, key: impl Into<IndexKey>) -> RowIter {
        self.query(txn, &IndexOp::Gt(key.into()))
    }

    pub fn ge(&self, txn: &Transaction, key: impl Into<IndexKey>) -> RowIter {
        self.query(txn, &IndexOp::Ge(key.into()))
    }

    pub fn inside(
        &self,
        txn: &Transaction,
        lo: impl Into<IndexKey>,
        hi: impl Into<IndexKey>,
    ) -> RowIter {
        self.query(
            txn,
            &IndexOp::Inside {
                lo: lo.into(),
                hi: hi.into(),
            },
        )
    }

    pub fn outside(
        &self,
        txn: &Transaction,
        lo: impl Into<IndexKey>,
        hi: impl Into<IndexKey>,
    ) -> RowIter {
        self.query(
            txn,
            &IndexOp::Outside {
                lo: lo.into(),
                hi: hi.into(),
            },
        )
    }

    pub fn nin(&self, txn: &Transaction, keys: Vec<IndexKey>) -> RowIter {
        self.query(txn, &IndexOp::Nin(keys))
    }

    /// Estimates the number of rows a lookup returns.
    ///
    /// Matching keys are counted by position in the tree and scaled by the
    /// average number of rows per key.
    pub fn entropy(&self, txn: &Transaction, op: &IndexOp) -> f64 {
        let data = self.data(txn);
        let tree = &data.tree;
        let stats = IndexStats::new(data.count, tree.len());
        let total = data.count as f64;
        let keys = tree.len();
        let eq = |key: &IndexKey| stats.rows_for_keys(tree.rank_upper(key) - tree.rank_lower(key));
        match op {
            IndexOp::Eq { key, .. } => eq(key),
            IndexOp::Neq { key, .. } => total - eq(key),
            IndexOp::Lt(k) => stats.rows_for_keys(tree.rank_lower(k)),
            IndexOp::Le(k) => stats.rows_for_keys(tree.rank_upper(k)),
            IndexOp::Gt(k) => stats.rows_for_keys(keys - tree.rank_upper(k)),
            IndexOp::Ge(k) => stats.rows_for_keys(keys - tree.rank_lower(k)),
            IndexOp::Inside { lo, hi } => {
                stats.rows_for_keys(tree.rank_upper(hi).saturating_sub(tree.rank_lower(lo)))
            }
            IndexOp::Outside { lo, hi } => {
                total - stats.rows_for_keys(tree.rank_upper(hi).saturating_sub(tree.rank_lower(lo)))
            }
            IndexOp::Nin(list) => (total - list.iter().map(eq).sum::<f64>()).max(0.0),
        }
    }
}

fn empty() -> RowIter {
    Box::new(std::iter::empty())
}

fn flatten(iter: impl Iterator<Item = (IndexKey, RowSet)> + 'static) -> RowIter {
    Box::new(iter.flat_map(|(_, rows)| rows.into_iter().map(|(_, r)| r)))
}

fn non_null_range(tree: &Tree, lower: Bound<&IndexKey>, upper: Bound<&IndexKey>) -> RowIter {
    let bound_has_null = |b: &Bound<&IndexKey>| match b {
        Bound::Included(k) | Bound::Excluded(k) => k.has_null(),
        Bound::Unbounded => false,
    };
    if bound_has_null(&lower) || bound_has_null(&upper) {
        return empty();
    }
    let range = tree.range(lower.cloned(), upper.cloned());
    flatten(range.filter(|(k, _)| !k.has_null()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tessera_core::expr::func;
    use tessera_core::schema::{NullsOrder, Order};

    fn row(seq: u64, a: Value) -> Row {
        let mut values = BTreeMap::new();
        values.insert("a".to_string(), a);
        Row::new(RowId::new("t", seq), values)
    }

    fn ids(iter: RowIter) -> Vec<u64> {
        let mut out: Vec<u64> = iter.map(|r| r.id().seq()).collect();
        out.sort();
        out
    }

    fn index_with(def: IndexDef, values: &[Option<i32>]) -> (OrderedIndex, Transaction) {
        let index = OrderedIndex::new(def, "t");
        let mut txn = Transaction::root();
        for (i, v) in values.iter().enumerate() {
            let value = v.map(Value::Int32).unwrap_or(Value::Null);
            index.add(&mut txn, &row(i as u64 + 1, value)).unwrap();
        }
        (index, txn)
    }

    fn simple(values: &[Option<i32>]) -> (OrderedIndex, Transaction) {
        index_with(IndexDef::on_columns("idx_a", &["a"]), values)
    }

    #[test]
    fn test_eq_and_neq() {
        let (idx, txn) = simple(&[Some(1), Some(2), Some(2), None]);
        assert_eq!(ids(idx.eq(&txn, Value::Int32(2), false)), vec![2, 3]);
        assert_eq!(ids(idx.eq(&txn, Value::Null, false)), Vec::<u64>::new());
        assert_eq!(ids(idx.eq(&txn, Value::Null, true)), vec![4]);
        assert_eq!(ids(idx.neq(&txn, Value::Int32(2), false)), vec![1]);
        assert_eq!(ids(idx.neq(&txn, Value::Int32(2), true)), vec![1, 4]);
        assert_eq!(ids(idx.neq(&txn, Value::Null, false)), Vec::<u64>::new());
    }

    #[test]
    fn test_ranges_skip_nulls() {
        let (idx, txn) = simple(&[Some(1), Some(2), Some(3), Some(4), None]);
        assert_eq!(ids(idx.lt(&txn, Value::Int32(3))), vec![1, 2]);
        assert_eq!(ids(idx.le(&txn, Value::Int32(3))), vec![1, 2, 3]);
        assert_eq!(ids(idx.gt(&txn, Value::Int32(3))), vec![4]);
        assert_eq!(ids(idx.ge(&txn, Value::Int32(3))), vec![3, 4]);
        assert_eq!(ids(idx.lt(&txn, Value::Null)), Vec::<u64>::new());
    }

    #[test]
    fn test_inside_outside() {
        let (idx, txn) = simple(&[Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(ids(idx.inside(&txn, Value::Int32(2), Value::Int32(3))), vec![2, 3]);
        assert_eq!(ids(idx.outside(&txn, Value::Int32(2), Value::Int32(3))), vec![1, 4]);
        assert_eq!(
            ids(idx.outside(&txn, Value::Int32(3), Value::Int32(2))),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn test_nin() {
        let (idx, txn) = simple(&[Some(1), Some(2), Some(3), None]);
        let keys = vec![IndexKey::from(Value::Int32(2)), IndexKey::from(Value::Int32(9))];
        assert_eq!(ids(idx.nin(&txn, keys)), vec![1, 3]);
        let with_null = vec![IndexKey::from(Value::Int32(2)), IndexKey::from(Value::Null)];
        assert_eq!(ids(idx.nin(&txn, with_null)), Vec::<u64>::new());
    }

    #[test]
    fn test_descending_index_order() {
        let def = IndexDef::new(
            "idx_desc",
            vec![IndexPart::column("a").order(Order::Desc)],
        );
        let (idx, txn) = index_with(def, &[Some(1), Some(2), Some(3), None]);
        let keys: Vec<IndexKey> = idx.iterate_keys(&txn).collect();
        assert_eq!(
            keys,
            vec![
                IndexKey::from(Value::Int32(3)),
                IndexKey::from(Value::Int32(2)),
                IndexKey::from(Value::Int32(1)),
                IndexKey::from(Value::Null),
            ]
        );
        // lt follows index order: keys sorting before 2 are the larger ones
        assert_eq!(ids(idx.lt(&txn, Value::Int32(2))), vec![3]);
    }

    #[test]
    fn test_nulls_last_override() {
        let def = IndexDef::new(
            "idx_nl",
            vec![IndexPart::column("a").nulls(NullsOrder::Last)],
        );
        let (idx, txn) = index_with(def, &[None, Some(1)]);
        let keys: Vec<IndexKey> = idx.iterate_keys(&txn).collect();
        assert_eq!(keys.last(), Some(&IndexKey::from(Value::Null)));
    }

    #[test]
    fn test_unique_violation_leaves_index_unchanged() {
        let def = IndexDef::on_columns("uq_a", &["a"]).unique(true);
        let (idx, mut txn) = index_with(def, &[Some(1), Some(2)]);
        let err = idx.add(&mut txn, &row(10, Value::Int32(1))).unwrap_err();
        match &err {
            Error::UniqueViolation {
                conflicting_row, ..
            } => assert_eq!(conflicting_row.seq(), 1),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.code(), "23505");
        assert_eq!(idx.len(&txn), 2);
        assert_eq!(ids(idx.eq(&txn, Value::Int32(1), false)), vec![1]);
    }

    #[test]
    fn test_unique_allows_multiple_nulls() {
        let def = IndexDef::on_columns("uq_a", &["a"]).unique(true);
        let (idx, txn) = index_with(def, &[None, None, Some(1)]);
        assert_eq!(idx.len(&txn), 3);
        assert_eq!(ids(idx.eq(&txn, Value::Null, true)), vec![1, 2]);
    }

    #[test]
    fn test_not_null_index() {
        let def = IndexDef::on_columns("nn_a", &["a"]).not_null(true);
        let index = OrderedIndex::new(def, "t");
        let mut txn = Transaction::root();
        let err = index.add(&mut txn, &row(1, Value::Null)).unwrap_err();
        assert_eq!(err.code(), "23502");
        assert_eq!(index.len(&txn), 0);
    }

    #[test]
    fn test_partial_index_skips_rows() {
        let pred = func("a > 1", &["a"], |r, _| {
            Ok(Value::Boolean(r.value("a").as_i32().map_or(false, |v| v > 1)))
        });
        let def = IndexDef::on_columns("p_a", &["a"]).unique(true).predicate(pred);
        let (idx, mut txn) = index_with(def, &[Some(1), Some(1), Some(2)]);
        assert_eq!(idx.len(&txn), 1);
        assert!(idx.add(&mut txn, &row(9, Value::Int32(2))).is_err());
        // deleting a filtered row is a no-op
        idx.delete(&mut txn, &row(1, Value::Int32(1))).unwrap();
        assert_eq!(idx.len(&txn), 1);
    }

    #[test]
    fn test_delete_and_missing_row() {
        let (idx, mut txn) = simple(&[Some(1), Some(1)]);
        idx.delete(&mut txn, &row(1, Value::Int32(1))).unwrap();
        assert_eq!(ids(idx.eq(&txn, Value::Int32(1), false)), vec![2]);
        idx.delete(&mut txn, &row(2, Value::Int32(1))).unwrap();
        assert!(!idx.has_key(&txn, &IndexKey::from(Value::Int32(1))));
        let err = idx.delete(&mut txn, &row(2, Value::Int32(1))).unwrap_err();
        assert_eq!(err.code(), "XX000");
    }

    #[test]
    fn test_stats_and_truncate() {
        let (idx, mut txn) = simple(&[Some(1), Some(1), Some(2)]);
        assert_eq!(idx.stats(&txn, None), IndexStats::new(3, 2));
        assert_eq!(
            idx.stats(&txn, Some(&IndexKey::from(Value::Int32(1)))),
            IndexStats::new(2, 1)
        );
        idx.truncate(&mut txn).unwrap();
        assert_eq!(idx.len(&txn), 0);
        assert_eq!(idx.iterate_keys(&txn).count(), 0);
    }

    #[test]
    fn test_entropy_formulas() {
        // keys 1..=4, two rows each
        let (idx, txn) = simple(&[
            Some(1),
            Some(1),
            Some(2),
            Some(2),
            Some(3),
            Some(3),
            Some(4),
            Some(4),
        ]);
        let k = |v: i32| IndexKey::from(Value::Int32(v));
        assert_eq!(idx.entropy(&txn, &IndexOp::eq(Value::Int32(2))), 2.0);
        assert_eq!(idx.entropy(&txn, &IndexOp::eq(Value::Int32(9))), 0.0);
        assert_eq!(idx.entropy(&txn, &IndexOp::neq(Value::Int32(2))), 6.0);
        assert_eq!(idx.entropy(&txn, &IndexOp::Lt(k(3))), 4.0);
        assert_eq!(idx.entropy(&txn, &IndexOp::Le(k(3))), 6.0);
        assert_eq!(idx.entropy(&txn, &IndexOp::Gt(k(3))), 2.0);
        assert_eq!(idx.entropy(&txn, &IndexOp::Ge(k(3))), 4.0);
        assert_eq!(
            idx.entropy(&txn, &IndexOp::Inside { lo: k(2), hi: k(3) }),
            4.0
        );
        assert_eq!(
            idx.entropy(&txn, &IndexOp::Outside { lo: k(2), hi: k(3) }),
            4.0
        );
        assert_eq!(idx.entropy(&txn, &IndexOp::Nin(vec![k(1), k(4)])), 4.0);
    }

    #[test]
    fn test_versions_are_isolated() {
        let (idx, txn) = simple(&[Some(1)]);
        let mut child = txn.fork().unwrap();
        idx.add(&mut child, &row(2, Value::Int32(2))).unwrap();
        assert_eq!(idx.len(&child), 2);
        let parent = child.rollback().unwrap();
        assert_eq!(idx.len(&parent), 1);
        assert!(!idx.has_key(&parent, &IndexKey::from(Value::Int32(2))));
    }

    #[test]
    fn test_find_conflict() {
        let def = IndexDef::on_columns("uq_a", &["a"]).unique(true);
        let (idx, txn) = index_with(def, &[Some(1)]);
        let found = idx.find_conflict(&txn, &row(5, Value::Int32(1))).unwrap();
        assert_eq!(found.map(|r| r.id().seq()), Some(1));
        assert!(idx.find_conflict(&txn, &row(1, Value::Int32(1))).unwrap().is_none());
        assert!(idx.find_conflict(&txn, &row(5, Value::Null)).unwrap().is_none());
    }

    #[test]
    fn test_rename_column() {
        let idx = OrderedIndex::new(IndexDef::on_columns("idx", &["a", "b"]), "t");
        idx.rename_column("a", "z").unwrap();
        assert_eq!(idx.key_hashes(), vec!["z".to_string(), "b".to_string()]);
        let pred = func("b > 0", &["b"], |_, _| Ok(Value::Boolean(true)));
        let partial = OrderedIndex::new(IndexDef::on_columns("p", &["a"]).predicate(pred), "t");
        assert!(partial.rename_column("b", "c").is_err());
    }
}
