//! Index statistics for Tessera.
//!
//! This module provides the counters an index keeps and the selectivity
//! arithmetic built on them.

/// Counts reported by [`crate::OrderedIndex::stats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Indexed rows (for a key: rows sharing that key).
    pub count: usize,
    /// Distinct keys (for a key: 1 if present, else 0).
    pub keys: usize,
}

impl IndexStats {
    /// Creates stats with the given counts.
    pub fn new(count: usize, keys: usize) -> Self {
        Self { count, keys }
    }

    /// Average number of rows per distinct key; 0 for an empty index.
    pub fn average_fan_out(&self) -> f64 {
        if self.keys == 0 {
            0.0
        } else {
            self.count as f64 / self.keys as f64
        }
    }

    /// Scales an estimated number of matching keys into a row estimate.
    pub fn rows_for_keys(&self, keys: usize) -> f64 {
        keys as f64 * self.average_fan_out()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = IndexStats::default();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.average_fan_out(), 0.0);
    }

    #[test]
    fn test_fan_out() {
        let stats = IndexStats::new(10, 4);
        assert_eq!(stats.average_fan_out(), 2.5);
        assert_eq!(stats.rows_for_keys(2), 5.0);
    }
}
