//! Bounded window of recent operation records.
//!
//! The full log lives in the ledger store; this keeps the last `capacity`
//! records in memory so recent-operations queries never touch disk.
//! When the window is full the oldest record is evicted.

use std::collections::VecDeque;

use tally_types::OperationRecord;

/// Recent operation records, oldest at the front.
pub struct RecentOperations {
    records: VecDeque<OperationRecord>,
    capacity: usize,
}

impl RecentOperations {
    /// Create an empty window holding at most `capacity` records.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RecentOperations capacity must be > 0");
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Seed the window from records loaded in log order (oldest first).
    pub fn seeded(capacity: usize, records: impl IntoIterator<Item = OperationRecord>) -> Self {
        let mut window = Self::new(capacity);
        for record in records {
            window.push(record);
        }
        window
    }

    /// Append a record, evicting the oldest if at capacity.
    pub fn push(&mut self, record: OperationRecord) {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Up to `limit` records, newest first.
    #[must_use]
    pub fn latest(&self, limit: usize) -> Vec<OperationRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    /// Most recent record, if any.
    #[must_use]
    pub fn last(&self) -> Option<&OperationRecord> {
        self.records.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn rec(seq: u64) -> OperationRecord {
        OperationRecord::dummy(seq, "c1", Decimal::ONE)
    }

    #[test]
    fn latest_is_newest_first() {
        let window = RecentOperations::seeded(10, (1..=4).map(rec));
        let seqs: Vec<u64> = window.latest(3).iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![4, 3, 2]);
    }

    #[test]
    fn limit_larger_than_window() {
        let window = RecentOperations::seeded(10, (1..=2).map(rec));
        assert_eq!(window.latest(50).len(), 2);
    }

    #[test]
    fn evicts_oldest() {
        let mut window = RecentOperations::new(3);
        for seq in 1..=5 {
            window.push(rec(seq));
        }
        assert_eq!(window.len(), 3);
        let seqs: Vec<u64> = window.latest(10).iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![5, 4, 3]);
        assert_eq!(window.last().map(|r| r.sequence), Some(5));
    }

    #[test]
    fn empty_window() {
        let window = RecentOperations::new(1);
        assert!(window.is_empty());
        assert!(window.latest(10).is_empty());
        assert!(window.last().is_none());
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_capacity_panics() {
        let _ = RecentOperations::new(0);
    }
}
