//! Ledger store seam.
//!
//! The coordinator persists through [`LedgerStore`] and never touches files
//! directly. Calls happen inside the coordinator's critical section, so
//! implementations are synchronous and need no internal locking.

use tally_types::{BalanceSet, LockSnapshot, OperationRecord, Result, TallyError};

/// Durable home of the balance set, the operation log and the lock mirror.
pub trait LedgerStore: Send + 'static {
    /// Load the persisted balance set. `None` means first run.
    ///
    /// # Errors
    /// Returns a persistence or serialization error if the data is unreadable.
    fn load_all(&self) -> Result<Option<BalanceSet>>;

    /// Replace the persisted balance set.
    ///
    /// # Errors
    /// Returns [`TallyError::StoreUnavailable`] if the write fails.
    fn write_all(&mut self, balances: &BalanceSet) -> Result<()>;

    /// Append one record to the operation log.
    ///
    /// # Errors
    /// Returns [`TallyError::StoreUnavailable`] if the write fails.
    fn append_log(&mut self, record: &OperationRecord) -> Result<()>;

    /// Up to `limit` most recent records, oldest first.
    ///
    /// # Errors
    /// Returns a persistence or serialization error if the log is unreadable.
    fn recent_log(&self, limit: usize) -> Result<Vec<OperationRecord>>;

    /// Mirror the lock table for external inspection.
    ///
    /// # Errors
    /// Returns [`TallyError::StoreUnavailable`] if the write fails.
    fn mirror_locks(&mut self, locks: &LockSnapshot) -> Result<()>;
}

/// In-memory store.
///
/// `set_unavailable(true)` makes every write fail, which is how tests drive
/// the persistence-failure path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    balances: Option<BalanceSet>,
    log: Vec<OperationRecord>,
    locks: Option<LockSnapshot>,
    unavailable: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `balances`, as if from a previous run.
    #[must_use]
    pub fn with_balances(balances: BalanceSet) -> Self {
        Self {
            balances: Some(balances),
            ..Self::default()
        }
    }

    /// Make writes fail (`true`) or succeed again (`false`).
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    #[must_use]
    pub fn balances(&self) -> Option<&BalanceSet> {
        self.balances.as_ref()
    }

    /// Every appended record, oldest first.
    #[must_use]
    pub fn log(&self) -> &[OperationRecord] {
        &self.log
    }

    #[must_use]
    pub fn locks(&self) -> Option<&LockSnapshot> {
        self.locks.as_ref()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(TallyError::StoreUnavailable {
                reason: "memory store switched off".into(),
            });
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn load_all(&self) -> Result<Option<BalanceSet>> {
        Ok(self.balances.clone())
    }

    fn write_all(&mut self, balances: &BalanceSet) -> Result<()> {
        self.check_available()?;
        self.balances = Some(balances.clone());
        Ok(())
    }

    fn append_log(&mut self, record: &OperationRecord) -> Result<()> {
        self.check_available()?;
        self.log.push(record.clone());
        Ok(())
    }

    fn recent_log(&self, limit: usize) -> Result<Vec<OperationRecord>> {
        let start = self.log.len().saturating_sub(limit);
        Ok(self.log[start..].to_vec())
    }

    fn mirror_locks(&mut self, locks: &LockSnapshot) -> Result<()> {
        self.check_available()?;
        self.locks = Some(locks.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tally_types::CounterId;

    use super::*;

    #[test]
    fn first_run_loads_nothing() {
        let store = MemoryStore::new();
        assert!(store.load_all().unwrap().is_none());
    }

    #[test]
    fn write_then_load() {
        let mut store = MemoryStore::new();
        let set: BalanceSet = [(CounterId::from("c1"), Decimal::ONE)].into_iter().collect();
        store.write_all(&set).unwrap();
        assert_eq!(store.load_all().unwrap(), Some(set));
    }

    #[test]
    fn recent_log_is_tail_oldest_first() {
        let mut store = MemoryStore::new();
        for seq in 1..=5 {
            store
                .append_log(&OperationRecord::dummy(seq, "c1", Decimal::ONE))
                .unwrap();
        }
        let seqs: Vec<u64> = store.recent_log(2).unwrap().iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![4, 5]);
        assert_eq!(store.recent_log(100).unwrap().len(), 5);
    }

    #[test]
    fn unavailable_rejects_writes() {
        let mut store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.write_all(&BalanceSet::new()).unwrap_err();
        assert!(matches!(err, TallyError::StoreUnavailable { .. }));
        assert!(store
            .append_log(&OperationRecord::dummy(1, "c1", Decimal::ONE))
            .is_err());
        assert!(store.mirror_locks(&LockSnapshot::default()).is_err());

        store.set_unavailable(false);
        assert!(store.write_all(&BalanceSet::new()).is_ok());
    }
}
