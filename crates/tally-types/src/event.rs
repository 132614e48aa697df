//! Outbound events published to every connected observer.
//!
//! Each event carries enough state for a passive observer to reconstruct
//! the ledger without having seen earlier events: balance events carry the
//! full set, lock events carry the full table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BalanceSet, LockSnapshot, OperationRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Full balance snapshot. `sequence` increases by one per applied
    /// operation, so observers can detect gaps.
    BalancesUpdated { sequence: u64, balances: BalanceSet },
    /// Full lock table snapshot.
    LocksUpdated { locks: LockSnapshot },
    /// An operation was applied.
    OperationApplied { record: OperationRecord },
    /// A participant asked everyone to resynchronize.
    BalancesRefreshed {
        requested_by: String,
        at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    /// Short name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BalancesUpdated { .. } => "balances_updated",
            Self::LocksUpdated { .. } => "locks_updated",
            Self::OperationApplied { .. } => "operation_applied",
            Self::BalancesRefreshed { .. } => "balances_refreshed",
        }
    }
}
