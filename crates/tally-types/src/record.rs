//! Operation records for the Tally audit trail.
//!
//! Every applied operation produces one [`OperationRecord`]. Records are
//! append-only and never re-applied; they exist for history display and
//! audit. Each record is chained to its predecessor by a SHA-256 digest
//! (see `tally_ledger::chain`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ActorId, CounterId, OperationId, OperationKind};

/// Immutable log entry describing one applied operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub id: OperationId,
    /// Position in the log, starting at 1.
    pub sequence: u64,
    pub actor: ActorId,
    pub actor_name: String,
    pub kind: OperationKind,
    /// Counters named by the request (may be empty for `reset_all`).
    pub counters: Vec<CounterId>,
    pub amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
    /// Human-readable description, e.g. "Transferred 25% (2500) from c1 to c2".
    pub description: String,
    pub recorded_at: DateTime<Utc>,
    /// Hex digest of the previous record (all zeros for the first).
    pub prev_digest: String,
    /// Hex SHA-256 over `prev_digest` and this record's content.
    pub digest: String,
}

impl OperationRecord {
    /// The primary counter of the record, used by single-counter displays.
    #[must_use]
    pub fn primary_counter(&self) -> Option<&CounterId> {
        self.counters.first()
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl OperationRecord {
    /// An `add` record on `counter` with placeholder digests.
    pub fn dummy(sequence: u64, counter: &str, amount: Decimal) -> Self {
        Self {
            id: OperationId::new(),
            sequence,
            actor: ActorId::from("tester"),
            actor_name: "Tester".into(),
            kind: OperationKind::Add,
            counters: vec![CounterId::from(counter)],
            amount: Some(amount),
            percentage: None,
            description: format!("Added {amount} to {counter}"),
            recorded_at: Utc::now(),
            prev_digest: crate::constants::GENESIS_DIGEST.to_string(),
            digest: crate::constants::GENESIS_DIGEST.to_string(),
        }
    }
}
