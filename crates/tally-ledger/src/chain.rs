//! Digest chain over the operation log.
//!
//! Each record carries the digest of its predecessor and its own digest:
//! ```text
//! digest = SHA-256("tally:op:v1:" || prev_digest || sequence || content...)
//! ```
//! Any edit, removal or reordering of a persisted record breaks the chain,
//! which [`verify_chain`] detects.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tally_types::{
    ActorId, CounterId, OperationId, OperationKind, OperationRecord, Result, TallyError, constants,
};

/// Unsealed record content produced by the coordinator.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub actor: ActorId,
    pub actor_name: String,
    pub kind: OperationKind,
    pub counters: Vec<CounterId>,
    pub amount: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub description: String,
}

/// Assigns sequence numbers and digests to new records.
#[derive(Debug, Clone)]
pub struct LogChain {
    next_sequence: u64,
    last_digest: String,
}

impl LogChain {
    /// A chain with no records yet.
    #[must_use]
    pub fn genesis() -> Self {
        Self {
            next_sequence: 1,
            last_digest: constants::GENESIS_DIGEST.to_string(),
        }
    }

    /// Continue after the given last record (or from genesis).
    #[must_use]
    pub fn resume(last: Option<&OperationRecord>) -> Self {
        match last {
            Some(record) => Self {
                next_sequence: record.sequence + 1,
                last_digest: record.digest.clone(),
            },
            None => Self::genesis(),
        }
    }

    /// Sequence number the next sealed record will get.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Seal a draft into the next record of the chain.
    pub fn seal(&mut self, draft: RecordDraft) -> OperationRecord {
        self.seal_at(draft, Utc::now())
    }

    /// Seal with an explicit timestamp.
    pub fn seal_at(&mut self, draft: RecordDraft, recorded_at: DateTime<Utc>) -> OperationRecord {
        let mut record = OperationRecord {
            id: OperationId::new(),
            sequence: self.next_sequence,
            actor: draft.actor,
            actor_name: draft.actor_name,
            kind: draft.kind,
            counters: draft.counters,
            amount: draft.amount,
            percentage: draft.percentage,
            description: draft.description,
            recorded_at,
            prev_digest: self.last_digest.clone(),
            digest: String::new(),
        };
        record.digest = compute_digest(&record);
        self.next_sequence += 1;
        self.last_digest.clone_from(&record.digest);
        record
    }
}

impl Default for LogChain {
    fn default() -> Self {
        Self::genesis()
    }
}

/// Hex SHA-256 over a record's predecessor digest and content.
///
/// The record's own `digest` field is not part of the input.
#[must_use]
pub fn compute_digest(record: &OperationRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"tally:op:v1:");
    hasher.update(record.prev_digest.as_bytes());
    hasher.update(record.sequence.to_le_bytes());
    hasher.update(record.id.0.as_bytes());
    hasher.update(record.actor.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(record.kind.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update((record.counters.len() as u64).to_le_bytes());
    for counter in &record.counters {
        hasher.update(counter.as_str().as_bytes());
        hasher.update(b"\0");
    }
    for value in [record.amount, record.percentage] {
        match value {
            Some(v) => hasher.update(v.normalize().to_string().as_bytes()),
            None => hasher.update(b"-"),
        }
        hasher.update(b"\0");
    }
    hasher.update(record.description.as_bytes());
    hasher.update(b"\0");
    hasher.update(record.recorded_at.timestamp_micros().to_le_bytes());
    hex::encode(hasher.finalize())
}

/// Verify that `records` (oldest first) form an unbroken chain.
///
/// The first record may start anywhere; only the links between consecutive
/// records and each record's own digest are checked.
///
/// # Errors
/// Returns [`TallyError::LogChainBroken`] naming the first bad sequence.
pub fn verify_chain(records: &[OperationRecord]) -> Result<()> {
    let mut previous: Option<&OperationRecord> = None;
    for record in records {
        if let Some(prev) = previous {
            if record.sequence != prev.sequence + 1 {
                return Err(TallyError::LogChainBroken {
                    sequence: record.sequence,
                    reason: format!("expected sequence {}", prev.sequence + 1),
                });
            }
            if record.prev_digest != prev.digest {
                return Err(TallyError::LogChainBroken {
                    sequence: record.sequence,
                    reason: "previous digest does not match".into(),
                });
            }
        } else if record.sequence == 1 && record.prev_digest != constants::GENESIS_DIGEST {
            return Err(TallyError::LogChainBroken {
                sequence: 1,
                reason: "first record does not start from genesis".into(),
            });
        }
        if compute_digest(record) != record.digest {
            return Err(TallyError::LogChainBroken {
                sequence: record.sequence,
                reason: "content digest mismatch".into(),
            });
        }
        previous = Some(record);
    }
    Ok(())
}
