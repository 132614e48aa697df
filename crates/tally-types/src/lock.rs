//! Lock table snapshot types.
//!
//! The lock manager owns the live table; these types are what it hands out
//! to observers and mirrors to the ledger store.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, CounterId};

/// What a start/end-operations request targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockTarget {
    Counter(CounterId),
    Global,
}

impl fmt::Display for LockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Counter(c) => write!(f, "{c}"),
            Self::Global => write!(f, "GLOBAL"),
        }
    }
}

/// A held lock: who holds it and since when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHold {
    pub holder: ActorId,
    pub since: DateTime<Utc>,
}

/// Point-in-time view of every counter lock plus the global lock.
///
/// `counters` holds the *stored* per-counter value. While `global` is
/// `Some`, those values are overridden; use [`LockSnapshot::effective_holder`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSnapshot {
    pub counters: BTreeMap<CounterId, Option<LockHold>>,
    pub global: Option<LockHold>,
}

impl LockSnapshot {
    #[must_use]
    pub fn is_globally_locked(&self) -> bool {
        self.global.is_some()
    }

    /// Holder that currently governs `counter`: the global holder if the
    /// global lock is held, otherwise the counter's own holder.
    #[must_use]
    pub fn effective_holder(&self, counter: &CounterId) -> Option<&ActorId> {
        if let Some(global) = &self.global {
            return Some(&global.holder);
        }
        self.counters
            .get(counter)
            .and_then(Option::as_ref)
            .map(|hold| &hold.holder)
    }
}
