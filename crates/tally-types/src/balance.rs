//! Balance set: the authoritative amount held by every counter.
//!
//! Counters are kept in a `BTreeMap` so snapshots serialize in a stable
//! order and every observer sees byte-identical payloads.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CounterId;

/// Current balance of every known counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalanceSet(BTreeMap<CounterId, Decimal>);

impl BalanceSet {
    /// Create an empty balance set.
    #[must_use]
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Balance of `counter`, or `None` if the counter is not part of the set.
    #[must_use]
    pub fn get(&self, counter: &CounterId) -> Option<Decimal> {
        self.0.get(counter).copied()
    }

    /// Overwrite the balance of `counter`, inserting it if absent.
    pub fn set(&mut self, counter: CounterId, amount: Decimal) {
        self.0.insert(counter, amount);
    }

    /// Remove a counter, returning its last balance.
    pub fn remove(&mut self, counter: &CounterId) -> Option<Decimal> {
        self.0.remove(counter)
    }

    #[must_use]
    pub fn contains(&self, counter: &CounterId) -> bool {
        self.0.contains_key(counter)
    }

    /// Sum of all balances.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    /// Sum of all balances, or `None` if it exceeds the decimal range.
    #[must_use]
    pub fn checked_total(&self) -> Option<Decimal> {
        self.0
            .values()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
    }

    /// Counter names in stable order.
    pub fn counters(&self) -> impl Iterator<Item = &CounterId> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CounterId, &Decimal)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every balance is non-negative.
    #[must_use]
    pub fn is_non_negative(&self) -> bool {
        self.0.values().all(|v| !v.is_sign_negative())
    }
}

impl FromIterator<(CounterId, Decimal)> for BalanceSet {
    fn from_iter<I: IntoIterator<Item = (CounterId, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
