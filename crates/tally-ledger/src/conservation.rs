//! Supply conservation invariant checker.
//!
//! Mathematical invariant enforced after every applied operation:
//! ```text
//! Σ balances == baseline + Σ credited - Σ debited
//! ```
//!
//! Conserving operations (transfer, deposit_to_bank, swap, divide_bank)
//! declare a net change of zero; every other operation declares exactly how
//! much it created or destroyed. If the actual total ever disagrees with the
//! declared one, the operation is refused and reported as an internal error.

use rust_decimal::Decimal;
use tally_types::{Result, TallyError};

/// Tracks the expected total supply across all counters.
#[derive(Debug, Clone)]
pub struct SupplyConservation {
    /// Total at the last rebase (load, seed or reset).
    baseline: Decimal,
    /// Sum of positive net changes since the rebase.
    credited: Decimal,
    /// Sum of negative net changes since the rebase (stored positive).
    debited: Decimal,
}

impl SupplyConservation {
    /// Create a tracker whose expected supply is `baseline`.
    #[must_use]
    pub fn new(baseline: Decimal) -> Self {
        Self {
            baseline,
            credited: Decimal::ZERO,
            debited: Decimal::ZERO,
        }
    }

    /// Record a declared net change (positive = created, negative = destroyed).
    pub fn record(&mut self, net_change: Decimal) {
        if net_change.is_sign_negative() {
            self.debited += -net_change;
        } else {
            self.credited += net_change;
        }
    }

    /// Restart tracking from a new known total.
    pub fn rebase(&mut self, total: Decimal) {
        self.baseline = total;
        self.credited = Decimal::ZERO;
        self.debited = Decimal::ZERO;
    }

    /// Expected total supply: baseline + credited - debited.
    #[must_use]
    pub fn expected_supply(&self) -> Decimal {
        self.baseline + self.credited - self.debited
    }

    /// Check a single transition: `after == before + net_change`.
    ///
    /// # Errors
    /// Returns [`TallyError::SupplyInvariantViolation`] on mismatch.
    pub fn check_transition(before: Decimal, after: Decimal, net_change: Decimal) -> Result<()> {
        if after != before + net_change {
            return Err(TallyError::SupplyInvariantViolation {
                reason: format!(
                    "total moved from {before} to {after}, declared change {net_change}"
                ),
            });
        }
        Ok(())
    }

    /// Verify the actual supply against the tracked expectation.
    ///
    /// # Errors
    /// Returns [`TallyError::SupplyInvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, actual_supply: Decimal) -> Result<()> {
        let expected = self.expected_supply();
        if actual_supply != expected {
            return Err(TallyError::SupplyInvariantViolation {
                reason: format!(
                    "actual supply {actual_supply} != expected {expected} \
                     (baseline={}, credited={}, debited={})",
                    self.baseline, self.credited, self.debited,
                ),
            });
        }
        Ok(())
    }
}

impl Default for SupplyConservation {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    #[test]
    fn empty_supply_is_baseline() {
        let sc = SupplyConservation::new(dec(50_000));
        assert_eq!(sc.expected_supply(), dec(50_000));
        assert!(sc.verify(dec(50_000)).is_ok());
    }

    #[test]
    fn credits_and_debits_move_expectation() {
        let mut sc = SupplyConservation::new(dec(1000));
        sc.record(dec(500));
        sc.record(dec(-300));
        assert_eq!(sc.expected_supply(), dec(1200));
        assert!(sc.verify(dec(1200)).is_ok());
    }

    #[test]
    fn verify_fails_when_imbalanced() {
        let mut sc = SupplyConservation::new(dec(10));
        sc.record(Decimal::ZERO);
        let err = sc.verify(dec(11)).unwrap_err();
        assert!(matches!(err, TallyError::SupplyInvariantViolation { .. }));
    }

    #[test]
    fn rebase_forgets_history() {
        let mut sc = SupplyConservation::new(dec(10));
        sc.record(dec(5));
        sc.rebase(dec(3));
        assert_eq!(sc.expected_supply(), dec(3));
    }

    #[test]
    fn transition_check() {
        assert!(SupplyConservation::check_transition(dec(100), dec(100), Decimal::ZERO).is_ok());
        assert!(SupplyConservation::check_transition(dec(100), dec(90), dec(-10)).is_ok());
        assert!(SupplyConservation::check_transition(dec(100), dec(101), Decimal::ZERO).is_err());
    }
}
