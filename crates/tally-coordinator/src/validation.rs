//! Request gate: shape and bounds checks before anything touches state.
//!
//! Only checks that need no ledger state live here. State-dependent
//! failures (unknown counter, bank too small, overflow) come from the ledger.

use rust_decimal::Decimal;
use tally_types::{Operation, RequestLimits, Result, TallyError, TransferAmount, constants};

/// Validates every operation request against the configured limits.
pub struct RequestValidator {
    limits: RequestLimits,
}

impl RequestValidator {
    #[must_use]
    pub fn new(limits: RequestLimits) -> Self {
        Self { limits }
    }

    /// # Errors
    /// Returns a validation-kind [`TallyError`] describing the first problem.
    pub fn validate(&self, op: &Operation) -> Result<()> {
        match op {
            Operation::Add { amount, .. }
            | Operation::Subtract { amount, .. }
            | Operation::DivideBank { amount } => self.check_positive(*amount),
            Operation::Set { amount, .. } => self.check_non_negative(*amount),
            Operation::AddPercentage { percentage, .. }
            | Operation::SubtractPercentage { percentage, .. }
            | Operation::DepositToBank { percentage, .. } => self.check_percentage(*percentage),
            Operation::Transfer { from, to, amount } => {
                if from == to {
                    return Err(TallyError::InvalidRequest {
                        reason: format!("transfer source and target are both {from}"),
                    });
                }
                match amount {
                    TransferAmount::Fixed(fixed) => self.check_positive(*fixed),
                    TransferAmount::Percentage(pct) => self.check_percentage(*pct),
                }
            }
            Operation::Swap { a, b } => {
                if a == b {
                    return Err(TallyError::InvalidRequest {
                        reason: format!("swap needs two different counters, got {a} twice"),
                    });
                }
                Ok(())
            }
            Operation::SetMany { values } => {
                if values.is_empty() {
                    return Err(TallyError::InvalidRequest {
                        reason: "set_many needs at least one counter".into(),
                    });
                }
                values
                    .values()
                    .try_for_each(|amount| self.check_non_negative(*amount))
            }
            Operation::Duplicate { .. } | Operation::Halve { .. } | Operation::ResetAll => Ok(()),
        }
    }

    fn check_positive(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(TallyError::InvalidAmount {
                amount,
                reason: "must be > 0".into(),
            });
        }
        self.check_non_negative(amount)
    }

    fn check_non_negative(&self, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(TallyError::InvalidAmount {
                amount,
                reason: "must be >= 0".into(),
            });
        }
        if amount > self.limits.max_amount {
            return Err(TallyError::InvalidAmount {
                amount,
                reason: format!("exceeds maximum {}", self.limits.max_amount),
            });
        }
        check_scale(amount)
    }

    fn check_percentage(&self, value: Decimal) -> Result<()> {
        if value < self.limits.min_percentage || value > self.limits.max_percentage {
            return Err(TallyError::PercentageOutOfRange {
                value,
                min: self.limits.min_percentage,
                max: self.limits.max_percentage,
            });
        }
        check_scale(value)
    }
}

fn check_scale(value: Decimal) -> Result<()> {
    if value.normalize().scale() > constants::AMOUNT_SCALE {
        return Err(TallyError::InvalidAmount {
            amount: value,
            reason: format!("more than {} decimal places", constants::AMOUNT_SCALE),
        });
    }
    Ok(())
}
