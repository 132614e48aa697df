//! In-memory authoritative balance ledger.
//!
//! Holds the current balance of every counter and applies exactly one
//! [`Operation`] per call. Every transformation is computed on a copy of a
//! single read of the current set and committed as one atomic swap: either
//! the whole operation lands or the ledger is unchanged.
//!
//! Edge policy:
//! - `subtract` / `subtract_percentage` clamp at zero and never fail.
//! - `transfer` / `deposit_to_bank` move at most what the source holds; the
//!   outcome reports both the requested and the moved amount.
//! - `halve` floors to a whole number; the lost fraction is reported.
//! - `divide_bank` gives each participant `amount / n` truncated to
//!   [`constants::AMOUNT_SCALE`] places and debits the bank by exactly what
//!   was handed out, so any rounding residue stays in the bank.

use rust_decimal::{Decimal, RoundingStrategy};
use tally_types::{
    BalanceSet, CounterId, LedgerConfig, Operation, Result, TallyError, TransferAmount, constants,
};

use crate::conservation::SupplyConservation;

/// Result of one applied transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Balance set after the operation.
    pub balances: BalanceSet,
    /// Human-readable description for the log and notifications.
    pub description: String,
    /// Counters whose balance the operation wrote.
    pub touched: Vec<CounterId>,
    /// Total supply change (zero for conserving kinds).
    pub net_change: Decimal,
    /// Amount requested by a transfer-like operation before clamping.
    pub requested: Option<Decimal>,
    /// Amount actually moved by a transfer-like operation.
    pub moved: Option<Decimal>,
    /// Value lost to truncation (`halve`) or left behind in the bank
    /// (`divide_bank` rounding residue).
    pub remainder: Option<Decimal>,
}

/// Per-kind effect computed against the working copy.
struct Effect {
    description: String,
    touched: Vec<CounterId>,
    net_change: Decimal,
    requested: Option<Decimal>,
    moved: Option<Decimal>,
    remainder: Option<Decimal>,
}

impl Effect {
    fn simple(description: String, counter: &CounterId, net_change: Decimal) -> Self {
        Self {
            description,
            touched: vec![counter.clone()],
            net_change,
            requested: None,
            moved: None,
            remainder: None,
        }
    }
}

/// The authoritative in-memory balance set plus the fixed counter layout.
pub struct BalanceLedger {
    balances: BalanceSet,
    /// Balances restored by `reset_all`.
    initial: BalanceSet,
    bank: CounterId,
    participants: Vec<CounterId>,
    supply: SupplyConservation,
}

impl BalanceLedger {
    /// Create a ledger seeded with the configured initial balances.
    #[must_use]
    pub fn new(config: &LedgerConfig) -> Self {
        let initial = config.initial_balances();
        Self {
            supply: SupplyConservation::new(initial.total()),
            balances: initial.clone(),
            initial,
            bank: config.bank.clone(),
            participants: config.participants.clone(),
        }
    }

    /// Create a ledger from previously persisted balances.
    ///
    /// The loaded set is reconciled against the configured counters:
    /// missing counters get their initial balance, unknown ones are dropped.
    /// Returns the ledger and whether any reconciliation happened.
    #[must_use]
    pub fn restore(config: &LedgerConfig, loaded: BalanceSet) -> (Self, bool) {
        let mut ledger = Self::new(config);
        let mut reconciled = false;

        for (counter, amount) in loaded.iter() {
            if !ledger.initial.contains(counter) {
                tracing::warn!(counter = %counter, "Dropping unknown counter from persisted balances");
                reconciled = true;
            } else if amount.is_sign_negative() {
                tracing::warn!(counter = %counter, amount = %amount, "Clamping negative persisted balance to zero");
                ledger.balances.set(counter.clone(), Decimal::ZERO);
                reconciled = true;
            } else {
                ledger.balances.set(counter.clone(), *amount);
            }
        }
        for counter in ledger.initial.counters() {
            if !loaded.contains(counter) {
                tracing::warn!(counter = %counter, "Seeding counter missing from persisted balances");
                reconciled = true;
            }
        }

        ledger.supply.rebase(ledger.balances.total());
        (ledger, reconciled)
    }

    /// Current balance set.
    #[must_use]
    pub fn balances(&self) -> &BalanceSet {
        &self.balances
    }

    /// Current balance of one counter.
    ///
    /// # Errors
    /// Returns [`TallyError::UnknownCounter`] if the counter is not configured.
    pub fn balance(&self, counter: &CounterId) -> Result<Decimal> {
        self.balances
            .get(counter)
            .ok_or_else(|| TallyError::UnknownCounter(counter.clone()))
    }

    #[must_use]
    pub fn is_known(&self, counter: &CounterId) -> bool {
        self.initial.contains(counter)
    }

    /// Total supply across all counters.
    #[must_use]
    pub fn total_supply(&self) -> Decimal {
        self.balances.total()
    }

    /// Apply one operation atomically.
    ///
    /// # Errors
    /// - `UnknownCounter` if the operation names a counter outside the set
    /// - `InvalidRequest` / `InvalidAmount` for malformed input
    /// - `InsufficientBank` if `divide_bank` asks for more than the bank holds
    /// - `AmountOverflow` if a result exceeds the decimal range
    /// - `SupplyInvariantViolation` if the result breaks conservation
    ///
    /// On error the ledger is unchanged.
    pub fn apply(&mut self, op: &Operation) -> Result<ApplyOutcome> {
        let before = self.balances.total();
        let mut next = self.balances.clone();
        let effect = self.transform(&mut next, op)?;

        if !next.is_non_negative() {
            return Err(TallyError::SupplyInvariantViolation {
                reason: format!("{} produced a negative balance", op.kind()),
            });
        }
        let after = next
            .checked_total()
            .ok_or_else(|| TallyError::AmountOverflow {
                counter: effect.touched.first().cloned().unwrap_or_else(|| self.bank.clone()),
            })?;
        SupplyConservation::check_transition(before, after, effect.net_change)?;

        let mut supply = self.supply.clone();
        supply.record(effect.net_change);
        supply.verify(after)?;

        self.supply = supply;
        self.balances = next;

        Ok(ApplyOutcome {
            balances: self.balances.clone(),
            description: effect.description,
            touched: effect.touched,
            net_change: effect.net_change,
            requested: effect.requested,
            moved: effect.moved,
            remainder: effect.remainder,
        })
    }

    fn transform(&self, next: &mut BalanceSet, op: &Operation) -> Result<Effect> {
        match op {
            Operation::Add { counter, amount } => {
                let current = read(next, counter)?;
                require_non_negative(*amount)?;
                let updated = current
                    .checked_add(*amount)
                    .ok_or_else(|| overflow(counter))?;
                write(next, counter, updated);
                Ok(Effect::simple(
                    format!("Added {} to {counter}", show(*amount)),
                    counter,
                    *amount,
                ))
            }

            Operation::Subtract { counter, amount } => {
                let current = read(next, counter)?;
                require_non_negative(*amount)?;
                let updated = (current - *amount).max(Decimal::ZERO);
                write(next, counter, updated);
                let mut description = format!("Subtracted {} from {counter}", show(*amount));
                if *amount > current {
                    description.push_str(" (clamped at zero)");
                }
                Ok(Effect::simple(description, counter, updated - current))
            }

            Operation::Set { counter, amount } => {
                let current = read(next, counter)?;
                require_non_negative(*amount)?;
                write(next, counter, *amount);
                Ok(Effect::simple(
                    format!("Set {counter} to {}", show(*amount)),
                    counter,
                    *amount - current,
                ))
            }

            Operation::AddPercentage {
                counter,
                percentage,
            } => {
                let current = read(next, counter)?;
                let delta = percent_of(current, *percentage, counter)?;
                let updated = current.checked_add(delta).ok_or_else(|| overflow(counter))?;
                write(next, counter, updated);
                Ok(Effect::simple(
                    format!(
                        "Added {}% ({}) of its balance to {counter}",
                        show(*percentage),
                        show(delta)
                    ),
                    counter,
                    delta,
                ))
            }

            Operation::SubtractPercentage {
                counter,
                percentage,
            } => {
                let current = read(next, counter)?;
                let delta = percent_of(current, *percentage, counter)?;
                let updated = (current - delta).max(Decimal::ZERO);
                write(next, counter, updated);
                Ok(Effect::simple(
                    format!(
                        "Subtracted {}% ({}) of its balance from {counter}",
                        show(*percentage),
                        show(delta)
                    ),
                    counter,
                    updated - current,
                ))
            }

            Operation::Transfer { from, to, amount } => {
                if from == to {
                    return Err(TallyError::InvalidRequest {
                        reason: format!("cannot transfer from {from} to itself"),
                    });
                }
                let source = read(next, from)?;
                read(next, to)?;
                let requested = match amount {
                    TransferAmount::Fixed(fixed) => {
                        require_non_negative(*fixed)?;
                        *fixed
                    }
                    TransferAmount::Percentage(pct) => percent_of(source, *pct, from)?,
                };
                let moved = move_between(next, from, to, requested)?;
                let description = match amount {
                    TransferAmount::Fixed(_) => {
                        format!("Transferred {} from {from} to {to}", show(moved))
                    }
                    TransferAmount::Percentage(pct) => format!(
                        "Transferred {}% ({}) from {from} to {to}",
                        show(*pct),
                        show(moved)
                    ),
                };
                Ok(Effect {
                    description: with_shortfall(description, requested, moved),
                    touched: vec![from.clone(), to.clone()],
                    net_change: Decimal::ZERO,
                    requested: Some(requested),
                    moved: Some(moved),
                    remainder: None,
                })
            }

            Operation::DepositToBank { from, percentage } => {
                if from == &self.bank {
                    return Err(TallyError::InvalidRequest {
                        reason: "the bank cannot deposit into itself".into(),
                    });
                }
                let source = read(next, from)?;
                let requested = percent_of(source, *percentage, from)?;
                let moved = move_between(next, from, &self.bank, requested)?;
                Ok(Effect {
                    description: format!(
                        "Deposited {}% ({}) of {from} into {}",
                        show(*percentage),
                        show(moved),
                        self.bank
                    ),
                    touched: vec![from.clone(), self.bank.clone()],
                    net_change: Decimal::ZERO,
                    requested: Some(requested),
                    moved: Some(moved),
                    remainder: None,
                })
            }

            Operation::Duplicate { counter } => {
                let current = read(next, counter)?;
                let updated = current
                    .checked_mul(Decimal::TWO)
                    .ok_or_else(|| overflow(counter))?;
                write(next, counter, updated);
                Ok(Effect::simple(
                    format!("Doubled the balance of {counter}"),
                    counter,
                    current,
                ))
            }

            Operation::Halve { counter } => {
                let current = read(next, counter)?;
                let exact = current / Decimal::TWO;
                let updated = exact.floor();
                write(next, counter, updated);
                let remainder = exact - updated;
                let mut effect = Effect::simple(
                    format!("Halved the balance of {counter}"),
                    counter,
                    updated - current,
                );
                if !remainder.is_zero() {
                    effect.description = format!(
                        "{} (dropped fractional {})",
                        effect.description,
                        show(remainder)
                    );
                }
                effect.remainder = Some(remainder);
                Ok(effect)
            }

            Operation::DivideBank { amount } => self.divide_bank(next, *amount),

            Operation::Swap { a, b } => {
                if a == b {
                    return Err(TallyError::InvalidRequest {
                        reason: format!("cannot swap {a} with itself"),
                    });
                }
                let left = read(next, a)?;
                let right = read(next, b)?;
                write(next, a, right);
                write(next, b, left);
                Ok(Effect {
                    description: format!("Swapped balances of {a} and {b}"),
                    touched: vec![a.clone(), b.clone()],
                    net_change: Decimal::ZERO,
                    requested: None,
                    moved: None,
                    remainder: None,
                })
            }

            Operation::SetMany { values } => {
                if values.is_empty() {
                    return Err(TallyError::InvalidRequest {
                        reason: "set_many needs at least one counter".into(),
                    });
                }
                let mut net_change = Decimal::ZERO;
                for (counter, amount) in values {
                    let current = read(next, counter)?;
                    require_non_negative(*amount)?;
                    net_change += *amount - current;
                    write(next, counter, *amount);
                }
                let listed = values
                    .iter()
                    .map(|(c, v)| format!("{c}={}", show(*v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                Ok(Effect {
                    description: format!("Set balances: {listed}"),
                    touched: values.keys().cloned().collect(),
                    net_change,
                    requested: None,
                    moved: None,
                    remainder: None,
                })
            }

            Operation::ResetAll => {
                let net_change = self.initial.total() - next.total();
                *next = self.initial.clone();
                Ok(Effect {
                    description: "Reset all balances to their initial values".into(),
                    touched: self.initial.counters().cloned().collect(),
                    net_change,
                    requested: None,
                    moved: None,
                    remainder: None,
                })
            }
        }
    }

    fn divide_bank(&self, next: &mut BalanceSet, amount: Decimal) -> Result<Effect> {
        if amount <= Decimal::ZERO {
            return Err(TallyError::InvalidAmount {
                amount,
                reason: "divide_bank amount must be positive".into(),
            });
        }
        let bank_balance = read(next, &self.bank)?;
        if amount > bank_balance {
            return Err(TallyError::InsufficientBank {
                needed: amount,
                available: bank_balance,
            });
        }

        let n = Decimal::from(self.participants.len());
        let mut share =
            (amount / n).round_dp_with_strategy(constants::AMOUNT_SCALE, RoundingStrategy::ToZero);
        // Truncation keeps share * n <= amount; the guard covers quotients
        // that rounded up at full precision before truncation.
        if share * n > amount {
            share -= Decimal::new(1, constants::AMOUNT_SCALE);
        }
        let distributed = share * n;
        let residue = amount - distributed;

        write(next, &self.bank, bank_balance - distributed);
        for counter in &self.participants {
            let current = read(next, counter)?;
            let updated = current.checked_add(share).ok_or_else(|| overflow(counter))?;
            write(next, counter, updated);
        }

        let mut description = format!(
            "Divided {} from {} among {} counters ({} each)",
            show(distributed),
            self.bank,
            self.participants.len(),
            show(share)
        );
        if !residue.is_zero() {
            description.push_str(&format!("; residue {} stays in {}", show(residue), self.bank));
        }

        let mut touched = vec![self.bank.clone()];
        touched.extend(self.participants.iter().cloned());
        Ok(Effect {
            description,
            touched,
            net_change: Decimal::ZERO,
            requested: Some(amount),
            moved: Some(distributed),
            remainder: Some(residue),
        })
    }
}

fn read(set: &BalanceSet, counter: &CounterId) -> Result<Decimal> {
    set.get(counter)
        .ok_or_else(|| TallyError::UnknownCounter(counter.clone()))
}

fn write(set: &mut BalanceSet, counter: &CounterId, amount: Decimal) {
    set.set(counter.clone(), amount.normalize());
}

fn overflow(counter: &CounterId) -> TallyError {
    TallyError::AmountOverflow {
        counter: counter.clone(),
    }
}

fn require_non_negative(amount: Decimal) -> Result<()> {
    if amount.is_sign_negative() {
        return Err(TallyError::InvalidAmount {
            amount,
            reason: "amount must be >= 0".into(),
        });
    }
    Ok(())
}

/// `balance * pct / 100`, truncated to the amount scale.
fn percent_of(balance: Decimal, pct: Decimal, counter: &CounterId) -> Result<Decimal> {
    if pct.is_sign_negative() || pct > Decimal::ONE_HUNDRED {
        return Err(TallyError::InvalidAmount {
            amount: pct,
            reason: "percentage must be within [0, 100]".into(),
        });
    }
    let scaled = balance.checked_mul(pct).ok_or_else(|| overflow(counter))?;
    Ok((scaled / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(constants::AMOUNT_SCALE, RoundingStrategy::ToZero))
}

/// Move up to `requested` from `from` to `to`; returns the amount moved.
fn move_between(
    next: &mut BalanceSet,
    from: &CounterId,
    to: &CounterId,
    requested: Decimal,
) -> Result<Decimal> {
    let source = read(next, from)?;
    let target = read(next, to)?;
    let moved = requested.min(source);
    let credited = target.checked_add(moved).ok_or_else(|| overflow(to))?;
    write(next, from, source - moved);
    write(next, to, credited);
    Ok(moved)
}

fn with_shortfall(description: String, requested: Decimal, moved: Decimal) -> String {
    if moved < requested {
        format!(
            "{description} (requested {}, only {} available)",
            show(requested),
            show(moved)
        )
    } else {
        description
    }
}

fn show(amount: Decimal) -> Decimal {
    amount.normalize()
}
