//! Operation model: the closed set of transformations a ledger accepts.
//!
//! Every mutating request carries exactly one [`Operation`]. The enum is
//! serde-tagged by `kind`, so the wire form is e.g.
//! `{"kind":"transfer","from":"c1","to":"c2","amount":{"mode":"percentage","value":"25"}}`.

use std::{collections::BTreeMap, fmt};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CounterId;

/// Discriminant of an [`Operation`], used in records and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Subtract,
    Set,
    AddPercentage,
    SubtractPercentage,
    Transfer,
    DepositToBank,
    Duplicate,
    Halve,
    DivideBank,
    Swap,
    SetMany,
    ResetAll,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Set => "set",
            Self::AddPercentage => "add_percentage",
            Self::SubtractPercentage => "subtract_percentage",
            Self::Transfer => "transfer",
            Self::DepositToBank => "deposit_to_bank",
            Self::Duplicate => "duplicate",
            Self::Halve => "halve",
            Self::DivideBank => "divide_bank",
            Self::Swap => "swap",
            Self::SetMany => "set_many",
            Self::ResetAll => "reset_all",
        };
        f.write_str(name)
    }
}

/// How much a transfer moves: a fixed amount or a share of the source balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum TransferAmount {
    Fixed(Decimal),
    Percentage(Decimal),
}

/// One named transformation of the balance set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Operation {
    /// `balance[c] += amount`
    Add { counter: CounterId, amount: Decimal },
    /// `balance[c] = max(0, balance[c] - amount)`
    Subtract { counter: CounterId, amount: Decimal },
    /// `balance[c] = amount`
    Set { counter: CounterId, amount: Decimal },
    /// `balance[c] += balance[c] * pct / 100`
    AddPercentage {
        counter: CounterId,
        percentage: Decimal,
    },
    /// `balance[c] = max(0, balance[c] - balance[c] * pct / 100)`
    SubtractPercentage {
        counter: CounterId,
        percentage: Decimal,
    },
    /// Move a fixed amount or a percentage from one counter to another,
    /// clamped to what `from` holds.
    Transfer {
        from: CounterId,
        to: CounterId,
        amount: TransferAmount,
    },
    /// Move `balance[from] * pct / 100` into the bank.
    DepositToBank { from: CounterId, percentage: Decimal },
    /// `balance[c] *= 2`
    Duplicate { counter: CounterId },
    /// `balance[c] = floor(balance[c] / 2)`
    Halve { counter: CounterId },
    /// Take `amount` from the bank and split it evenly across every
    /// participant counter.
    DivideBank { amount: Decimal },
    /// Exchange the balances of two counters.
    Swap { a: CounterId, b: CounterId },
    /// Set an arbitrary subset of counters in one step.
    SetMany { values: BTreeMap<CounterId, Decimal> },
    /// Restore the configured initial balances.
    ResetAll,
}

impl Operation {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Add { .. } => OperationKind::Add,
            Self::Subtract { .. } => OperationKind::Subtract,
            Self::Set { .. } => OperationKind::Set,
            Self::AddPercentage { .. } => OperationKind::AddPercentage,
            Self::SubtractPercentage { .. } => OperationKind::SubtractPercentage,
            Self::Transfer { .. } => OperationKind::Transfer,
            Self::DepositToBank { .. } => OperationKind::DepositToBank,
            Self::Duplicate { .. } => OperationKind::Duplicate,
            Self::Halve { .. } => OperationKind::Halve,
            Self::DivideBank { .. } => OperationKind::DivideBank,
            Self::Swap { .. } => OperationKind::Swap,
            Self::SetMany { .. } => OperationKind::SetMany,
            Self::ResetAll => OperationKind::ResetAll,
        }
    }

    /// The counter an operator must own to request this operation.
    ///
    /// `None` for operations without a single source (admin-only kinds).
    #[must_use]
    pub fn source_counter(&self) -> Option<&CounterId> {
        match self {
            Self::Add { counter, .. }
            | Self::Subtract { counter, .. }
            | Self::Set { counter, .. }
            | Self::AddPercentage { counter, .. }
            | Self::SubtractPercentage { counter, .. }
            | Self::Duplicate { counter }
            | Self::Halve { counter } => Some(counter),
            Self::Transfer { from, .. } | Self::DepositToBank { from, .. } => Some(from),
            Self::DivideBank { .. } | Self::Swap { .. } | Self::SetMany { .. } | Self::ResetAll => {
                None
            }
        }
    }

    /// Kinds reserved for admins: they touch several counters at once.
    #[must_use]
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Self::DivideBank { .. } | Self::Swap { .. } | Self::SetMany { .. } | Self::ResetAll
        )
    }

    /// Counters named explicitly in the request, in request order.
    #[must_use]
    pub fn named_counters(&self) -> Vec<CounterId> {
        match self {
            Self::Transfer { from, to, .. } => vec![from.clone(), to.clone()],
            Self::Swap { a, b } => vec![a.clone(), b.clone()],
            Self::SetMany { values } => values.keys().cloned().collect(),
            Self::DivideBank { .. } | Self::ResetAll => Vec::new(),
            other => other.source_counter().cloned().into_iter().collect(),
        }
    }

    /// Fixed amount carried by the request, if any.
    #[must_use]
    pub fn amount(&self) -> Option<Decimal> {
        match self {
            Self::Add { amount, .. }
            | Self::Subtract { amount, .. }
            | Self::Set { amount, .. }
            | Self::DivideBank { amount }
            | Self::Transfer {
                amount: TransferAmount::Fixed(amount),
                ..
            } => Some(*amount),
            _ => None,
        }
    }

    /// Percentage carried by the request, if any.
    #[must_use]
    pub fn percentage(&self) -> Option<Decimal> {
        match self {
            Self::AddPercentage { percentage, .. }
            | Self::SubtractPercentage { percentage, .. }
            | Self::DepositToBank { percentage, .. }
            | Self::Transfer {
                amount: TransferAmount::Percentage(percentage),
                ..
            } => Some(*percentage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(name: &str) -> CounterId {
        CounterId::from(name)
    }

    #[test]
    fn transfer_wire_format() {
        let json = r#"{"kind":"transfer","from":"c1","to":"c2","amount":{"mode":"percentage","value":"25"}}"#;
        let op: Operation = serde_json::from_str(json).unwrap();
        assert_eq!(
            op,
            Operation::Transfer {
                from: c("c1"),
                to: c("c2"),
                amount: TransferAmount::Percentage(Decimal::new(25, 0)),
            }
        );
        assert_eq!(op.kind(), OperationKind::Transfer);
        assert_eq!(op.percentage(), Some(Decimal::new(25, 0)));
        assert_eq!(op.amount(), None);
    }

    #[test]
    fn reset_all_has_no_fields() {
        let op: Operation = serde_json::from_str(r#"{"kind":"reset_all"}"#).unwrap();
        assert_eq!(op, Operation::ResetAll);
        assert!(op.is_admin_only());
        assert!(op.named_counters().is_empty());
    }

    #[test]
    fn unknown_kind_rejected() {
        let res: Result<Operation, _> = serde_json::from_str(r#"{"kind":"triple","counter":"c1"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn source_counter_per_kind() {
        let add = Operation::Add {
            counter: c("c1"),
            amount: Decimal::ONE,
        };
        assert_eq!(add.source_counter(), Some(&c("c1")));

        let deposit = Operation::DepositToBank {
            from: c("c2"),
            percentage: Decimal::TEN,
        };
        assert_eq!(deposit.source_counter(), Some(&c("c2")));

        let swap = Operation::Swap {
            a: c("c1"),
            b: c("c2"),
        };
        assert_eq!(swap.source_counter(), None);
        assert_eq!(swap.named_counters(), vec![c("c1"), c("c2")]);
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(OperationKind::DepositToBank.to_string(), "deposit_to_bank");
        assert_eq!(
            serde_json::to_string(&OperationKind::SetMany).unwrap(),
            "\"set_many\""
        );
    }
}
