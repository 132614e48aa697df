//! Configuration types for the coordinator process.
//!
//! Every struct has a `Default` and is `#[serde(default)]`, so a config file
//! only needs the fields it overrides. Call [`CoordinatorConfig::validate`]
//! before use; [`CoordinatorConfig::from_json_file`] does so automatically.

use std::{
    collections::HashSet,
    net::{Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BalanceSet, CounterId, Result, Role, TallyError, constants};

/// Top-level configuration for one coordinator process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Address to listen on for client connections.
    pub listen_addr: SocketAddr,
    /// Directory for the JSON file store. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// The fixed set of counters and their initial balances.
    pub ledger: LedgerConfig,
    /// Request validation bounds.
    pub limits: RequestLimits,
    /// Known identities (the session source's credential table).
    pub accounts: Vec<AccountConfig>,
    /// Number of recent operation records kept in memory.
    pub history_capacity: usize,
    /// Capacity of the observer broadcast channel.
    pub broadcast_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let ledger = LedgerConfig::default();
        let accounts = AccountConfig::defaults_for(&ledger);
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            data_dir: None,
            ledger,
            limits: RequestLimits::default(),
            accounts,
            history_capacity: constants::DEFAULT_HISTORY_CAPACITY,
            broadcast_capacity: constants::DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TallyError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TallyError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        self.ledger.validate()?;
        self.limits.validate()?;

        let mut usernames = HashSet::new();
        for account in &self.accounts {
            if !usernames.insert(account.username.as_str()) {
                return Err(TallyError::Configuration(format!(
                    "duplicate username {}",
                    account.username
                )));
            }
            match (account.role, &account.counter) {
                (Role::Operator, None) => {
                    return Err(TallyError::Configuration(format!(
                        "operator {} has no assigned counter",
                        account.username
                    )));
                }
                (Role::Operator, Some(counter)) if !self.ledger.is_participant(counter) => {
                    return Err(TallyError::Configuration(format!(
                        "operator {} assigned to {counter}, which is not a participant counter",
                        account.username
                    )));
                }
                _ => {}
            }
        }

        if self.history_capacity == 0 {
            return Err(TallyError::Configuration(
                "history_capacity must be > 0".into(),
            ));
        }
        if self.broadcast_capacity == 0 {
            return Err(TallyError::Configuration(
                "broadcast_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// The fixed counter set: one bank plus N participant counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub bank: CounterId,
    pub participants: Vec<CounterId>,
    /// Initial balance of every participant counter.
    pub starting_balance: Decimal,
    /// Initial balance of the bank.
    pub bank_starting_balance: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bank: CounterId::from(constants::DEFAULT_BANK_COUNTER),
            participants: (1..=constants::DEFAULT_PARTICIPANT_COUNT)
                .map(|i| CounterId::new(format!("c{i}")))
                .collect(),
            starting_balance: Decimal::new(constants::DEFAULT_STARTING_BALANCE, 0),
            bank_starting_balance: Decimal::new(constants::DEFAULT_BANK_STARTING_BALANCE, 0),
        }
    }
}

impl LedgerConfig {
    /// Ledger config with the given participant names and default amounts.
    #[must_use]
    pub fn with_participants(names: &[&str]) -> Self {
        Self {
            participants: names.iter().map(|n| CounterId::from(*n)).collect(),
            ..Self::default()
        }
    }

    /// Balances restored by `reset_all` and seeded on first run.
    #[must_use]
    pub fn initial_balances(&self) -> BalanceSet {
        std::iter::once((self.bank.clone(), self.bank_starting_balance))
            .chain(
                self.participants
                    .iter()
                    .map(|c| (c.clone(), self.starting_balance)),
            )
            .collect()
    }

    #[must_use]
    pub fn is_bank(&self, counter: &CounterId) -> bool {
        &self.bank == counter
    }

    #[must_use]
    pub fn is_participant(&self, counter: &CounterId) -> bool {
        self.participants.contains(counter)
    }

    /// Bank first, then participants in configured order.
    #[must_use]
    pub fn all_counters(&self) -> Vec<CounterId> {
        std::iter::once(self.bank.clone())
            .chain(self.participants.iter().cloned())
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.participants.is_empty() {
            return Err(TallyError::Configuration(
                "at least one participant counter is required".into(),
            ));
        }
        let mut seen = HashSet::new();
        for counter in self.all_counters() {
            if counter.as_str().is_empty() {
                return Err(TallyError::Configuration("empty counter name".into()));
            }
            if !seen.insert(counter.clone()) {
                return Err(TallyError::Configuration(format!(
                    "duplicate counter {counter}"
                )));
            }
        }
        if self.starting_balance.is_sign_negative() || self.bank_starting_balance.is_sign_negative()
        {
            return Err(TallyError::Configuration(
                "starting balances must be >= 0".into(),
            ));
        }
        Ok(())
    }
}

/// Bounds applied to every request before it reaches the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestLimits {
    pub min_percentage: Decimal,
    pub max_percentage: Decimal,
    pub max_amount: Decimal,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            min_percentage: Decimal::new(constants::MIN_PERCENTAGE, 0),
            max_percentage: Decimal::new(constants::MAX_PERCENTAGE, 0),
            max_amount: Decimal::new(constants::DEFAULT_MAX_AMOUNT, 0),
        }
    }
}

impl RequestLimits {
    pub fn validate(&self) -> Result<()> {
        if self.min_percentage <= Decimal::ZERO || self.min_percentage > self.max_percentage {
            return Err(TallyError::Configuration(format!(
                "invalid percentage bounds [{}, {}]",
                self.min_percentage, self.max_percentage
            )));
        }
        if self.max_percentage > Decimal::ONE_HUNDRED {
            return Err(TallyError::Configuration(
                "max_percentage cannot exceed 100".into(),
            ));
        }
        if self.max_amount <= Decimal::ZERO {
            return Err(TallyError::Configuration("max_amount must be > 0".into()));
        }
        Ok(())
    }
}

/// One entry of the credential table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub display_name: String,
    /// Assigned counter (operators only).
    #[serde(default)]
    pub counter: Option<CounterId>,
}

impl AccountConfig {
    /// One admin plus one operator per participant counter.
    #[must_use]
    pub fn defaults_for(ledger: &LedgerConfig) -> Vec<Self> {
        std::iter::once(Self {
            username: "admin".into(),
            password: "admin".into(),
            role: Role::Admin,
            display_name: "Administrator".into(),
            counter: None,
        })
        .chain(ledger.participants.iter().map(|c| Self {
            username: format!("operator_{c}"),
            password: format!("{c}-secret"),
            role: Role::Operator,
            display_name: format!("Operator {c}"),
            counter: Some(c.clone()),
        }))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = CoordinatorConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.ledger.participants.len(), 5);
        assert_eq!(cfg.accounts.len(), 6);
        assert_eq!(cfg.listen_addr.port(), 3000);
    }

    #[test]
    fn initial_balances_seed_bank_and_participants() {
        let ledger = LedgerConfig::with_participants(&["c1", "c2"]);
        let balances = ledger.initial_balances();
        assert_eq!(balances.len(), 3);
        assert_eq!(balances.get(&CounterId::from("bank")), Some(Decimal::ZERO));
        assert_eq!(
            balances.get(&CounterId::from("c2")),
            Some(Decimal::new(10_000, 0))
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let cfg = CoordinatorConfig::from_json_str(
            r#"{"ledger":{"participants":["north","south"]},"accounts":[]}"#,
        )
        .unwrap();
        assert_eq!(cfg.ledger.bank.as_str(), "bank");
        assert_eq!(cfg.ledger.participants.len(), 2);
        assert_eq!(cfg.history_capacity, constants::DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn participant_named_like_bank_rejected() {
        let mut cfg = CoordinatorConfig::default();
        cfg.ledger.participants.push(CounterId::from("bank"));
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, TallyError::Configuration(_)), "{err}");
    }

    #[test]
    fn operator_on_bank_rejected() {
        let mut cfg = CoordinatorConfig::default();
        cfg.accounts.push(AccountConfig {
            username: "sneaky".into(),
            password: "x".into(),
            role: Role::Operator,
            display_name: "Sneaky".into(),
            counter: Some(CounterId::from("bank")),
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn duplicate_username_rejected() {
        let mut cfg = CoordinatorConfig::default();
        let dup = cfg.accounts[0].clone();
        cfg.accounts.push(dup);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn inverted_percentage_bounds_rejected() {
        let limits = RequestLimits {
            min_percentage: Decimal::new(50, 0),
            max_percentage: Decimal::new(10, 0),
            ..RequestLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = CoordinatorConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back = CoordinatorConfig::from_json_str(&json).unwrap();
        assert_eq!(back.ledger.participants, cfg.ledger.participants);
        assert_eq!(back.accounts.len(), cfg.accounts.len());
    }
}
