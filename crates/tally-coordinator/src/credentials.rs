//! Session source: turns a username/secret pair into a [`Participant`].

use std::collections::HashMap;

use tally_types::{AccountConfig, Participant, Result, Role, TallyError};

/// Resolves credentials to an identity with a role and assigned counter.
pub trait SessionSource: Send + Sync + 'static {
    /// # Errors
    /// Returns [`TallyError::InvalidCredentials`] for an unknown identity or
    /// a wrong secret.
    fn authenticate(&self, identity: &str, secret: &str) -> Result<Participant>;
}

struct Account {
    password: String,
    participant: Participant,
}

/// Fixed credential table built from configuration.
pub struct CredentialTable {
    accounts: HashMap<String, Account>,
}

impl CredentialTable {
    #[must_use]
    pub fn from_accounts(accounts: &[AccountConfig]) -> Self {
        let accounts = accounts
            .iter()
            .map(|account| {
                let participant = Participant {
                    actor: account.username.as_str().into(),
                    display_name: account.display_name.clone(),
                    role: account.role,
                    counter: match account.role {
                        Role::Admin => None,
                        Role::Operator => account.counter.clone(),
                    },
                };
                (
                    account.username.clone(),
                    Account {
                        password: account.password.clone(),
                        participant,
                    },
                )
            })
            .collect();
        Self { accounts }
    }

    /// Number of known identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl SessionSource for CredentialTable {
    fn authenticate(&self, identity: &str, secret: &str) -> Result<Participant> {
        match self.accounts.get(identity) {
            Some(account) if account.password == secret => Ok(account.participant.clone()),
            _ => Err(TallyError::InvalidCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use tally_types::{CounterId, LedgerConfig};

    use super::*;

    fn table() -> CredentialTable {
        let ledger = LedgerConfig::with_participants(&["c1", "c2"]);
        CredentialTable::from_accounts(&AccountConfig::defaults_for(&ledger))
    }

    #[test]
    fn admin_authenticates() {
        let p = table().authenticate("admin", "admin").unwrap();
        assert!(p.is_admin());
        assert_eq!(p.counter, None);
    }

    #[test]
    fn operator_gets_assigned_counter() {
        let p = table().authenticate("operator_c2", "c2-secret").unwrap();
        assert_eq!(p.role, Role::Operator);
        assert_eq!(p.counter, Some(CounterId::from("c2")));
        assert_eq!(p.display_name, "Operator c2");
    }

    #[test]
    fn wrong_secret_and_unknown_identity_look_the_same() {
        let t = table();
        let wrong = t.authenticate("admin", "nope").unwrap_err();
        let unknown = t.authenticate("ghost", "admin").unwrap_err();
        assert!(matches!(wrong, TallyError::InvalidCredentials));
        assert!(matches!(unknown, TallyError::InvalidCredentials));
    }

    #[test]
    fn one_entry_per_account() {
        let t = table();
        assert_eq!(t.len(), 3);
        assert!(!t.is_empty());
        assert!(CredentialTable::from_accounts(&[]).is_empty());
    }
}
