//! Participant and session types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActorId, CounterId, SessionId};

/// What a participant is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May operate on every counter and take the global lock.
    Admin,
    /// Bound to one assigned counter.
    Operator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "ADMIN"),
            Self::Operator => write!(f, "OPERATOR"),
        }
    }
}

/// An authenticated identity as returned by the session source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub actor: ActorId,
    pub display_name: String,
    pub role: Role,
    /// Assigned counter; always `Some` for operators, `None` for admins.
    pub counter: Option<CounterId>,
}

impl Participant {
    #[must_use]
    pub fn admin(actor: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            actor: ActorId::new(actor),
            display_name: display_name.into(),
            role: Role::Admin,
            counter: None,
        }
    }

    #[must_use]
    pub fn operator(
        actor: impl Into<String>,
        display_name: impl Into<String>,
        counter: CounterId,
    ) -> Self {
        Self {
            actor: ActorId::new(actor),
            display_name: display_name.into(),
            role: Role::Operator,
            counter: Some(counter),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this participant may act on `counter` as its source.
    #[must_use]
    pub fn is_assigned_to(&self, counter: &CounterId) -> bool {
        self.is_admin() || self.counter.as_ref() == Some(counter)
    }
}

/// One authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub participant: Participant,
    pub authenticated_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn actor(&self) -> &ActorId {
        &self.participant.actor
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.participant.role
    }
}
