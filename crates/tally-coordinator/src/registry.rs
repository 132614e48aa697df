//! Connection registry.
//!
//! Every live connection gets a [`SessionId`] when it opens. It stays
//! anonymous until it authenticates; only authenticated connections may
//! mutate anything.

use std::collections::HashMap;

use chrono::Utc;
use tally_types::{ActorId, Participant, Result, Session, SessionId, TallyError};

/// Live connections and their (optional) authenticated sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    connections: HashMap<SessionId, Option<Session>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new anonymous connection.
    pub fn open(&mut self) -> SessionId {
        let id = SessionId::new();
        self.connections.insert(id, None);
        id
    }

    /// Bind an authenticated participant to a connection.
    ///
    /// # Errors
    /// - [`TallyError::UnknownSession`] if the connection is not registered
    /// - [`TallyError::AlreadyAuthenticated`] if it already has a session
    pub fn authenticate(&mut self, id: SessionId, participant: Participant) -> Result<&Session> {
        let slot = self
            .connections
            .get_mut(&id)
            .ok_or(TallyError::UnknownSession(id))?;
        if let Some(existing) = slot {
            return Err(TallyError::AlreadyAuthenticated {
                actor: existing.actor().clone(),
            });
        }
        Ok(slot.insert(Session {
            id,
            participant,
            authenticated_at: Utc::now(),
        }))
    }

    /// The authenticated session of a connection.
    ///
    /// # Errors
    /// - [`TallyError::UnknownSession`] if the connection is not registered
    /// - [`TallyError::NotAuthenticated`] if it never authenticated
    pub fn get(&self, id: SessionId) -> Result<&Session> {
        self.connections
            .get(&id)
            .ok_or(TallyError::UnknownSession(id))?
            .as_ref()
            .ok_or(TallyError::NotAuthenticated)
    }

    /// Forget a connection, returning its session if it had one.
    pub fn close(&mut self, id: SessionId) -> Option<Session> {
        self.connections.remove(&id).flatten()
    }

    /// Number of authenticated connections for `actor`.
    #[must_use]
    pub fn connections_of(&self, actor: &ActorId) -> usize {
        self.connections
            .values()
            .flatten()
            .filter(|s| s.actor() == actor)
            .count()
    }

    /// Number of open connections, authenticated or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tally_types::CounterId;

    use super::*;

    #[test]
    fn anonymous_until_authenticated() {
        let mut reg = SessionRegistry::new();
        let id = reg.open();
        assert!(matches!(reg.get(id), Err(TallyError::NotAuthenticated)));

        reg.authenticate(id, Participant::admin("admin", "Administrator"))
            .unwrap();
        assert_eq!(reg.get(id).unwrap().actor().as_str(), "admin");
    }

    #[test]
    fn double_authentication_rejected() {
        let mut reg = SessionRegistry::new();
        let id = reg.open();
        reg.authenticate(id, Participant::admin("admin", "Administrator"))
            .unwrap();
        let err = reg
            .authenticate(
                id,
                Participant::operator("operator_c1", "Operator c1", CounterId::from("c1")),
            )
            .unwrap_err();
        assert!(matches!(err, TallyError::AlreadyAuthenticated { .. }));
    }

    #[test]
    fn unknown_session() {
        let mut reg = SessionRegistry::new();
        let ghost = SessionId::new();
        assert!(matches!(reg.get(ghost), Err(TallyError::UnknownSession(_))));
        assert!(reg.close(ghost).is_none());
    }

    #[test]
    fn close_returns_session() {
        let mut reg = SessionRegistry::new();
        let anon = reg.open();
        let id = reg.open();
        reg.authenticate(id, Participant::admin("admin", "Administrator"))
            .unwrap();
        assert_eq!(reg.connections_of(&ActorId::from("admin")), 1);
        assert!(reg.close(anon).is_none());
        assert!(reg.close(id).is_some());
        assert!(reg.is_empty());
    }
}
