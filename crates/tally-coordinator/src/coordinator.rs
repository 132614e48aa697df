//! The coordinator: one owned object holding the balance ledger, the lock
//! table, the session registry and the store.
//!
//! Every request runs to completion on `&mut self`; the server shares the
//! coordinator as `Arc<tokio::sync::Mutex<Coordinator<S>>>`, so requests are
//! applied one at a time in arrival order and lock state and balances always
//! change together.
//!
//! Operation pipeline:
//! ```text
//! Received → Authorized → Applied → Persisted → Broadcast → Done
//!     └──────────┴──── Rejected (no side effects)
//! ```
//! A store failure after `Applied` does not roll back: the new balances are
//! still broadcast and the requester gets a persistence error. The sealed
//! record stays queued and is appended ahead of the next record, so the
//! persisted log never skips a sequence.

use std::collections::VecDeque;

use tally_ledger::{
    BalanceLedger, LedgerStore, LogChain, RecentOperations, RecordDraft, verify_chain,
};
use tally_locks::LockManager;
use tally_types::{
    BalanceSet, CoordinatorConfig, CounterId, ErrorKind, LedgerConfig, LedgerEvent, LockSnapshot,
    LockTarget, Operation, OperationRecord, Result, Session, SessionId, TallyError,
};
use tokio::sync::broadcast;

use crate::{
    credentials::{CredentialTable, SessionSource},
    registry::SessionRegistry,
    validation::RequestValidator,
};

/// What a new connection gets: its id, its event subscription and the
/// snapshot it must render before consuming the subscription.
pub struct Connection {
    pub id: SessionId,
    pub events: broadcast::Receiver<LedgerEvent>,
    pub snapshot: Vec<LedgerEvent>,
}

/// Owned state of one coordinator process.
pub struct Coordinator<S: LedgerStore> {
    ledger_config: LedgerConfig,
    ledger: BalanceLedger,
    locks: LockManager,
    sessions: SessionRegistry,
    source: Box<dyn SessionSource>,
    validator: RequestValidator,
    store: S,
    chain: LogChain,
    history: RecentOperations,
    /// Sealed records whose append has not succeeded yet, oldest first.
    unpersisted: VecDeque<OperationRecord>,
    events: broadcast::Sender<LedgerEvent>,
}

impl<S: LedgerStore> Coordinator<S> {
    /// Open a coordinator with the credential table from `config.accounts`.
    ///
    /// # Errors
    /// See [`Coordinator::open`].
    pub fn with_credentials(config: &CoordinatorConfig, store: S) -> Result<Self> {
        let source = CredentialTable::from_accounts(&config.accounts);
        if source.is_empty() {
            tracing::warn!("No accounts configured; every authentication will fail");
        } else {
            tracing::info!(accounts = source.len(), "Credential table loaded");
        }
        Self::open(config, source, store)
    }

    /// Open a coordinator over `store`.
    ///
    /// On first run the initial balances are seeded and written. A loaded
    /// balance set is reconciled against the configured counters. The
    /// recent-history window is seeded from the store's log tail, whose
    /// digest chain must verify.
    ///
    /// # Errors
    /// - [`TallyError::Configuration`] if the config does not validate
    /// - a persistence error if the store cannot be read or seeded
    /// - [`TallyError::LogChainBroken`] if the persisted log was altered
    pub fn open(
        config: &CoordinatorConfig,
        source: impl SessionSource,
        mut store: S,
    ) -> Result<Self> {
        config.validate()?;

        let ledger = match store.load_all()? {
            None => {
                let ledger = BalanceLedger::new(&config.ledger);
                store.write_all(ledger.balances())?;
                tracing::info!(
                    counters = ledger.balances().len(),
                    total = %ledger.total_supply(),
                    "Seeded initial balances"
                );
                ledger
            }
            Some(loaded) => {
                let (ledger, reconciled) = BalanceLedger::restore(&config.ledger, loaded);
                if reconciled {
                    store.write_all(ledger.balances())?;
                }
                tracing::info!(
                    counters = ledger.balances().len(),
                    total = %ledger.total_supply(),
                    reconciled,
                    "Loaded balances"
                );
                ledger
            }
        };

        let recent = store.recent_log(config.history_capacity)?;
        verify_chain(&recent)?;
        let chain = LogChain::resume(recent.last());
        let history = RecentOperations::seeded(config.history_capacity, recent);

        let locks = LockManager::new(config.ledger.all_counters());
        if let Err(e) = store.mirror_locks(&locks.snapshot()) {
            tracing::error!(error = %e, "Failed to mirror initial lock table");
        }

        let (events, _) = broadcast::channel(config.broadcast_capacity);

        Ok(Self {
            ledger_config: config.ledger.clone(),
            ledger,
            locks,
            sessions: SessionRegistry::new(),
            source: Box::new(source),
            validator: RequestValidator::new(config.limits.clone()),
            store,
            chain,
            history,
            unpersisted: VecDeque::new(),
            events,
        })
    }

    // -----------------------------------------------------------------
    // Connections and sessions
    // -----------------------------------------------------------------

    /// Register a new connection and subscribe it to events.
    ///
    /// The snapshot and the subscription are taken in the same critical
    /// section, so nothing published afterwards is missed.
    pub fn connect(&mut self) -> Connection {
        let id = self.sessions.open();
        tracing::info!(session = %id, connections = self.sessions.len(), "Connection opened");
        Connection {
            id,
            events: self.events.subscribe(),
            snapshot: self.snapshot_events(),
        }
    }

    /// Authenticate a connection through the session source.
    ///
    /// # Errors
    /// - [`TallyError::InvalidCredentials`]
    /// - [`TallyError::AlreadyAuthenticated`]
    /// - [`TallyError::UnknownSession`]
    pub fn authenticate(&mut self, id: SessionId, identity: &str, secret: &str) -> Result<Session> {
        let participant = match self.source.authenticate(identity, secret) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(session = %id, identity, "Authentication failed");
                return Err(e);
            }
        };
        let session = self.sessions.authenticate(id, participant)?.clone();
        tracing::info!(
            session = %id,
            actor = %session.actor(),
            role = %session.role(),
            "Session authenticated"
        );
        Ok(session)
    }

    /// Close a connection and release every lock its identity holds.
    pub fn disconnect(&mut self, id: SessionId) {
        let Some(session) = self.sessions.close(id) else {
            tracing::info!(session = %id, "Anonymous connection closed");
            return;
        };
        let released = self.locks.release_all_for(session.actor());
        tracing::info!(
            session = %id,
            actor = %session.actor(),
            released = released.len(),
            other_connections = self.sessions.connections_of(session.actor()),
            "Connection closed"
        );
        if !released.is_empty() {
            self.publish_locks();
        }
    }

    // -----------------------------------------------------------------
    // Locks
    // -----------------------------------------------------------------

    /// Claim a counter, or the whole system, for a burst of operations.
    ///
    /// Returns an acknowledgement message.
    ///
    /// # Errors
    /// - [`TallyError::NotAuthenticated`]
    /// - [`TallyError::Forbidden`] if an operator targets another counter or
    ///   the global lock
    /// - a lock error naming the current holder
    pub fn start_operations(&mut self, id: SessionId, target: &LockTarget) -> Result<String> {
        let session = self.sessions.get(id)?.clone();
        let actor = session.actor();

        let result = match target {
            LockTarget::Counter(counter) => {
                if session.participant.is_assigned_to(counter) {
                    self.locks
                        .try_acquire_counter(counter, actor, session.role())
                        .map(|()| format!("{actor} is now operating on {counter}"))
                } else {
                    Err(TallyError::Forbidden {
                        reason: format!("{actor} may only lock their own counter"),
                    })
                }
            }
            LockTarget::Global => self
                .locks
                .acquire_global(actor, session.role())
                .map(|displaced| {
                    for (counter, holder) in &displaced {
                        tracing::info!(counter = %counter, holder = %holder, "Counter lock cleared by global lock");
                    }
                    format!("{actor} holds the global lock")
                }),
        };

        match result {
            Ok(message) => {
                tracing::info!(actor = %actor, target = %target, "Lock acquired");
                self.publish_locks();
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(actor = %actor, target = %target, error = %e, "Lock request rejected");
                Err(e)
            }
        }
    }

    /// Release a counter lock or the global lock.
    ///
    /// Releasing something that is not held is acknowledged as a no-op.
    ///
    /// # Errors
    /// - [`TallyError::NotAuthenticated`]
    /// - [`TallyError::NotLockHolder`] if someone else holds the target
    pub fn end_operations(&mut self, id: SessionId, target: &LockTarget) -> Result<String> {
        let session = self.sessions.get(id)?.clone();
        let actor = session.actor();

        let released = match target {
            LockTarget::Counter(counter) => {
                self.locks.release(counter, actor, session.role())?
            }
            LockTarget::Global => self.locks.release_global(actor),
        };

        if released {
            tracing::info!(actor = %actor, target = %target, "Lock released");
            self.publish_locks();
            return Ok(format!("{actor} released {target}"));
        }

        let held_by_other = match target {
            LockTarget::Counter(counter) => self
                .locks
                .snapshot()
                .counters
                .get(counter)
                .and_then(Option::as_ref)
                .is_some(),
            LockTarget::Global => self.locks.global_holder().is_some(),
        };
        if held_by_other {
            let err = TallyError::NotLockHolder {
                actor: actor.clone(),
                target: target.to_string(),
            };
            tracing::warn!(actor = %actor, target = %target, "Release rejected: not the holder");
            return Err(err);
        }
        Ok(format!("{target} was not locked"))
    }

    // -----------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------

    /// Run one operation request through the full pipeline.
    ///
    /// Returns the sealed operation record.
    ///
    /// # Errors
    /// - auth errors if the connection is not authenticated or the role
    ///   does not cover the operation
    /// - validation errors for malformed or out-of-range input
    /// - lock errors naming the current holder
    /// - [`TallyError::StoreUnavailable`] if persisting failed; the operation
    ///   is applied and broadcast regardless
    pub fn submit(&mut self, id: SessionId, op: &Operation) -> Result<OperationRecord> {
        let span = tracing::info_span!("operation", session = %id, kind = %op.kind());
        let _guard = span.enter();
        tracing::debug!(state = "received");

        let result = self.run_operation(id, op);
        match &result {
            Ok(record) => tracing::debug!(state = "done", sequence = record.sequence),
            Err(e) if e.kind() == ErrorKind::Persistence => {}
            Err(e) => tracing::warn!(state = "rejected", code = %e.code(), error = %e, "Operation rejected"),
        }
        result
    }

    fn run_operation(&mut self, id: SessionId, op: &Operation) -> Result<OperationRecord> {
        let session = self.sessions.get(id)?.clone();
        self.validator.validate(op)?;
        self.authorize(&session, op)?;
        tracing::debug!(state = "authorized", actor = %session.actor());

        let outcome = self.ledger.apply(op)?;
        tracing::debug!(state = "applied", net_change = %outcome.net_change);

        let counters = match op.named_counters() {
            named if named.is_empty() => outcome.touched.clone(),
            named => named,
        };
        let record = self.chain.seal(RecordDraft {
            actor: session.actor().clone(),
            actor_name: session.participant.display_name.clone(),
            kind: op.kind(),
            counters,
            amount: op.amount(),
            percentage: op.percentage(),
            description: outcome.description,
        });

        self.unpersisted.push_back(record.clone());
        let persisted = self.persist(&outcome.balances);
        match &persisted {
            Ok(()) => tracing::debug!(state = "persisted"),
            Err(e) => tracing::error!(
                sequence = record.sequence,
                queued = self.unpersisted.len(),
                error = %e,
                "Failed to persist operation; in-memory state stands"
            ),
        }

        self.history.push(record.clone());
        self.publish(LedgerEvent::BalancesUpdated {
            sequence: record.sequence,
            balances: outcome.balances,
        });
        self.publish(LedgerEvent::OperationApplied {
            record: record.clone(),
        });
        tracing::debug!(state = "broadcast");
        tracing::info!(
            actor = %record.actor,
            sequence = record.sequence,
            "{}",
            record.description
        );

        persisted.map(|()| record)
    }

    /// Role scope, then lock checks on every touched counter.
    fn authorize(&self, session: &Session, op: &Operation) -> Result<()> {
        let participant = &session.participant;
        if !participant.is_admin() {
            if op.is_admin_only() {
                return Err(TallyError::Forbidden {
                    reason: format!("{} is reserved for admins", op.kind()),
                });
            }
            if let Some(source) = op.source_counter() {
                if !participant.is_assigned_to(source) {
                    return Err(TallyError::Forbidden {
                        reason: format!("{} may only operate from their own counter", session.actor()),
                    });
                }
            }
        }

        for counter in self.lock_checked_counters(op) {
            self.locks
                .check_operate(&counter, session.actor(), session.role())?;
        }
        Ok(())
    }

    /// Counters whose lock must allow the operation. The bank is skipped
    /// when it is only the credit side of a transfer or deposit.
    fn lock_checked_counters(&self, op: &Operation) -> Vec<CounterId> {
        let bank = &self.ledger_config.bank;
        match op {
            Operation::Transfer { from, to, .. } => {
                let mut counters = vec![from.clone()];
                if to != bank {
                    counters.push(to.clone());
                }
                counters
            }
            Operation::DepositToBank { from, .. } => vec![from.clone()],
            Operation::DivideBank { .. } | Operation::ResetAll => self.ledger_config.all_counters(),
            other => other.named_counters(),
        }
    }

    // -----------------------------------------------------------------
    // Queries and resync
    // -----------------------------------------------------------------

    /// Ask every observer to resynchronize: publishes a refresh notice
    /// followed by full balance and lock snapshots.
    ///
    /// # Errors
    /// Returns [`TallyError::NotAuthenticated`] for anonymous connections.
    pub fn request_balances(&mut self, id: SessionId) -> Result<()> {
        let session = self.sessions.get(id)?.clone();
        tracing::info!(actor = %session.actor(), "Balance refresh requested");
        self.publish(LedgerEvent::BalancesRefreshed {
            requested_by: session.participant.display_name.clone(),
            at: chrono::Utc::now(),
        });
        for event in self.snapshot_events() {
            self.publish(event);
        }
        Ok(())
    }

    /// Up to `limit` recent records, newest first.
    #[must_use]
    pub fn recent_operations(&self, limit: usize) -> Vec<OperationRecord> {
        self.history.latest(limit)
    }

    /// Current balances and lock table as events, for new or lagging observers.
    #[must_use]
    pub fn snapshot_events(&self) -> Vec<LedgerEvent> {
        vec![
            LedgerEvent::BalancesUpdated {
                sequence: self.sequence(),
                balances: self.ledger.balances().clone(),
            },
            LedgerEvent::LocksUpdated {
                locks: self.locks.snapshot(),
            },
        ]
    }

    /// Sequence of the last applied operation (0 before the first).
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.chain.next_sequence() - 1
    }

    #[must_use]
    pub fn balances(&self) -> &BalanceSet {
        self.ledger.balances()
    }

    #[must_use]
    pub fn lock_snapshot(&self) -> LockSnapshot {
        self.locks.snapshot()
    }

    /// A fresh event subscription (without snapshot).
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // -----------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------

    /// Write the balance set, then append every queued record in order.
    /// A record leaves the queue only once its append succeeded.
    fn persist(&mut self, balances: &BalanceSet) -> Result<()> {
        self.store.write_all(balances)?;
        if self.unpersisted.len() > 1 {
            tracing::info!(records = self.unpersisted.len(), "Appending deferred log records");
        }
        while let Some(record) = self.unpersisted.front() {
            self.store.append_log(record)?;
            self.unpersisted.pop_front();
        }
        Ok(())
    }

    fn publish(&self, event: LedgerEvent) {
        let name = event.name();
        match self.events.send(event) {
            Ok(receivers) => tracing::trace!(event = name, receivers, "Published event"),
            Err(_) => tracing::trace!(event = name, "No observers for event"),
        }
    }

    fn publish_locks(&mut self) {
        let locks = self.locks.snapshot();
        if let Err(e) = self.store.mirror_locks(&locks) {
            tracing::error!(error = %e, "Failed to mirror lock table");
        }
        self.publish(LedgerEvent::LocksUpdated { locks });
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tally_ledger::MemoryStore;
    use tally_types::{ActorId, TransferAmount};

    use super::*;

    fn config() -> CoordinatorConfig {
        let ledger = LedgerConfig::with_participants(&["c1", "c2"]);
        CoordinatorConfig {
            accounts: tally_types::AccountConfig::defaults_for(&ledger),
            ledger,
            ..CoordinatorConfig::default()
        }
    }

    fn coordinator() -> Coordinator<MemoryStore> {
        Coordinator::with_credentials(&config(), MemoryStore::new()).unwrap()
    }

    fn login(c: &mut Coordinator<MemoryStore>, user: &str, secret: &str) -> SessionId {
        let id = c.connect().id;
        c.authenticate(id, user, secret).unwrap();
        id
    }

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn bal(c: &Coordinator<MemoryStore>, name: &str) -> Decimal {
        c.balances().get(&CounterId::from(name)).unwrap()
    }

    #[test]
    fn first_run_seeds_store() {
        let c = coordinator();
        assert_eq!(c.store().balances(), Some(c.balances()));
        assert_eq!(c.sequence(), 0);
    }

    #[test]
    fn anonymous_cannot_mutate() {
        let mut c = coordinator();
        let id = c.connect().id;
        let err = c
            .submit(
                id,
                &Operation::Add {
                    counter: CounterId::from("c1"),
                    amount: dec(1),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TallyError::NotAuthenticated));
    }

    #[test]
    fn operator_limited_to_own_counter() {
        let mut c = coordinator();
        let op1 = login(&mut c, "operator_c1", "c1-secret");
        let err = c
            .submit(
                op1,
                &Operation::Add {
                    counter: CounterId::from("c2"),
                    amount: dec(1),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TallyError::Forbidden { .. }));

        let err = c.submit(op1, &Operation::ResetAll).unwrap_err();
        assert!(matches!(err, TallyError::Forbidden { .. }));

        let err = c
            .start_operations(op1, &LockTarget::Counter(CounterId::from("c2")))
            .unwrap_err();
        assert!(matches!(err, TallyError::Forbidden { .. }));
        let err = c.start_operations(op1, &LockTarget::Global).unwrap_err();
        assert!(matches!(err, TallyError::Forbidden { .. }));
    }

    #[test]
    fn applied_operation_is_logged_and_persisted() {
        let mut c = coordinator();
        let admin = login(&mut c, "admin", "admin");
        let record = c
            .submit(
                admin,
                &Operation::Transfer {
                    from: CounterId::from("c1"),
                    to: CounterId::from("bank"),
                    amount: TransferAmount::Fixed(dec(100)),
                },
            )
            .unwrap();
        assert_eq!(record.sequence, 1);
        assert_eq!(record.actor_name, "Administrator");
        assert_eq!(c.store().log().len(), 1);
        assert_eq!(c.store().balances().and_then(|b| b.get(&CounterId::from("bank"))), Some(dec(100)));
        assert_eq!(c.recent_operations(10), vec![record]);
    }

    #[test]
    fn store_failure_keeps_state_and_reports() {
        let mut c = coordinator();
        let admin = login(&mut c, "admin", "admin");
        let mut rx = c.subscribe();
        c.store_mut().set_unavailable(true);

        let err = c
            .submit(
                admin,
                &Operation::Add {
                    counter: CounterId::from("c1"),
                    amount: dec(5),
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(bal(&c, "c1"), dec(10_005));
        assert!(matches!(
            rx.try_recv().unwrap(),
            LedgerEvent::BalancesUpdated { sequence: 1, .. }
        ));
        assert_eq!(c.recent_operations(1).len(), 1);
    }

    #[test]
    fn restart_after_transient_store_failure() {
        let mut c = coordinator();
        let admin = login(&mut c, "admin", "admin");
        let add = Operation::Add {
            counter: CounterId::from("c1"),
            amount: dec(1),
        };

        c.submit(admin, &add).unwrap();
        c.store_mut().set_unavailable(true);
        assert_eq!(c.submit(admin, &add).unwrap_err().kind(), ErrorKind::Persistence);
        assert_eq!(c.store().log().len(), 1);
        c.store_mut().set_unavailable(false);
        let third = c.submit(admin, &add).unwrap();
        assert_eq!(third.sequence, 3);

        let sequences: Vec<u64> = c.store().log().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(
            c.store().balances().and_then(|b| b.get(&CounterId::from("c1"))),
            Some(dec(10_003))
        );

        let mut store = MemoryStore::with_balances(c.balances().clone());
        for record in c.store().log() {
            store.append_log(record).unwrap();
        }
        let reopened = Coordinator::with_credentials(&config(), store).unwrap();
        assert_eq!(reopened.sequence(), 3);
        assert_eq!(bal(&reopened, "c1"), dec(10_003));
    }

    #[test]
    fn bank_credit_ignores_bank_lock() {
        let mut c = coordinator();
        let admin = login(&mut c, "admin", "admin");
        let op1 = login(&mut c, "operator_c1", "c1-secret");
        c.start_operations(admin, &LockTarget::Counter(CounterId::from("bank")))
            .unwrap();

        c.submit(
            op1,
            &Operation::DepositToBank {
                from: CounterId::from("c1"),
                percentage: dec(10),
            },
        )
        .unwrap();
        assert_eq!(bal(&c, "bank"), dec(1_000));

        let err = c
            .submit(
                op1,
                &Operation::Subtract {
                    counter: CounterId::from("bank"),
                    amount: dec(1),
                },
            )
            .unwrap_err();
        assert!(matches!(err, TallyError::Forbidden { .. }));
    }

    #[test]
    fn transfer_into_claimed_counter_rejected() {
        let mut c = coordinator();
        let op1 = login(&mut c, "operator_c1", "c1-secret");
        let op2 = login(&mut c, "operator_c2", "c2-secret");
        c.start_operations(op2, &LockTarget::Counter(CounterId::from("c2")))
            .unwrap();
        let err = c
            .submit(
                op1,
                &Operation::Transfer {
                    from: CounterId::from("c1"),
                    to: CounterId::from("c2"),
                    amount: TransferAmount::Fixed(dec(1)),
                },
            )
            .unwrap_err();
        assert_eq!(err.holder(), Some(&ActorId::from("operator_c2")));
    }

    #[test]
    fn end_operations_by_non_holder() {
        let mut c = coordinator();
        let admin = login(&mut c, "admin", "admin");
        let op1 = login(&mut c, "operator_c1", "c1-secret");
        c.start_operations(admin, &LockTarget::Global).unwrap();

        let err = c.end_operations(op1, &LockTarget::Global).unwrap_err();
        assert!(matches!(err, TallyError::NotLockHolder { .. }));

        let msg = c
            .end_operations(op1, &LockTarget::Counter(CounterId::from("c1")))
            .unwrap();
        assert!(msg.contains("not locked"));
    }

    #[test]
    fn request_balances_publishes_refresh_then_snapshots() {
        let mut c = coordinator();
        let op1 = login(&mut c, "operator_c1", "c1-secret");
        let mut rx = c.subscribe();
        c.request_balances(op1).unwrap();
        assert!(matches!(rx.try_recv().unwrap(), LedgerEvent::BalancesRefreshed { .. }));
        assert!(matches!(rx.try_recv().unwrap(), LedgerEvent::BalancesUpdated { .. }));
        assert!(matches!(rx.try_recv().unwrap(), LedgerEvent::LocksUpdated { .. }));
    }

    #[test]
    fn reopen_resumes_sequence_and_history() {
        let mut c = coordinator();
        let admin = login(&mut c, "admin", "admin");
        for _ in 0..3 {
            c.submit(
                admin,
                &Operation::Add {
                    counter: CounterId::from("c2"),
                    amount: dec(1),
                },
            )
            .unwrap();
        }
        let mut store = MemoryStore::with_balances(c.balances().clone());
        for record in c.store().log() {
            store.append_log(record).unwrap();
        }

        let reopened = Coordinator::with_credentials(&config(), store).unwrap();
        assert_eq!(reopened.sequence(), 3);
        assert_eq!(reopened.recent_operations(10).len(), 3);
        assert_eq!(bal(&reopened, "c2"), dec(10_003));
    }

    #[test]
    fn reopen_rejects_tampered_log() {
        let mut c = coordinator();
        let admin = login(&mut c, "admin", "admin");
        for _ in 0..2 {
            c.submit(admin, &Operation::Duplicate { counter: CounterId::from("c1") })
                .unwrap();
        }
        let mut store = MemoryStore::with_balances(c.balances().clone());
        for record in c.store().log() {
            let mut record = record.clone();
            record.description.push('!');
            store.append_log(&record).unwrap();
        }
        let err = Coordinator::with_credentials(&config(), store).err().unwrap();
        assert!(matches!(err, TallyError::LogChainBroken { .. }));
    }
}
