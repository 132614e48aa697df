//! Per-counter and global lock table.
//!
//! Each counter has at most one holder. The global lock, when held, freezes
//! every counter (bank included) for everyone but its holder and always
//! wins contention: taking it clears every counter lock.
//!
//! Locks are keyed by actor identity, not by connection. Nothing expires;
//! a lock lasts until released or until [`LockManager::release_all_for`]
//! runs on disconnect.

use std::collections::BTreeMap;

use chrono::Utc;
use tally_types::{
    ActorId, CounterId, LockHold, LockSnapshot, LockTarget, Result, Role, TallyError,
};

/// The live lock table.
#[derive(Debug, Clone)]
pub struct LockManager {
    counters: BTreeMap<CounterId, Option<LockHold>>,
    global: Option<LockHold>,
}

impl LockManager {
    /// Create a table with every given counter unlocked.
    pub fn new(counters: impl IntoIterator<Item = CounterId>) -> Self {
        Self {
            counters: counters.into_iter().map(|c| (c, None)).collect(),
            global: None,
        }
    }

    /// Claim `counter` for `actor`.
    ///
    /// Succeeds if the counter is free, already held by `actor`, or `role`
    /// is admin (which takes the counter over). Never overrides a global
    /// lock held by someone else.
    ///
    /// # Errors
    /// - [`TallyError::UnknownCounter`] if the counter is not in the table
    /// - [`TallyError::GloballyLocked`] if another actor holds the global lock
    /// - [`TallyError::CounterLocked`] naming the current holder otherwise
    pub fn try_acquire_counter(
        &mut self,
        counter: &CounterId,
        actor: &ActorId,
        role: Role,
    ) -> Result<()> {
        if let Some(global) = &self.global {
            if &global.holder != actor {
                return Err(TallyError::GloballyLocked {
                    holder: global.holder.clone(),
                });
            }
        }

        let slot = self
            .counters
            .get_mut(counter)
            .ok_or_else(|| TallyError::UnknownCounter(counter.clone()))?;

        if let Some(hold) = slot.as_ref() {
            if &hold.holder == actor {
                return Ok(());
            }
            if role != Role::Admin {
                return Err(TallyError::CounterLocked {
                    counter: counter.clone(),
                    holder: hold.holder.clone(),
                });
            }
            tracing::info!(
                counter = %counter,
                previous = %hold.holder,
                actor = %actor,
                "Admin took over counter lock"
            );
        }
        *slot = Some(LockHold {
            holder: actor.clone(),
            since: Utc::now(),
        });
        Ok(())
    }

    /// Release `counter` if `actor` holds it or `role` is admin.
    ///
    /// Returns `Ok(true)` if a lock was cleared, `Ok(false)` if nothing
    /// changed (free counter, or held by someone else for a non-admin).
    ///
    /// # Errors
    /// Returns [`TallyError::UnknownCounter`] if the counter is not in the table.
    pub fn release(&mut self, counter: &CounterId, actor: &ActorId, role: Role) -> Result<bool> {
        let slot = self
            .counters
            .get_mut(counter)
            .ok_or_else(|| TallyError::UnknownCounter(counter.clone()))?;

        if slot
            .as_ref()
            .is_some_and(|hold| &hold.holder == actor || role == Role::Admin)
        {
            *slot = None;
            return Ok(true);
        }
        Ok(false)
    }

    /// Take the global lock.
    ///
    /// Clears every counter lock and returns the counters that were held
    /// (with their former holders).
    ///
    /// # Errors
    /// - [`TallyError::Forbidden`] if `role` is not admin
    /// - [`TallyError::GloballyLocked`] if another actor holds it
    pub fn acquire_global(
        &mut self,
        actor: &ActorId,
        role: Role,
    ) -> Result<Vec<(CounterId, ActorId)>> {
        if role != Role::Admin {
            return Err(TallyError::Forbidden {
                reason: "only admins may take the global lock".into(),
            });
        }
        if let Some(global) = &self.global {
            if &global.holder != actor {
                return Err(TallyError::GloballyLocked {
                    holder: global.holder.clone(),
                });
            }
            return Ok(Vec::new());
        }

        let mut displaced = Vec::new();
        for (counter, slot) in &mut self.counters {
            if let Some(hold) = slot.take() {
                displaced.push((counter.clone(), hold.holder));
            }
        }
        self.global = Some(LockHold {
            holder: actor.clone(),
            since: Utc::now(),
        });
        Ok(displaced)
    }

    /// Clear the global lock if `actor` holds it. Returns whether it was cleared.
    pub fn release_global(&mut self, actor: &ActorId) -> bool {
        if self.global_holder() == Some(actor) {
            self.global = None;
            return true;
        }
        false
    }

    /// Whether `actor` may mutate `counter` right now. Acquires nothing.
    #[must_use]
    pub fn can_operate(&self, counter: &CounterId, actor: &ActorId, role: Role) -> bool {
        self.check_operate(counter, actor, role).is_ok()
    }

    /// [`can_operate`](Self::can_operate) with an error naming the blocker.
    ///
    /// # Errors
    /// - [`TallyError::GloballyLocked`] if another actor holds the global lock
    /// - [`TallyError::CounterLocked`] if another actor holds the counter and
    ///   `role` is not admin
    /// - [`TallyError::UnknownCounter`] if the counter is not in the table
    pub fn check_operate(&self, counter: &CounterId, actor: &ActorId, role: Role) -> Result<()> {
        let slot = self
            .counters
            .get(counter)
            .ok_or_else(|| TallyError::UnknownCounter(counter.clone()))?;

        if let Some(global) = &self.global {
            if &global.holder != actor {
                return Err(TallyError::GloballyLocked {
                    holder: global.holder.clone(),
                });
            }
            return Ok(());
        }

        match slot {
            Some(hold) if &hold.holder != actor && role != Role::Admin => {
                Err(TallyError::CounterLocked {
                    counter: counter.clone(),
                    holder: hold.holder.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Release every lock `actor` holds. Idempotent.
    ///
    /// Returns the targets that were released.
    pub fn release_all_for(&mut self, actor: &ActorId) -> Vec<LockTarget> {
        let mut released = Vec::new();
        for (counter, slot) in &mut self.counters {
            if slot.as_ref().is_some_and(|hold| &hold.holder == actor) {
                *slot = None;
                released.push(LockTarget::Counter(counter.clone()));
            }
        }
        if self.release_global(actor) {
            released.push(LockTarget::Global);
        }
        released
    }

    /// Holder governing `counter`: the global holder if any, else the counter's own.
    #[must_use]
    pub fn holder_of(&self, counter: &CounterId) -> Option<&ActorId> {
        if let Some(global) = &self.global {
            return Some(&global.holder);
        }
        self.counters
            .get(counter)
            .and_then(Option::as_ref)
            .map(|hold| &hold.holder)
    }

    #[must_use]
    pub fn global_holder(&self) -> Option<&ActorId> {
        self.global.as_ref().map(|hold| &hold.holder)
    }

    /// Whether `actor` holds any lock at all.
    #[must_use]
    pub fn holds_any(&self, actor: &ActorId) -> bool {
        self.global_holder() == Some(actor)
            || self
                .counters
                .values()
                .flatten()
                .any(|hold| &hold.holder == actor)
    }

    /// Point-in-time copy of the table for observers and the store mirror.
    #[must_use]
    pub fn snapshot(&self) -> LockSnapshot {
        LockSnapshot {
            counters: self.counters.clone(),
            global: self.global.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> LockManager {
        LockManager::new(["bank", "c1", "c2"].map(CounterId::from))
    }

    fn c(name: &str) -> CounterId {
        CounterId::from(name)
    }

    fn a(name: &str) -> ActorId {
        ActorId::from(name)
    }

    #[test]
    fn acquire_free_counter() {
        let mut locks = table();
        locks
            .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
            .unwrap();
        assert_eq!(locks.holder_of(&c("c1")), Some(&a("x")));
        assert!(locks.holds_any(&a("x")));
    }

    #[test]
    fn reacquire_by_holder_is_ok() {
        let mut locks = table();
        locks
            .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
            .unwrap();
        assert!(
            locks
                .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
                .is_ok()
        );
    }

    #[test]
    fn second_operator_is_refused_with_holder() {
        let mut locks = table();
        locks
            .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
            .unwrap();
        let err = locks
            .try_acquire_counter(&c("c1"), &a("y"), Role::Operator)
            .unwrap_err();
        assert_eq!(err.holder(), Some(&a("x")));
        assert!(matches!(err, TallyError::CounterLocked { .. }));
    }

    #[test]
    fn admin_takes_over_counter() {
        let mut locks = table();
        locks
            .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
            .unwrap();
        locks
            .try_acquire_counter(&c("c1"), &a("admin"), Role::Admin)
            .unwrap();
        assert_eq!(locks.holder_of(&c("c1")), Some(&a("admin")));
    }

    #[test]
    fn unknown_counter() {
        let mut locks = table();
        let err = locks
            .try_acquire_counter(&c("zz"), &a("x"), Role::Operator)
            .unwrap_err();
        assert!(matches!(err, TallyError::UnknownCounter(_)));
        assert!(!locks.can_operate(&c("zz"), &a("x"), Role::Admin));
    }

    #[test]
    fn release_by_stranger_is_noop() {
        let mut locks = table();
        locks
            .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
            .unwrap();
        assert!(!locks.release(&c("c1"), &a("y"), Role::Operator).unwrap());
        assert_eq!(locks.holder_of(&c("c1")), Some(&a("x")));
        assert!(locks.release(&c("c1"), &a("admin"), Role::Admin).unwrap());
        assert_eq!(locks.holder_of(&c("c1")), None);
    }

    #[test]
    fn global_requires_admin() {
        let mut locks = table();
        let err = locks.acquire_global(&a("x"), Role::Operator).unwrap_err();
        assert!(matches!(err, TallyError::Forbidden { .. }));
    }

    #[test]
    fn global_clears_counter_locks() {
        let mut locks = table();
        locks
            .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
            .unwrap();
        let displaced = locks.acquire_global(&a("admin"), Role::Admin).unwrap();
        assert_eq!(displaced, vec![(c("c1"), a("x"))]);
        let snap = locks.snapshot();
        assert!(snap.counters.values().all(Option::is_none));
        assert!(snap.is_globally_locked());
    }

    #[test]
    fn global_blocks_everyone_else() {
        let mut locks = table();
        locks.acquire_global(&a("admin"), Role::Admin).unwrap();

        let err = locks
            .check_operate(&c("c1"), &a("x"), Role::Operator)
            .unwrap_err();
        assert!(matches!(err, TallyError::GloballyLocked { ref holder } if holder == &a("admin")));
        assert!(!locks.can_operate(&c("bank"), &a("admin2"), Role::Admin));
        assert!(locks.can_operate(&c("bank"), &a("admin"), Role::Admin));

        let err = locks
            .try_acquire_counter(&c("c2"), &a("admin2"), Role::Admin)
            .unwrap_err();
        assert!(matches!(err, TallyError::GloballyLocked { .. }));
        let err = locks.acquire_global(&a("admin2"), Role::Admin).unwrap_err();
        assert!(matches!(err, TallyError::GloballyLocked { .. }));
    }

    #[test]
    fn release_global_only_by_holder() {
        let mut locks = table();
        locks.acquire_global(&a("admin"), Role::Admin).unwrap();
        assert!(!locks.release_global(&a("admin2")));
        assert!(locks.release_global(&a("admin")));
        assert!(locks.can_operate(&c("c1"), &a("x"), Role::Operator));
    }

    #[test]
    fn can_operate_rules() {
        let mut locks = table();
        assert!(locks.can_operate(&c("c1"), &a("y"), Role::Operator));
        locks
            .try_acquire_counter(&c("c1"), &a("x"), Role::Operator)
            .unwrap();
        assert!(locks.can_operate(&c("c1"), &a("x"), Role::Operator));
        assert!(!locks.can_operate(&c("c1"), &a("y"), Role::Operator));
        assert!(locks.can_operate(&c("c1"), &a("admin"), Role::Admin));
    }

    #[test]
    fn release_all_for_is_idempotent() {
        let mut locks = table();
        locks
            .try_acquire_counter(&c("c1"), &a("admin"), Role::Admin)
            .unwrap();
        locks
            .try_acquire_counter(&c("c2"), &a("admin"), Role::Admin)
            .unwrap();
        let released = locks.release_all_for(&a("admin"));
        assert_eq!(
            released,
            vec![LockTarget::Counter(c("c1")), LockTarget::Counter(c("c2"))]
        );
        assert!(locks.release_all_for(&a("admin")).is_empty());
        assert!(locks.release_all_for(&a("nobody")).is_empty());
        assert!(!locks.holds_any(&a("admin")));
    }

    #[test]
    fn release_all_for_includes_global() {
        let mut locks = table();
        locks.acquire_global(&a("admin"), Role::Admin).unwrap();
        assert_eq!(locks.release_all_for(&a("admin")), vec![LockTarget::Global]);
        assert!(locks.global_holder().is_none());
    }
}
