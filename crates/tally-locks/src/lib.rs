//! # tally-locks
//!
//! **Lock plane**: who may mutate which counter right now.
//!
//! A participant claims a counter for a burst of operations with a
//! per-counter lock; an admin can freeze the whole ledger with the global
//! lock. The coordinator consults [`LockManager::check_operate`] before every
//! mutating operation and calls [`LockManager::release_all_for`] when a
//! connection goes away.

pub mod lock_manager;

pub use lock_manager::LockManager;
