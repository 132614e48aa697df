//! # tally-types
//!
//! Shared types, errors, and configuration for the **Tally** lock-and-ledger
//! coordinator.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`CounterId`], [`ActorId`], [`SessionId`], [`OperationId`]
//! - **Balance model**: [`BalanceSet`]
//! - **Operation model**: [`Operation`], [`OperationKind`], [`TransferAmount`]
//! - **Sessions**: [`Participant`], [`Role`], [`Session`]
//! - **Locks**: [`LockTarget`], [`LockHold`], [`LockSnapshot`]
//! - **Audit trail**: [`OperationRecord`]
//! - **Events**: [`LedgerEvent`]
//! - **Configuration**: [`CoordinatorConfig`], [`LedgerConfig`], [`RequestLimits`], [`AccountConfig`]
//! - **Errors**: [`TallyError`] with `TL_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod balance;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod ids;
pub mod lock;
pub mod operation;
pub mod record;
pub mod session;

// Re-export all primary types at crate root for ergonomic imports:
//   use tally_types::{Operation, BalanceSet, LockSnapshot, ...};

pub use balance::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use lock::*;
pub use operation::*;
pub use record::*;
pub use session::*;

// Constants are accessed via `tally_types::constants::FOO`
// (not re-exported to avoid name collisions).
