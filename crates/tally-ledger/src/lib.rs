//! # tally-ledger
//!
//! **Ledger plane**: the authoritative balance set and everything that keeps
//! it honest.
//!
//! - [`BalanceLedger`] applies one [`Operation`](tally_types::Operation) at a
//!   time, atomically, with a clamp-never-negative policy
//! - [`SupplyConservation`] checks every transition against its declared
//!   net supply change
//! - [`LogChain`] seals operation records into a SHA-256 digest chain
//! - [`RecentOperations`] keeps a bounded window of recent records
//! - [`LedgerStore`] is the persistence seam, with [`MemoryStore`] and
//!   [`JsonFileStore`] implementations

pub mod balance_ledger;
pub mod chain;
pub mod conservation;
pub mod file_store;
pub mod history;
pub mod store;

pub use balance_ledger::{ApplyOutcome, BalanceLedger};
pub use chain::{LogChain, RecordDraft, verify_chain};
pub use conservation::SupplyConservation;
pub use file_store::JsonFileStore;
pub use history::RecentOperations;
pub use store::{LedgerStore, MemoryStore};
