//! # tally-coordinator
//!
//! **Coordination plane**: turns client requests into serialized ledger and
//! lock transitions and fans the results out to every observer.
//!
//! ## Architecture
//!
//! ```text
//! tally-server (bin)
//!   └─ Server               (TCP, newline-delimited JSON)
//!        └─ Arc<Mutex<Coordinator<S>>>
//!             ├─ SessionRegistry   (connections → sessions)
//!             ├─ SessionSource     (credentials → participant)
//!             ├─ RequestValidator  (shape and bounds)
//!             ├─ LockManager       (per-counter + global locks)
//!             ├─ BalanceLedger     (atomic transformations)
//!             ├─ LogChain + RecentOperations
//!             ├─ LedgerStore S     (MemoryStore | JsonFileStore)
//!             └─ broadcast::Sender<LedgerEvent>
//! ```

pub mod coordinator;
pub mod credentials;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod validation;

pub use coordinator::{Connection, Coordinator};
pub use credentials::{CredentialTable, SessionSource};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::SessionRegistry;
pub use server::{Server, SharedCoordinator, dispatch};
pub use validation::RequestValidator;
