//! System-wide constants for the Tally coordinator.

/// Name of the bank counter in the default configuration.
pub const DEFAULT_BANK_COUNTER: &str = "bank";

/// Number of participant counters in the default configuration (`c1`..`c5`).
pub const DEFAULT_PARTICIPANT_COUNT: usize = 5;

/// Starting balance of every participant counter (whole units).
pub const DEFAULT_STARTING_BALANCE: i64 = 10_000;

/// Starting balance of the bank (whole units).
pub const DEFAULT_BANK_STARTING_BALANCE: i64 = 0;

/// Decimal places kept for amounts (requests and derived shares).
pub const AMOUNT_SCALE: u32 = 8;

/// Smallest accepted percentage for percentage-based operations.
pub const MIN_PERCENTAGE: i64 = 1;

/// Largest accepted percentage for percentage-based operations.
pub const MAX_PERCENTAGE: i64 = 100;

/// Largest amount accepted in a single request.
pub const DEFAULT_MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Number of recent operation records kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default number of records returned by a recent-operations query.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Capacity of the broadcast channel feeding observers.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Default API listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Maximum size of one client message line, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Digest that precedes the first record of the operation log.
pub const GENESIS_DIGEST: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Tally";
