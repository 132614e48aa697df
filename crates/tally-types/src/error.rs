//! Error types for the Tally coordinator.
//!
//! All errors use the `TL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by category:
//! - 1xx: Validation errors (rejected before any state change)
//! - 2xx: Lock errors (someone else holds the counter or the system)
//! - 3xx: Authentication / authorization errors
//! - 4xx: Persistence errors (in-memory effect stands)
//! - 5xx: Not-found errors
//! - 9xx: General / internal errors

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ActorId, CounterId, SessionId};

/// Coarse category of a [`TallyError`], sent to clients alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Lock,
    Auth,
    Persistence,
    NotFound,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Lock => write!(f, "LOCK"),
            Self::Auth => write!(f, "AUTH"),
            Self::Persistence => write!(f, "PERSISTENCE"),
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all Tally operations.
#[derive(Debug, Error)]
pub enum TallyError {
    // =================================================================
    // Validation Errors (1xx)
    // =================================================================
    /// The request is malformed (same source and target, empty map, ...).
    #[error("TL_ERR_100: Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// An amount is negative, zero where positive is required, or too large.
    #[error("TL_ERR_101: Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: String },

    /// A percentage falls outside the configured bounds.
    #[error("TL_ERR_102: Percentage {value} outside [{min}, {max}]")]
    PercentageOutOfRange {
        value: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// The bank does not hold enough to divide the requested amount.
    #[error("TL_ERR_103: Insufficient bank balance: need {needed}, have {available}")]
    InsufficientBank { needed: Decimal, available: Decimal },

    /// The result would exceed the decimal range.
    #[error("TL_ERR_104: Arithmetic overflow on counter {counter}")]
    AmountOverflow { counter: CounterId },

    // =================================================================
    // Lock Errors (2xx)
    // =================================================================
    /// The counter is held by another participant.
    #[error("TL_ERR_200: Counter {counter} is held by {holder}")]
    CounterLocked { counter: CounterId, holder: ActorId },

    /// The whole system is held by an admin's global lock.
    #[error("TL_ERR_201: System is globally locked by {holder}")]
    GloballyLocked { holder: ActorId },

    /// The actor tried to release a lock they do not hold.
    #[error("TL_ERR_202: {actor} does not hold the lock on {target}")]
    NotLockHolder { actor: ActorId, target: String },

    // =================================================================
    // Auth Errors (3xx)
    // =================================================================
    /// A mutating request arrived on a connection that never authenticated.
    #[error("TL_ERR_300: Not authenticated")]
    NotAuthenticated,

    /// Unknown username or wrong password.
    #[error("TL_ERR_301: Invalid credentials")]
    InvalidCredentials,

    /// The role is not allowed to perform this action.
    #[error("TL_ERR_302: Forbidden: {reason}")]
    Forbidden { reason: String },

    /// The connection already has an authenticated session.
    #[error("TL_ERR_303: Session already authenticated as {actor}")]
    AlreadyAuthenticated { actor: ActorId },

    // =================================================================
    // Persistence Errors (4xx)
    // =================================================================
    /// The ledger store rejected a write or read.
    #[error("TL_ERR_400: Ledger store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// The persisted operation log does not verify.
    #[error("TL_ERR_401: Operation log chain broken at sequence {sequence}: {reason}")]
    LogChainBroken { sequence: u64, reason: String },

    // =================================================================
    // Not Found Errors (5xx)
    // =================================================================
    /// The counter is not part of the configured set.
    #[error("TL_ERR_500: Unknown counter: {0}")]
    UnknownCounter(CounterId),

    /// The connection is not registered.
    #[error("TL_ERR_501: Unknown session: {0}")]
    UnknownSession(SessionId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// An applied operation did not preserve the declared supply change.
    #[error("TL_ERR_900: Supply invariant violation: {reason}")]
    SupplyInvariantViolation { reason: String },

    /// Unrecoverable internal error.
    #[error("TL_ERR_901: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("TL_ERR_902: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("TL_ERR_903: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk, network).
    #[error("TL_ERR_904: I/O error: {0}")]
    Io(String),
}

impl TallyError {
    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest { .. }
            | Self::InvalidAmount { .. }
            | Self::PercentageOutOfRange { .. }
            | Self::InsufficientBank { .. }
            | Self::AmountOverflow { .. } => ErrorKind::Validation,
            Self::CounterLocked { .. } | Self::GloballyLocked { .. } | Self::NotLockHolder { .. } => {
                ErrorKind::Lock
            }
            Self::NotAuthenticated
            | Self::InvalidCredentials
            | Self::Forbidden { .. }
            | Self::AlreadyAuthenticated { .. } => ErrorKind::Auth,
            Self::StoreUnavailable { .. } | Self::LogChainBroken { .. } => ErrorKind::Persistence,
            Self::UnknownCounter(_) | Self::UnknownSession(_) => ErrorKind::NotFound,
            Self::SupplyInvariantViolation { .. }
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// The `TL_ERR_xxx` code at the start of the display string.
    #[must_use]
    pub fn code(&self) -> String {
        let msg = self.to_string();
        msg.split(':').next().unwrap_or_default().to_string()
    }

    /// Current holder named by a lock error, if any.
    #[must_use]
    pub fn holder(&self) -> Option<&ActorId> {
        match self {
            Self::CounterLocked { holder, .. } | Self::GloballyLocked { holder } => Some(holder),
            _ => None,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, TallyError>;

// Conversion from std::io::Error
impl From<std::io::Error> for TallyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TallyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
