//! Error types for slotpool

use serde::Serialize;
use thiserror::Error;

/// Classification of a [`PoolError`], independent of its message.
///
/// Callers that poll the last error of a pool usually only care about the
/// kind, so this is the type tests and retry loops should match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotInitialized,
    NotThreadSafe,
    LibraryInitFailed,
    GateInitFailed,
    ConnectFailed,
    ReconnectFailed,
    NotOpen,
    InvalidInput,
    GateTimeout,
    LockTimeout,
    GateSignalFailed,
    SlotInvariantViolation,
    PingFailed,
    Driver,
}

/// Core error type for pool and driver operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("the connection pool is not initialized")]
    NotInitialized,

    #[error("database client library is not thread-safe")]
    NotThreadSafe,

    #[error("failed to initialize the database client library: {0}")]
    LibraryInit(String),

    #[error("failed to create the admission gate: {0}")]
    GateInit(String),

    #[error("cannot connect to the database (slot {slot}): {reason}")]
    Connect { slot: usize, reason: String },

    #[error("cannot reconnect to the database (slot {slot}): {reason}")]
    Reconnect { slot: usize, reason: String },

    #[error("the connection pool is not open")]
    NotOpen,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("timed out after {waited_ms}ms waiting for a free connection")]
    GateTimeout { waited_ms: u64 },

    #[error("timed out waiting for the slot table lock")]
    LockTimeout,

    #[error("admission gate release failed: {0}")]
    GateSignal(String),

    #[error("no free slot found although a permit was granted (pool bug)")]
    NoFreeSlot,

    #[error("slot {slot} is not leased to the returning holder (pool bug)")]
    NoLeasedSlot { slot: usize },

    #[error("database ping was not successful: {0}")]
    Ping(String),

    #[error("driver error: {0}")]
    Driver(String),
}

impl PoolError {
    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::NotInitialized => ErrorKind::NotInitialized,
            PoolError::NotThreadSafe => ErrorKind::NotThreadSafe,
            PoolError::LibraryInit(_) => ErrorKind::LibraryInitFailed,
            PoolError::GateInit(_) => ErrorKind::GateInitFailed,
            PoolError::Connect { .. } => ErrorKind::ConnectFailed,
            PoolError::Reconnect { .. } => ErrorKind::ReconnectFailed,
            PoolError::NotOpen => ErrorKind::NotOpen,
            PoolError::InvalidInput(_) => ErrorKind::InvalidInput,
            PoolError::GateTimeout { .. } => ErrorKind::GateTimeout,
            PoolError::LockTimeout => ErrorKind::LockTimeout,
            PoolError::GateSignal(_) => ErrorKind::GateSignalFailed,
            PoolError::NoFreeSlot | PoolError::NoLeasedSlot { .. } => {
                ErrorKind::SlotInvariantViolation
            }
            PoolError::Ping(_) => ErrorKind::PingFailed,
            PoolError::Driver(_) => ErrorKind::Driver,
        }
    }

    /// Whether this error means the pool itself is in an impossible state.
    ///
    /// These never occur in correct usage; the host application decides
    /// whether to terminate.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::SlotInvariantViolation | ErrorKind::GateSignalFailed
        )
    }

    /// Whether retrying the same call later can succeed without reopening
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::GateTimeout | ErrorKind::LockTimeout)
    }
}

/// Result type alias for slotpool operations
pub type Result<T> = std::result::Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_errors_share_a_kind() {
        assert_eq!(PoolError::NoFreeSlot.kind(), ErrorKind::SlotInvariantViolation);
        assert_eq!(
            PoolError::NoLeasedSlot { slot: 3 }.kind(),
            ErrorKind::SlotInvariantViolation
        );
        assert!(PoolError::NoFreeSlot.is_invariant_violation());
        assert!(PoolError::GateSignal("over capacity".into()).is_invariant_violation());
        assert!(!PoolError::NotOpen.is_invariant_violation());
    }

    #[test]
    fn test_timeouts_are_transient() {
        assert!(PoolError::GateTimeout { waited_ms: 10 }.is_transient());
        assert!(PoolError::LockTimeout.is_transient());
        assert!(!PoolError::Connect { slot: 0, reason: "refused".into() }.is_transient());
    }

    #[test]
    fn test_error_messages_carry_slot() {
        let err = PoolError::Connect {
            slot: 2,
            reason: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot connect to the database (slot 2): connection refused"
        );
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::GateTimeout).unwrap();
        assert_eq!(json, "\"gate_timeout\"");
    }
}
