//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of connections in a pool
pub const DEFAULT_CAPACITY: usize = 8;

/// Default time an acquire waits for a free connection, in milliseconds
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;

/// Configuration for a connection pool
///
/// Controls the fixed pool size and how long `acquire` may block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of connections the pool opens and lends out
    capacity: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given capacity
    ///
    /// A capacity of zero is accepted here and rejected when the pool is
    /// first opened, so configurations can be loaded before they are checked.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the acquire timeout
    pub fn with_acquire_timeout(self, timeout: Duration) -> Self {
        self.with_acquire_timeout_ms(timeout.as_millis() as u64)
    }

    /// Get the pool capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - capacity: 8
    /// - acquire_timeout: 30 seconds
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
