//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a connection pool's slots and admission gate
///
/// At quiescent points `leased == capacity - available_permits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of slots in the pool
    capacity: usize,
    /// Slots holding a connection ready to lend
    idle: usize,
    /// Slots whose connection is currently lent out
    leased: usize,
    /// Slots without a connection
    vacant: usize,
    /// Permits the admission gate can still grant
    available_permits: usize,
    /// Callers blocked waiting for a permit
    waiting: usize,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(
        capacity: usize,
        idle: usize,
        leased: usize,
        vacant: usize,
        available_permits: usize,
        waiting: usize,
    ) -> Self {
        Self {
            capacity,
            idle,
            leased,
            vacant,
            available_permits,
            waiting,
        }
    }

    /// Get the pool capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of idle connections
    pub fn idle(&self) -> usize {
        self.idle
    }

    /// Get the number of leased (in-use) connections
    pub fn leased(&self) -> usize {
        self.leased
    }

    /// Get the number of slots without a connection
    pub fn vacant(&self) -> usize {
        self.vacant
    }

    /// Get the number of permits left in the admission gate
    pub fn available_permits(&self) -> usize {
        self.available_permits
    }

    /// Get the number of callers waiting for a permit
    pub fn waiting(&self) -> usize {
        self.waiting
    }

    /// Number of connections the pool currently owns (idle + leased)
    pub fn connections(&self) -> usize {
        self.idle + self.leased
    }

    /// Calculate pool utilization as a fraction (0.0 to 1.0)
    ///
    /// Returns 0.0 if capacity is 0 to avoid division by zero.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.leased as f64 / self.capacity as f64
        }
    }

    /// Check if every slot is lent out
    pub fn is_exhausted(&self) -> bool {
        self.capacity > 0 && self.leased == self.capacity
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0, 0, 0, 0)
    }
}
